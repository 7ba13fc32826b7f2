//! HTTP client for a local Ollama server (`/api/chat`, `/api/tags`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::backend::{ChatBackend, ChatMessage, ChatRequest};

pub const DEFAULT_HOST: &str = "http://localhost:11434";

#[derive(Error, Debug)]
pub enum AiError {
    #[error("cannot reach model server at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("model `{model}` is not available on the server; pull it first (`ollama pull {model}`)")]
    ModelNotFound { model: String },
    #[error("model `{model}` ran out of memory: {detail}")]
    OutOfMemory { model: String, detail: String },
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("model `{model}` returned an empty response")]
    EmptyResponse { model: String },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Client for a single Ollama server.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

impl OllamaClient {
    /// Create a client for the given base URL, e.g. `http://localhost:11434`
    /// (a trailing slash is dropped).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Replace the underlying HTTP client with one that gives up after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, AiError> {
        self.client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        let url = format!("{}/api/chat", self.base_url);
        let images: usize = request.messages.iter().map(|m| m.images.len()).sum();
        info!(model = %request.model, images, "sending chat request");

        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(&request.model, status, body));
        }

        let chat: ChatResponse = resp.json().await.map_err(|e| send_error(&url, e))?;
        let content = chat.message.content.trim().to_string();
        info!(
            model = %request.model,
            chars = content.chars().count(),
            eval_tokens = chat.eval_count.unwrap_or(0),
            prompt_tokens = chat.prompt_eval_count.unwrap_or(0),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "chat response received"
        );

        if content.is_empty() {
            return Err(AiError::EmptyResponse {
                model: request.model.clone(),
            });
        }
        Ok(content)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, AiError> {
        self.post_chat(request).await
    }

    async fn list_models(&self) -> Result<Vec<String>, AiError> {
        let url = format!("{}/api/tags", self.base_url);
        debug!(url = %url, "listing models");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = resp.json().await.map_err(|e| send_error(&url, e))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}

fn send_error(url: &str, err: reqwest::Error) -> AiError {
    if err.is_timeout() {
        AiError::Timeout {
            url: url.to_string(),
        }
    } else if err.is_connect() {
        AiError::Unreachable {
            url: url.to_string(),
            source: err,
        }
    } else {
        AiError::Http(err)
    }
}

const MEMORY_MARKERS: &[&str] = &[
    "out of memory",
    "requires more system memory",
    "signal: killed",
    "unexpectedly stopped",
    "cudamalloc failed",
];

/// Map a non-success chat response onto a specific error.
///
/// Ollama reports failures as `{"error": "..."}`; the raw body is used when
/// it is not in that shape.
fn classify_failure(model: &str, status: StatusCode, body: String) -> AiError {
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    let lower = message.to_lowercase();

    if status == StatusCode::NOT_FOUND && lower.contains("not found") {
        return AiError::ModelNotFound {
            model: model.to_string(),
        };
    }
    if MEMORY_MARKERS.iter().any(|m| lower.contains(m)) {
        return AiError::OutOfMemory {
            model: model.to_string(),
            detail: message,
        };
    }
    AiError::Server {
        status: status.as_u16(),
        body: message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ChatOptions;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve exactly one canned HTTP response on a loopback port.
    ///
    /// Returns the base URL and a handle resolving to the raw request text.
    async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let request = read_request(&mut sock).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            request
        });

        (format!("http://{addr}"), handle)
    }

    async fn read_request(sock: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = sock.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(header_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&buf[..header_end]).to_lowercase();
            let content_length = headers
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= header_end + 4 + content_length {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn request(model: &str) -> ChatRequest {
        ChatRequest::user(
            model,
            "read this",
            ChatOptions {
                temperature: 0.0,
                num_ctx: 2048,
            },
        )
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/");
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn chat_returns_trimmed_content() {
        let body = r#"{"model":"llama3","message":{"role":"assistant","content":"  MATRÍCULA 12.345\n"},"done":true,"eval_count":12}"#;
        let (url, server) = serve_once("200 OK", body.to_string()).await;

        let client = OllamaClient::new(url);
        let reply = client.chat(&request("llama3")).await.unwrap();
        assert_eq!(reply, "MATRÍCULA 12.345");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /api/chat "));
        assert!(raw.contains(r#""stream":false"#));
        assert!(raw.contains(r#""num_ctx":2048"#));
    }

    #[tokio::test]
    async fn chat_sends_image_payload() {
        let body = r#"{"message":{"role":"assistant","content":"ok"}}"#;
        let (url, server) = serve_once("200 OK", body.to_string()).await;

        let client = OllamaClient::new(url);
        let req = request("llama3.2-vision").with_image(&[0xFF, 0xD8, 0xFF, 0xE0]);
        client.chat(&req).await.unwrap();

        let raw = server.await.unwrap();
        assert!(raw.contains(r#""images":["/9j/4A=="]"#));
    }

    #[tokio::test]
    async fn empty_content_is_an_error() {
        let body = r#"{"message":{"role":"assistant","content":"   "}}"#;
        let (url, _server) = serve_once("200 OK", body.to_string()).await;

        let err = OllamaClient::new(url)
            .chat(&request("llama3"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse { model } if model == "llama3"));
    }

    #[tokio::test]
    async fn undecodable_body_is_http_error() {
        let (url, _server) = serve_once("200 OK", "not json".to_string()).await;

        let err = OllamaClient::new(url)
            .chat(&request("llama3"))
            .await
            .unwrap_err();
        match err {
            AiError::Http(e) => assert!(e.is_decode(), "got {e:?}"),
            other => panic!("expected Http, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_model_is_reported() {
        let body = r#"{"error":"model \"llama3.2-vision\" not found, try pulling it first"}"#;
        let (url, _server) = serve_once("404 Not Found", body.to_string()).await;

        let err = OllamaClient::new(url)
            .chat(&request("llama3.2-vision"))
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::ModelNotFound { model } if model == "llama3.2-vision"));
    }

    #[tokio::test]
    async fn killed_runner_is_out_of_memory() {
        let body = r#"{"error":"llama runner process has terminated: signal: killed"}"#;
        let (url, _server) = serve_once("500 Internal Server Error", body.to_string()).await;

        let err = OllamaClient::new(url)
            .chat(&request("llama3.2-vision"))
            .await
            .unwrap_err();
        match err {
            AiError::OutOfMemory { model, detail } => {
                assert_eq!(model, "llama3.2-vision");
                assert!(detail.contains("signal: killed"));
            }
            other => panic!("expected OutOfMemory, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn other_failures_keep_status_and_message() {
        let (url, _server) =
            serve_once("400 Bad Request", r#"{"error":"invalid options"}"#.to_string()).await;

        let err = OllamaClient::new(url)
            .chat(&request("llama3"))
            .await
            .unwrap_err();
        match err {
            AiError::Server { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "invalid options");
            }
            other => panic!("expected Server, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn list_models_reads_tags() {
        let body = r#"{"models":[{"name":"llama3:latest","size":1},{"name":"llama3.2-vision:latest","size":2}]}"#;
        let (url, server) = serve_once("200 OK", body.to_string()).await;

        let models = OllamaClient::new(url).list_models().await.unwrap();
        assert_eq!(models, vec!["llama3:latest", "llama3.2-vision:latest"]);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("GET /api/tags "));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = OllamaClient::new(format!("http://{addr}"))
            .list_models()
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Unreachable { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let client = OllamaClient::new(format!("http://{addr}"))
            .with_timeout(Duration::from_millis(200))
            .unwrap();
        let err = client.chat(&request("llama3")).await.unwrap_err();
        assert!(matches!(err, AiError::Timeout { .. }), "got {err:?}");
    }

    #[test]
    fn classify_plain_text_body() {
        let err = classify_failure(
            "llama3",
            StatusCode::INTERNAL_SERVER_ERROR,
            "model requires more system memory (8.0 GiB) than is available (4.1 GiB)".into(),
        );
        assert!(matches!(err, AiError::OutOfMemory { .. }));
    }

    #[test]
    fn not_found_without_model_message_is_server_error() {
        let err = classify_failure("llama3", StatusCode::NOT_FOUND, "404 page".into());
        assert!(matches!(err, AiError::Server { status: 404, .. }));
    }
}
