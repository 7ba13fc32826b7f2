mod display;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use certidao_ai::extractor::{DEFAULT_NUM_CTX, DEFAULT_TEXT_MODEL, DEFAULT_VISION_MODEL};
use certidao_ai::ollama::DEFAULT_HOST;
use certidao_ai::{DeedExtractor, ModelConfig, OllamaClient, load_image};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Read a Brazilian property registry certificate (certidão de imóvel) with a
/// local vision model and restructure it into fixed fields.
#[derive(Parser, Debug)]
#[command(name = "certidao", version, about)]
struct Cli {
    /// Path to the certificate image.
    image: PathBuf,

    /// Write the extracted record to this CSV file.
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Also print the structured JSON returned by the text model.
    #[arg(long)]
    show_json: bool,

    /// Also print the raw transcription returned by the vision model.
    #[arg(long)]
    show_text: bool,

    /// Ollama server URL.
    #[arg(long, env = "OLLAMA_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Vision model used to transcribe the image.
    #[arg(long, env = "CERTIDAO_VISION_MODEL", default_value = DEFAULT_VISION_MODEL)]
    vision_model: String,

    /// Text model used to structure the transcription.
    #[arg(long, env = "CERTIDAO_TEXT_MODEL", default_value = DEFAULT_TEXT_MODEL)]
    text_model: String,

    /// Context window passed to both models.
    #[arg(long, env = "CERTIDAO_NUM_CTX", default_value_t = DEFAULT_NUM_CTX)]
    num_ctx: u32,

    /// Sampling temperature for both models.
    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Per-request timeout in seconds.
    #[arg(long, env = "CERTIDAO_TIMEOUT", default_value_t = 600, value_name = "SECS")]
    timeout: u64,

    /// Skip checking that both models are pulled before running.
    #[arg(long)]
    skip_preflight: bool,
}

impl Cli {
    fn model_config(&self) -> ModelConfig {
        ModelConfig {
            vision_model: self.vision_model.clone(),
            text_model: self.text_model.clone(),
            temperature: self.temperature,
            num_ctx: self.num_ctx,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    info!("certidao v{}", env!("CARGO_PKG_VERSION"));
    run(cli).await
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Read the image first so a bad path fails before any network traffic.
    let image = load_image(&cli.image).await?;

    let host = normalize_host(&cli.host);
    let client = OllamaClient::new(host.as_str())
        .with_timeout(Duration::from_secs(cli.timeout))
        .context("building HTTP client")?;
    let extractor = DeedExtractor::new(client, cli.model_config());

    if !cli.skip_preflight {
        extractor
            .preflight()
            .await
            .with_context(|| format!("checking models on {host}"))?;
    }

    let out = extractor
        .extract_image(&image)
        .await
        .with_context(|| format!("extracting {}", cli.image.display()))?;

    if cli.show_text {
        display::print_block("TRANSCRIPTION", &out.transcript);
    }
    display::print_block("EXTRACTED RECORD", &display::render_card(&out.record));
    if cli.show_json {
        display::print_block("STRUCTURED JSON", &display::render_json(&out.json)?);
    }

    if let Some(path) = &cli.output {
        certidao_core::write_csv_file(path, std::slice::from_ref(&out.record))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("\nCSV written to {}", path.display());
    }
    Ok(())
}

const DEFAULT_PORT: u16 = 11434;

/// Accept `OLLAMA_HOST`-style values, e.g. `0.0.0.0` or `127.0.0.1:11434`.
///
/// Without a scheme, `http` and port 11434 are assumed unless a port is given.
/// With an explicit scheme the value is used as is.
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        return host.to_string();
    }
    if host.is_empty() {
        return format!("http://127.0.0.1:{DEFAULT_PORT}");
    }

    let (authority, path) = match host.find('/') {
        Some(i) => host.split_at(i),
        None => (host, ""),
    };
    let has_port = if authority.starts_with('[') {
        authority.contains("]:")
    } else {
        authority.contains(':')
    };
    if has_port {
        format!("http://{authority}{path}")
    } else {
        format!("http://{authority}:{DEFAULT_PORT}{path}")
    }
}
