use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("no JSON object found in model reply")]
    NoJson,

    #[error("invalid JSON in model reply: {source}; snippet: {snippet}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
