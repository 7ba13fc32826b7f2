//! Best-effort recovery of a JSON object from free-form model output.
//!
//! Text models asked for "only JSON" still wrap it in markdown fences or
//! surround it with prose. A fenced block wins; otherwise the widest
//! `{ ... }` span is taken.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::CoreError;

const SNIPPET_LEN: usize = 500;

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

static BARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("bare JSON pattern is valid"));

/// Locate the JSON object in `reply` and parse it.
pub fn extract_json_object(reply: &str) -> Result<Value, CoreError> {
    let span = locate(reply).ok_or(CoreError::NoJson)?;
    debug!(len = span.len(), "located JSON span in model reply");

    serde_json::from_str(span).map_err(|source| CoreError::InvalidJson {
        source,
        snippet: span.chars().take(SNIPPET_LEN).collect(),
    })
}

fn locate(reply: &str) -> Option<&str> {
    if let Some(caps) = FENCED.captures(reply) {
        return caps.get(1).map(|m| m.as_str());
    }
    BARE.find(reply).map(|m| m.as_str())
}
