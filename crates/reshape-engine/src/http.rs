use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Blocking client without an overall request timeout. Generation and
/// streaming calls run as long as the server keeps the connection open.
pub(crate) fn build_client() -> Result<HttpClient> {
    HttpClient::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None)
        .build()
        .context("failed to build HTTP client")
}

/// Status code, success flag, and body text of a finished response.
pub(crate) fn read_body(label: &str, response: HttpResponse) -> Result<(u16, bool, String)> {
    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    Ok((status.as_u16(), status.is_success(), body))
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
