//! Clients for the two external generative APIs: one turns a month name
//! into a short image prompt, the other turns a prompt into image bytes.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

pub mod clipdrop;
#[cfg(test)]
pub mod fake;
pub mod gemini;

pub use clipdrop::ClipdropClient;
pub use gemini::GeminiClient;

/// Prompts longer than this are cut down.
pub const MAX_PROMPT_WORDS: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The call succeeded but the payload cannot be used.
    #[error("unusable response: {0}")]
    Unusable(String),
}

#[async_trait]
pub trait PromptGenerator: Send + Sync {
    /// Short descriptive image prompt for the given month name.
    async fn prompt_for_month(&self, month_name: &str) -> Result<String, GenerationError>;
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Raw encoded image bytes for the prompt.
    async fn generate_image(&self, prompt: &str) -> Result<Bytes, GenerationError>;
}

/// Shared HTTP client for both APIs.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Trims whitespace and wrapping quotes, keeps at most
/// [`MAX_PROMPT_WORDS`] words. `None` when nothing is left.
pub fn normalize_prompt(raw: &str) -> Option<String> {
    let words: Vec<&str> = raw
        .trim()
        .trim_matches(|c| matches!(c, '"' | '\'' | '*' | '`'))
        .split_whitespace()
        .take(MAX_PROMPT_WORDS)
        .collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Returns the response unchanged on a 2xx status, otherwise an
/// [`GenerationError::Api`] carrying the status and body text.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, GenerationError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(GenerationError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
