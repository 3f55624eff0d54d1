//! Clients for the external categorization and embedding services.

mod client;
mod prompt;

pub use client::GeminiClient;
pub use prompt::{classification_prompt, parse_classification, strip_successive_newlines};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of classifying one document.
#[derive(Debug, Clone)]
pub struct Classification {
    /// One of the domain's category identifiers.
    pub category: String,
    /// Document title, when the service could discern one.
    pub title: Option<String>,
    /// Effective date, when the document states one.
    pub effective_date: Option<DateTime<Utc>>,
}

/// Errors that can occur talking to the LLM services.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to reach the service.
    #[error("connection error: {0}")]
    Connection(String),

    /// The service answered with an error status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// The response violated the interface contract (out-of-enumeration
    /// category, wrong embedding shape). Never retried.
    #[error("contract violation: {0}")]
    Contract(String),
}

impl LlmError {
    /// Whether a retry with backoff could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Connection(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Parse(_) | LlmError::Contract(_) => false,
        }
    }
}

/// A backend that classifies a document from its leading pages.
///
/// The caller bounds the page prefix; implementations see only what they
/// are given.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        file_name: &str,
        pages: &[String],
    ) -> Result<Classification, LlmError>;
}

/// A backend that embeds page text into fixed-dimension vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed each page, one vector per page, order preserved.
    async fn embed_pages(&self, pages: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classes() {
        assert!(LlmError::Connection("timeout".into()).is_retryable());
        assert!(LlmError::Api { status: 503, message: "overloaded".into() }.is_retryable());
        assert!(LlmError::Api { status: 429, message: "rate limited".into() }.is_retryable());
        assert!(!LlmError::Api { status: 400, message: "bad request".into() }.is_retryable());
        assert!(!LlmError::Parse("truncated".into()).is_retryable());
        assert!(!LlmError::Contract("unknown category".into()).is_retryable());
    }
}
