// Remote Classification Providers
// GPTZero (single endpoint, character quota) and Hugging Face inference
// (multiple equivalent endpoints, model loading) behind one Classifier trait.

pub mod gptzero;
pub mod huggingface;
pub mod retry;

pub use gptzero::GptZeroClient;
pub use huggingface::{extract_huggingface_score, HuggingFaceClient, ModelId};
pub use retry::{run_with_retries, RetryPolicy, MAX_RETRIES};

use async_trait::async_trait;
use thiserror::Error;

/// Provider character quota for GPTZero; 0 elsewhere means unlimited
pub const GPTZERO_LIMIT: u64 = 10_000;

/// Classified provider failure. Transient, never persisted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("authentication rejected")]
    Auth,
    #[error("rate limited")]
    Rate,
    #[error("server error (status {})", status_label(.0))]
    Server(Option<u16>),
    #[error("malformed provider response")]
    BadResponse,
    #[error("model loading (retry after {0:?} ms)")]
    Loading(Option<u64>),
    #[error("endpoint unavailable")]
    Endpoint,
    #[error("model not found")]
    NotFound,
    #[error("network failure: {0}")]
    Network(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "unknown".to_string(), |s| s.to_string())
}

impl ProviderError {
    /// Transport failures, server errors, malformed bodies and model loading are retried;
    /// credential, rate and endpoint-topology errors abort the call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::Server(_)
                | ProviderError::BadResponse
                | ProviderError::Loading(_)
                | ProviderError::Network(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// Which remote service the settings select
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProviderKind {
    GptZero,
    HuggingFace,
}

impl ProviderKind {
    /// Any id other than "gptzero" selects Hugging Face
    pub fn from_name(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "gptzero" => Self::GptZero,
            _ => Self::HuggingFace,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::GptZero => "gptzero",
            Self::HuggingFace => "huggingface",
        }
    }

    /// Character quota tracked in stats (0 = unlimited)
    pub fn api_limit(&self) -> u64 {
        match self {
            Self::GptZero => GPTZERO_LIMIT,
            Self::HuggingFace => 0,
        }
    }
}

/// A remote AI-text classifier returning a 0..=100 score
#[async_trait]
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Classify `text`; `model` is only consulted by providers that host several models.
    async fn classify(
        &self,
        text: &str,
        api_key: &str,
        model: Option<&ModelId>,
    ) -> Result<u8, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_from_name() {
        assert_eq!(ProviderKind::from_name("gptzero"), ProviderKind::GptZero);
        assert_eq!(ProviderKind::from_name(" GPTZero "), ProviderKind::GptZero);
        assert_eq!(ProviderKind::from_name("huggingface"), ProviderKind::HuggingFace);
        assert_eq!(ProviderKind::from_name("something-else"), ProviderKind::HuggingFace);
    }

    #[test]
    fn test_api_limits() {
        assert_eq!(ProviderKind::GptZero.api_limit(), 10_000);
        assert_eq!(ProviderKind::HuggingFace.api_limit(), 0);
    }

    #[test]
    fn test_retryable_kinds() {
        assert!(ProviderError::Server(Some(500)).is_retryable());
        assert!(ProviderError::BadResponse.is_retryable());
        assert!(ProviderError::Loading(None).is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(!ProviderError::Auth.is_retryable());
        assert!(!ProviderError::Rate.is_retryable());
        assert!(!ProviderError::NotFound.is_retryable());
        assert!(!ProviderError::Endpoint.is_retryable());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ProviderError::Server(Some(502)).to_string(), "server error (status 502)");
        assert_eq!(ProviderError::Server(None).to_string(), "server error (status unknown)");
        assert_eq!(
            ProviderError::Network("connection reset".into()).to_string(),
            "network failure: connection reset"
        );
    }
}
