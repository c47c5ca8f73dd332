// GPTZero Provider
// Single endpoint, x-api-key auth, probability in documents[0].completely_generated_prob

use super::retry::{run_with_retries, RetryPolicy};
use super::{Classifier, ModelId, ProviderError, ProviderKind};
use crate::services::heuristics::normalize_score;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::env;
use tracing::{info, warn};

const GPTZERO_DEFAULT_URL: &str = "https://api.gptzero.me/v2/predict/text";
const GPTZERO_INITIAL_BACKOFF_MS: u64 = 500;

#[derive(Debug, Serialize)]
struct PredictRequest<'a> {
    document: &'a str,
}

pub struct GptZeroClient {
    client: Client,
    url: String,
    retry: RetryPolicy,
}

impl Default for GptZeroClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GptZeroClient {
    pub fn new() -> Self {
        let url = env::var("GPTZERO_API_URL").unwrap_or_else(|_| GPTZERO_DEFAULT_URL.to_string());
        Self::with_url(Client::new(), url)
    }

    pub fn with_url(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            retry: RetryPolicy::new(GPTZERO_INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn predict_once(&self, text: &str, api_key: &str) -> Result<u8, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", api_key)
            .json(&PredictRequest { document: text })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ProviderError::Auth);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Rate);
        }
        if !status.is_success() {
            return Err(ProviderError::Server(Some(status.as_u16())));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|_| ProviderError::BadResponse)?;

        let prob = data["documents"][0]["completely_generated_prob"]
            .as_f64()
            .ok_or(ProviderError::BadResponse)?;

        Ok(normalize_score(prob * 100.0))
    }
}

#[async_trait]
impl Classifier for GptZeroClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::GptZero
    }

    async fn classify(
        &self,
        text: &str,
        api_key: &str,
        _model: Option<&ModelId>,
    ) -> Result<u8, ProviderError> {
        let result = run_with_retries(&self.retry, "gptzero", |_| self.predict_once(text, api_key)).await;
        match &result {
            Ok(score) => info!(score, chars = text.chars().count(), "[PROVIDER] gptzero ok"),
            Err(e) => warn!(error = %e, "[PROVIDER] gptzero failed"),
        }
        result
    }
}
