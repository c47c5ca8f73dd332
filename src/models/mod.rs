// TweetGuard Data Models
// Settings, scoring results, cache/stats records and caller-facing responses

use crate::services::providers::ProviderKind;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_HF_MODEL: &str = "openai-community/roberta-large-openai-detector";
pub const DEFAULT_PROVIDER: &str = "huggingface";

// ============ Settings ============

/// User settings; read-only to the analysis core
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub hf_api_key: String,
    pub hf_model: String,
    pub provider: String,
    pub local_only: bool,
    pub filter_enabled: bool,
    pub collapse_enabled: bool,
    pub enabled: bool,
    pub threshold: u8,
    pub analyze_timeline: bool,
    pub analyze_replies: bool,
    pub analyze_search: bool,
    pub analyze_tweet_pages: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            hf_api_key: String::new(),
            hf_model: DEFAULT_HF_MODEL.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            local_only: true,
            filter_enabled: true,
            collapse_enabled: false,
            enabled: true,
            threshold: 72,
            analyze_timeline: true,
            analyze_replies: true,
            analyze_search: false,
            analyze_tweet_pages: true,
        }
    }
}

// Keys are never printed, only whether they are set
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("api_key_len", &self.api_key.len())
            .field("hf_api_key_len", &self.hf_api_key.len())
            .field("hf_model", &self.hf_model)
            .field("provider", &self.provider)
            .field("local_only", &self.local_only)
            .field("filter_enabled", &self.filter_enabled)
            .field("collapse_enabled", &self.collapse_enabled)
            .field("enabled", &self.enabled)
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl Settings {
    /// Empty provider id falls back to the default provider
    pub fn provider_name(&self) -> &str {
        let provider = self.provider.trim();
        if provider.is_empty() {
            DEFAULT_PROVIDER
        } else {
            provider
        }
    }

    pub fn provider_kind(&self) -> ProviderKind {
        ProviderKind::from_name(self.provider_name())
    }

    /// Configured model id, or the default detector when left blank
    pub fn hf_model_or_default(&self) -> &str {
        if self.hf_model.is_empty() {
            DEFAULT_HF_MODEL
        } else {
            &self.hf_model
        }
    }

    /// Collapsing and hiding are exclusive; collapsing wins
    pub fn normalized(mut self) -> Self {
        if self.collapse_enabled && self.filter_enabled {
            self.filter_enabled = false;
        }
        self
    }
}

// ============ Scores ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Heuristic,
    Api,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Heuristic => "heuristic",
            Method::Api => "api",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: u8,
    pub method: Method,
}

impl ScoreResult {
    pub fn heuristic(score: u8) -> Self {
        Self { score, method: Method::Heuristic }
    }

    pub fn api(score: u8) -> Self {
        Self { score, method: Method::Api }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub score: u8,
    pub method: Method,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}

// ============ Stats ============

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Stats {
    pub total_analyzed: u64,
    pub avg_score: f64,
    pub hidden_count: u64,
    pub api_chars_used: u64,
    pub api_limit: u64,
    pub api_errors: u64,
    pub last_error: String,
    pub fallback_mode: bool,
    pub last_provider: String,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            total_analyzed: 0,
            avg_score: 0.0,
            hidden_count: 0,
            api_chars_used: 0,
            api_limit: 0,
            api_errors: 0,
            last_error: String::new(),
            fallback_mode: false,
            last_provider: DEFAULT_PROVIDER.to_string(),
        }
    }
}

// ============ Requests & Responses ============

/// Failure codes surfaced to callers; everything else degrades to a heuristic score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ApiKeyMissing,
    ApiKeyInvalid,
    ModelInvalid,
    ModelNotFound,
    EndpointUnavailable,
    AnalysisFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ApiKeyMissing => "API_KEY_MISSING",
            ErrorCode::ApiKeyInvalid => "API_KEY_INVALID",
            ErrorCode::ModelInvalid => "MODEL_INVALID",
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::EndpointUnavailable => "ENDPOINT_UNAVAILABLE",
            ErrorCode::AnalysisFailed => "ANALYSIS_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub text: String,
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<Method>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
    pub identifier: String,
}

impl AnalysisResponse {
    pub fn scored(identifier: impl Into<String>, result: ScoreResult) -> Self {
        Self {
            success: true,
            score: Some(result.score),
            method: Some(result.method),
            error: None,
            cached: None,
            identifier: identifier.into(),
        }
    }

    pub fn from_cache(identifier: impl Into<String>, entry: &CacheEntry) -> Self {
        Self {
            cached: Some(true),
            ..Self::scored(identifier, ScoreResult { score: entry.score, method: entry.method })
        }
    }

    pub fn failed(identifier: impl Into<String>, error: ErrorCode) -> Self {
        Self {
            success: false,
            score: None,
            method: None,
            error: Some(error),
            cached: None,
            identifier: identifier.into(),
        }
    }

    pub fn is_cached(&self) -> bool {
        self.cached.unwrap_or(false)
    }
}
