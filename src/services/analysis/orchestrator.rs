// Analysis Orchestrator
// Cache lookup, then local heuristic or remote provider depending on settings and fallback state.

use super::cache::ResponseCache;
use super::stats::StatsTracker;
use crate::models::{
    AnalysisRequest, AnalysisResponse, CacheEntry, ErrorCode, Method, ScoreResult, Settings,
    Stats, DEFAULT_PROVIDER,
};
use crate::services::heuristics::heuristic_score;
use crate::services::providers::{
    Classifier, GptZeroClient, HuggingFaceClient, ModelId, ProviderError, ProviderKind,
    GPTZERO_LIMIT,
};
use crate::services::storage::{KeyValueStore, StoreError};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

const ERR_INVALID_KEY: &str = "Invalid API key";
const ERR_RATE_LIMITED: &str = "Rate limit exceeded, switching to heuristics";
const ERR_GENERIC: &str = "API error, using heuristics";
const ERR_INVALID_MODEL: &str = "Invalid Hugging Face model ID";
const ERR_ENDPOINT: &str = "Hugging Face endpoint unavailable";
const ERR_NOT_FOUND: &str = "Hugging Face model not found";

/// Either a score or one of the caller-visible error codes
pub type Outcome = Result<ScoreResult, ErrorCode>;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub struct AnalysisOrchestrator {
    settings: watch::Receiver<Settings>,
    cache: ResponseCache,
    stats: StatsTracker,
    gptzero: Box<dyn Classifier>,
    huggingface: Box<dyn Classifier>,
    clock: fn() -> i64,
}

impl AnalysisOrchestrator {
    pub fn new(store: Arc<dyn KeyValueStore>, settings: watch::Receiver<Settings>) -> Self {
        Self::with_classifiers(
            store,
            settings,
            Box::new(GptZeroClient::new()),
            Box::new(HuggingFaceClient::new()),
        )
    }

    pub fn with_classifiers(
        store: Arc<dyn KeyValueStore>,
        settings: watch::Receiver<Settings>,
        gptzero: Box<dyn Classifier>,
        huggingface: Box<dyn Classifier>,
    ) -> Self {
        Self {
            settings,
            cache: ResponseCache::new(store.clone()),
            stats: StatsTracker::new(store),
            gptzero,
            huggingface,
            clock: now_millis,
        }
    }

    /// Replace the millisecond clock used for cache timestamps
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Serve from cache or analyze, caching successful results
    pub async fn handle(&mut self, request: &AnalysisRequest) -> Result<AnalysisResponse, StoreError> {
        let now = (self.clock)();
        self.cache.load(now).await?;

        if let Some(entry) = self.cache.get(&request.identifier) {
            debug!(identifier = %request.identifier, score = entry.score, "[CACHE] hit");
            return Ok(AnalysisResponse::from_cache(&request.identifier, entry));
        }

        match self.analyze_text(&request.text).await? {
            Ok(result) => {
                let entry = CacheEntry {
                    score: result.score,
                    method: result.method,
                    timestamp: (self.clock)(),
                };
                self.cache.insert(&request.identifier, entry, now).await?;
                Ok(AnalysisResponse::scored(&request.identifier, result))
            }
            Err(code) => {
                info!(identifier = %request.identifier, error = %code, "[ANALYSIS] request failed");
                Ok(AnalysisResponse::failed(&request.identifier, code))
            }
        }
    }

    /// Score text without touching the cache
    pub async fn analyze_text(&mut self, text: &str) -> Result<Outcome, StoreError> {
        let settings = self.settings.borrow().clone();
        let provider = settings.provider_kind();
        self.stats.sync_provider(settings.provider_name()).await?;

        if settings.local_only {
            return self.heuristic_result(text, provider).await.map(Ok);
        }

        match provider {
            ProviderKind::GptZero => self.analyze_with_gptzero(text, &settings).await,
            ProviderKind::HuggingFace => self.analyze_with_huggingface(text, &settings).await,
        }
    }

    async fn analyze_with_gptzero(&mut self, text: &str, settings: &Settings) -> Result<Outcome, StoreError> {
        if settings.api_key.is_empty() {
            return Ok(Err(ErrorCode::ApiKeyMissing));
        }
        if self.stats.is_fallback() || self.stats.api_chars_used() >= GPTZERO_LIMIT {
            debug!("[ANALYSIS] gptzero in fallback, scoring locally");
            return self.heuristic_result(text, ProviderKind::GptZero).await.map(Ok);
        }

        let kind = self.gptzero.kind();
        let result = self.gptzero.classify(text, &settings.api_key, None).await;
        self.finish_remote(text, kind, result).await
    }

    async fn analyze_with_huggingface(&mut self, text: &str, settings: &Settings) -> Result<Outcome, StoreError> {
        if settings.hf_api_key.is_empty() {
            return Ok(Err(ErrorCode::ApiKeyMissing));
        }
        let Some(model) = ModelId::parse(settings.hf_model_or_default()) else {
            self.stats.record_error(ERR_INVALID_MODEL).await?;
            return Ok(Err(ErrorCode::ModelInvalid));
        };
        if self.stats.is_fallback() {
            debug!("[ANALYSIS] huggingface in fallback, scoring locally");
            return self.heuristic_result(text, ProviderKind::HuggingFace).await.map(Ok);
        }

        let kind = self.huggingface.kind();
        let result = self
            .huggingface
            .classify(text, &settings.hf_api_key, Some(&model))
            .await;
        self.finish_remote(text, kind, result).await
    }

    /// Record a provider outcome; transient failures degrade to the heuristic
    async fn finish_remote(
        &mut self,
        text: &str,
        provider: ProviderKind,
        result: Result<u8, ProviderError>,
    ) -> Result<Outcome, StoreError> {
        let err = match result {
            Ok(score) => {
                let chars = text.chars().count() as u64;
                self.stats
                    .record_score(score, Method::Api, chars, provider)
                    .await?;
                info!(provider = provider.name(), score, "[ANALYSIS] scored by provider");
                return Ok(Ok(ScoreResult::api(score)));
            }
            Err(err) => err,
        };

        warn!(provider = provider.name(), error = %err, "[ANALYSIS] provider call failed");
        match (provider, err) {
            (ProviderKind::HuggingFace, ProviderError::Endpoint) => {
                self.stats.record_error(ERR_ENDPOINT).await?;
                Ok(Err(ErrorCode::EndpointUnavailable))
            }
            (ProviderKind::HuggingFace, ProviderError::NotFound) => {
                self.stats.record_error(ERR_NOT_FOUND).await?;
                Ok(Err(ErrorCode::ModelNotFound))
            }
            (_, ProviderError::Auth) => {
                self.stats.record_error(ERR_INVALID_KEY).await?;
                Ok(Err(ErrorCode::ApiKeyInvalid))
            }
            (_, ProviderError::Rate) => {
                self.stats.record_error(ERR_RATE_LIMITED).await?;
                self.stats.set_fallback_mode(true).await?;
                self.heuristic_result(text, provider).await.map(Ok)
            }
            _ => {
                self.stats.record_error(ERR_GENERIC).await?;
                self.heuristic_result(text, provider).await.map(Ok)
            }
        }
    }

    async fn heuristic_result(&mut self, text: &str, provider: ProviderKind) -> Result<ScoreResult, StoreError> {
        let score = heuristic_score(text);
        self.stats
            .record_score(score, Method::Heuristic, 0, provider)
            .await?;
        debug!(score, "[ANALYSIS] scored by heuristic");
        Ok(ScoreResult::heuristic(score))
    }

    // ============ Operator actions ============

    pub async fn stats(&mut self) -> Result<Stats, StoreError> {
        self.stats.snapshot().await
    }

    pub async fn clear_cache(&mut self) -> Result<(), StoreError> {
        info!("[CACHE] cleared");
        self.cache.clear().await
    }

    pub async fn reset_stats(&mut self) -> Result<(), StoreError> {
        self.stats.reset().await
    }

    pub async fn record_hidden(&mut self, delta: i64) -> Result<(), StoreError> {
        self.stats.record_hidden(delta).await
    }

    pub async fn set_fallback_mode(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.stats.set_fallback_mode(enabled).await
    }

    pub async fn sync_provider(&mut self, provider: &str) -> Result<(), StoreError> {
        let provider = if provider.trim().is_empty() {
            DEFAULT_PROVIDER
        } else {
            provider
        };
        self.stats.sync_provider(provider).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::services::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const FORMAL: &str = "Furthermore, it is important to note that renewable energy adoption \
        has accelerated significantly. In conclusion, policymakers should consider these factors.";

    #[derive(Default)]
    pub(crate) struct FakeState {
        pub outcomes: Mutex<VecDeque<Result<u8, ProviderError>>>,
        pub calls: AtomicUsize,
        pub last_model: Mutex<Option<String>>,
    }

    pub(crate) struct FakeClassifier {
        pub kind: ProviderKind,
        pub state: Arc<FakeState>,
    }

    impl FakeClassifier {
        pub fn scripted(
            kind: ProviderKind,
            outcomes: Vec<Result<u8, ProviderError>>,
        ) -> (Box<dyn Classifier>, Arc<FakeState>) {
            let state = Arc::new(FakeState::default());
            state.outcomes.lock().unwrap().extend(outcomes);
            (Box::new(Self { kind, state: state.clone() }), state)
        }
    }

    #[async_trait]
    impl Classifier for FakeClassifier {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn classify(
            &self,
            _text: &str,
            _api_key: &str,
            model: Option<&ModelId>,
        ) -> Result<u8, ProviderError> {
            self.state.calls.fetch_add(1, Ordering::SeqCst);
            *self.state.last_model.lock().unwrap() = model.map(|m| m.as_str().to_string());
            self.state
                .outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(ProviderError::Server(Some(500))))
        }
    }

    struct Harness {
        orchestrator: AnalysisOrchestrator,
        settings: watch::Sender<Settings>,
        store: Arc<MemoryStore>,
        gptzero: Arc<FakeState>,
        huggingface: Arc<FakeState>,
    }

    fn harness(
        settings: Settings,
        gptzero: Vec<Result<u8, ProviderError>>,
        huggingface: Vec<Result<u8, ProviderError>>,
    ) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let (tx, rx) = watch::channel(settings);
        let (gz, gz_state) = FakeClassifier::scripted(ProviderKind::GptZero, gptzero);
        let (hf, hf_state) = FakeClassifier::scripted(ProviderKind::HuggingFace, huggingface);
        let orchestrator = AnalysisOrchestrator::with_classifiers(store.clone(), rx, gz, hf)
            .with_clock(|| 1_700_000_000_000);
        Harness {
            orchestrator,
            settings: tx,
            store,
            gptzero: gz_state,
            huggingface: hf_state,
        }
    }

    fn gptzero_settings() -> Settings {
        Settings {
            provider: "gptzero".into(),
            api_key: "gz-key".into(),
            local_only: false,
            ..Settings::default()
        }
    }

    fn hf_settings() -> Settings {
        Settings {
            provider: "huggingface".into(),
            hf_api_key: "hf-key".into(),
            local_only: false,
            ..Settings::default()
        }
    }

    fn request(text: &str, id: &str) -> AnalysisRequest {
        AnalysisRequest {
            text: text.to_string(),
            identifier: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_local_only_never_calls_provider() {
        let mut h = harness(Settings::default(), vec![Ok(99)], vec![Ok(99)]);
        let response = h.orchestrator.handle(&request(FORMAL, "t1")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.method, Some(Method::Heuristic));
        assert_eq!(response.score, Some(heuristic_score(FORMAL)));
        assert_eq!(h.gptzero.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.huggingface.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orchestrator.stats().await.unwrap().total_analyzed, 1);
    }

    #[tokio::test]
    async fn test_second_identical_request_is_cached() {
        let mut h = harness(gptzero_settings(), vec![Ok(64)], vec![]);
        let first = h.orchestrator.handle(&request("some text here", "t1")).await.unwrap();
        let second = h.orchestrator.handle(&request("some text here", "t1")).await.unwrap();

        assert_eq!(first.score, Some(64));
        assert_eq!(first.method, Some(Method::Api));
        assert!(!first.is_cached());
        assert!(second.is_cached());
        assert_eq!(second.score, first.score);
        assert_eq!(second.method, first.method);
        assert_eq!(h.gptzero.calls.load(Ordering::SeqCst), 1);

        let stats = h.orchestrator.stats().await.unwrap();
        assert_eq!(stats.total_analyzed, 1);
        assert_eq!(stats.api_chars_used, 14);
        assert!(h.store.get("aiCache").await.unwrap().unwrap().get("t1").is_some());
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_recording_error() {
        let settings = Settings {
            api_key: String::new(),
            ..gptzero_settings()
        };
        let mut h = harness(settings, vec![], vec![]);
        let response = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(response.error, Some(ErrorCode::ApiKeyMissing));
        assert_eq!(h.orchestrator.stats().await.unwrap().api_errors, 0);
        assert!(h.store.get("aiCache").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rate_limit_enters_fallback_until_provider_switch() {
        let mut h = harness(gptzero_settings(), vec![Err(ProviderError::Rate)], vec![Ok(77)]);

        let first = h.orchestrator.handle(&request(FORMAL, "t1")).await.unwrap();
        assert_eq!(first.method, Some(Method::Heuristic));
        let stats = h.orchestrator.stats().await.unwrap();
        assert!(stats.fallback_mode);
        assert_eq!(stats.last_error, ERR_RATE_LIMITED);

        let second = h.orchestrator.handle(&request(FORMAL, "t2")).await.unwrap();
        assert_eq!(second.method, Some(Method::Heuristic));
        assert_eq!(h.gptzero.calls.load(Ordering::SeqCst), 1);

        h.settings.send_replace(hf_settings());
        let third = h.orchestrator.handle(&request(FORMAL, "t3")).await.unwrap();
        assert_eq!(third.method, Some(Method::Api));
        assert_eq!(third.score, Some(77));
        assert!(!h.orchestrator.stats().await.unwrap().fallback_mode);
        assert_eq!(
            h.huggingface.last_model.lock().unwrap().as_deref(),
            Some("openai-community/roberta-large-openai-detector")
        );
    }

    #[tokio::test]
    async fn test_gptzero_over_quota_scores_locally() {
        let mut h = harness(gptzero_settings(), vec![Ok(10)], vec![]);
        h.store
            .set(
                "stats",
                json!({"apiCharsUsed": 10_000, "lastProvider": "gptzero", "apiLimit": 10_000}),
            )
            .await
            .unwrap();

        let response = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(response.method, Some(Method::Heuristic));
        assert_eq!(h.gptzero.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_auth_error_surfaces_invalid_key() {
        let mut h = harness(gptzero_settings(), vec![Err(ProviderError::Auth)], vec![]);
        let response = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert!(!response.success);
        assert_eq!(response.error, Some(ErrorCode::ApiKeyInvalid));
        let stats = h.orchestrator.stats().await.unwrap();
        assert_eq!(stats.api_errors, 1);
        assert_eq!(stats.last_error, ERR_INVALID_KEY);
        assert_eq!(stats.total_analyzed, 0);
    }

    #[tokio::test]
    async fn test_invalid_model_is_rejected_before_calling() {
        let settings = Settings {
            hf_model: "not a model".into(),
            ..hf_settings()
        };
        let mut h = harness(settings, vec![], vec![Ok(50)]);
        let response = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(response.error, Some(ErrorCode::ModelInvalid));
        assert_eq!(h.huggingface.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.orchestrator.stats().await.unwrap().last_error, ERR_INVALID_MODEL);
    }

    #[tokio::test]
    async fn test_endpoint_topology_errors_surface_and_are_not_cached() {
        let mut h = harness(
            hf_settings(),
            vec![],
            vec![Err(ProviderError::NotFound), Err(ProviderError::Endpoint), Ok(40)],
        );
        let missing = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(missing.error, Some(ErrorCode::ModelNotFound));

        let gone = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(gone.error, Some(ErrorCode::EndpointUnavailable));
        assert_eq!(h.orchestrator.stats().await.unwrap().last_error, ERR_ENDPOINT);

        let ok = h.orchestrator.handle(&request("text", "t1")).await.unwrap();
        assert_eq!(ok.score, Some(40));
        assert!(!ok.is_cached());
    }

    #[tokio::test]
    async fn test_transient_failure_degrades_to_heuristic() {
        let mut h = harness(
            hf_settings(),
            vec![],
            vec![Err(ProviderError::Network("server error (status 502)".into()))],
        );
        let response = h.orchestrator.handle(&request(FORMAL, "t1")).await.unwrap();
        assert!(response.success);
        assert_eq!(response.method, Some(Method::Heuristic));
        let stats = h.orchestrator.stats().await.unwrap();
        assert_eq!(stats.last_error, ERR_GENERIC);
        assert!(!stats.fallback_mode);
    }

    #[tokio::test]
    async fn test_operator_actions() {
        let mut h = harness(Settings::default(), vec![], vec![]);
        h.orchestrator.handle(&request(FORMAL, "t1")).await.unwrap();
        h.orchestrator.record_hidden(3).await.unwrap();
        h.orchestrator.set_fallback_mode(true).await.unwrap();
        assert!(h.orchestrator.stats().await.unwrap().fallback_mode);

        h.orchestrator.sync_provider("gptzero").await.unwrap();
        let stats = h.orchestrator.stats().await.unwrap();
        assert!(!stats.fallback_mode);
        assert_eq!(stats.api_limit, 10_000);
        assert_eq!(stats.hidden_count, 3);

        h.orchestrator.clear_cache().await.unwrap();
        let again = h.orchestrator.handle(&request(FORMAL, "t1")).await.unwrap();
        assert!(!again.is_cached());

        h.orchestrator.reset_stats().await.unwrap();
        assert_eq!(h.orchestrator.stats().await.unwrap(), Stats::default());
    }
}
