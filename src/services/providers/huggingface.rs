// Hugging Face Inference Provider
// Validates the model id, walks the router's equivalent endpoints, and turns a
// label/score list into a single AI-likelihood score.

use super::retry::{run_with_retries, RetryPolicy};
use super::{Classifier, ProviderError, ProviderKind};
use crate::models::DEFAULT_HF_MODEL;
use crate::services::heuristics::normalize_score;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use std::env;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

const HF_ROUTER_BASE: &str = "https://router.huggingface.co";
const HF_INITIAL_BACKOFF_MS: u64 = 700;

/// Models whose label semantics are known up front: (model, ai labels, human labels)
const HF_LABEL_MAP: &[(&str, &[&str], &[&str])] = &[
    (
        "openai-community/roberta-large-openai-detector",
        &["LABEL_1"],
        &["LABEL_0"],
    ),
    (
        "openai-community/roberta-base-openai-detector",
        &["LABEL_1"],
        &["LABEL_0"],
    ),
];

fn model_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}/[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}(?:@[a-zA-Z0-9._-]{1,64})?$",
        )
        .expect("model id regex")
    })
}

fn ai_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)ai|generated|fake|machine").expect("ai label regex"))
}

fn human_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)human|real|original").expect("human label regex"))
}

/// A validated `owner/name[@revision]` model identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    raw: String,
    owner: String,
    name: String,
    revision: Option<String>,
}

impl ModelId {
    /// Returns `None` unless the trimmed id matches `owner/name[@revision]`
    pub fn parse(model: &str) -> Option<Self> {
        let trimmed = model.trim();
        if !model_id_re().is_match(trimmed) {
            return None;
        }
        let (base, revision) = match trimmed.split_once('@') {
            Some((base, rev)) => (base, Some(rev.to_string())),
            None => (trimmed, None),
        };
        let (owner, name) = base.split_once('/')?;
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            raw: trimmed.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
            revision,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }

    /// Path segments after `models/`; the revision rides on the name segment
    fn path_segments(&self) -> [String; 2] {
        let name = match &self.revision {
            Some(rev) => format!("{}@{}", self.name, rev),
            None => self.name.clone(),
        };
        [self.owner.clone(), name]
    }
}

impl Default for ModelId {
    fn default() -> Self {
        Self {
            raw: DEFAULT_HF_MODEL.to_string(),
            owner: "openai-community".to_string(),
            name: "roberta-large-openai-detector".to_string(),
            revision: None,
        }
    }
}

#[derive(Debug, Clone)]
struct Prediction {
    label: Option<String>,
    score: f64,
}

fn collect_predictions(data: &Value) -> Vec<Prediction> {
    let mut list = match data.as_array() {
        Some(list) => list,
        None => return Vec::new(),
    };
    if let Some(inner) = list.first().and_then(Value::as_array) {
        list = inner;
    }

    list.iter()
        .filter_map(|item| {
            let score = item.get("score")?.as_f64()?;
            let label = match item.get("label") {
                None | Some(Value::Null) => None,
                Some(Value::String(s)) => Some(s.clone()),
                Some(other) => Some(other.to_string()),
            };
            Some(Prediction { label, score })
        })
        .collect()
}

/// Turn a `[{label, score}]` response into a 0..100 AI score.
///
/// Preference order: known label map, AI-ish label, human-ish label (inverted),
/// `LABEL_1`/`LABEL_0`, then the highest-scoring label.
pub fn extract_huggingface_score(data: &Value, model: &str) -> Option<f64> {
    let scored = collect_predictions(data);
    if scored.is_empty() {
        return None;
    }

    if let Some((_, ai_labels, human_labels)) = HF_LABEL_MAP.iter().find(|(m, _, _)| *m == model) {
        let find_by_labels = |labels: &[&str]| {
            scored
                .iter()
                .find(|p| p.label.as_deref().is_some_and(|l| labels.contains(&l)))
        };
        if let Some(ai) = find_by_labels(*ai_labels) {
            return Some(ai.score * 100.0);
        }
        if let Some(human) = find_by_labels(*human_labels) {
            return Some((1.0 - human.score) * 100.0);
        }
        return None;
    }

    let find_by_label = |re: &Regex| {
        scored.iter().find(|p| {
            p.label
                .as_deref()
                .is_some_and(|l| !l.is_empty() && re.is_match(l))
        })
    };
    if let Some(ai) = find_by_label(ai_label_re()) {
        return Some(ai.score * 100.0);
    }
    if let Some(human) = find_by_label(human_label_re()) {
        return Some((1.0 - human.score) * 100.0);
    }

    let find_upper = |wanted: &str| {
        scored.iter().find(|p| {
            p.label
                .as_deref()
                .is_some_and(|l| l.to_uppercase() == wanted)
        })
    };
    if let Some(label1) = find_upper("LABEL_1") {
        return Some(label1.score * 100.0);
    }
    if let Some(label0) = find_upper("LABEL_0") {
        return Some((1.0 - label0.score) * 100.0);
    }

    // first maximum in response order
    let top = scored
        .iter()
        .fold(None::<&Prediction>, |best, p| match best {
            Some(b) if b.score >= p.score => Some(b),
            _ => Some(p),
        })?;
    Some(top.score * 100.0)
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    options: InferenceOptions,
}

pub struct HuggingFaceClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl Default for HuggingFaceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HuggingFaceClient {
    pub fn new() -> Self {
        let base_url = env::var("HF_ROUTER_URL").unwrap_or_else(|_| HF_ROUTER_BASE.to_string());
        Self::with_base_url(Client::new(), base_url)
    }

    pub fn with_base_url(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            retry: RetryPolicy::new(HF_INITIAL_BACKOFF_MS),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Equivalent inference endpoints for a model, in the order they are tried
    pub fn candidate_endpoints(&self, model: &ModelId) -> Vec<Url> {
        let base = match Url::parse(&self.base_url) {
            Ok(url) => url,
            Err(e) => {
                warn!(base = %self.base_url, error = %e, "[PROVIDER] invalid huggingface router url");
                return Vec::new();
            }
        };
        let prefixes: [&[&str]; 2] = [&["hf-inference", "models"], &["models"]];
        let [owner, name] = model.path_segments();

        prefixes
            .iter()
            .filter_map(|prefix| {
                let mut url = base.clone();
                url.path_segments_mut()
                    .ok()?
                    .pop_if_empty()
                    .extend(prefix.iter())
                    .push(&owner)
                    .push(&name);
                Some(url)
            })
            .collect()
    }

    async fn infer_once(
        &self,
        text: &str,
        api_key: &str,
        model: &ModelId,
        endpoints: &[Url],
    ) -> Result<u8, ProviderError> {
        let body = InferenceRequest {
            inputs: text,
            options: InferenceOptions {
                wait_for_model: true,
            },
        };
        let mut last_endpoint_error: Option<ProviderError> = None;

        for endpoint in endpoints {
            let response = self
                .client
                .post(endpoint.clone())
                .bearer_auth(api_key)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            match status.as_u16() {
                401 | 403 => return Err(ProviderError::Auth),
                429 => return Err(ProviderError::Rate),
                503 => {
                    let wait_ms = response
                        .json::<Value>()
                        .await
                        .ok()
                        .and_then(|v| v.get("estimated_time").and_then(Value::as_f64))
                        .filter(|secs| *secs > 0.0)
                        .map(|secs| (secs * 1000.0).round() as u64);
                    return Err(ProviderError::Loading(wait_ms));
                }
                404 => {
                    debug!(endpoint = %endpoint, "[PROVIDER] model not found on endpoint");
                    last_endpoint_error = Some(ProviderError::NotFound);
                    continue;
                }
                410 => {
                    debug!(endpoint = %endpoint, "[PROVIDER] endpoint gone");
                    last_endpoint_error = Some(ProviderError::Endpoint);
                    continue;
                }
                code if !status.is_success() => return Err(ProviderError::Server(Some(code))),
                _ => {}
            }

            let data: Value = response
                .json()
                .await
                .map_err(|_| ProviderError::BadResponse)?;
            let score = extract_huggingface_score(&data, model.as_str())
                .filter(|s| s.is_finite())
                .ok_or(ProviderError::BadResponse)?;
            return Ok(normalize_score(score));
        }

        Err(last_endpoint_error.unwrap_or(ProviderError::Server(None)))
    }
}

#[async_trait]
impl Classifier for HuggingFaceClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::HuggingFace
    }

    async fn classify(
        &self,
        text: &str,
        api_key: &str,
        model: Option<&ModelId>,
    ) -> Result<u8, ProviderError> {
        let default_model = ModelId::default();
        let model = model.unwrap_or(&default_model);
        let endpoints = self.candidate_endpoints(model);

        let result = run_with_retries(&self.retry, "huggingface", |_| {
            self.infer_once(text, api_key, model, &endpoints)
        })
        .await;
        match &result {
            Ok(score) => info!(score, model = model.as_str(), "[PROVIDER] huggingface ok"),
            Err(e) => warn!(error = %e, model = model.as_str(), "[PROVIDER] huggingface failed"),
        }
        result
    }
}
