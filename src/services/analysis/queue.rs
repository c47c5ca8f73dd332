// Request Queue
// Single drain task, FIFO, at most one request in flight and one dispatch per RATE_LIMIT_MS.

use super::orchestrator::AnalysisOrchestrator;
use crate::models::{AnalysisRequest, AnalysisResponse, ErrorCode, Stats};
use crate::services::storage::StoreError;
use crate::services::text_processor::truncate_chars;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, error, info};

pub const RATE_LIMIT_MS: u64 = 800;
/// Longest text forwarded to analysis, in characters
pub const MAX_TEXT_LENGTH: usize = 5000;

struct Job {
    request: AnalysisRequest,
    respond: oneshot::Sender<AnalysisResponse>,
}

/// Cloneable handle to the drain task
#[derive(Clone)]
pub struct RequestQueue {
    jobs: mpsc::UnboundedSender<Job>,
    orchestrator: Arc<Mutex<AnalysisOrchestrator>>,
}

impl RequestQueue {
    /// Start the drain task on the current tokio runtime
    pub fn spawn(orchestrator: AnalysisOrchestrator) -> Self {
        let orchestrator = Arc::new(Mutex::new(orchestrator));
        let (jobs, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(rx, orchestrator.clone()));
        info!(rate_limit_ms = RATE_LIMIT_MS, "[QUEUE] drain task started");
        Self { jobs, orchestrator }
    }

    /// Enqueue text for scoring and wait for its terminal response
    pub async fn analyze(&self, text: &str, identifier: &str) -> AnalysisResponse {
        let request = AnalysisRequest {
            text: truncate_chars(text, MAX_TEXT_LENGTH).to_string(),
            identifier: identifier.to_string(),
        };
        let (respond, response) = oneshot::channel();

        if self.jobs.send(Job { request, respond }).is_err() {
            error!(identifier, "[QUEUE] drain task gone");
            return AnalysisResponse::failed(identifier, ErrorCode::AnalysisFailed);
        }
        response
            .await
            .unwrap_or_else(|_| AnalysisResponse::failed(identifier, ErrorCode::AnalysisFailed))
    }

    // Operator actions skip the rate limiter but wait for the in-flight request

    pub async fn stats(&self) -> Result<Stats, StoreError> {
        self.orchestrator.lock().await.stats().await
    }

    pub async fn clear_cache(&self) -> Result<(), StoreError> {
        self.orchestrator.lock().await.clear_cache().await
    }

    pub async fn reset_stats(&self) -> Result<(), StoreError> {
        self.orchestrator.lock().await.reset_stats().await
    }

    pub async fn record_hidden(&self, delta: i64) -> Result<(), StoreError> {
        self.orchestrator.lock().await.record_hidden(delta).await
    }

    pub async fn set_fallback_mode(&self, enabled: bool) -> Result<(), StoreError> {
        self.orchestrator.lock().await.set_fallback_mode(enabled).await
    }

    pub async fn sync_provider(&self, provider: &str) -> Result<(), StoreError> {
        self.orchestrator.lock().await.sync_provider(provider).await
    }
}

async fn drain(mut rx: mpsc::UnboundedReceiver<Job>, orchestrator: Arc<Mutex<AnalysisOrchestrator>>) {
    let spacing = Duration::from_millis(RATE_LIMIT_MS);
    let mut last_dispatch: Option<Instant> = None;

    while let Some(Job { request, respond }) = rx.recv().await {
        if let Some(last) = last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < spacing {
                let wait = spacing - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "[QUEUE] rate limit wait");
                tokio::time::sleep(wait).await;
            }
        }
        last_dispatch = Some(Instant::now());

        let identifier = request.identifier.clone();
        let worker = orchestrator.clone();
        // a panicking analysis must not take the drain loop down with it
        let handle = tokio::spawn(async move { worker.lock().await.handle(&request).await });

        let response = match handle.await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!(identifier = %identifier, error = %e, "[QUEUE] analysis failed");
                AnalysisResponse::failed(&identifier, ErrorCode::AnalysisFailed)
            }
            Err(e) => {
                error!(identifier = %identifier, error = %e, "[QUEUE] analysis task aborted");
                AnalysisResponse::failed(&identifier, ErrorCode::AnalysisFailed)
            }
        };

        if respond.send(response).is_err() {
            debug!(identifier = %identifier, "[QUEUE] caller went away before response");
        }
    }
    debug!("[QUEUE] all handles dropped, drain task exiting");
}
