// Analysis Pipeline
// Rate-limited queue -> orchestrator -> cache / stats / providers

pub mod cache;
pub mod filter;
pub mod orchestrator;
pub mod queue;
pub mod stats;

pub use cache::{ResponseCache, CACHE_KEY, CACHE_MAX_ITEMS, CACHE_TTL_MS};
pub use filter::FilterAction;
pub use orchestrator::{AnalysisOrchestrator, Outcome};
pub use queue::{RequestQueue, MAX_TEXT_LENGTH, RATE_LIMIT_MS};
pub use stats::{StatsTracker, STATS_KEY};
