// TweetGuard Core Services

pub mod analysis;
pub mod config_store;
pub mod heuristics;
pub mod providers;
pub mod storage;
pub mod text_processor;

pub use analysis::{AnalysisOrchestrator, FilterAction, RequestQueue};
pub use config_store::ConfigStore;
pub use heuristics::{analyze_heuristics, heuristic_score, HeuristicBreakdown};
pub use providers::{Classifier, GptZeroClient, HuggingFaceClient, ModelId, ProviderError, ProviderKind};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
