pub mod models;
pub mod error;
pub mod config;
pub mod logger;
pub mod input_loader;
pub mod resume_manager;
pub mod output_store;
pub mod delay_manager;
pub mod profile_url;
pub mod extractor;
pub mod matching;
pub mod provider;
pub mod linkedin;
pub mod search_engine;
pub mod pipeline;
pub mod job_manager;
pub mod api;

// Exporting types for convenience
pub use config::{MatcherArgs, MatcherConfig, ProviderKind};
pub use error::{MatcherError, ProviderError};
pub use job_manager::{JobManager, StatusSnapshot};
pub use models::{ConfidenceLevel, EnrichmentResult, Identity, MatchStatus, OutputRecord};
pub use pipeline::{run_pipeline, PipelineOptions, ProgressReporter, RunSummary};
pub use provider::{Credentials, EnrichmentProvider};
