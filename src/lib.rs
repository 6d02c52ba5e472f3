pub mod analytics;
pub mod config;
pub mod db;
pub mod encoding;
pub mod engine;
pub mod models;
pub mod recommend;
pub mod retrieval;
pub mod samples;
pub mod store;

pub use engine::{CaseRecommender, EngineError};
pub use recommend::{Recommendation, RecommendationStatus};
pub use store::{CaseStore, InMemoryCaseStore, SqliteCaseStore, StoreError};

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
