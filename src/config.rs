use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level constants
pub const APP_NAME: &str = "Cliniq";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default embedding model name for both the ONNX and Ollama backends.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Remote embedding calls give up after this many seconds and fall back.
pub const DEFAULT_EMBEDDING_TIMEOUT_SECS: u64 = 10;

/// Neighbors retrieved per recommendation request.
pub const DEFAULT_NEIGHBOR_LIMIT: usize = 10;

/// Default tracing filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,cliniq=debug"
}

/// Get the application data directory.
/// `CLINIQ_DATA_DIR` overrides `~/Cliniq/`.
pub fn app_data_dir() -> PathBuf {
    if let Ok(custom) = std::env::var("CLINIQ_DATA_DIR") {
        return PathBuf::from(custom);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Path of the case history database.
pub fn database_path() -> PathBuf {
    app_data_dir().join("cliniq_data.db")
}

/// Get the models directory (for ONNX embeddings)
pub fn models_dir() -> PathBuf {
    app_data_dir().join("models")
}

/// Get the embedding model directory (all-MiniLM-L6-v2)
pub fn embedding_model_dir() -> PathBuf {
    models_dir().join("all-MiniLM-L6-v2")
}

// ═══════════════════════════════════════════════════════════
// Encoder selection
// ═══════════════════════════════════════════════════════════

/// Which fingerprint backend to try at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// ONNX if available, then Ollama, then hand-built features.
    Auto,
    /// Hand-built feature vectors only.
    Features,
    Onnx,
    Ollama,
}

impl EmbeddingBackend {
    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "features" => Some(Self::Features),
            "onnx" => Some(Self::Onnx),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Encoder configuration. The model name is fixed per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub ollama_url: String,
    pub timeout_secs: u64,
    pub onnx_model_dir: PathBuf,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Auto,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: DEFAULT_EMBEDDING_TIMEOUT_SECS,
            onnx_model_dir: embedding_model_dir(),
        }
    }
}

impl EncoderConfig {
    /// Defaults overridden by `CLINIQ_EMBEDDING_*` / `CLINIQ_OLLAMA_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CLINIQ_EMBEDDING_BACKEND") {
            match EmbeddingBackend::from_label(&raw) {
                Some(backend) => config.backend = backend,
                None => tracing::warn!(value = %raw, "Unknown embedding backend, using auto"),
            }
        }
        if let Ok(model) = std::env::var("CLINIQ_EMBEDDING_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("CLINIQ_OLLAMA_URL") {
            config.ollama_url = url;
        }
        if let Ok(raw) = std::env::var("CLINIQ_EMBEDDING_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => config.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Invalid embedding timeout, using default"),
            }
        }

        config
    }
}

// ═══════════════════════════════════════════════════════════
// Recommendation and analytics constants
// ═══════════════════════════════════════════════════════════

/// Similarity tiers and caps applied when turning neighbors into tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Neighbors strictly above this similarity form the preferred tier.
    pub high_similarity: f32,
    /// Fallback tier when the preferred tier is empty.
    pub medium_similarity: f32,
    /// Tests ordered by fewer than this share of the working neighborhood are dropped.
    pub min_test_confidence: f32,
    pub max_tests: usize,
    /// Neighbors averaged for the overall confidence.
    pub confidence_sample: usize,
    /// Neighbors attached to the result for display.
    pub explanation_sample: usize,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            high_similarity: 0.7,
            medium_similarity: 0.5,
            min_test_confidence: 0.30,
            max_tests: 10,
            confidence_sample: 5,
            explanation_sample: 3,
        }
    }
}

/// Placeholder business constants behind the savings estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    /// Euro per laboratory test.
    pub cost_per_test: f64,
    /// Share of test cost saved by an efficient order.
    pub savings_fraction: f64,
    /// Cost-efficiency score at or above which an order counts as efficient.
    pub efficient_threshold: u8,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            cost_per_test: 25.0,
            savings_fraction: 0.3,
            efficient_threshold: 4,
        }
    }
}

/// Everything the engine needs besides its store and encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommenderConfig {
    pub neighbor_limit: usize,
    pub aggregation: AggregationPolicy,
    pub cost_model: CostModel,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            neighbor_limit: DEFAULT_NEIGHBOR_LIMIT,
            aggregation: AggregationPolicy::default(),
            cost_model: CostModel::default(),
        }
    }
}
