//! Case encoding: structured case + outcome to a fixed-length fingerprint.
//!
//! Two strategies sit behind [`CaseEncoder`]: a semantic one over a text
//! embedding model and the deterministic [`FeatureEncoder`]. The strategy is
//! picked once by [`select_encoder`]; call sites never branch on backend.

pub mod description;
pub mod embedder;
pub mod features;
pub mod semantic;

pub use description::describe_case;
pub use embedder::*;
pub use features::{feature_vector, FeatureEncoder, FEATURE_DIM};
pub use semantic::SemanticEncoder;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{EmbeddingBackend, EncoderConfig};
use crate::models::{Fingerprint, FingerprintKind, LabOutcome, PatientCase};

/// Embedding backend failures. Never escape [`CaseEncoder::encode`].
#[derive(Error, Debug)]
pub enum EncodingError {
    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Cannot reach embedding backend at {0}")]
    BackendConnection(String),

    #[error("Embedding backend returned {status}: {body}")]
    BackendResponse { status: u16, body: String },

    #[error("Embedding request timed out after {0}s")]
    Timeout(u64),
}

/// Total encoding contract: always returns a finite fixed-length fingerprint.
pub trait CaseEncoder: Send + Sync {
    /// Kind of fingerprint this encoder produces when healthy.
    fn kind(&self) -> FingerprintKind;

    fn encode(&self, case: &PatientCase, outcome: &LabOutcome) -> Fingerprint;
}

impl CaseEncoder for Box<dyn CaseEncoder> {
    fn kind(&self) -> FingerprintKind {
        (**self).kind()
    }

    fn encode(&self, case: &PatientCase, outcome: &LabOutcome) -> Fingerprint {
        (**self).encode(case, outcome)
    }
}

/// Pick the encoding strategy once at startup.
///
/// `Auto` tries ONNX, then Ollama, then settles on features. An explicitly
/// requested backend that fails to come up also degrades to features.
pub fn select_encoder(config: &EncoderConfig) -> Box<dyn CaseEncoder> {
    let semantic = match config.backend {
        EmbeddingBackend::Features => None,
        EmbeddingBackend::Onnx => try_onnx(config),
        EmbeddingBackend::Ollama => try_ollama(config),
        EmbeddingBackend::Auto => try_onnx(config).or_else(|| try_ollama(config)),
    };

    match semantic {
        Some(encoder) => {
            tracing::info!(strategy = %encoder.kind(), "Case encoder selected");
            encoder
        }
        None => {
            tracing::info!(strategy = %FingerprintKind::Features, "Case encoder selected");
            Box::new(FeatureEncoder::new())
        }
    }
}

#[cfg(feature = "onnx-embeddings")]
fn try_onnx(config: &EncoderConfig) -> Option<Box<dyn CaseEncoder>> {
    let model_name = config
        .onnx_model_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| config.model.clone());

    match OnnxEmbedder::load(&config.onnx_model_dir) {
        Ok(embedder) => Some(Box::new(SemanticEncoder::new(embedder, model_name))),
        Err(e) => {
            tracing::warn!(error = %e, "ONNX embedder unavailable");
            None
        }
    }
}

#[cfg(not(feature = "onnx-embeddings"))]
fn try_onnx(_config: &EncoderConfig) -> Option<Box<dyn CaseEncoder>> {
    tracing::debug!("Built without onnx-embeddings, skipping ONNX backend");
    None
}

fn try_ollama(config: &EncoderConfig) -> Option<Box<dyn CaseEncoder>> {
    match OllamaEmbedder::connect(&config.ollama_url, &config.model, config.timeout_secs) {
        Ok(embedder) => Some(Box::new(SemanticEncoder::new(embedder, config.model.clone()))),
        Err(e) => {
            tracing::warn!(url = %config.ollama_url, error = %e, "Ollama embedder unavailable");
            None
        }
    }
}
