use serde::{Deserialize, Serialize};

use super::EncodingError;

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

/// Text embedding backend behind the semantic strategy.
pub trait EmbeddingModel: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError>;
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError>;
    fn dimension(&self) -> usize;
}

impl EmbeddingModel for Box<dyn EmbeddingModel> {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

// ═══════════════════════════════════════════════════════════
// ONNX embedder, behind the `onnx-embeddings` feature
// ═══════════════════════════════════════════════════════════

#[cfg(feature = "onnx-embeddings")]
mod onnx {
    use super::{EmbeddingModel, EncodingError, MINILM_DIM};
    use ort::session::Session;
    use std::path::Path;
    use std::sync::Mutex;

    /// Local all-MiniLM-L6-v2 inference through ONNX Runtime.
    ///
    /// The model directory must contain `model.onnx` and `tokenizer.json`.
    /// `Session::run` needs `&mut self`, hence the Mutex.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: tokenizers::Tokenizer,
    }

    impl OnnxEmbedder {
        pub fn load(model_dir: &Path) -> Result<Self, EncodingError> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            for required in [&model_path, &tokenizer_path] {
                if !required.exists() {
                    return Err(EncodingError::ModelNotFound(required.clone()));
                }
            }

            let session = Session::builder()
                .map_err(|e: ort::Error| EncodingError::ModelInit(e.to_string()))?
                .with_intra_threads(2)
                .map_err(|e: ort::Error| EncodingError::ModelInit(e.to_string()))?
                .commit_from_file(&model_path)
                .map_err(|e: ort::Error| EncodingError::ModelInit(format!("ONNX load failed: {e}")))?;

            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| EncodingError::ModelInit(format!("Tokenizer load failed: {e}")))?;

            tracing::info!(dir = %model_dir.display(), "ONNX embedder loaded");

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
            })
        }

        /// Mean-pooled, L2-normalized sentence embedding.
        fn infer(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
            use ort::value::TensorRef;

            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| EncodingError::Tokenization(e.to_string()))?;

            let to_i64 = |xs: &[u32]| xs.iter().map(|&x| x as i64).collect::<Vec<i64>>();
            let input_ids = to_i64(encoding.get_ids());
            let attention_mask = to_i64(encoding.get_attention_mask());
            let token_type_ids = to_i64(encoding.get_type_ids());
            let seq_len = input_ids.len();

            let shaped = |data: Vec<i64>| {
                ndarray::Array2::from_shape_vec((1, seq_len), data)
                    .map_err(|e| EncodingError::Embedding(e.to_string()))
            };
            let ids_array = shaped(input_ids)?;
            let mask_array = shaped(attention_mask.clone())?;
            let type_array = shaped(token_type_ids)?;

            let ids_tensor = TensorRef::from_array_view(&ids_array)
                .map_err(|e| EncodingError::Embedding(e.to_string()))?;
            let mask_tensor = TensorRef::from_array_view(&mask_array)
                .map_err(|e| EncodingError::Embedding(e.to_string()))?;
            let type_tensor = TensorRef::from_array_view(&type_array)
                .map_err(|e| EncodingError::Embedding(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|_| EncodingError::Embedding("Session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_tensor])
                .map_err(|e| EncodingError::Embedding(format!("ONNX inference failed: {e}")))?;

            let (shape, token_embeddings) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| EncodingError::Embedding(format!("Output extraction: {e}")))?;

            if shape.len() != 3 || shape[2] as usize != MINILM_DIM {
                return Err(EncodingError::Embedding(format!(
                    "Unexpected output shape: {shape:?}, expected [1, {seq_len}, {MINILM_DIM}]"
                )));
            }

            let mut pooled = vec![0.0f32; MINILM_DIM];
            let mut mask_sum = 0.0f32;
            for (token_idx, &mask) in attention_mask.iter().enumerate() {
                let weight = mask as f32;
                mask_sum += weight;
                let row = &token_embeddings[token_idx * MINILM_DIM..(token_idx + 1) * MINILM_DIM];
                for (acc, &x) in pooled.iter_mut().zip(row) {
                    *acc += x * weight;
                }
            }
            if mask_sum > 0.0 {
                pooled.iter_mut().for_each(|v| *v /= mask_sum);
            }

            l2_normalize(&mut pooled);
            Ok(pooled)
        }
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
            self.infer(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError> {
            texts.iter().map(|t| self.infer(t)).collect()
        }

        fn dimension(&self) -> usize {
            MINILM_DIM
        }
    }

    use super::l2_normalize;
}

#[cfg(feature = "onnx-embeddings")]
pub use onnx::OnnxEmbedder;

// ═══════════════════════════════════════════════════════════
// Ollama embedder
// ═══════════════════════════════════════════════════════════

/// Remote embeddings from an Ollama instance (`/api/embeddings`).
///
/// Every request carries the configured timeout so a hung backend degrades
/// to the feature strategy instead of blocking the caller.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    dimension: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl OllamaEmbedder {
    /// Probe the instance: the model must be pulled and must answer one
    /// embedding request, whose length fixes the dimension.
    pub fn connect(base_url: &str, model: &str, timeout_secs: u64) -> Result<Self, EncodingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EncodingError::ModelInit(format!("HTTP client: {e}")))?;

        let mut embedder = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
            timeout_secs,
            dimension: 0,
        };

        let available = embedder.list_models()?;
        if !available.iter().any(|m| m.starts_with(model)) {
            return Err(EncodingError::ModelInit(format!(
                "Model '{model}' not pulled on {}",
                embedder.base_url
            )));
        }

        embedder.dimension = embedder.request_embedding("dimension probe")?.len();
        if embedder.dimension == 0 {
            return Err(EncodingError::Embedding("Backend returned an empty embedding".into()));
        }

        tracing::info!(
            url = %embedder.base_url,
            model = %embedder.model,
            dimension = embedder.dimension,
            "Ollama embedder connected"
        );
        Ok(embedder)
    }

    fn list_models(&self) -> Result<Vec<String>, EncodingError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EncodingError::BackendResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: TagsResponse = response
            .json()
            .map_err(|e| EncodingError::Embedding(format!("Malformed tags response: {e}")))?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn request_embedding(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EncodingError::BackendResponse {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .map_err(|e| EncodingError::Embedding(format!("Malformed embedding response: {e}")))?;
        Ok(parsed.embedding)
    }

    fn map_send_error(&self, e: reqwest::Error) -> EncodingError {
        if e.is_timeout() {
            EncodingError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            EncodingError::BackendConnection(self.base_url.clone())
        } else {
            EncodingError::Embedding(e.to_string())
        }
    }
}

impl EmbeddingModel for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        self.request_embedding(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError> {
        texts.iter().map(|t| self.request_embedding(t)).collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ═══════════════════════════════════════════════════════════
// Mock embedder
// ═══════════════════════════════════════════════════════════

/// Deterministic embedding model for tests and offline runs.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(MINILM_DIM)
    }

    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingModel for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EncodingError> {
        Ok(deterministic_vector(text, self.dimension))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncodingError> {
        Ok(texts
            .iter()
            .map(|t| deterministic_vector(t, self.dimension))
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Hash-free byte walk producing a unit vector that depends on every byte.
fn deterministic_vector(text: &str, dim: usize) -> Vec<f32> {
    let bytes = text.as_bytes();
    let mut vec = vec![0.0f32; dim];

    for (i, &b) in bytes.iter().enumerate() {
        if dim == 0 {
            break;
        }
        let slot = (i * 31 + b as usize) % dim;
        vec[slot] += (b as f32 + 1.0) / 256.0;
    }

    l2_normalize(&mut vec);
    vec
}

pub(crate) fn l2_normalize(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.iter_mut().for_each(|v| *v /= norm);
    }
}
