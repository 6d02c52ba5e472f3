use crate::models::{Fingerprint, FingerprintKind, LabOutcome, PatientCase};

use super::description::describe_case;
use super::embedder::EmbeddingModel;
use super::features::FeatureEncoder;
use super::CaseEncoder;

/// Text-embedding strategy over the canonical case description.
///
/// A failed, mis-sized or non-finite embedding falls back to the feature
/// strategy for that call. The resulting fingerprint is tagged `features`
/// so it is never ranked against semantic ones.
pub struct SemanticEncoder<M: EmbeddingModel> {
    model: M,
    model_name: String,
    fallback: FeatureEncoder,
}

impl<M: EmbeddingModel> SemanticEncoder<M> {
    pub fn new(model: M, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
            fallback: FeatureEncoder::new(),
        }
    }
}

impl<M: EmbeddingModel> CaseEncoder for SemanticEncoder<M> {
    fn kind(&self) -> FingerprintKind {
        FingerprintKind::Semantic(self.model_name.clone())
    }

    fn encode(&self, case: &PatientCase, outcome: &LabOutcome) -> Fingerprint {
        let text = describe_case(case, outcome);

        match self.model.embed(&text) {
            Ok(values) if values.len() != self.model.dimension() => {
                tracing::warn!(
                    model = %self.model_name,
                    expected = self.model.dimension(),
                    actual = values.len(),
                    "Embedding dimension mismatch, using feature fingerprint"
                );
            }
            Ok(values) if values.iter().any(|v| !v.is_finite()) => {
                tracing::warn!(model = %self.model_name, "Non-finite embedding, using feature fingerprint");
            }
            Ok(values) => return Fingerprint::new(self.kind(), values),
            Err(e) => {
                tracing::warn!(model = %self.model_name, error = %e, "Embedding failed, using feature fingerprint");
            }
        }

        self.fallback.encode(case, outcome)
    }
}
