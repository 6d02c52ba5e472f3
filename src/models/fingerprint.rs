use serde::{Deserialize, Serialize};

use super::case::{CaseId, CaseRecord, LabOutcome, PatientCase};
use super::enums::{Gender, TriageCategory};

/// Which encoding strategy produced a fingerprint.
///
/// Fingerprints of different kinds live in unrelated vector spaces and are
/// never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FingerprintKind {
    /// Deterministic hand-built feature vector.
    Features,
    /// Dense text embedding from the named model.
    Semantic(String),
}

impl FingerprintKind {
    pub fn label(&self) -> String {
        match self {
            Self::Features => "features".to_string(),
            Self::Semantic(model) => format!("semantic:{model}"),
        }
    }

    pub fn from_label(s: &str) -> Self {
        match s.strip_prefix("semantic:") {
            Some(model) => Self::Semantic(model.to_string()),
            None => Self::Features,
        }
    }
}

impl From<String> for FingerprintKind {
    fn from(s: String) -> Self {
        Self::from_label(&s)
    }
}

impl From<FingerprintKind> for String {
    fn from(kind: FingerprintKind) -> Self {
        kind.label()
    }
}

impl std::fmt::Display for FingerprintKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label())
    }
}

/// Fixed-length numeric representation of a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub kind: FingerprintKind,
    pub values: Vec<f32>,
}

impl Fingerprint {
    pub fn new(kind: FingerprintKind, values: Vec<f32>) -> Self {
        Self { kind, values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Only finite fingerprints survive a JSON round trip through the store.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Same strategy and same dimensionality.
    pub fn is_comparable(&self, other: &Fingerprint) -> bool {
        self.kind == other.kind && self.values.len() == other.values.len()
    }
}

/// Flat descriptive record stored next to each fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseMetadata {
    pub diagnosis: String,
    pub age: u32,
    pub gender: Gender,
    pub triage_category: TriageCategory,
    pub urgency: String,
    pub cost_efficiency: u8,
}

impl CaseMetadata {
    pub fn describe(case: &PatientCase, outcome: &LabOutcome) -> Self {
        Self {
            diagnosis: case.suspected_diagnosis.clone(),
            age: case.age,
            gender: case.gender,
            triage_category: case.triage_category,
            urgency: outcome.urgency_level.clone(),
            cost_efficiency: outcome.cost_efficiency,
        }
    }
}

/// A fingerprinted case as held by the case store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredCase {
    pub case_id: CaseId,
    pub fingerprint: Fingerprint,
    pub metadata: CaseMetadata,
    pub record: CaseRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_round_trip() {
        for kind in [
            FingerprintKind::Features,
            FingerprintKind::Semantic("all-minilm".into()),
        ] {
            assert_eq!(FingerprintKind::from_label(&kind.label()), kind);
        }
    }

    #[test]
    fn semantic_model_name_may_contain_colons() {
        let kind = FingerprintKind::from_label("semantic:all-minilm:l6-v2");
        assert_eq!(kind, FingerprintKind::Semantic("all-minilm:l6-v2".into()));
    }

    #[test]
    fn comparability_requires_kind_and_dimension() {
        let a = Fingerprint::new(FingerprintKind::Features, vec![0.0; 50]);
        let b = Fingerprint::new(FingerprintKind::Features, vec![1.0; 50]);
        let c = Fingerprint::new(FingerprintKind::Features, vec![1.0; 49]);
        let d = Fingerprint::new(FingerprintKind::Semantic("m".into()), vec![1.0; 50]);

        assert!(a.is_comparable(&b));
        assert!(!a.is_comparable(&c));
        assert!(!a.is_comparable(&d));
    }

    #[test]
    fn non_finite_values_are_detected() {
        assert!(Fingerprint::new(FingerprintKind::Features, vec![0.0, 1.5]).is_finite());
        assert!(!Fingerprint::new(FingerprintKind::Features, vec![f32::NAN, 0.0]).is_finite());
        assert!(!Fingerprint::new(FingerprintKind::Features, vec![f32::INFINITY]).is_finite());
    }
}
