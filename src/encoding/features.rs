use crate::models::{Fingerprint, FingerprintKind, Gender, LabOutcome, PatientCase};

use super::CaseEncoder;

/// Fixed dimensionality of the hand-built feature vector.
pub const FEATURE_DIM: usize = 50;

/// Deterministic feature strategy. Pure and total, no external dependency.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl CaseEncoder for FeatureEncoder {
    fn kind(&self) -> FingerprintKind {
        FingerprintKind::Features
    }

    fn encode(&self, case: &PatientCase, outcome: &LabOutcome) -> Fingerprint {
        Fingerprint::new(FingerprintKind::Features, feature_vector(case, outcome))
    }
}

/// Normalized features in fixed order, zero-padded (or truncated) to `FEATURE_DIM`.
pub fn feature_vector(case: &PatientCase, outcome: &LabOutcome) -> Vec<f32> {
    let vitals = &case.vital_signs;

    let mut features = vec![
        case.age as f32 / 100.0,
        one_hot(case.gender == Gender::Male),
        one_hot(case.gender == Gender::Female),
        case.triage_category.severity() as f32 / 5.0,
        vitals.systolic_bp / 200.0,
        vitals.diastolic_bp / 120.0,
        vitals.heart_rate / 200.0,
        vitals.temperature / 42.0,
        vitals.respiratory_rate / 60.0,
        vitals.oxygen_saturation / 100.0,
        case.pain_scale as f32 / 10.0,
        outcome.laboratory_tests.len() as f32 / 20.0,
        outcome.cost_efficiency as f32 / 5.0,
    ];

    // non-finite inputs contribute zero
    for value in &mut features {
        if !value.is_finite() {
            *value = 0.0;
        }
    }

    features.resize(FEATURE_DIM, 0.0);
    features
}

fn one_hot(flag: bool) -> f32 {
    if flag {
        1.0
    } else {
        0.0
    }
}
