use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::enums::{Gender, SymptomDuration, TriageCategory};

/// Store-assigned case identifier. Monotonically increasing per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub i64);

impl std::fmt::Display for CaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Pain scale must be within 0-10, got {0}")]
    PainScale(u8),

    #[error("Cost efficiency must be within 1-5, got {0}")]
    CostEfficiency(u8),

    #[error("Vital sign {field} is not a finite number")]
    NonFiniteVital { field: &'static str },

    #[error("Vital sign {field} out of range: {value}")]
    VitalOutOfRange { field: &'static str, value: f32 },

    #[error("Suspected diagnosis must not be empty")]
    EmptyDiagnosis,
}

/// Vital signs captured at triage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    pub systolic_bp: f32,
    pub diastolic_bp: f32,
    pub heart_rate: f32,
    pub temperature: f32,
    pub respiratory_rate: f32,
    pub oxygen_saturation: f32,
}

impl VitalSigns {
    /// Named fields with their plausible physiological bounds.
    fn bounded_fields(&self) -> [(&'static str, f32, f32, f32); 6] {
        [
            ("systolic_bp", self.systolic_bp, 0.0, 300.0),
            ("diastolic_bp", self.diastolic_bp, 0.0, 200.0),
            ("heart_rate", self.heart_rate, 0.0, 300.0),
            ("temperature", self.temperature, 20.0, 45.0),
            ("respiratory_rate", self.respiratory_rate, 0.0, 100.0),
            ("oxygen_saturation", self.oxygen_saturation, 0.0, 100.0),
        ]
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value, low, high) in self.bounded_fields() {
            if !value.is_finite() {
                return Err(ValidationError::NonFiniteVital { field });
            }
            if value < low || value > high {
                return Err(ValidationError::VitalOutOfRange { field, value });
            }
        }
        Ok(())
    }
}

/// A structured emergency case as submitted at intake. Immutable once saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientCase {
    pub age: u32,
    pub gender: Gender,
    pub triage_category: TriageCategory,
    pub suspected_diagnosis: String,
    #[serde(default)]
    pub comorbidities: Vec<String>,
    pub symptom_duration: SymptomDuration,
    pub pain_scale: u8,
    #[serde(default)]
    pub notes: String,
    pub vital_signs: VitalSigns,
}

impl PatientCase {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pain_scale > 10 {
            return Err(ValidationError::PainScale(self.pain_scale));
        }
        if self.suspected_diagnosis.trim().is_empty() {
            return Err(ValidationError::EmptyDiagnosis);
        }
        self.vital_signs.validate()
    }
}

/// The laboratory order decided for a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabOutcome {
    #[serde(default)]
    pub laboratory_tests: Vec<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub estimated_duration: String,
    #[serde(default)]
    pub urgency_level: String,
    pub cost_efficiency: u8,
    #[serde(default)]
    pub quality_check: String,
}

impl LabOutcome {
    /// Neutral placeholder used when encoding a case that has no outcome yet.
    pub fn probe() -> Self {
        Self {
            laboratory_tests: Vec::new(),
            reasoning: String::new(),
            estimated_duration: String::new(),
            urgency_level: String::new(),
            cost_efficiency: 3,
            quality_check: String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(1..=5).contains(&self.cost_efficiency) {
            return Err(ValidationError::CostEfficiency(self.cost_efficiency));
        }
        Ok(())
    }
}

/// A persisted case with its outcome, as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub recorded_at: NaiveDateTime,
    pub session_id: String,
    pub case: PatientCase,
    pub outcome: LabOutcome,
}
