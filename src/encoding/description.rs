use crate::models::{LabOutcome, PatientCase};

/// Canonical pipe-delimited sentence fed to text-embedding models.
///
/// Field order is fixed: demographics, triage, diagnosis, duration, pain,
/// comorbidities, vitals, ordered tests, reasoning. Empty optional sections
/// are omitted entirely.
pub fn describe_case(case: &PatientCase, outcome: &LabOutcome) -> String {
    let vitals = &case.vital_signs;
    let mut parts = vec![
        format!("Patient: {} years, {}", case.age, case.gender),
        format!("Triage category: {}", case.triage_category),
        format!("Suspected diagnosis: {}", case.suspected_diagnosis.trim()),
        format!("Symptom duration: {}", case.symptom_duration.describe()),
        format!("Pain: {}/10", case.pain_scale),
    ];

    if !case.comorbidities.is_empty() {
        parts.push(format!("Comorbidities: {}", case.comorbidities.join(", ")));
    }

    parts.push(format!(
        "Blood pressure: {}/{} mmHg",
        vitals.systolic_bp, vitals.diastolic_bp
    ));
    parts.push(format!("Heart rate: {} bpm", vitals.heart_rate));
    parts.push(format!("Temperature: {}°C", vitals.temperature));
    parts.push(format!("SpO2: {}%", vitals.oxygen_saturation));

    if !outcome.laboratory_tests.is_empty() {
        parts.push(format!(
            "Laboratory tests: {}",
            outcome.laboratory_tests.join(", ")
        ));
    }
    if !outcome.reasoning.trim().is_empty() {
        parts.push(format!("Reasoning: {}", outcome.reasoning.trim()));
    }

    parts.join(" | ")
}
