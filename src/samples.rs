//! Reference cases for seeding an empty history.

use crate::models::*;

/// A historical case with its order and measured values.
#[derive(Debug, Clone)]
pub struct SampleCase {
    pub case: PatientCase,
    pub outcome: LabOutcome,
    pub results: Vec<LabMeasurement>,
}

fn measurement(name: &str, value: f64, unit: &str, min: f64, max: f64) -> LabMeasurement {
    let status = if value > max {
        ResultStatus::High
    } else if value < min {
        ResultStatus::Low
    } else {
        ResultStatus::Normal
    };
    LabMeasurement {
        parameter_name: name.to_string(),
        value,
        unit: unit.to_string(),
        reference_min: Some(min),
        reference_max: Some(max),
        status,
    }
}

/// The ordered tests are exactly the measured parameters.
fn outcome_for(results: &[LabMeasurement]) -> LabOutcome {
    LabOutcome {
        laboratory_tests: results.iter().map(|r| r.parameter_name.clone()).collect(),
        reasoning: "Based on clinical symptoms and vital signs".into(),
        estimated_duration: "2-4".into(),
        urgency_level: "high".into(),
        cost_efficiency: 5,
        quality_check: "Recommendation follows guidelines".into(),
    }
}

pub fn sample_cases() -> Vec<SampleCase> {
    let appendicitis_results = vec![
        measurement("CRP", 45.2, "mg/L", 0.0, 5.0),
        measurement("Leukozyten", 14.5, "G/L", 4.0, 10.0),
        measurement("Neutrophile", 82.0, "%", 50.0, 70.0),
    ];
    let pneumonia_results = vec![
        measurement("CRP", 89.3, "mg/L", 0.0, 5.0),
        measurement("PCT", 2.1, "ng/mL", 0.0, 0.25),
        measurement("Leukozyten", 16.8, "G/L", 4.0, 10.0),
    ];

    vec![
        SampleCase {
            case: PatientCase {
                age: 28,
                gender: Gender::Male,
                triage_category: TriageCategory::Orange,
                suspected_diagnosis: "Acute appendicitis".into(),
                comorbidities: vec![],
                symptom_duration: SymptomDuration::SixToTwentyFourHours,
                pain_scale: 8,
                notes: "Right lower quadrant pain".into(),
                vital_signs: VitalSigns {
                    systolic_bp: 130.0,
                    diastolic_bp: 85.0,
                    heart_rate: 95.0,
                    temperature: 38.2,
                    respiratory_rate: 18.0,
                    oxygen_saturation: 98.0,
                },
            },
            outcome: outcome_for(&appendicitis_results),
            results: appendicitis_results,
        },
        SampleCase {
            case: PatientCase {
                age: 65,
                gender: Gender::Female,
                triage_category: TriageCategory::Yellow,
                suspected_diagnosis: "Pneumonia".into(),
                comorbidities: vec!["COPD/Asthma".into()],
                symptom_duration: SymptomDuration::OneToThreeDays,
                pain_scale: 4,
                notes: "Productive cough, dyspnea".into(),
                vital_signs: VitalSigns {
                    systolic_bp: 145.0,
                    diastolic_bp: 90.0,
                    heart_rate: 105.0,
                    temperature: 39.1,
                    respiratory_rate: 24.0,
                    oxygen_saturation: 92.0,
                },
            },
            outcome: outcome_for(&pneumonia_results),
            results: pneumonia_results,
        },
    ]
}
