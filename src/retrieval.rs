//! Similarity ranking over stored fingerprints.
//!
//! Full linear scan, O(n·D) per query. No index: the case history is assumed
//! small enough that an exact scan stays cheap.

use serde::{Deserialize, Serialize};

use crate::models::{CaseId, CaseMetadata, CaseRecord, Fingerprint, PatientCase, StoredCase};

/// A candidate scored against the query. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNeighbor {
    pub case_id: CaseId,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
    pub metadata: CaseMetadata,
    pub tests: Vec<String>,
    pub reasoning: String,
    pub cost_efficiency: u8,
}

impl RankedNeighbor {
    fn from_stored(stored: &StoredCase, similarity: f32) -> Self {
        Self {
            case_id: stored.case_id,
            similarity,
            metadata: stored.metadata.clone(),
            tests: stored.record.outcome.laboratory_tests.clone(),
            reasoning: stored.record.outcome.reasoning.clone(),
            cost_efficiency: stored.record.outcome.cost_efficiency,
        }
    }
}

/// Cosine similarity of two fingerprints.
///
/// Total: incomparable kinds, mismatched lengths and zero vectors all
/// yield 0.0.
pub fn similarity(a: &Fingerprint, b: &Fingerprint) -> f32 {
    if a.kind != b.kind {
        return 0.0;
    }
    cosine_similarity(&a.values, &b.values)
}

/// Cosine similarity of two raw vectors, clamped to [-1, 1].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| *x as f64 * *y as f64).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = dot / (norm_a * norm_b);
    if !sim.is_finite() {
        return 0.0;
    }
    sim.clamp(-1.0, 1.0) as f32
}

/// Score every comparable candidate, sort descending, keep `limit`.
///
/// Equal similarities keep the candidates' input order. Candidates from a
/// different encoding strategy or dimension are skipped.
pub fn rank(query: &Fingerprint, candidates: &[StoredCase], limit: usize) -> Vec<RankedNeighbor> {
    let mut scored: Vec<RankedNeighbor> = candidates
        .iter()
        .filter(|c| c.fingerprint.is_comparable(query))
        .map(|c| RankedNeighbor::from_stored(c, similarity(query, &c.fingerprint)))
        .collect();

    let skipped = candidates.len() - scored.len();
    if skipped > 0 {
        tracing::debug!(
            skipped,
            strategy = %query.kind,
            "Skipped fingerprints from another encoding strategy"
        );
    }

    // sort_by is stable
    scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    scored.truncate(limit);
    scored
}

/// Legacy attribute match: diagnosis substring or age within 10 years.
///
/// Diagnosis matches come first, then ascending age difference. Not part of
/// the fingerprint path.
pub fn rank_by_profile(query: &PatientCase, records: &[CaseRecord], limit: usize) -> Vec<CaseRecord> {
    let needle = query.suspected_diagnosis.trim().to_lowercase();

    let mut matches: Vec<(bool, u32, &CaseRecord)> = records
        .iter()
        .filter_map(|record| {
            let diagnosis_match = !needle.is_empty()
                && record.case.suspected_diagnosis.to_lowercase().contains(&needle);
            let age_diff = record.case.age.abs_diff(query.age);
            (diagnosis_match || age_diff <= 10).then_some((diagnosis_match, age_diff, record))
        })
        .collect();

    matches.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
    matches
        .into_iter()
        .take(limit)
        .map(|(_, _, record)| record.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDateTime;

    use super::*;
    use crate::models::*;

    fn fp(values: &[f32]) -> Fingerprint {
        Fingerprint::new(FingerprintKind::Features, values.to_vec())
    }

    fn patient(diagnosis: &str, age: u32) -> PatientCase {
        PatientCase {
            age,
            gender: Gender::Male,
            triage_category: TriageCategory::Yellow,
            suspected_diagnosis: diagnosis.into(),
            comorbidities: vec![],
            symptom_duration: SymptomDuration::Unknown,
            pain_scale: 5,
            notes: String::new(),
            vital_signs: VitalSigns {
                systolic_bp: 120.0,
                diastolic_bp: 80.0,
                heart_rate: 80.0,
                temperature: 37.0,
                respiratory_rate: 16.0,
                oxygen_saturation: 98.0,
            },
        }
    }

    fn record(id: i64, diagnosis: &str, age: u32, tests: &[&str]) -> CaseRecord {
        CaseRecord {
            id: CaseId(id),
            recorded_at: NaiveDateTime::parse_from_str("2026-03-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
            session_id: "s".into(),
            case: patient(diagnosis, age),
            outcome: LabOutcome {
                laboratory_tests: tests.iter().map(|t| t.to_string()).collect(),
                ..LabOutcome::probe()
            },
        }
    }

    fn stored(id: i64, fingerprint: Fingerprint) -> StoredCase {
        let record = record(id, "Case", 40, &["CRP"]);
        StoredCase {
            case_id: CaseId(id),
            metadata: CaseMetadata::describe(&record.case, &record.outcome),
            fingerprint,
            record,
        }
    }

    #[test]
    fn identical_vectors_score_one() {
        let a = fp(&[0.3, 0.1, 0.9, 0.25]);
        assert!((similarity(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_score_zero() {
        assert!(similarity(&fp(&[1.0, 0.0]), &fp(&[0.0, 1.0])).abs() < 1e-6);
    }

    #[test]
    fn opposite_vectors_score_minus_one() {
        assert!((similarity(&fp(&[1.0, 2.0]), &fp(&[-1.0, -2.0])) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn similarity_is_symmetric() {
        let a = fp(&[0.2, 0.7, 0.1, 0.05]);
        let b = fp(&[0.9, 0.3, 0.4, 0.6]);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }

    #[test]
    fn zero_vector_scores_exactly_zero() {
        let zero = fp(&[0.0, 0.0, 0.0]);
        assert_eq!(similarity(&zero, &fp(&[1.0, 2.0, 3.0])), 0.0);
        assert_eq!(similarity(&zero, &zero), 0.0);
    }

    #[test]
    fn mismatched_kind_or_length_scores_zero() {
        let semantic = Fingerprint::new(FingerprintKind::Semantic("m".into()), vec![1.0, 0.0]);
        assert_eq!(similarity(&fp(&[1.0, 0.0]), &semantic), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn rank_sorts_descending_and_truncates() {
        let query = fp(&[1.0, 0.0]);
        let candidates = vec![
            stored(1, fp(&[0.0, 1.0])),
            stored(2, fp(&[1.0, 0.0])),
            stored(3, fp(&[1.0, 1.0])),
        ];

        let ranked = rank(&query, &candidates, 2);
        let ids: Vec<i64> = ranked.iter().map(|n| n.case_id.0).collect();
        assert_eq!(ids, vec![2, 3]);
        assert!(ranked[0].similarity >= ranked[1].similarity);
    }

    #[test]
    fn rank_keeps_input_order_for_ties() {
        let query = fp(&[1.0, 0.0]);
        let candidates: Vec<StoredCase> = (1..=5).map(|i| stored(i, fp(&[2.0, 0.0]))).collect();
        let ids: Vec<i64> = rank(&query, &candidates, 10).iter().map(|n| n.case_id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn rank_skips_other_strategies() {
        let query = fp(&[1.0, 0.0]);
        let candidates = vec![
            stored(1, Fingerprint::new(FingerprintKind::Semantic("m".into()), vec![1.0, 0.0])),
            stored(2, fp(&[1.0, 0.0, 0.0])),
            stored(3, fp(&[0.5, 0.5])),
        ];
        let ranked = rank(&query, &candidates, 10);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].case_id, CaseId(3));
    }

    #[test]
    fn rank_carries_outcome_details() {
        let ranked = rank(&fp(&[1.0]), &[stored(7, fp(&[1.0]))], 1);
        assert_eq!(ranked[0].tests, vec!["CRP".to_string()]);
        assert_eq!(ranked[0].cost_efficiency, 3);
        assert_eq!(ranked[0].metadata.diagnosis, "Case");
    }

    #[test]
    fn rank_of_empty_candidates_is_empty() {
        assert!(rank(&fp(&[1.0]), &[], 10).is_empty());
    }

    #[test]
    fn profile_match_prefers_diagnosis_then_age() {
        let records = vec![
            record(1, "Migraine", 44, &[]),
            record(2, "Community-acquired pneumonia", 80, &[]),
            record(3, "Fracture", 41, &[]),
            record(4, "Gastritis", 70, &[]),
        ];
        let query = patient("Pneumonia", 40);

        let ids: Vec<i64> = rank_by_profile(&query, &records, 10).iter().map(|r| r.id.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(rank_by_profile(&query, &records, 1).len(), 1);
    }
}
