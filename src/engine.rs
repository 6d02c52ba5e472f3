//! The recommendation engine: the three operations exposed to callers plus
//! history browsing, wired over an injected store and encoder.

use chrono::{Local, NaiveDate, NaiveDateTime};
use thiserror::Error;
use uuid::Uuid;

use crate::analytics::{self, DashboardSummary, DiagnosisInsight};
use crate::config::RecommenderConfig;
use crate::encoding::CaseEncoder;
use crate::models::*;
use crate::recommend::{aggregate_with, Recommendation};
use crate::retrieval::{rank, rank_by_profile};
use crate::samples::sample_cases;
use crate::store::{CaseStore, StoreError};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Case-similarity recommender over an explicitly constructed store.
pub struct CaseRecommender<S: CaseStore, E: CaseEncoder> {
    store: S,
    encoder: E,
    config: RecommenderConfig,
    session_id: String,
}

impl<S: CaseStore, E: CaseEncoder> CaseRecommender<S, E> {
    pub fn new(store: S, encoder: E, config: RecommenderConfig) -> Self {
        let session_id = Uuid::new_v4().to_string();
        tracing::debug!(session_id = %session_id, strategy = %encoder.kind(), "Recommender ready");
        Self {
            store,
            encoder,
            config,
            session_id,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hand the store back for an explicit close.
    pub fn into_store(self) -> S {
        self.store
    }

    // ═══════════════════════════════════════════════════════════
    // Core operations
    // ═══════════════════════════════════════════════════════════

    /// Encode and persist a case with its outcome, stamped now.
    pub fn save_case(&self, case: &PatientCase, outcome: &LabOutcome) -> Result<CaseId, EngineError> {
        self.save_case_at(case, outcome, Local::now().naive_local())
    }

    pub fn save_case_at(
        &self,
        case: &PatientCase,
        outcome: &LabOutcome,
        recorded_at: NaiveDateTime,
    ) -> Result<CaseId, EngineError> {
        case.validate()?;
        outcome.validate()?;

        let fingerprint = self.encoder.encode(case, outcome);
        let case_id = self.store.append_case(
            case,
            outcome,
            recorded_at,
            &self.session_id,
            &fingerprint,
            &CaseMetadata::describe(case, outcome),
        )?;

        tracing::info!(
            case_id = %case_id,
            strategy = %fingerprint.kind,
            dimension = fingerprint.dimension(),
            "Case saved"
        );
        Ok(case_id)
    }

    /// Recommend tests for a case that has no outcome yet.
    pub fn recommend(&self, case: &PatientCase) -> Result<Recommendation, EngineError> {
        case.validate()?;

        let candidates = self.store.get_all()?;
        if candidates.is_empty() {
            tracing::info!("No case history, recommendation skipped");
            return Ok(Recommendation::insufficient_history());
        }

        let query = self.encoder.encode(case, &LabOutcome::probe());
        let ranked = rank(&query, &candidates, self.config.neighbor_limit);
        let recommendation = aggregate_with(&ranked, &self.config.aggregation);

        tracing::info!(
            candidates = candidates.len(),
            neighbors = ranked.len(),
            tests = recommendation.recommended_tests.len(),
            status = ?recommendation.status,
            "Recommendation computed"
        );
        Ok(recommendation)
    }

    /// Dashboard aggregates over the last `window_days` days.
    pub fn get_dashboard_summary(&self, window_days: u32) -> Result<DashboardSummary, EngineError> {
        self.dashboard_summary_on(Local::now().date_naive(), window_days)
    }

    pub fn dashboard_summary_on(
        &self,
        today: NaiveDate,
        window_days: u32,
    ) -> Result<DashboardSummary, EngineError> {
        let records = self
            .store
            .cases_since(analytics::window_start(today, window_days))?;
        Ok(analytics::summarize(
            &records,
            today,
            window_days,
            &self.config.cost_model,
        ))
    }

    // ═══════════════════════════════════════════════════════════
    // History
    // ═══════════════════════════════════════════════════════════

    pub fn get_case(&self, case_id: CaseId) -> Result<StoredCase, EngineError> {
        Ok(self.store.get_by_id(case_id)?)
    }

    pub fn recent_cases(&self, limit: u32) -> Result<Vec<CaseRecord>, EngineError> {
        Ok(self.store.recent(limit)?)
    }

    /// Attribute-based lookup (diagnosis substring or age within 10 years).
    pub fn similar_by_profile(
        &self,
        case: &PatientCase,
        limit: usize,
    ) -> Result<Vec<CaseRecord>, EngineError> {
        let records = self.store.all_cases()?;
        Ok(rank_by_profile(case, &records, limit))
    }

    pub fn record_lab_results(
        &self,
        case_id: CaseId,
        results: &[LabMeasurement],
    ) -> Result<usize, EngineError> {
        let written = self.store.record_lab_results(case_id, results)?;
        tracing::debug!(case_id = %case_id, written, "Lab results recorded");
        Ok(written)
    }

    pub fn lab_results(&self, case_id: CaseId) -> Result<Vec<LabMeasurement>, EngineError> {
        Ok(self.store.lab_results(case_id)?)
    }

    pub fn diagnosis_insights(&self) -> Result<Vec<DiagnosisInsight>, EngineError> {
        let records = self.store.all_cases()?;
        Ok(analytics::diagnosis_insights(&records))
    }

    /// Save the reference cases with their measured values.
    pub fn seed_sample_data(&self) -> Result<Vec<CaseId>, EngineError> {
        let mut ids = Vec::new();
        for sample in sample_cases() {
            let case_id = self.save_case(&sample.case, &sample.outcome)?;
            self.record_lab_results(case_id, &sample.results)?;
            ids.push(case_id);
        }
        tracing::info!(cases = ids.len(), "Sample data seeded");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository;
    use crate::encoding::{FeatureEncoder, FEATURE_DIM};
    use crate::recommend::RecommendationStatus;
    use crate::store::{InMemoryCaseStore, SqliteCaseStore};

    fn engine() -> CaseRecommender<SqliteCaseStore, FeatureEncoder> {
        CaseRecommender::new(
            SqliteCaseStore::open_in_memory().unwrap(),
            FeatureEncoder::new(),
            RecommenderConfig::default(),
        )
    }

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn empty_store_reports_insufficient_history() {
        let engine = engine();
        let case = sample_cases()[0].case.clone();
        let rec = engine.recommend(&case).unwrap();
        assert_eq!(rec.status, RecommendationStatus::InsufficientHistory);
        assert_eq!(rec.similar_cases_count, 0);
        assert!(rec.recommended_tests.is_empty());
    }

    #[test]
    fn save_then_get_round_trips_metadata() {
        let engine = engine();
        let sample = &sample_cases()[1];
        let id = engine.save_case(&sample.case, &sample.outcome).unwrap();

        let stored = engine.get_case(id).unwrap();
        assert_eq!(stored.metadata.diagnosis, sample.case.suspected_diagnosis);
        assert_eq!(stored.metadata.age, sample.case.age);
        assert_eq!(stored.metadata.gender, sample.case.gender);
        assert_eq!(stored.metadata.triage_category, sample.case.triage_category);
        assert_eq!(stored.fingerprint.dimension(), FEATURE_DIM);
    }

    #[test]
    fn invalid_case_is_rejected_before_writing() {
        let engine = engine();
        let mut sample = sample_cases()[0].clone();
        sample.case.pain_scale = 12;
        let result = engine.save_case(&sample.case, &sample.outcome);
        assert!(matches!(result, Err(EngineError::Validation(ValidationError::PainScale(12)))));
        assert_eq!(engine.store().count().unwrap(), 0);
    }

    #[test]
    fn identical_case_recommends_its_tests() {
        let engine = engine();
        let sample = &sample_cases()[0];
        engine.save_case(&sample.case, &sample.outcome).unwrap();

        let rec = engine.recommend(&sample.case).unwrap();
        assert_eq!(rec.status, RecommendationStatus::Recommended);
        assert_eq!(rec.test_names(), vec!["CRP", "Leukozyten", "Neutrophile"]);
        assert_eq!(rec.similar_cases.len(), 1);
    }

    #[test]
    fn missing_case_surfaces_not_found() {
        let engine = engine();
        assert!(matches!(
            engine.get_case(CaseId(3)),
            Err(EngineError::Store(StoreError::NotFound(CaseId(3))))
        ));
    }

    #[test]
    fn seeding_stores_cases_and_results() {
        let engine = engine();
        let ids = engine.seed_sample_data().unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(engine.lab_results(ids[1]).unwrap().len(), 3);
        assert_eq!(engine.recent_cases(10).unwrap().len(), 2);

        let insights = engine.diagnosis_insights().unwrap();
        assert_eq!(insights.len(), 2);
    }

    #[test]
    fn dashboard_counts_saved_cases() {
        let engine = CaseRecommender::new(
            InMemoryCaseStore::new(),
            FeatureEncoder::new(),
            RecommenderConfig::default(),
        );
        let sample = &sample_cases()[0];
        engine.save_case_at(&sample.case, &sample.outcome, at("2026-03-09 10:00:00")).unwrap();
        engine.save_case_at(&sample.case, &sample.outcome, at("2025-12-01 10:00:00")).unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let summary = engine.dashboard_summary_on(today, 30).unwrap();
        assert_eq!(summary.total_orders, 1);
        assert_eq!(summary.efficient_orders, 1);
        assert!((summary.estimated_savings - 7.5).abs() < 1e-9);
    }

    /// Emits NaN for every case, as a misbehaving custom encoder would.
    struct NanEncoder;

    impl CaseEncoder for NanEncoder {
        fn kind(&self) -> FingerprintKind {
            FingerprintKind::Semantic("nan".into())
        }

        fn encode(&self, _case: &PatientCase, _outcome: &LabOutcome) -> Fingerprint {
            Fingerprint::new(self.kind(), vec![f32::NAN, 0.0])
        }
    }

    #[test]
    fn rejected_fingerprint_leaves_no_case_behind() {
        let engine = CaseRecommender::new(
            SqliteCaseStore::open_in_memory().unwrap(),
            NanEncoder,
            RecommenderConfig::default(),
        );
        let sample = &sample_cases()[0];
        let result = engine.save_case_at(&sample.case, &sample.outcome, at("2026-03-09 10:00:00"));

        assert!(matches!(result, Err(EngineError::Store(StoreError::NonFiniteFingerprint))));
        assert_eq!(engine.store().count().unwrap(), 0);
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(engine.dashboard_summary_on(today, 30).unwrap().total_orders, 0);
        assert!(engine.recent_cases(10).unwrap().is_empty());
    }

    #[test]
    fn unreadable_history_fails_recommend_instead_of_returning_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.db");

        let engine = CaseRecommender::new(
            SqliteCaseStore::open(&path).unwrap(),
            FeatureEncoder::new(),
            RecommenderConfig::default(),
        );
        let sample = &sample_cases()[0];
        engine.save_case(&sample.case, &sample.outcome).unwrap();
        engine.into_store().close().unwrap();

        let conn = crate::db::open_database(&path).unwrap();
        conn.execute("UPDATE case_embeddings SET embedding_vector = 'not a vector'", [])
            .unwrap();
        drop(conn);

        let engine = CaseRecommender::new(
            SqliteCaseStore::open(&path).unwrap(),
            FeatureEncoder::new(),
            RecommenderConfig::default(),
        );
        assert!(matches!(
            engine.recommend(&sample.case),
            Err(EngineError::Store(StoreError::Unavailable(_)))
        ));
    }

    #[test]
    fn store_write_failure_reaches_save_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cases.db");

        let conn = crate::db::open_database(&path).unwrap();
        conn.execute_batch("DROP TABLE case_embeddings").unwrap();
        assert_eq!(repository::count_lab_orders(&conn).unwrap(), 0);
        drop(conn);

        let engine = CaseRecommender::new(
            SqliteCaseStore::open(&path).unwrap(),
            FeatureEncoder::new(),
            RecommenderConfig::default(),
        );
        let sample = &sample_cases()[1];
        assert!(matches!(
            engine.save_case(&sample.case, &sample.outcome),
            Err(EngineError::Store(StoreError::Unavailable(_)))
        ));
        assert_eq!(engine.store().count().unwrap(), 0);
    }

    #[test]
    fn profile_lookup_uses_whole_history() {
        let engine = engine();
        engine.seed_sample_data().unwrap();
        let mut query = sample_cases()[1].case.clone();
        query.age = 20;
        let matches = engine.similar_by_profile(&query, 5).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].case.suspected_diagnosis, "Pneumonia");
    }
}
