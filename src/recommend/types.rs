use serde::{Deserialize, Serialize};

use crate::retrieval::RankedNeighbor;

/// How a recommendation came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    /// The case history is empty; nothing to compare against.
    InsufficientHistory,
    /// History exists but no fingerprint is comparable to the query.
    NoSimilarCases,
    /// Neighbors were found but none cleared the medium similarity tier.
    NoConfidentMatch,
    Recommended,
}

/// One recommended test with its support in the working neighborhood.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedTest {
    pub test: String,
    /// Share of the working neighborhood that ordered this test, in [0, 1].
    pub confidence: f32,
    pub frequency: usize,
    pub total_cases: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub status: RecommendationStatus,
    pub recommended_tests: Vec<RecommendedTest>,
    /// Mean similarity of the best ranked neighbors, in [0, 1].
    pub confidence: f32,
    pub rationale: String,
    /// Neighbors considered, before tier selection.
    pub similar_cases_count: usize,
    pub working_neighborhood_size: usize,
    /// Best ranked neighbors, for display.
    pub similar_cases: Vec<RankedNeighbor>,
}

impl Recommendation {
    pub fn empty(status: RecommendationStatus, rationale: impl Into<String>) -> Self {
        Self {
            status,
            recommended_tests: Vec::new(),
            confidence: 0.0,
            rationale: rationale.into(),
            similar_cases_count: 0,
            working_neighborhood_size: 0,
            similar_cases: Vec::new(),
        }
    }

    /// Result for a store without any history.
    pub fn insufficient_history() -> Self {
        Self::empty(
            RecommendationStatus::InsufficientHistory,
            "Insufficient history: no cases have been recorded yet",
        )
    }

    pub fn test_names(&self) -> Vec<&str> {
        self.recommended_tests.iter().map(|t| t.test.as_str()).collect()
    }
}
