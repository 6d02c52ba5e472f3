use std::collections::{HashMap, HashSet};

use crate::config::AggregationPolicy;
use crate::retrieval::RankedNeighbor;

use super::types::{Recommendation, RecommendationStatus, RecommendedTest};

const NO_SIMILAR_CASES: &str = "No similar cases found";

/// Aggregate with the default similarity tiers and caps.
pub fn aggregate(ranked: &[RankedNeighbor]) -> Recommendation {
    aggregate_with(ranked, &AggregationPolicy::default())
}

/// Turn a ranked neighborhood into confidence-scored tests.
///
/// Neighbors above `high_similarity` form the working neighborhood; if
/// there are none, those above `medium_similarity` do. Each neighbor counts
/// once per distinct test. Never fails.
pub fn aggregate_with(ranked: &[RankedNeighbor], policy: &AggregationPolicy) -> Recommendation {
    if ranked.is_empty() {
        return Recommendation::empty(RecommendationStatus::NoSimilarCases, NO_SIMILAR_CASES);
    }

    let working = working_neighborhood(ranked, policy);
    let recommended_tests = score_tests(&working, policy);

    let sample = &ranked[..ranked.len().min(policy.confidence_sample)];
    let mean_similarity = if sample.is_empty() {
        0.0
    } else {
        sample.iter().map(|n| n.similarity).sum::<f32>() / sample.len() as f32
    };

    let status = if working.is_empty() {
        RecommendationStatus::NoConfidentMatch
    } else {
        RecommendationStatus::Recommended
    };

    let rationale = format!(
        "Based on {} similar cases (mean similarity {:.2}). Top recommendations drawn from {} highly similar cases.",
        ranked.len(),
        mean_similarity,
        working.len()
    );

    tracing::debug!(
        neighbors = ranked.len(),
        working = working.len(),
        tests = recommended_tests.len(),
        "Aggregated recommendation"
    );

    Recommendation {
        status,
        recommended_tests,
        confidence: mean_similarity.clamp(0.0, 1.0),
        rationale,
        similar_cases_count: ranked.len(),
        working_neighborhood_size: working.len(),
        similar_cases: ranked.iter().take(policy.explanation_sample).cloned().collect(),
    }
}

fn working_neighborhood<'a>(
    ranked: &'a [RankedNeighbor],
    policy: &AggregationPolicy,
) -> Vec<&'a RankedNeighbor> {
    let above = |threshold: f32| -> Vec<&'a RankedNeighbor> {
        ranked.iter().filter(|n| n.similarity > threshold).collect()
    };

    let high = above(policy.high_similarity);
    if !high.is_empty() {
        return high;
    }
    above(policy.medium_similarity)
}

fn score_tests(working: &[&RankedNeighbor], policy: &AggregationPolicy) -> Vec<RecommendedTest> {
    if working.is_empty() {
        return Vec::new();
    }

    // discovery order breaks confidence ties
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for neighbor in working {
        let mut seen = HashSet::new();
        for test in &neighbor.tests {
            let name = test.trim();
            if name.is_empty() || !seen.insert(name) {
                continue;
            }
            let count = counts.entry(name).or_insert_with(|| {
                order.push(name);
                0
            });
            *count += 1;
        }
    }

    let total = working.len();
    let mut tests: Vec<RecommendedTest> = order
        .into_iter()
        .map(|name| {
            let frequency = counts.get(name).copied().unwrap_or(0);
            RecommendedTest {
                test: name.to_string(),
                confidence: frequency as f32 / total as f32,
                frequency,
                total_cases: total,
            }
        })
        .filter(|t| t.confidence >= policy.min_test_confidence)
        .collect();

    tests.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    tests.truncate(policy.max_tests);
    tests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn neighbor(id: i64, similarity: f32, tests: &[&str]) -> RankedNeighbor {
        RankedNeighbor {
            case_id: CaseId(id),
            similarity,
            metadata: CaseMetadata {
                diagnosis: format!("Case {id}"),
                age: 50,
                gender: Gender::Female,
                triage_category: TriageCategory::Yellow,
                urgency: "medium".into(),
                cost_efficiency: 4,
            },
            tests: tests.iter().map(|t| t.to_string()).collect(),
            reasoning: String::new(),
            cost_efficiency: 4,
        }
    }

    fn confidence_of(rec: &Recommendation, test: &str) -> Option<f32> {
        rec.recommended_tests.iter().find(|t| t.test == test).map(|t| t.confidence)
    }

    #[test]
    fn empty_input_is_explicit() {
        let rec = aggregate(&[]);
        assert_eq!(rec.confidence, 0.0);
        assert!(rec.recommended_tests.is_empty());
        assert_eq!(rec.similar_cases_count, 0);
        assert_eq!(rec.status, RecommendationStatus::NoSimilarCases);
        assert!(!rec.rationale.is_empty());
    }

    #[test]
    fn high_tier_wins_over_medium() {
        let ranked = vec![
            neighbor(1, 0.9, &["CRP", "Leukozyten"]),
            neighbor(2, 0.4, &["CRP"]),
        ];
        let rec = aggregate(&ranked);

        assert_eq!(rec.test_names(), vec!["CRP", "Leukozyten"]);
        assert_eq!(confidence_of(&rec, "CRP"), Some(1.0));
        assert_eq!(confidence_of(&rec, "Leukozyten"), Some(1.0));
        assert_eq!(rec.working_neighborhood_size, 1);
        assert_eq!(rec.similar_cases_count, 2);
        assert!((rec.confidence - 0.65).abs() < 1e-6);
    }

    #[test]
    fn confidence_floor_drops_rare_tests() {
        let ranked = vec![
            neighbor(1, 0.95, &["CRP", "Lipase"]),
            neighbor(2, 0.9, &["CRP"]),
            neighbor(3, 0.85, &["CRP"]),
            neighbor(4, 0.8, &["Troponin"]),
        ];
        let rec = aggregate(&ranked);

        assert_eq!(confidence_of(&rec, "CRP"), Some(0.75));
        assert_eq!(confidence_of(&rec, "Lipase"), None);
        assert_eq!(confidence_of(&rec, "Troponin"), None);
        assert_eq!(rec.recommended_tests[0].frequency, 3);
        assert_eq!(rec.recommended_tests[0].total_cases, 4);
    }

    #[test]
    fn falls_back_to_medium_tier() {
        let ranked = vec![
            neighbor(1, 0.65, &["BGA"]),
            neighbor(2, 0.55, &["BGA", "D-Dimer"]),
            neighbor(3, 0.2, &["Urinalysis"]),
        ];
        let rec = aggregate(&ranked);

        assert_eq!(rec.status, RecommendationStatus::Recommended);
        assert_eq!(rec.working_neighborhood_size, 2);
        assert_eq!(confidence_of(&rec, "BGA"), Some(1.0));
        assert_eq!(confidence_of(&rec, "D-Dimer"), Some(0.5));
        assert_eq!(confidence_of(&rec, "Urinalysis"), None);
    }

    #[test]
    fn thresholds_are_strict() {
        let ranked = vec![neighbor(1, 0.7, &["CRP"]), neighbor(2, 0.5, &["PCT"])];
        let rec = aggregate(&ranked);
        assert_eq!(rec.working_neighborhood_size, 1);
        assert_eq!(rec.test_names(), vec!["CRP"]);
    }

    #[test]
    fn no_tier_reports_considered_neighbors() {
        let ranked = vec![neighbor(1, 0.3, &["CRP"]), neighbor(2, 0.1, &["CRP"])];
        let rec = aggregate(&ranked);

        assert_eq!(rec.status, RecommendationStatus::NoConfidentMatch);
        assert!(rec.recommended_tests.is_empty());
        assert_eq!(rec.similar_cases_count, 2);
        assert_eq!(rec.working_neighborhood_size, 0);
        assert_eq!(rec.similar_cases.len(), 2);
    }

    #[test]
    fn duplicate_test_in_one_neighbor_counts_once() {
        let ranked = vec![
            neighbor(1, 0.9, &["CRP", "CRP", " CRP "]),
            neighbor(2, 0.9, &["Lactate"]),
        ];
        let rec = aggregate(&ranked);
        assert_eq!(confidence_of(&rec, "CRP"), Some(0.5));
        assert!(rec.recommended_tests.iter().all(|t| t.confidence <= 1.0));
    }

    #[test]
    fn ties_keep_discovery_order_and_cap_applies() {
        let tests: Vec<String> = (0..15).map(|i| format!("T{i:02}")).collect();
        let refs: Vec<&str> = tests.iter().map(String::as_str).collect();
        let rec = aggregate(&[neighbor(1, 0.99, &refs)]);

        assert_eq!(rec.recommended_tests.len(), 10);
        assert_eq!(rec.recommended_tests[0].test, "T00");
        assert_eq!(rec.recommended_tests[9].test, "T09");
    }

    #[test]
    fn confidence_uses_top_five_of_full_ranking() {
        let ranked: Vec<RankedNeighbor> = [0.9, 0.8, 0.7, 0.6, 0.5, 0.1]
            .iter()
            .enumerate()
            .map(|(i, &s)| neighbor(i as i64, s, &["CRP"]))
            .collect();
        let rec = aggregate(&ranked);
        assert!((rec.confidence - 0.7).abs() < 1e-6);
        assert_eq!(rec.similar_cases.len(), 3);
        assert_eq!(rec.similar_cases[0].case_id, CaseId(0));
    }

    #[test]
    fn negative_mean_similarity_clamps_to_zero() {
        let rec = aggregate(&[neighbor(1, -0.4, &["CRP"])]);
        assert_eq!(rec.confidence, 0.0);
        assert!(rec.rationale.contains("-0.40"));
    }

    #[test]
    fn custom_policy_is_honored() {
        let policy = AggregationPolicy {
            min_test_confidence: 0.6,
            max_tests: 1,
            ..AggregationPolicy::default()
        };
        let ranked = vec![
            neighbor(1, 0.9, &["CRP", "PCT"]),
            neighbor(2, 0.9, &["CRP", "PCT"]),
            neighbor(3, 0.9, &["CRP"]),
        ];
        let rec = aggregate_with(&ranked, &policy);
        assert_eq!(rec.test_names(), vec!["CRP"]);
    }
}
