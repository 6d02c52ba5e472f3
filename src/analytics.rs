//! Read-side aggregates over the case history for dashboard display.
//!
//! Pure grouping and averaging over records fetched from the store.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::config::CostModel;
use crate::models::CaseRecord;

const TOP_DIAGNOSES: usize = 5;
const COMMON_TESTS: usize = 5;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Orders and efficiency for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub orders: usize,
    pub average_efficiency: f64,
    pub efficient_orders: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisFrequency {
    pub diagnosis: String,
    pub count: usize,
}

/// Rolling-window dashboard aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub window_days: u32,
    pub window_start: NaiveDate,
    pub total_orders: usize,
    pub average_efficiency: f64,
    pub efficient_orders: usize,
    /// Share of orders at or above the efficiency threshold, in [0, 1].
    pub efficiency_rate: f64,
    /// Euro, see [`CostModel`].
    pub estimated_savings: f64,
    pub today_orders: usize,
    pub today_efficiency: f64,
    /// Ascending by date; days without orders are absent.
    pub daily: Vec<DailyVolume>,
    pub top_diagnoses: Vec<DiagnosisFrequency>,
    /// Day with the highest mean efficiency, earliest on ties.
    pub best_day: Option<NaiveDate>,
}

/// Per-diagnosis profile across the whole history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisInsight {
    pub diagnosis: String,
    pub frequency: usize,
    pub average_efficiency: f64,
    pub average_age: f64,
    pub common_tests: Vec<String>,
    pub typical_urgency: Option<String>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// First instant covered by a window of `window_days` ending today.
///
/// The window reaches back `window_days` whole days from midnight today.
pub fn window_start(today: NaiveDate, window_days: u32) -> NaiveDateTime {
    today
        .checked_sub_days(Days::new(window_days as u64))
        .unwrap_or(NaiveDate::MIN)
        .and_time(chrono::NaiveTime::MIN)
}

pub fn summarize(
    records: &[CaseRecord],
    today: NaiveDate,
    window_days: u32,
    cost: &CostModel,
) -> DashboardSummary {
    let start = window_start(today, window_days);
    let in_window: Vec<&CaseRecord> = records.iter().filter(|r| r.recorded_at >= start).collect();

    let total_orders = in_window.len();
    let efficient_orders = in_window
        .iter()
        .filter(|r| r.outcome.cost_efficiency >= cost.efficient_threshold)
        .count();
    let todays: Vec<&CaseRecord> = in_window
        .iter()
        .copied()
        .filter(|r| r.recorded_at.date() == today)
        .collect();

    let daily = daily_volumes(&in_window, cost.efficient_threshold);
    let best_day = daily
        .iter()
        .fold(None::<&DailyVolume>, |best, day| match best {
            Some(b) if b.average_efficiency >= day.average_efficiency => Some(b),
            _ => Some(day),
        })
        .map(|d| d.date);

    DashboardSummary {
        window_days,
        window_start: start.date(),
        total_orders,
        average_efficiency: mean_efficiency(&in_window),
        efficient_orders,
        efficiency_rate: ratio(efficient_orders, total_orders),
        estimated_savings: efficient_orders as f64 * cost.cost_per_test * cost.savings_fraction,
        today_orders: todays.len(),
        today_efficiency: mean_efficiency(&todays),
        daily,
        top_diagnoses: top_diagnoses(&in_window),
        best_day,
    }
}

/// Insights per diagnosis, most frequent first.
pub fn diagnosis_insights(records: &[CaseRecord]) -> Vec<DiagnosisInsight> {
    let mut groups: Vec<(String, Vec<&CaseRecord>)> = Vec::new();
    for record in records {
        let key = record.case.suspected_diagnosis.trim();
        match groups.iter_mut().find(|(d, _)| d.as_str() == key) {
            Some((_, members)) => members.push(record),
            None => groups.push((key.to_string(), vec![record])),
        }
    }

    let mut insights: Vec<DiagnosisInsight> = groups
        .into_iter()
        .map(|(diagnosis, members)| DiagnosisInsight {
            frequency: members.len(),
            average_efficiency: mean_efficiency(&members),
            average_age: members.iter().map(|r| r.case.age as f64).sum::<f64>()
                / members.len() as f64,
            common_tests: most_common(
                members.iter().flat_map(|r| r.outcome.laboratory_tests.iter().map(String::as_str)),
                COMMON_TESTS,
            ),
            typical_urgency: most_common(
                members
                    .iter()
                    .map(|r| r.outcome.urgency_level.as_str())
                    .filter(|u| !u.trim().is_empty()),
                1,
            )
            .into_iter()
            .next(),
            diagnosis,
        })
        .collect();

    insights.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    insights
}

fn daily_volumes(records: &[&CaseRecord], efficient_threshold: u8) -> Vec<DailyVolume> {
    let mut by_day: HashMap<NaiveDate, Vec<&CaseRecord>> = HashMap::new();
    for record in records {
        by_day.entry(record.recorded_at.date()).or_default().push(record);
    }

    let mut daily: Vec<DailyVolume> = by_day
        .into_iter()
        .map(|(date, members)| DailyVolume {
            date,
            orders: members.len(),
            average_efficiency: mean_efficiency(&members),
            efficient_orders: members
                .iter()
                .filter(|r| r.outcome.cost_efficiency >= efficient_threshold)
                .count(),
        })
        .collect();
    daily.sort_by_key(|d| d.date);
    daily
}

fn top_diagnoses(records: &[&CaseRecord]) -> Vec<DiagnosisFrequency> {
    let mut counts: Vec<DiagnosisFrequency> = Vec::new();
    for record in records {
        let diagnosis = record.case.suspected_diagnosis.trim();
        match counts.iter_mut().find(|c| c.diagnosis == diagnosis) {
            Some(entry) => entry.count += 1,
            None => counts.push(DiagnosisFrequency {
                diagnosis: diagnosis.to_string(),
                count: 1,
            }),
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(TOP_DIAGNOSES);
    counts
}

/// Up to `n` most frequent values, first occurrence breaking ties.
fn most_common<'a>(values: impl Iterator<Item = &'a str>, n: usize) -> Vec<String> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values {
        match counts.iter_mut().find(|(v, _)| *v == value) {
            Some((_, c)) => *c += 1,
            None => counts.push((value, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(n).map(|(v, _)| v.to_string()).collect()
}

fn mean_efficiency(records: &[&CaseRecord]) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    records.iter().map(|r| r.outcome.cost_efficiency as f64).sum::<f64>() / records.len() as f64
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
