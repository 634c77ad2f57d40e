//! Result payload types: the record built per experiment on every
//! calculation pass and upserted into the result store.

use serde::{Deserialize, Serialize};

/// An ordered sequence of (timestamp, value) pairs. One point is appended
/// per processed day boundary; the two vectors always have equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeseries {
    pub timestamps: Vec<i64>,
    pub values: Vec<f64>,
}

impl Timeseries {
    pub fn push(&mut self, timestamp: i64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Posterior sample histogram for display: `bins` holds the
/// `hist.len() + 1` bin edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub hist: Vec<i64>,
    pub bins: Vec<f64>,
}

/// Summary statistics of a posterior distribution.
///
/// `rhat` is the chain convergence diagnostic and stays 0.0 for quantities
/// that were not sampled by MCMC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub mean: f64,
    pub sd: f64,
    pub rhat: f64,
    pub median: f64,
    pub percentile025: f64,
    pub percentile975: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Histogram>,
}

/// Raw counters for one variation over a half-open window `[start_at, end_at)`,
/// as reported by the event counter service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationCount {
    pub variation_id: String,
    pub user_count: i64,
    pub event_count: i64,
    pub value_sum: f64,
    pub value_sum_per_user_mean: f64,
    pub value_sum_per_user_variance: f64,
}

/// Per-variation result bundle: the latest-day snapshots plus the cumulative
/// time series grown by one point per processed day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariationResult {
    pub variation_id: String,

    /// Latest-day evaluation counters (users exposed to the experiment).
    pub evaluation_count: VariationCount,
    /// Latest-day goal counters (users/events that hit the goal).
    pub experiment_count: VariationCount,

    pub cvr_prob: DistributionSummary,
    pub cvr_prob_best: DistributionSummary,
    pub cvr_prob_beat_baseline: DistributionSummary,

    pub goal_value_sum_per_user_prob: DistributionSummary,
    pub goal_value_sum_per_user_prob_best: DistributionSummary,
    pub goal_value_sum_per_user_prob_beat_baseline: DistributionSummary,

    pub evaluation_user_count_timeseries: Timeseries,
    pub evaluation_event_count_timeseries: Timeseries,
    pub goal_user_count_timeseries: Timeseries,
    pub goal_event_count_timeseries: Timeseries,
    pub goal_value_sum_timeseries: Timeseries,
    pub cvr_median_timeseries: Timeseries,
    pub cvr_percentile025_timeseries: Timeseries,
    pub cvr_percentile975_timeseries: Timeseries,
    pub cvr_timeseries: Timeseries,
    pub goal_value_sum_per_user_timeseries: Timeseries,
    pub goal_value_sum_per_user_median_timeseries: Timeseries,
    pub goal_value_sum_per_user_percentile025_timeseries: Timeseries,
    pub goal_value_sum_per_user_percentile975_timeseries: Timeseries,
}

impl VariationResult {
    pub fn new(variation_id: impl Into<String>) -> Self {
        Self {
            variation_id: variation_id.into(),
            ..Self::default()
        }
    }
}

/// Results for one goal: one `VariationResult` per experiment variation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalResult {
    pub goal_id: String,
    pub variation_results: Vec<VariationResult>,
}

/// The full record persisted per experiment, keyed by experiment id with
/// upsert semantics. Rebuilt from scratch on every calculation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: String,
    pub experiment_id: String,
    pub updated_at: i64,
    pub goal_results: Vec<GoalResult>,
}

impl ExperimentResult {
    pub fn new(experiment_id: &str, updated_at: i64) -> Self {
        Self {
            id: experiment_id.to_string(),
            experiment_id: experiment_id.to_string(),
            updated_at,
            goal_results: Vec::new(),
        }
    }
}
