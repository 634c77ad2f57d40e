//! Experiment domain types shared across the workspace.
//!
//! Experiments are owned by the remote experiment service; the calculator
//! reads them and issues lifecycle commands, nothing else mutates them here.

use serde::{Deserialize, Serialize};

/// One day in unix seconds, the bucketing granularity for result series.
pub const DAY_SECS: i64 = 24 * 60 * 60;

/// How long after `stop_at` an experiment keeps being calculated. Evaluation
/// and goal events can arrive late from clients, so results are still
/// refreshed for two days after an experiment stops.
pub const STOPPED_GRACE_SECS: i64 = 2 * DAY_SECS;

/// An environment (tenant namespace) that owns experiments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
}

/// Lifecycle status of an experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    Waiting,
    Running,
    Finished,
    Stopped,
}

/// A single variation (variant) of an experiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variation {
    pub id: String,
    /// The flag value served to users assigned to this variation.
    #[serde(default)]
    pub value: String,
}

/// An experiment as served by the remote experiment service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    pub id: String,
    pub feature_id: String,
    pub feature_version: i32,
    pub variations: Vec<Variation>,
    pub base_variation_id: String,
    pub goal_ids: Vec<String>,
    /// Unix seconds at which the experiment starts collecting events.
    pub start_at: i64,
    /// Unix seconds at which the experiment stops collecting events.
    pub stop_at: i64,
    pub status: ExperimentStatus,
}

impl Experiment {
    pub fn variation_ids(&self) -> Vec<String> {
        self.variations.iter().map(|v| v.id.clone()).collect()
    }

    /// Whether this experiment should be included in a calculation pass.
    pub fn eligible_for_calculation(&self, now: i64) -> bool {
        matches!(
            self.status,
            ExperimentStatus::Waiting | ExperimentStatus::Running
        ) && self.start_at <= now
    }

    /// Whether the experiment is past its late-event grace window and should
    /// be transitioned to finished.
    pub fn should_finish(&self, now: i64) -> bool {
        now - self.stop_at > STOPPED_GRACE_SECS
    }

    /// Whether a waiting experiment has reached its start time and should be
    /// transitioned to running.
    pub fn should_start(&self, now: i64) -> bool {
        self.status == ExperimentStatus::Waiting && self.start_at <= now
    }
}
