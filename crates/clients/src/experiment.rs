use async_trait::async_trait;
use uplift_core::types::{Experiment, ExperimentStatus};
use uplift_core::UpliftResult;

/// Filter for the paginated experiment listing.
#[derive(Debug, Clone)]
pub struct ListExperimentsRequest {
    pub statuses: Vec<ExperimentStatus>,
    /// Experiments stopped before this unix timestamp are excluded. The
    /// calculator passes `now - 2d` so recently stopped experiments keep
    /// receiving late events.
    pub stopped_after: i64,
    pub page_size: i64,
    pub cursor: String,
}

/// One page of the experiment listing.
#[derive(Debug, Clone, Default)]
pub struct ExperimentPage {
    pub experiments: Vec<Experiment>,
    pub cursor: String,
}

/// Experiment enumeration and lifecycle commands. The commands are
/// idempotent by experiment id.
#[async_trait]
pub trait ExperimentClient: Send + Sync {
    async fn list_experiments(
        &self,
        environment_id: &str,
        request: ListExperimentsRequest,
    ) -> UpliftResult<ExperimentPage>;

    async fn start_experiment(&self, environment_id: &str, experiment_id: &str)
        -> UpliftResult<()>;

    async fn finish_experiment(
        &self,
        environment_id: &str,
        experiment_id: &str,
    ) -> UpliftResult<()>;
}
