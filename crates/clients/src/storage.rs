use async_trait::async_trait;
use uplift_core::results::ExperimentResult;
use uplift_core::UpliftResult;

/// Persistence for calculated records, keyed by experiment result id.
/// On conflict every mutable field is overwritten with the new payload.
#[async_trait]
pub trait ResultStorage: Send + Sync {
    async fn upsert(&self, environment_id: &str, result: &ExperimentResult) -> UpliftResult<()>;
}
