use async_trait::async_trait;
use uplift_core::types::Environment;
use uplift_core::UpliftResult;

/// One page of the environment listing. An empty-or-short page ends the
/// cursor walk.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentPage {
    pub environments: Vec<Environment>,
    pub cursor: String,
}

/// Paginated enumeration of environments.
#[async_trait]
pub trait EnvironmentClient: Send + Sync {
    async fn list_environments(
        &self,
        page_size: i64,
        cursor: &str,
    ) -> UpliftResult<EnvironmentPage>;
}
