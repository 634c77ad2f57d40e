use async_trait::async_trait;
use uplift_core::results::VariationCount;
use uplift_core::UpliftResult;

/// Point query for per-variation counters over the half-open window
/// `[start_at, end_at)`, scoped to one feature version.
#[derive(Debug, Clone)]
pub struct CountQuery {
    pub environment_id: String,
    pub start_at: i64,
    pub end_at: i64,
    pub feature_id: String,
    pub feature_version: i32,
    /// Set for goal count queries, `None` for evaluation counts.
    pub goal_id: Option<String>,
    pub variation_ids: Vec<String>,
}

/// Windowed counter retrieval from the event counting service.
#[async_trait]
pub trait EventCounterClient: Send + Sync {
    /// Users/events evaluated into each variation.
    async fn evaluation_counts(&self, query: &CountQuery) -> UpliftResult<Vec<VariationCount>>;

    /// Users/events that reached the goal named by `query.goal_id`.
    async fn goal_counts(&self, query: &CountQuery) -> UpliftResult<Vec<VariationCount>>;
}
