//! In-memory collaborator implementations backing tests and the offline
//! replay binary. Pagination cursors are numeric offsets into the stored
//! lists, mirroring the cursor walk of the remote services.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use uplift_core::results::{ExperimentResult, VariationCount};
use uplift_core::types::{Environment, Experiment, ExperimentStatus};
use uplift_core::{UpliftError, UpliftResult};

use crate::environment::{EnvironmentClient, EnvironmentPage};
use crate::event_counter::{CountQuery, EventCounterClient};
use crate::experiment::{ExperimentClient, ExperimentPage, ListExperimentsRequest};
use crate::storage::ResultStorage;

fn parse_cursor(cursor: &str) -> UpliftResult<usize> {
    if cursor.is_empty() {
        return Ok(0);
    }
    cursor
        .parse()
        .map_err(|_| UpliftError::Transport(format!("invalid cursor: {cursor}")))
}

fn page_of<T: Clone>(items: &[T], page_size: i64, cursor: &str) -> UpliftResult<(Vec<T>, String)> {
    let offset = parse_cursor(cursor)?;
    let end = (offset + page_size.max(0) as usize).min(items.len());
    let page = items[offset.min(items.len())..end].to_vec();
    Ok((page, end.to_string()))
}

/// Fixed set of environments.
#[derive(Debug, Default)]
pub struct InMemoryEnvironments {
    environments: Vec<Environment>,
}

impl InMemoryEnvironments {
    pub fn new(environments: Vec<Environment>) -> Self {
        Self { environments }
    }
}

#[async_trait]
impl EnvironmentClient for InMemoryEnvironments {
    async fn list_environments(
        &self,
        page_size: i64,
        cursor: &str,
    ) -> UpliftResult<EnvironmentPage> {
        let (environments, cursor) = page_of(&self.environments, page_size, cursor)?;
        Ok(EnvironmentPage {
            environments,
            cursor,
        })
    }
}

/// Experiments per environment, with lifecycle commands applied in place and
/// recorded so tests can assert on them.
#[derive(Debug, Default)]
pub struct InMemoryExperiments {
    experiments: Mutex<HashMap<String, Vec<Experiment>>>,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
}

impl InMemoryExperiments {
    pub fn new(experiments: HashMap<String, Vec<Experiment>>) -> Self {
        Self {
            experiments: Mutex::new(experiments),
            started: Mutex::new(Vec::new()),
            finished: Mutex::new(Vec::new()),
        }
    }

    /// Experiment ids that received a start command, in order.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Experiment ids that received a finish command, in order.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    fn set_status(&self, environment_id: &str, experiment_id: &str, status: ExperimentStatus) {
        let mut experiments = self.experiments.lock();
        if let Some(list) = experiments.get_mut(environment_id) {
            for experiment in list.iter_mut() {
                if experiment.id == experiment_id {
                    experiment.status = status;
                }
            }
        }
    }
}

#[async_trait]
impl ExperimentClient for InMemoryExperiments {
    async fn list_experiments(
        &self,
        environment_id: &str,
        request: ListExperimentsRequest,
    ) -> UpliftResult<ExperimentPage> {
        let experiments = self.experiments.lock();
        let matching: Vec<Experiment> = experiments
            .get(environment_id)
            .map(|list| {
                list.iter()
                    .filter(|e| request.statuses.contains(&e.status))
                    // The stop floor only excludes experiments that actually
                    // stopped; waiting/running experiments pass regardless of
                    // their scheduled stop_at so lapsed ones can still be
                    // finished by the calculator.
                    .filter(|e| {
                        e.status != ExperimentStatus::Stopped || e.stop_at >= request.stopped_after
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let (experiments, cursor) = page_of(&matching, request.page_size, &request.cursor)?;
        Ok(ExperimentPage {
            experiments,
            cursor,
        })
    }

    async fn start_experiment(
        &self,
        environment_id: &str,
        experiment_id: &str,
    ) -> UpliftResult<()> {
        self.set_status(environment_id, experiment_id, ExperimentStatus::Running);
        self.started.lock().push(experiment_id.to_string());
        Ok(())
    }

    async fn finish_experiment(
        &self,
        environment_id: &str,
        experiment_id: &str,
    ) -> UpliftResult<()> {
        self.set_status(environment_id, experiment_id, ExperimentStatus::Finished);
        self.finished.lock().push(experiment_id.to_string());
        Ok(())
    }
}

/// Counter responses keyed by goal id (goal counts) with one shared
/// evaluation response, returned for every query window — cumulative counts
/// as of "now", the way test fixtures describe them.
#[derive(Debug, Default)]
pub struct InMemoryEventCounts {
    evaluation: Vec<VariationCount>,
    goal: HashMap<String, Vec<VariationCount>>,
}

impl InMemoryEventCounts {
    pub fn new(evaluation: Vec<VariationCount>, goal: HashMap<String, Vec<VariationCount>>) -> Self {
        Self { evaluation, goal }
    }
}

#[async_trait]
impl EventCounterClient for InMemoryEventCounts {
    async fn evaluation_counts(&self, _query: &CountQuery) -> UpliftResult<Vec<VariationCount>> {
        Ok(self.evaluation.clone())
    }

    async fn goal_counts(&self, query: &CountQuery) -> UpliftResult<Vec<VariationCount>> {
        let goal_id = query
            .goal_id
            .as_deref()
            .ok_or_else(|| UpliftError::Transport("goal count query without goal id".into()))?;
        Ok(self.goal.get(goal_id).cloned().unwrap_or_default())
    }
}

/// Upsert-by-id storage over a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryResultStorage {
    results: DashMap<(String, String), ExperimentResult>,
}

impl InMemoryResultStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, environment_id: &str, result_id: &str) -> Option<ExperimentResult> {
        self.results
            .get(&(environment_id.to_string(), result_id.to_string()))
            .map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[async_trait]
impl ResultStorage for InMemoryResultStorage {
    async fn upsert(&self, environment_id: &str, result: &ExperimentResult) -> UpliftResult<()> {
        self.results.insert(
            (environment_id.to_string(), result.id.clone()),
            result.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplift_core::types::Variation;

    fn experiment(id: &str, status: ExperimentStatus, stop_at: i64) -> Experiment {
        Experiment {
            id: id.to_string(),
            feature_id: "fid".to_string(),
            feature_version: 1,
            variations: vec![Variation {
                id: "vid0".to_string(),
                value: String::new(),
            }],
            base_variation_id: "vid0".to_string(),
            goal_ids: vec!["gid".to_string()],
            start_at: 0,
            stop_at,
            status,
        }
    }

    #[tokio::test]
    async fn test_environment_pagination() {
        let environments: Vec<Environment> = (0..5)
            .map(|i| Environment {
                id: format!("env{i}"),
                name: format!("env {i}"),
            })
            .collect();
        let client = InMemoryEnvironments::new(environments);

        let first = client.list_environments(2, "").await.unwrap();
        assert_eq!(first.environments.len(), 2);
        let second = client.list_environments(2, &first.cursor).await.unwrap();
        assert_eq!(second.environments.len(), 2);
        let third = client.list_environments(2, &second.cursor).await.unwrap();
        assert_eq!(third.environments.len(), 1);
        assert_eq!(third.environments[0].id, "env4");
    }

    #[tokio::test]
    async fn test_experiment_listing_filters_status_and_stop_floor() {
        let mut experiments = HashMap::new();
        experiments.insert(
            "env0".to_string(),
            vec![
                experiment("running", ExperimentStatus::Running, 1_000),
                experiment("finished", ExperimentStatus::Finished, 1_000),
                // Lapsed but never explicitly stopped: still listed so the
                // calculator can finish it.
                experiment("lapsed", ExperimentStatus::Running, 10),
                experiment("stopped_old", ExperimentStatus::Stopped, 10),
                experiment("stopped_recent", ExperimentStatus::Stopped, 500),
            ],
        );
        let client = InMemoryExperiments::new(experiments);

        let page = client
            .list_experiments(
                "env0",
                ListExperimentsRequest {
                    statuses: vec![ExperimentStatus::Waiting, ExperimentStatus::Running],
                    stopped_after: 100,
                    page_size: 10,
                    cursor: String::new(),
                },
            )
            .await
            .unwrap();
        let mut ids: Vec<&str> = page.experiments.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["lapsed", "running"]);

        let page = client
            .list_experiments(
                "env0",
                ListExperimentsRequest {
                    statuses: vec![ExperimentStatus::Stopped],
                    stopped_after: 100,
                    page_size: 10,
                    cursor: String::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.experiments.len(), 1);
        assert_eq!(page.experiments[0].id, "stopped_recent");
    }

    #[tokio::test]
    async fn test_lifecycle_commands_update_status_and_record() {
        let mut experiments = HashMap::new();
        experiments.insert(
            "env0".to_string(),
            vec![experiment("eid", ExperimentStatus::Waiting, 1_000)],
        );
        let client = InMemoryExperiments::new(experiments);

        client.start_experiment("env0", "eid").await.unwrap();
        assert_eq!(client.started(), vec!["eid".to_string()]);

        let page = client
            .list_experiments(
                "env0",
                ListExperimentsRequest {
                    statuses: vec![ExperimentStatus::Running],
                    stopped_after: 0,
                    page_size: 10,
                    cursor: String::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(page.experiments.len(), 1);

        client.finish_experiment("env0", "eid").await.unwrap();
        assert_eq!(client.finished(), vec!["eid".to_string()]);
    }

    #[tokio::test]
    async fn test_storage_upsert_overwrites() {
        let storage = InMemoryResultStorage::new();
        let mut result = ExperimentResult::new("eid", 100);
        storage.upsert("env0", &result).await.unwrap();
        result.updated_at = 200;
        storage.upsert("env0", &result).await.unwrap();

        assert_eq!(storage.len(), 1);
        assert_eq!(storage.get("env0", "eid").unwrap().updated_at, 200);
    }
}
