//! The orchestrating calculation pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, warn};
use uplift_clients::{
    CountQuery, EnvironmentClient, EventCounterClient, ExperimentClient, ListExperimentsRequest,
    ResultStorage,
};
use uplift_core::results::{ExperimentResult, GoalResult, VariationCount, VariationResult};
use uplift_core::types::{Environment, Experiment, ExperimentStatus, STOPPED_GRACE_SECS};
use uplift_core::UpliftResult;
use uplift_stats::{ConversionRateModel, ValuePerUserModel};

use crate::accumulate::fold_day;
use crate::telemetry;
use crate::timeline::day_boundaries;

/// Builds and persists the result record for every eligible experiment.
/// One instance serves the whole process; a scheduler invokes [`run`] once
/// per cadence and guarantees passes do not overlap.
///
/// [`run`]: ExperimentCalculator::run
pub struct ExperimentCalculator {
    environments: Arc<dyn EnvironmentClient>,
    experiments: Arc<dyn ExperimentClient>,
    counters: Arc<dyn EventCounterClient>,
    storage: Arc<dyn ResultStorage>,
    cvr_model: Arc<dyn ConversionRateModel>,
    value_model: Arc<dyn ValuePerUserModel>,
    page_size: i64,
}

impl ExperimentCalculator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        environments: Arc<dyn EnvironmentClient>,
        experiments: Arc<dyn ExperimentClient>,
        counters: Arc<dyn EventCounterClient>,
        storage: Arc<dyn ResultStorage>,
        cvr_model: Arc<dyn ConversionRateModel>,
        value_model: Arc<dyn ValuePerUserModel>,
        page_size: i64,
    ) -> Self {
        Self {
            environments,
            experiments,
            counters,
            storage,
            cvr_model,
            value_model,
            page_size,
        }
    }

    /// Run one calculation pass at the current wall-clock time.
    pub async fn run(&self) -> UpliftResult<()> {
        self.run_at(Utc::now().timestamp()).await
    }

    /// Run one calculation pass as of `now`. Listing failures abort the
    /// pass; failures inside a single experiment are logged and isolated so
    /// the remaining experiments still get results.
    pub async fn run_at(&self, now: i64) -> UpliftResult<()> {
        let environments = self.list_environments().await?;
        info!(environments = environments.len(), "starting calculation pass");
        for env in &environments {
            let experiments = self.list_experiments(&env.id, now).await?;
            info!(
                environment_id = %env.id,
                experiments = experiments.len(),
                "calculating environment"
            );
            for experiment in &experiments {
                if !experiment.eligible_for_calculation(now) {
                    continue;
                }
                match self.process_experiment(&env.id, experiment, now).await {
                    Ok(()) => telemetry::record_calculation("success"),
                    Err(e) => {
                        telemetry::record_calculation("fail");
                        error!(
                            environment_id = %env.id,
                            experiment_id = %experiment.id,
                            error = %e,
                            "experiment calculation failed"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    async fn process_experiment(
        &self,
        environment_id: &str,
        experiment: &Experiment,
        now: i64,
    ) -> UpliftResult<()> {
        let result = self
            .build_experiment_result(environment_id, experiment, now)
            .await?;
        self.storage.upsert(environment_id, &result).await?;
        self.update_experiment_status(environment_id, experiment, now)
            .await
    }

    async fn list_environments(&self) -> UpliftResult<Vec<Environment>> {
        let mut environments = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self
                .environments
                .list_environments(self.page_size, &cursor)
                .await?;
            let page_len = page.environments.len() as i64;
            environments.extend(page.environments);
            if page_len < self.page_size {
                return Ok(environments);
            }
            cursor = page.cursor;
        }
    }

    async fn list_experiments(
        &self,
        environment_id: &str,
        now: i64,
    ) -> UpliftResult<Vec<Experiment>> {
        let mut experiments = Vec::new();
        let mut cursor = String::new();
        loop {
            let page = self
                .experiments
                .list_experiments(
                    environment_id,
                    ListExperimentsRequest {
                        statuses: vec![ExperimentStatus::Waiting, ExperimentStatus::Running],
                        stopped_after: now - STOPPED_GRACE_SECS,
                        page_size: self.page_size,
                        cursor,
                    },
                )
                .await?;
            let page_len = page.experiments.len() as i64;
            experiments.extend(page.experiments);
            if page_len < self.page_size {
                return Ok(experiments);
            }
            cursor = page.cursor;
        }
    }

    /// Rebuild the full record from scratch: for every goal, walk the day
    /// boundaries, fetch the counters for the cumulative window and fold the
    /// day's result into the per-variation series.
    async fn build_experiment_result(
        &self,
        environment_id: &str,
        experiment: &Experiment,
        now: i64,
    ) -> UpliftResult<ExperimentResult> {
        let mut result = ExperimentResult::new(&experiment.id, now);
        let variation_ids = experiment.variation_ids();
        let boundaries = day_boundaries(experiment.start_at, experiment.stop_at, now);

        for goal_id in &experiment.goal_ids {
            let mut variation_results: Vec<VariationResult> = experiment
                .variations
                .iter()
                .map(|v| VariationResult::new(&v.id))
                .collect();

            for &end_at in &boundaries {
                let query = CountQuery {
                    environment_id: environment_id.to_string(),
                    start_at: experiment.start_at,
                    end_at,
                    feature_id: experiment.feature_id.clone(),
                    feature_version: experiment.feature_version,
                    goal_id: None,
                    variation_ids: variation_ids.clone(),
                };
                let eval_counts = self.counters.evaluation_counts(&query).await?;
                let goal_counts = self
                    .counters
                    .goal_counts(&CountQuery {
                        goal_id: Some(goal_id.clone()),
                        ..query.clone()
                    })
                    .await?;

                let Some(day) =
                    self.calc_goal_result(&eval_counts, &goal_counts, &experiment.base_variation_id)
                else {
                    continue;
                };
                if let Err(e) = fold_day(&mut variation_results, day, end_at) {
                    // The counter response did not cover the experiment's
                    // variation set; drop this day rather than corrupt the
                    // series.
                    telemetry::record_skip("variation_set_mismatch");
                    warn!(
                        environment_id = %environment_id,
                        experiment_id = %experiment.id,
                        goal_id = %goal_id,
                        end_at,
                        error = %e,
                        "day result dropped"
                    );
                }
            }

            result.goal_results.push(GoalResult {
                goal_id: goal_id.clone(),
                variation_results,
            });
        }
        Ok(result)
    }

    /// One day's per-variation results. Returns `None` when a variation in
    /// the goal counts is missing from the evaluation counts (the whole
    /// goal-day is abandoned). Degenerate counts skip the models and leave
    /// their summaries at the zero default; the raw counters still fold.
    fn calc_goal_result(
        &self,
        eval_counts: &[VariationCount],
        goal_counts: &[VariationCount],
        base_variation_id: &str,
    ) -> Option<Vec<VariationResult>> {
        let eval_by_id: HashMap<&str, &VariationCount> = eval_counts
            .iter()
            .map(|vc| (vc.variation_id.as_str(), vc))
            .collect();

        let mut variation_results = Vec::with_capacity(goal_counts.len());
        let mut variation_ids = Vec::with_capacity(goal_counts.len());
        let mut goal_users = Vec::with_capacity(goal_counts.len());
        let mut eval_users = Vec::with_capacity(goal_counts.len());
        let mut value_means = Vec::with_capacity(goal_counts.len());
        let mut value_vars = Vec::with_capacity(goal_counts.len());
        let mut baseline_idx = 0;

        for (i, goal_count) in goal_counts.iter().enumerate() {
            let Some(eval_count) = eval_by_id.get(goal_count.variation_id.as_str()) else {
                telemetry::record_skip("eval_variation_count_not_found");
                warn!(
                    variation_id = %goal_count.variation_id,
                    "variation missing from evaluation counts, abandoning goal result"
                );
                return None;
            };
            let mut vr = VariationResult::new(&goal_count.variation_id);
            vr.experiment_count = goal_count.clone();
            vr.evaluation_count = (*eval_count).clone();

            variation_ids.push(goal_count.variation_id.clone());
            goal_users.push(goal_count.user_count);
            eval_users.push(eval_count.user_count);
            value_means.push(goal_count.value_sum_per_user_mean);
            value_vars.push(goal_count.value_sum_per_user_variance);
            if goal_count.variation_id == base_variation_id {
                baseline_idx = i;
            }
            variation_results.push(vr);
        }
        if variation_results.is_empty() {
            return Some(variation_results);
        }

        // Counts that have not stabilized yet (more goal users than
        // evaluated users) make both models meaningless for this day.
        for i in 0..eval_users.len() {
            if eval_users[i] < goal_users[i] {
                telemetry::record_skip("evaluation_count_below_goal");
                warn!(
                    variation_id = %variation_ids[i],
                    evaluation_count = eval_users[i],
                    goal_count = goal_users[i],
                    "evaluation count is less than goal count"
                );
                return Some(variation_results);
            }
        }

        let started = Instant::now();
        match self
            .cvr_model
            .run(&variation_ids, &goal_users, &eval_users, baseline_idx)
        {
            Ok(posteriors) => {
                telemetry::record_sampling_seconds(
                    "conversion_rate",
                    started.elapsed().as_secs_f64(),
                );
                for (vr, p) in variation_results.iter_mut().zip(posteriors) {
                    vr.cvr_prob = p.cvr_prob;
                    vr.cvr_prob_best = p.cvr_prob_best;
                    vr.cvr_prob_beat_baseline = p.cvr_prob_beat_baseline;
                }
            }
            Err(e) => {
                telemetry::record_skip("cvr_sampling_failed");
                error!(error = %e, "conversion rate sampling failed");
                return Some(variation_results);
            }
        }

        // Unobserved or degenerate value data cannot drive the conjugate
        // update.
        for i in 0..variation_ids.len() {
            if goal_users[i] == 0 || value_means[i] == 0.0 || value_vars[i] == 0.0 {
                telemetry::record_skip("values_are_zero");
                warn!(
                    variation_id = %variation_ids[i],
                    goal_user_count = goal_users[i],
                    value_mean = value_means[i],
                    value_variance = value_vars[i],
                    "skipping value-per-user model"
                );
                return Some(variation_results);
            }
        }

        let started = Instant::now();
        match self.value_model.run(
            &variation_ids,
            &value_means,
            &value_vars,
            &goal_users,
            baseline_idx,
        ) {
            Ok(posteriors) => {
                telemetry::record_sampling_seconds(
                    "value_per_user",
                    started.elapsed().as_secs_f64(),
                );
                for (vr, p) in variation_results.iter_mut().zip(posteriors) {
                    vr.goal_value_sum_per_user_prob = p.goal_value_sum_per_user_prob;
                    vr.goal_value_sum_per_user_prob_best = p.goal_value_sum_per_user_prob_best;
                    vr.goal_value_sum_per_user_prob_beat_baseline =
                        p.goal_value_sum_per_user_prob_beat_baseline;
                }
            }
            Err(e) => {
                telemetry::record_skip("value_sampling_failed");
                error!(error = %e, "value-per-user sampling failed");
            }
        }
        Some(variation_results)
    }

    /// At most one lifecycle transition per pass; finishing a lapsed
    /// experiment takes priority over starting a waiting one.
    async fn update_experiment_status(
        &self,
        environment_id: &str,
        experiment: &Experiment,
        now: i64,
    ) -> UpliftResult<()> {
        if experiment.should_finish(now) {
            info!(experiment_id = %experiment.id, "finishing experiment");
            return self
                .experiments
                .finish_experiment(environment_id, &experiment.id)
                .await;
        }
        if experiment.should_start(now) {
            info!(experiment_id = %experiment.id, "starting experiment");
            return self
                .experiments
                .start_experiment(environment_id, &experiment.id)
                .await;
        }
        Ok(())
    }
}
