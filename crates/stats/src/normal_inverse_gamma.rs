//! Value-per-user model: conjugate Normal-Inverse-Gamma posterior over the
//! true mean value-per-user of each variation, with Monte Carlo estimates of
//! the cross-variation probabilities.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Gamma, Normal};
use uplift_core::config::ValueModelConfig;
use uplift_core::results::DistributionSummary;
use uplift_core::{UpliftError, UpliftResult};

use crate::summary;

/// Base of the sample-size damping transform: the effective sample size fed
/// into the conjugate update is log base 1.1 of the observed user count, so
/// very large samples do not collapse the posterior to a point mass.
const DAMPING_BASE: f64 = 1.1;

/// Posterior summaries for one variation's mean value-per-user.
#[derive(Debug, Clone, Default)]
pub struct ValuePosterior {
    pub variation_id: String,
    pub goal_value_sum_per_user_prob: DistributionSummary,
    pub goal_value_sum_per_user_prob_best: DistributionSummary,
    pub goal_value_sum_per_user_prob_beat_baseline: DistributionSummary,
}

/// Seam trait for the value-per-user model so the calculator can be driven
/// with stubs in tests.
pub trait ValuePerUserModel: Send + Sync {
    /// Per-variation sample mean / variance of the per-user value sum and
    /// the goal user count it was computed from; `baseline_idx` is 0-based.
    fn run(
        &self,
        variation_ids: &[String],
        means: &[f64],
        variances: &[f64],
        sizes: &[i64],
        baseline_idx: usize,
    ) -> UpliftResult<Vec<ValuePosterior>>;
}

/// Monte-Carlo-backed implementation of [`ValuePerUserModel`].
pub struct NormalInverseGamma {
    config: ValueModelConfig,
}

#[derive(Debug, Clone, Copy)]
struct NigPosterior {
    mean: f64,
    nu: f64,
    shape: f64,
    scale: f64,
}

impl NormalInverseGamma {
    pub fn new(config: ValueModelConfig) -> Self {
        Self { config }
    }

    /// Standard conjugate update against the fixed prior, using the damped
    /// effective sample size instead of the raw count.
    fn posterior(&self, mean: f64, variance: f64, size: i64) -> NigPosterior {
        let c = &self.config;
        let m = damped_size(size);
        let nu = c.prior_nu + m;
        NigPosterior {
            mean: (c.prior_nu * c.prior_mean + m * mean) / nu,
            nu,
            shape: c.prior_shape + m / 2.0,
            scale: c.prior_scale
                + 0.5 * m * variance
                + m * c.prior_nu / nu * (mean - c.prior_mean).powi(2) / 2.0,
        }
    }

    /// Draw `draws` samples of the posterior mean: a variance from the
    /// Inverse-Gamma marginal, then a mean from the Normal conditioned on it.
    fn sample_means(&self, post: NigPosterior, rng: &mut StdRng) -> UpliftResult<Vec<f64>> {
        if post.scale <= 0.0 || post.shape <= 0.0 {
            return Err(UpliftError::Sampling(format!(
                "degenerate posterior: shape={} scale={}",
                post.shape, post.scale
            )));
        }
        let precision_dist = Gamma::new(post.shape, 1.0 / post.scale)
            .map_err(|e| UpliftError::Sampling(format!("gamma parameters rejected: {e}")))?;
        let mut out = Vec::with_capacity(self.config.draws);
        for _ in 0..self.config.draws {
            let precision: f64 = precision_dist.sample(rng).max(f64::MIN_POSITIVE);
            let variance = 1.0 / precision;
            let normal = Normal::new(post.mean, (variance / post.nu).sqrt())
                .map_err(|e| UpliftError::Sampling(format!("normal parameters rejected: {e}")))?;
            out.push(normal.sample(rng));
        }
        Ok(out)
    }
}

impl ValuePerUserModel for NormalInverseGamma {
    fn run(
        &self,
        variation_ids: &[String],
        means: &[f64],
        variances: &[f64],
        sizes: &[i64],
        baseline_idx: usize,
    ) -> UpliftResult<Vec<ValuePosterior>> {
        let g = variation_ids.len();
        if g == 0 || means.len() != g || variances.len() != g || sizes.len() != g {
            return Err(UpliftError::InvalidInput(format!(
                "variation/statistic length mismatch: ids={g} means={} vars={} sizes={}",
                means.len(),
                variances.len(),
                sizes.len()
            )));
        }
        if baseline_idx >= g {
            return Err(UpliftError::InvalidInput(format!(
                "baseline index {baseline_idx} out of range for {g} variations"
            )));
        }
        for i in 0..g {
            if sizes[i] < 1 || variances[i] < 0.0 {
                return Err(UpliftError::InvalidInput(format!(
                    "variation {} has size={} variance={}",
                    variation_ids[i], sizes[i], variances[i]
                )));
            }
        }

        // draws[i][k]: draw k of variation i's posterior mean. Each variation
        // gets its own deterministic stream so results do not depend on the
        // order variations are sampled in.
        let mut draws = Vec::with_capacity(g);
        for i in 0..g {
            let post = self.posterior(means[i], variances[i], sizes[i]);
            let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(i as u64));
            draws.push(self.sample_means(post, &mut rng)?);
        }

        let best = best_indicators(&draws);
        let beat = beat_baseline_indicators(&draws, baseline_idx);

        let mut results = Vec::with_capacity(g);
        for i in 0..g {
            results.push(ValuePosterior {
                variation_id: variation_ids[i].clone(),
                goal_value_sum_per_user_prob: summary::summarize(&draws[i]),
                goal_value_sum_per_user_prob_best: summary::summarize(&best[i]),
                goal_value_sum_per_user_prob_beat_baseline: summary::summarize(&beat[i]),
            });
        }
        Ok(results)
    }
}

/// Effective sample size after damping: log base 1.1 of the user count.
fn damped_size(size: i64) -> f64 {
    (size as f64).ln() / DAMPING_BASE.ln()
}

/// `out[i][k] = 1.0` when variation i's draw k reaches the maximum across
/// variations; ties mark every tied variation as best.
fn best_indicators(draws: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let g = draws.len();
    let n = draws[0].len();
    let mut out = vec![vec![0.0; n]; g];
    for k in 0..n {
        let max = draws
            .iter()
            .map(|d| d[k])
            .fold(f64::NEG_INFINITY, f64::max);
        for i in 0..g {
            if draws[i][k] == max {
                out[i][k] = 1.0;
            }
        }
    }
    out
}

/// `out[i][k] = 1.0` when variation i's draw k strictly exceeds the
/// baseline's paired draw; the baseline never beats itself.
fn beat_baseline_indicators(draws: &[Vec<f64>], baseline_idx: usize) -> Vec<Vec<f64>> {
    let g = draws.len();
    let n = draws[0].len();
    let mut out = vec![vec![0.0; n]; g];
    for i in 0..g {
        for k in 0..n {
            if draws[i][k] > draws[baseline_idx][k] {
                out[i][k] = 1.0;
            }
        }
    }
    out
}
