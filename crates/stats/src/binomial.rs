//! Conversion-rate model: independent Uniform(0,1) priors over each
//! variation's true conversion probability with Binomial likelihoods.
//!
//! The posterior is sampled (not solved in closed form) because the
//! "probability of being best" and "probability of beating the baseline"
//! need comparisons across the joint posterior, draw by draw.

use std::sync::Arc;

use uplift_core::results::DistributionSummary;
use uplift_core::{UpliftError, UpliftResult};

use crate::mcmc::{BinomialPosteriorSampler, Chain};
use crate::summary;

/// Number of equal-width bins retained for the conversion-rate histogram.
const HISTOGRAM_BINS: usize = 100;

/// Posterior summaries for one variation's conversion rate.
#[derive(Debug, Clone, Default)]
pub struct CvrPosterior {
    pub variation_id: String,
    pub cvr_prob: DistributionSummary,
    pub cvr_prob_best: DistributionSummary,
    pub cvr_prob_beat_baseline: DistributionSummary,
}

/// Seam trait for the conversion-rate model so the calculator can be driven
/// with stubs in tests.
pub trait ConversionRateModel: Send + Sync {
    /// `goal_user_counts[i]` successes out of `evaluation_user_counts[i]`
    /// trials per variation; `baseline_idx` is 0-based.
    fn run(
        &self,
        variation_ids: &[String],
        goal_user_counts: &[i64],
        evaluation_user_counts: &[i64],
        baseline_idx: usize,
    ) -> UpliftResult<Vec<CvrPosterior>>;
}

/// MCMC-backed implementation of [`ConversionRateModel`].
pub struct BinomialModel {
    sampler: Arc<dyn BinomialPosteriorSampler>,
}

impl BinomialModel {
    pub fn new(sampler: Arc<dyn BinomialPosteriorSampler>) -> Self {
        Self { sampler }
    }
}

impl ConversionRateModel for BinomialModel {
    fn run(
        &self,
        variation_ids: &[String],
        goal_user_counts: &[i64],
        evaluation_user_counts: &[i64],
        baseline_idx: usize,
    ) -> UpliftResult<Vec<CvrPosterior>> {
        let g = variation_ids.len();
        if g == 0 || goal_user_counts.len() != g || evaluation_user_counts.len() != g {
            return Err(UpliftError::InvalidInput(format!(
                "variation/count length mismatch: ids={g} goals={} evals={}",
                goal_user_counts.len(),
                evaluation_user_counts.len()
            )));
        }
        if baseline_idx >= g {
            return Err(UpliftError::InvalidInput(format!(
                "baseline index {baseline_idx} out of range for {g} variations"
            )));
        }
        for i in 0..g {
            if goal_user_counts[i] < 0 || goal_user_counts[i] > evaluation_user_counts[i] {
                return Err(UpliftError::InvalidInput(format!(
                    "variation {} has {} successes out of {} trials",
                    variation_ids[i], goal_user_counts[i], evaluation_user_counts[i]
                )));
            }
        }

        let chains = self
            .sampler
            .sample_posterior(goal_user_counts, evaluation_user_counts)?;
        if chains.is_empty() || chains.iter().any(|c| c.draws.is_empty()) {
            return Err(UpliftError::Sampling(
                "sampler returned no draws".to_string(),
            ));
        }
        for chain in &chains {
            if chain.draws.iter().any(|d| d.len() != g) {
                return Err(UpliftError::Sampling(format!(
                    "sampler draw width does not match {g} variations"
                )));
            }
        }

        let best = best_indicators(&chains);
        let beat = beat_baseline_indicators(&chains, baseline_idx);

        let mut results = Vec::with_capacity(g);
        for i in 0..g {
            let p_chains: Vec<Vec<f64>> = chains
                .iter()
                .map(|c| c.draws.iter().map(|d| d[i]).collect())
                .collect();
            let p_all: Vec<f64> = p_chains.iter().flatten().copied().collect();

            let mut cvr_prob = summary::summarize(&p_all);
            cvr_prob.rhat = summary::gelman_rubin(&p_chains);
            cvr_prob.histogram = Some(summary::histogram(&p_all, HISTOGRAM_BINS));

            let cvr_prob_best = indicator_summary(&best, i);
            let cvr_prob_beat_baseline = if i == baseline_idx {
                // A variation cannot beat itself; the baseline reports the
                // all-zero summary rather than a sampled one.
                DistributionSummary::default()
            } else {
                indicator_summary(&beat, i)
            };

            results.push(CvrPosterior {
                variation_id: variation_ids[i].clone(),
                cvr_prob,
                cvr_prob_best,
                cvr_prob_beat_baseline,
            });
        }
        Ok(results)
    }
}

/// Per-chain indicator series (`out[chain][draw][variation]`) marking the
/// variation whose draw strictly exceeds every other variation's draw.
fn best_indicators(chains: &[Chain]) -> Vec<Vec<Vec<f64>>> {
    chains
        .iter()
        .map(|chain| {
            chain
                .draws
                .iter()
                .map(|draw| {
                    let max = draw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    let winners = draw.iter().filter(|&&p| p == max).count();
                    draw.iter()
                        .map(|&p| {
                            if winners == 1 && p == max {
                                1.0
                            } else {
                                0.0
                            }
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Per-chain indicator series marking draws that strictly exceed the
/// baseline's paired draw. The baseline's own column is all zero.
fn beat_baseline_indicators(chains: &[Chain], baseline_idx: usize) -> Vec<Vec<Vec<f64>>> {
    chains
        .iter()
        .map(|chain| {
            chain
                .draws
                .iter()
                .map(|draw| {
                    let baseline = draw[baseline_idx];
                    draw.iter()
                        .map(|&p| if p > baseline { 1.0 } else { 0.0 })
                        .collect()
                })
                .collect()
        })
        .collect()
}

fn indicator_summary(indicators: &[Vec<Vec<f64>>], variation_idx: usize) -> DistributionSummary {
    let per_chain: Vec<Vec<f64>> = indicators
        .iter()
        .map(|chain| chain.iter().map(|draw| draw[variation_idx]).collect())
        .collect();
    let all: Vec<f64> = per_chain.iter().flatten().copied().collect();
    let mut s = summary::summarize(&all);
    s.rhat = summary::gelman_rubin(&per_chain);
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplift_core::config::SamplerConfig;

    use crate::mcmc::MetropolisSampler;

    fn model() -> BinomialModel {
        BinomialModel::new(Arc::new(MetropolisSampler::new(&SamplerConfig {
            chains: 4,
            warmup: 300,
            samples: 2_000,
            seed: 1234,
        })))
    }

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("vid{i}")).collect()
    }

    #[test]
    fn test_higher_rate_variation_wins() {
        // 38/101 ≈ 0.376 vs 51/99 ≈ 0.515 with variation 0 as baseline.
        let results = model().run(&ids(2), &[38, 51], &[101, 99], 0).unwrap();

        let baseline = &results[0];
        let challenger = &results[1];

        assert!((baseline.cvr_prob.mean - 38.0 / 101.0).abs() < 0.03);
        assert!((challenger.cvr_prob.mean - 51.0 / 99.0).abs() < 0.03);

        assert!(challenger.cvr_prob_best.mean > 0.5);
        assert!(challenger.cvr_prob_beat_baseline.mean > 0.5);
        assert!(baseline.cvr_prob_best.mean < 0.5);

        // The baseline cannot beat itself.
        assert_eq!(baseline.cvr_prob_beat_baseline.mean, 0.0);
        assert_eq!(baseline.cvr_prob_beat_baseline.sd, 0.0);
        assert_eq!(baseline.cvr_prob_beat_baseline.rhat, 0.0);

        // Best probabilities sum to ~1 when ties have measure zero.
        let total = baseline.cvr_prob_best.mean + challenger.cvr_prob_best.mean;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_summary_shape() {
        let results = model().run(&ids(2), &[38, 51], &[101, 99], 0).unwrap();
        for r in &results {
            let p = &r.cvr_prob;
            assert!(p.percentile025 <= p.median && p.median <= p.percentile975);
            assert!((p.rhat - 1.0).abs() < 0.05, "rhat = {}", p.rhat);
            let hist = p.histogram.as_ref().unwrap();
            assert_eq!(hist.hist.len(), 100);
            assert_eq!(hist.bins.len(), 101);
            assert_eq!(hist.hist.iter().sum::<i64>(), 4 * 2_000);
        }
    }

    #[test]
    fn test_single_variation_is_trivially_best() {
        let results = model().run(&ids(1), &[10], &[50], 0).unwrap();
        assert_eq!(results[0].cvr_prob_best.mean, 1.0);
        assert_eq!(results[0].cvr_prob_beat_baseline, Default::default());
    }

    #[test]
    fn test_input_validation() {
        let m = model();
        assert!(m.run(&[], &[], &[], 0).is_err());
        assert!(m.run(&ids(2), &[1], &[2, 3], 0).is_err());
        assert!(m.run(&ids(2), &[5, 1], &[4, 3], 0).is_err());
        assert!(m.run(&ids(2), &[1, 1], &[2, 3], 2).is_err());
    }

    #[test]
    fn test_sampler_failure_propagates() {
        struct FailingSampler;
        impl BinomialPosteriorSampler for FailingSampler {
            fn sample_posterior(&self, _: &[i64], _: &[i64]) -> UpliftResult<Vec<Chain>> {
                Err(UpliftError::Sampling("backend unavailable".to_string()))
            }
        }
        let m = BinomialModel::new(Arc::new(FailingSampler));
        assert!(matches!(
            m.run(&ids(2), &[1, 1], &[2, 2], 0),
            Err(UpliftError::Sampling(_))
        ));
    }

    #[test]
    fn test_best_indicators_strict() {
        let chains = vec![Chain {
            draws: vec![vec![0.1, 0.9], vec![0.5, 0.5], vec![0.7, 0.2]],
        }];
        let best = best_indicators(&chains);
        assert_eq!(best[0][0], vec![0.0, 1.0]);
        // An exact tie leaves no strict winner.
        assert_eq!(best[0][1], vec![0.0, 0.0]);
        assert_eq!(best[0][2], vec![1.0, 0.0]);
    }

    #[test]
    fn test_beat_baseline_indicators() {
        let chains = vec![Chain {
            draws: vec![vec![0.1, 0.9], vec![0.5, 0.5]],
        }];
        let beat = beat_baseline_indicators(&chains, 0);
        assert_eq!(beat[0][0], vec![0.0, 1.0]);
        assert_eq!(beat[0][1], vec![0.0, 0.0]);
    }
}
