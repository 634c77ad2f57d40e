//! Posterior sampling capability for the conversion-rate model.
//!
//! The model only depends on the [`BinomialPosteriorSampler`] contract:
//! given per-variation success and trial counts, produce several independent
//! chains of joint posterior draws with warm-up already discarded. The
//! embedded [`MetropolisSampler`] is a random-walk Metropolis implementation
//! of that contract; tests substitute closed-form samplers.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use uplift_core::config::SamplerConfig;
use uplift_core::{UpliftError, UpliftResult};

/// Retained draws of one chain. `draws[k][i]` is the k-th joint draw of
/// variation i's conversion probability; all draws within one chain share a
/// joint index so cross-variation comparisons stay paired.
#[derive(Debug, Clone)]
pub struct Chain {
    pub draws: Vec<Vec<f64>>,
}

/// Draws from the joint posterior of per-variation conversion probabilities
/// under independent Uniform(0,1) priors and Binomial likelihoods.
///
/// Implementations must be safe to share across calculation passes: the
/// sampler is constructed once at process start and reused read-only.
pub trait BinomialPosteriorSampler: Send + Sync {
    fn sample_posterior(&self, successes: &[i64], trials: &[i64]) -> UpliftResult<Vec<Chain>>;
}

/// Random-walk Metropolis sampler over each variation's conversion
/// probability. Chains run in parallel; each chain is seeded independently
/// so results are reproducible for a fixed configuration.
#[derive(Debug, Clone)]
pub struct MetropolisSampler {
    chains: usize,
    warmup: usize,
    samples: usize,
    seed: u64,
}

impl MetropolisSampler {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            chains: config.chains.max(1),
            warmup: config.warmup,
            samples: config.samples.max(1),
            seed: config.seed,
        }
    }

    fn run_chain(&self, chain_idx: u64, successes: &[i64], trials: &[i64]) -> Chain {
        let g = successes.len();
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(chain_idx));

        // Conjugate Beta(x+1, n-x+1) moments give a well-scaled proposal and
        // overdispersed starting points across chains.
        let mut current = vec![0.0f64; g];
        let mut current_ll = vec![0.0f64; g];
        let mut step = vec![0.0f64; g];
        for i in 0..g {
            let a = successes[i] as f64 + 1.0;
            let b = (trials[i] - successes[i]) as f64 + 1.0;
            let mean = a / (a + b);
            let sd = (a * b / ((a + b).powi(2) * (a + b + 1.0))).sqrt();
            let z: f64 = rng.sample(StandardNormal);
            current[i] = (mean + 2.0 * sd * z).clamp(1e-6, 1.0 - 1e-6);
            current_ll[i] = log_likelihood(successes[i], trials[i], current[i]);
            step[i] = (2.4 * sd).max(1e-4);
        }

        let mut draws = Vec::with_capacity(self.samples);
        for t in 0..(self.warmup + self.samples) {
            for i in 0..g {
                let z: f64 = rng.sample(StandardNormal);
                let proposal = current[i] + step[i] * z;
                if proposal <= 0.0 || proposal >= 1.0 {
                    continue;
                }
                let proposal_ll = log_likelihood(successes[i], trials[i], proposal);
                let accept: f64 = rng.gen::<f64>();
                if accept.ln() < proposal_ll - current_ll[i] {
                    current[i] = proposal;
                    current_ll[i] = proposal_ll;
                }
            }
            if t >= self.warmup {
                draws.push(current.clone());
            }
        }
        Chain { draws }
    }
}

impl BinomialPosteriorSampler for MetropolisSampler {
    fn sample_posterior(&self, successes: &[i64], trials: &[i64]) -> UpliftResult<Vec<Chain>> {
        if successes.len() != trials.len() || successes.is_empty() {
            return Err(UpliftError::InvalidInput(format!(
                "successes/trials length mismatch: {} vs {}",
                successes.len(),
                trials.len()
            )));
        }
        let chains: Result<Vec<Chain>, _> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.chains)
                .map(|chain_idx| {
                    scope.spawn(move || self.run_chain(chain_idx as u64, successes, trials))
                })
                .collect();
            handles.into_iter().map(|h| h.join()).collect()
        });
        chains.map_err(|_| UpliftError::Sampling("sampler chain thread panicked".to_string()))
    }
}

/// Binomial log-likelihood up to a constant. The zero-count terms are
/// skipped so `x = 0` or `x = n` does not produce `0 * -inf`.
fn log_likelihood(x: i64, n: i64, p: f64) -> f64 {
    let mut ll = 0.0;
    if x > 0 {
        ll += x as f64 * p.ln();
    }
    if n - x > 0 {
        ll += (n - x) as f64 * (1.0 - p).ln();
    }
    ll
}
