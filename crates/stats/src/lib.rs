//! Bayesian inference models for experiment results.
//!
//! Two models are exposed behind seam traits so the calculator can be tested
//! with stubs: [`BinomialModel`] estimates each variation's true conversion
//! rate by MCMC, [`NormalInverseGamma`] estimates the mean value-per-user by
//! conjugate update plus Monte Carlo. Both report posterior summaries and the
//! cross-variation "best" / "beats baseline" probabilities.

pub mod binomial;
pub mod mcmc;
pub mod normal_inverse_gamma;
pub mod summary;

pub use binomial::{BinomialModel, ConversionRateModel, CvrPosterior};
pub use mcmc::{BinomialPosteriorSampler, Chain, MetropolisSampler};
pub use normal_inverse_gamma::{NormalInverseGamma, ValuePerUserModel, ValuePosterior};
