use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `UPLIFT__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Page size for the paginated environment/experiment list calls.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub value_model: ValueModelConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Settings for the MCMC sampler behind the conversion-rate model.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    #[serde(default = "default_chains")]
    pub chains: usize,
    /// Warm-up iterations discarded from the front of every chain.
    #[serde(default = "default_warmup")]
    pub warmup: usize,
    /// Retained draws per chain after warm-up.
    #[serde(default = "default_samples")]
    pub samples: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

/// Settings for the Normal-Inverse-Gamma value-per-user model.
#[derive(Debug, Clone, Deserialize)]
pub struct ValueModelConfig {
    /// Monte Carlo draws per variation.
    #[serde(default = "default_value_draws")]
    pub draws: usize,
    #[serde(default = "default_prior_mean")]
    pub prior_mean: f64,
    #[serde(default = "default_prior_nu")]
    pub prior_nu: f64,
    /// A shape of 10 corresponds to 20 pseudo-observations of spread.
    #[serde(default = "default_prior_shape")]
    pub prior_shape: f64,
    #[serde(default = "default_prior_scale")]
    pub prior_scale: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default functions
fn default_page_size() -> i64 {
    500
}
fn default_chains() -> usize {
    5
}
fn default_warmup() -> usize {
    1000
}
fn default_samples() -> usize {
    21_000
}
fn default_seed() -> u64 {
    1234
}
fn default_value_draws() -> usize {
    25_000
}
fn default_prior_mean() -> f64 {
    30.0
}
fn default_prior_nu() -> f64 {
    2.0
}
fn default_prior_shape() -> f64 {
    10.0
}
fn default_prior_scale() -> f64 {
    1000.0
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: default_chains(),
            warmup: default_warmup(),
            samples: default_samples(),
            seed: default_seed(),
        }
    }
}

impl Default for ValueModelConfig {
    fn default() -> Self {
        Self {
            draws: default_value_draws(),
            prior_mean: default_prior_mean(),
            prior_nu: default_prior_nu(),
            prior_shape: default_prior_shape(),
            prior_scale: default_prior_scale(),
            seed: default_seed(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            sampler: SamplerConfig::default(),
            value_model: ValueModelConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("UPLIFT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
