//! Uplift batch calculator — Bayesian experiment result computation.
//!
//! Runs one calculation pass against a JSON fixture of collaborator state
//! and writes the resulting records as JSON documents. An external scheduler
//! provides the cadence and guarantees that passes for the same job never
//! overlap.

mod fixture;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{info, warn};
use uplift_calculator::ExperimentCalculator;
use uplift_clients::memory::{InMemoryEnvironments, InMemoryEventCounts, InMemoryExperiments};
use uplift_core::AppConfig;
use uplift_stats::{BinomialModel, MetropolisSampler, NormalInverseGamma};

#[derive(Parser, Debug)]
#[command(name = "uplift-batch")]
#[command(about = "Bayesian experiment result calculator")]
#[command(version)]
struct Cli {
    /// JSON fixture holding environments, experiments, and counters
    #[arg(long, env = "UPLIFT__FIXTURE")]
    fixture: PathBuf,

    /// Directory the result documents are written to
    #[arg(long, default_value = "results", env = "UPLIFT__OUT")]
    out: PathBuf,

    /// Override the pass timestamp (unix seconds) for reproducible runs
    #[arg(long)]
    now: Option<i64>,

    /// Skip starting the Prometheus exporter
    #[arg(long, default_value_t = false)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "uplift_batch=info,uplift_calculator=info".into()),
        )
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    if !cli.no_metrics {
        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        if let Err(e) = PrometheusBuilder::new().with_http_listener(addr).install() {
            warn!(error = %e, "Failed to start metrics exporter");
        }
    }

    info!(fixture = %cli.fixture.display(), "loading fixture");
    let fixture = fixture::Fixture::load(&cli.fixture)?;
    info!(
        environments = fixture.environments.len(),
        "fixture loaded"
    );

    // The sampler is an expensive, process-lifetime resource: built once,
    // shared read-only by every pass.
    let sampler = Arc::new(MetropolisSampler::new(&config.sampler));
    let cvr_model = Arc::new(BinomialModel::new(sampler));
    let value_model = Arc::new(NormalInverseGamma::new(config.value_model.clone()));

    let calculator = ExperimentCalculator::new(
        Arc::new(InMemoryEnvironments::new(fixture.environments)),
        Arc::new(InMemoryExperiments::new(fixture.experiments)),
        Arc::new(InMemoryEventCounts::new(
            fixture.evaluation_counts,
            fixture.goal_counts,
        )),
        Arc::new(store::JsonResultStore::new(cli.out)),
        cvr_model,
        value_model,
        config.page_size,
    );

    let now = cli.now.unwrap_or_else(|| chrono::Utc::now().timestamp());
    calculator.run_at(now).await?;
    info!("calculation pass complete");

    Ok(())
}
