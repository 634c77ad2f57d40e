//! The calculation pass: walks eligible experiments, fetches windowed
//! counters, runs the inference models, and assembles per-day cumulative
//! results.

pub mod accumulate;
pub mod calculator;
mod telemetry;
pub mod timeline;

pub use calculator::ExperimentCalculator;
