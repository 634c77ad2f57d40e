//! Operational counters for the calculation pass, exported through the
//! process-wide metrics recorder.

use metrics::{counter, histogram};

pub(crate) fn record_calculation(result: &'static str) {
    counter!("calculator.calculations", "result" => result).increment(1);
}

pub(crate) fn record_skip(reason: &'static str) {
    counter!("calculator.skips", "reason" => reason).increment(1);
}

pub(crate) fn record_sampling_seconds(model: &'static str, seconds: f64) {
    histogram!("calculator.sampling_seconds", "model" => model).record(seconds);
}
