//! Posterior sample summaries: moments, quantiles, histograms, and the
//! Gelman-Rubin convergence diagnostic.

use uplift_core::results::{DistributionSummary, Histogram};

/// Summarize a flat set of posterior draws.
///
/// `rhat` is left at 0.0 and the histogram at `None`; callers that sampled
/// by MCMC fill those in themselves.
pub fn summarize(samples: &[f64]) -> DistributionSummary {
    if samples.is_empty() {
        return DistributionSummary::default();
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    DistributionSummary {
        mean: mean(samples),
        sd: sample_sd(samples),
        rhat: 0.0,
        median: percentile_of_sorted(&sorted, 50.0),
        percentile025: percentile_of_sorted(&sorted, 2.5),
        percentile975: percentile_of_sorted(&sorted, 97.5),
        histogram: None,
    }
}

pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Sample standard deviation (n − 1 denominator).
pub fn sample_sd(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    let variance =
        samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
    variance.sqrt()
}

/// Linearly interpolated percentile over already-sorted samples.
pub fn percentile_of_sorted(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let weight = rank - lower as f64;
    sorted[lower] * (1.0 - weight) + sorted[upper] * weight
}

/// Equal-width histogram over the sample range.
///
/// `bins` edges are `num_bins + 1` values from min to max; a degenerate
/// range (all samples equal) is widened by half a unit on each side so the
/// counts still land in a bin.
pub fn histogram(samples: &[f64], num_bins: usize) -> Histogram {
    if samples.is_empty() || num_bins == 0 {
        return Histogram::default();
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in samples {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    if hi <= lo {
        lo -= 0.5;
        hi += 0.5;
    }
    let width = (hi - lo) / num_bins as f64;
    let bins: Vec<f64> = (0..=num_bins).map(|i| lo + width * i as f64).collect();
    let mut hist = vec![0i64; num_bins];
    for &x in samples {
        let idx = (((x - lo) / width) as usize).min(num_bins - 1);
        hist[idx] += 1;
    }
    Histogram { hist, bins }
}

/// Gelman-Rubin potential scale reduction factor across chains.
///
/// Returns 0.0 (diagnostic not computed) when the chains are too short or
/// degenerate (zero within-chain variance), so a constant indicator series
/// does not report a bogus value.
pub fn gelman_rubin(chains: &[Vec<f64>]) -> f64 {
    let m = chains.len();
    if m < 2 {
        return 0.0;
    }
    let n = chains[0].len();
    if n < 2 || chains.iter().any(|c| c.len() != n) {
        return 0.0;
    }

    let chain_means: Vec<f64> = chains.iter().map(|c| mean(c)).collect();
    let grand_mean = mean(&chain_means);

    // Between-chain variance (times n) and mean within-chain variance.
    let b = n as f64
        * chain_means
            .iter()
            .map(|cm| (cm - grand_mean).powi(2))
            .sum::<f64>()
        / (m - 1) as f64;
    let w = chains
        .iter()
        .zip(&chain_means)
        .map(|(c, cm)| c.iter().map(|x| (x - cm).powi(2)).sum::<f64>() / (n - 1) as f64)
        .sum::<f64>()
        / m as f64;

    if w <= 0.0 {
        return 0.0;
    }
    let var_plus = (n - 1) as f64 / n as f64 * w + b / n as f64;
    let rhat = (var_plus / w).sqrt();
    if rhat.is_finite() {
        rhat
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_orders_quantiles() {
        let samples: Vec<f64> = (0..=100).map(|i| i as f64).collect();
        let summary = summarize(&samples);
        assert!((summary.mean - 50.0).abs() < 1e-9);
        assert!((summary.median - 50.0).abs() < 1e-9);
        assert!((summary.percentile025 - 2.5).abs() < 1e-9);
        assert!((summary.percentile975 - 97.5).abs() < 1e-9);
        assert!(summary.percentile025 <= summary.median);
        assert!(summary.median <= summary.percentile975);
        assert_eq!(summary.rhat, 0.0);
    }

    #[test]
    fn test_summarize_empty_is_default() {
        assert_eq!(summarize(&[]), Default::default());
    }

    #[test]
    fn test_sample_sd() {
        let samples = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        // Known sample variance of this set is 32/7.
        assert!((sample_sd(&samples) - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
        assert_eq!(sample_sd(&[3.0]), 0.0);
    }

    #[test]
    fn test_histogram_bins_and_counts() {
        let samples = vec![0.0, 0.1, 0.2, 0.9, 1.0];
        let h = histogram(&samples, 10);
        assert_eq!(h.hist.len(), 10);
        assert_eq!(h.bins.len(), 11);
        assert_eq!(h.hist.iter().sum::<i64>(), 5);
        assert_eq!(h.bins[0], 0.0);
        assert!((h.bins[10] - 1.0).abs() < 1e-12);
        // The max sample lands in the last bin, not past it.
        assert_eq!(h.hist[9], 2);
    }

    #[test]
    fn test_histogram_degenerate_range() {
        let h = histogram(&[5.0, 5.0, 5.0], 4);
        assert_eq!(h.hist.iter().sum::<i64>(), 3);
        assert!(h.bins[0] < 5.0 && h.bins[4] > 5.0);
    }

    #[test]
    fn test_gelman_rubin_near_one_for_identical_chains() {
        let chain: Vec<f64> = (0..500).map(|i| ((i * 37) % 100) as f64 / 100.0).collect();
        let rhat = gelman_rubin(&[chain.clone(), chain.clone(), chain]);
        assert!((rhat - 1.0).abs() < 0.01, "rhat = {rhat}");
    }

    #[test]
    fn test_gelman_rubin_detects_disagreeing_chains() {
        let low: Vec<f64> = (0..500).map(|i| (i % 10) as f64 / 100.0).collect();
        let high: Vec<f64> = (0..500).map(|i| 10.0 + (i % 10) as f64 / 100.0).collect();
        let rhat = gelman_rubin(&[low, high]);
        assert!(rhat > 2.0, "rhat = {rhat}");
    }

    #[test]
    fn test_gelman_rubin_degenerate_chains_not_computed() {
        assert_eq!(gelman_rubin(&[vec![1.0; 10], vec![1.0; 10]]), 0.0);
        assert_eq!(gelman_rubin(&[vec![1.0, 2.0]]), 0.0);
    }
}
