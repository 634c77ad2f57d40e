//! Folds one day's per-variation results into the growing cumulative record.

use uplift_core::results::VariationResult;
use uplift_core::{UpliftError, UpliftResult};

/// Merge `src` (one day's results) into `dst` (the cumulative record):
/// snapshot fields are overwritten with the day's values and every time
/// series gains one `(timestamp, value)` point. Both sides are paired by
/// sorting on variation id; the id sets must match exactly.
///
/// Days must be folded in increasing timestamp order — the fold is not
/// commutative.
pub fn fold_day(
    dst: &mut [VariationResult],
    mut src: Vec<VariationResult>,
    timestamp: i64,
) -> UpliftResult<()> {
    dst.sort_by(|a, b| a.variation_id.cmp(&b.variation_id));
    src.sort_by(|a, b| a.variation_id.cmp(&b.variation_id));

    let dst_ids: Vec<&str> = dst.iter().map(|vr| vr.variation_id.as_str()).collect();
    let src_ids: Vec<&str> = src.iter().map(|vr| vr.variation_id.as_str()).collect();
    if dst_ids != src_ids {
        return Err(UpliftError::VariationMismatch(format!(
            "dst={dst_ids:?} src={src_ids:?}"
        )));
    }

    for (d, s) in dst.iter_mut().zip(src) {
        // Per-day ratios come from the day's raw counters, not from the
        // model output.
        let cvr = if s.evaluation_count.user_count != 0 {
            s.experiment_count.user_count as f64 / s.evaluation_count.user_count as f64
        } else {
            0.0
        };
        let value_per_user = if s.experiment_count.user_count != 0 {
            s.experiment_count.value_sum / s.experiment_count.user_count as f64
        } else {
            0.0
        };

        d.evaluation_user_count_timeseries
            .push(timestamp, s.evaluation_count.user_count as f64);
        d.evaluation_event_count_timeseries
            .push(timestamp, s.evaluation_count.event_count as f64);
        d.goal_user_count_timeseries
            .push(timestamp, s.experiment_count.user_count as f64);
        d.goal_event_count_timeseries
            .push(timestamp, s.experiment_count.event_count as f64);
        d.goal_value_sum_timeseries
            .push(timestamp, s.experiment_count.value_sum);
        d.cvr_median_timeseries.push(timestamp, s.cvr_prob.median);
        d.cvr_percentile025_timeseries
            .push(timestamp, s.cvr_prob.percentile025);
        d.cvr_percentile975_timeseries
            .push(timestamp, s.cvr_prob.percentile975);
        d.cvr_timeseries.push(timestamp, cvr);
        d.goal_value_sum_per_user_timeseries
            .push(timestamp, value_per_user);
        d.goal_value_sum_per_user_median_timeseries
            .push(timestamp, s.goal_value_sum_per_user_prob.median);
        d.goal_value_sum_per_user_percentile025_timeseries
            .push(timestamp, s.goal_value_sum_per_user_prob.percentile025);
        d.goal_value_sum_per_user_percentile975_timeseries
            .push(timestamp, s.goal_value_sum_per_user_prob.percentile975);

        d.evaluation_count = s.evaluation_count;
        d.experiment_count = s.experiment_count;
        d.cvr_prob = s.cvr_prob;
        d.cvr_prob_best = s.cvr_prob_best;
        d.cvr_prob_beat_baseline = s.cvr_prob_beat_baseline;
        d.goal_value_sum_per_user_prob = s.goal_value_sum_per_user_prob;
        d.goal_value_sum_per_user_prob_best = s.goal_value_sum_per_user_prob_best;
        d.goal_value_sum_per_user_prob_beat_baseline = s.goal_value_sum_per_user_prob_beat_baseline;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uplift_core::results::{DistributionSummary, VariationCount};

    fn day_result(
        variation_id: &str,
        eval_users: i64,
        eval_events: i64,
        goal_users: i64,
        goal_events: i64,
        value_sum: f64,
    ) -> VariationResult {
        let mut vr = VariationResult::new(variation_id);
        vr.evaluation_count = VariationCount {
            variation_id: variation_id.to_string(),
            user_count: eval_users,
            event_count: eval_events,
            ..Default::default()
        };
        vr.experiment_count = VariationCount {
            variation_id: variation_id.to_string(),
            user_count: goal_users,
            event_count: goal_events,
            value_sum,
            ..Default::default()
        };
        vr.cvr_prob = DistributionSummary {
            median: 0.5,
            percentile025: 0.2,
            percentile975: 0.8,
            ..Default::default()
        };
        vr.goal_value_sum_per_user_prob = DistributionSummary {
            median: 2.0,
            percentile025: 1.0,
            percentile975: 3.0,
            ..Default::default()
        };
        vr
    }

    #[test]
    fn test_first_fold_produces_length_one_series() {
        let mut dst = vec![VariationResult::new("vid0")];
        let src = vec![day_result("vid0", 5, 10, 2, 4, 1.2)];
        fold_day(&mut dst, src, 86_400).unwrap();

        let vr = &dst[0];
        assert_eq!(vr.evaluation_user_count_timeseries.timestamps, vec![86_400]);
        assert_eq!(vr.evaluation_user_count_timeseries.values, vec![5.0]);
        assert_eq!(vr.evaluation_event_count_timeseries.values, vec![10.0]);
        assert_eq!(vr.goal_user_count_timeseries.values, vec![2.0]);
        assert_eq!(vr.goal_event_count_timeseries.values, vec![4.0]);
        assert_eq!(vr.goal_value_sum_timeseries.values, vec![1.2]);
        assert_eq!(vr.cvr_timeseries.values, vec![0.4]);
        assert_eq!(vr.goal_value_sum_per_user_timeseries.values, vec![0.6]);
        assert_eq!(vr.cvr_median_timeseries.values, vec![0.5]);
        assert_eq!(vr.cvr_percentile025_timeseries.values, vec![0.2]);
        assert_eq!(vr.cvr_percentile975_timeseries.values, vec![0.8]);
        assert_eq!(vr.goal_value_sum_per_user_median_timeseries.values, vec![2.0]);
        assert_eq!(vr.evaluation_count.user_count, 5);
        assert_eq!(vr.experiment_count.value_sum, 1.2);
    }

    #[test]
    fn test_second_fold_appends_and_overwrites_snapshot() {
        let mut dst = vec![VariationResult::new("vid0"), VariationResult::new("vid1")];
        fold_day(
            &mut dst,
            vec![
                day_result("vid0", 1, 2, 3, 4, 5.5),
                day_result("vid1", 10, 20, 30, 40, 50.5),
            ],
            1,
        )
        .unwrap();
        fold_day(
            &mut dst,
            vec![
                day_result("vid0", 2, 3, 4, 5, 6.6),
                day_result("vid1", 20, 30, 40, 50, 60.6),
            ],
            2,
        )
        .unwrap();

        let vr0 = &dst[0];
        assert_eq!(vr0.variation_id, "vid0");
        assert_eq!(vr0.evaluation_user_count_timeseries.timestamps, vec![1, 2]);
        assert_eq!(vr0.evaluation_user_count_timeseries.values, vec![1.0, 2.0]);
        assert_eq!(vr0.goal_value_sum_timeseries.values, vec![5.5, 6.6]);
        // Latest-day snapshot comes from the second fold.
        assert_eq!(vr0.evaluation_count.user_count, 2);
        assert_eq!(vr0.experiment_count.user_count, 4);

        let vr1 = &dst[1];
        assert_eq!(vr1.goal_user_count_timeseries.values, vec![30.0, 40.0]);
        assert!(vr1.cvr_timeseries.timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_cvr_handles_zero_denominator() {
        let mut dst = vec![VariationResult::new("vid0")];
        let src = vec![day_result("vid0", 0, 0, 0, 0, 0.0)];
        fold_day(&mut dst, src, 86_400).unwrap();
        assert_eq!(dst[0].cvr_timeseries.values, vec![0.0]);
        assert_eq!(dst[0].goal_value_sum_per_user_timeseries.values, vec![0.0]);
    }

    #[test]
    fn test_pairing_sorts_by_variation_id() {
        let mut dst = vec![VariationResult::new("vid1"), VariationResult::new("vid0")];
        let src = vec![
            day_result("vid0", 5, 0, 2, 0, 0.0),
            day_result("vid1", 8, 0, 4, 0, 0.0),
        ];
        fold_day(&mut dst, src, 1).unwrap();
        assert_eq!(dst[0].variation_id, "vid0");
        assert_eq!(dst[0].cvr_timeseries.values, vec![0.4]);
        assert_eq!(dst[1].variation_id, "vid1");
        assert_eq!(dst[1].cvr_timeseries.values, vec![0.5]);
    }

    #[test]
    fn test_mismatched_variation_sets_error_without_mutating() {
        let mut dst = vec![VariationResult::new("vid0"), VariationResult::new("vid1")];
        let src = vec![day_result("vid0", 1, 1, 1, 1, 1.0)];
        let err = fold_day(&mut dst, src, 1).unwrap_err();
        assert!(matches!(err, UpliftError::VariationMismatch(_)));
        assert!(dst.iter().all(|vr| vr.cvr_timeseries.is_empty()));
    }
}
