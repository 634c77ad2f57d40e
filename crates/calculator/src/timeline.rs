//! Day bucketing for windowed counter queries.

use uplift_core::types::DAY_SECS;

/// The ordered day-end timestamps to evaluate for an experiment: whole days
/// from `start_at`, capped by the effective end `min(stop_at, now)`, which
/// is always the final element even when it is a partial day. A window
/// shorter than one day yields just the effective end.
pub fn day_boundaries(start_at: i64, stop_at: i64, now: i64) -> Vec<i64> {
    let effective_end = stop_at.min(now);
    let mut timestamps = Vec::new();
    let mut ts = start_at + DAY_SECS;
    while ts < effective_end {
        timestamps.push(ts);
        ts += DAY_SECS;
    }
    timestamps.push(effective_end);
    timestamps
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAR_FUTURE: i64 = 32_508_810_000;

    #[test]
    fn test_sub_day_experiments_get_a_single_bucket() {
        assert_eq!(day_boundaries(0, 3_600, FAR_FUTURE), vec![3_600]);
        assert_eq!(day_boundaries(0, 23 * 3_600, FAR_FUTURE), vec![82_800]);
        assert_eq!(day_boundaries(0, DAY_SECS, FAR_FUTURE), vec![86_400]);
    }

    #[test]
    fn test_multi_day_experiment() {
        assert_eq!(
            day_boundaries(0, 300_000, FAR_FUTURE),
            vec![86_400, 172_800, 259_200, 300_000]
        );
        // A stop landing exactly on a day boundary is not duplicated.
        assert_eq!(
            day_boundaries(0, 3 * DAY_SECS, FAR_FUTURE),
            vec![86_400, 172_800, 259_200]
        );
    }

    #[test]
    fn test_boundaries_follow_start_offset() {
        // 2021-03-04 09:00:00Z .. 2021-03-07 03:00:00Z
        assert_eq!(
            day_boundaries(1_614_848_400, 1_615_086_000, FAR_FUTURE),
            vec![1_614_934_800, 1_615_021_200, 1_615_086_000]
        );
    }

    #[test]
    fn test_running_experiment_clamps_to_now() {
        // now is 2021-03-06 03:00:00Z, before the experiment stops: the final
        // bucket is the partial-day snapshot at now.
        assert_eq!(
            day_boundaries(1_614_848_400, 1_615_086_000, 1_614_967_200),
            vec![1_614_934_800, 1_614_967_200]
        );
    }

    #[test]
    fn test_now_on_day_boundary_not_duplicated() {
        let now = 2 * DAY_SECS;
        assert_eq!(day_boundaries(0, 10 * DAY_SECS, now), vec![86_400, 172_800]);
    }
}
