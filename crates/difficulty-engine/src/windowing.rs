//! Pure windowed-statistics and trajectory arithmetic (spec.md §4.4).
//!
//! Kept free of I/O so the windowing rules can be property-tested directly
//! against synthetic score sequences.

use learning_types::Trajectory;

pub const DNA_WINDOW: usize = 8;
pub const TRAJECTORY_WINDOW: usize = 10;

/// A single chronologically-ordered score, expressed on a 0-100 scale.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPoint {
    pub score_0_100: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowedStats {
    pub recent_avg: f64,
    pub lifetime_avg: f64,
    pub n_recent: usize,
    pub n_lifetime: usize,
}

/// `points` must be ordered oldest-first. Averages are rounded to 2
/// decimals at this boundary (spec.md §8 testable property #6), once, so
/// rounding error never compounds across callers.
pub fn windowed_stats(points: &[ScoredPoint], window: usize) -> WindowedStats {
    let n_lifetime = points.len();
    let lifetime_avg = mean(points.iter().map(|p| p.score_0_100));

    let recent_slice = tail(points, window);
    let n_recent = recent_slice.len();
    let recent_avg = mean(recent_slice.iter().map(|p| p.score_0_100));

    WindowedStats {
        recent_avg: round2(recent_avg),
        lifetime_avg: round2(lifetime_avg),
        n_recent,
        n_lifetime,
    }
}

/// Split-half trajectory over the last `TRAJECTORY_WINDOW` points
/// (spec.md §4.4 rule 5). Falls back to `Stable` when either half would
/// have fewer than 2 points (insufficient signal for a trend verdict).
pub fn trajectory(points: &[ScoredPoint]) -> Trajectory {
    let recent = tail(points, TRAJECTORY_WINDOW);
    let half = recent.len() / 2;
    if half < 2 {
        return Trajectory::Stable;
    }
    let (earlier, later) = recent.split_at(half);
    let earlier_mean = mean(earlier.iter().map(|p| p.score_0_100));
    let later_mean = mean(later.iter().map(|p| p.score_0_100));
    let delta = later_mean - earlier_mean;
    if delta >= 10.0 {
        Trajectory::Improving
    } else if delta <= -10.0 {
        Trajectory::Declining
    } else {
        Trajectory::Stable
    }
}

fn tail<T>(slice: &[T], n: usize) -> &[T] {
    let start = slice.len().saturating_sub(n);
    &slice[start..]
}

fn mean(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let count = values.clone().count();
    if count == 0 {
        return 0.0;
    }
    values.sum::<f64>() / count as f64
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(scores: &[f64]) -> Vec<ScoredPoint> {
        scores.iter().map(|s| ScoredPoint { score_0_100: *s }).collect()
    }

    #[test]
    fn recent_avg_matches_arithmetic_mean_of_last_n() {
        let p = points(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);
        let stats = windowed_stats(&p, DNA_WINDOW);
        // last 8 of 9: 20..90 -> mean 55
        assert_eq!(stats.recent_avg, 55.0);
        assert_eq!(stats.n_recent, 8);
    }

    #[test]
    fn s4_promotion_scenario_trajectory_is_improving() {
        let p = points(&[20.0, 20.0, 33.0, 50.0, 60.0, 60.0, 60.0, 67.0, 80.0, 80.0]);
        assert_eq!(trajectory(&p), Trajectory::Improving);
        let stats = windowed_stats(&p, DNA_WINDOW);
        // recent-5 mean used by reassessment is computed separately; sanity check windowed stats here.
        assert!(stats.recent_avg > 60.0);
    }

    #[test]
    fn fewer_than_four_points_is_stable() {
        let p = points(&[10.0, 90.0]);
        assert_eq!(trajectory(&p), Trajectory::Stable);
    }
}
