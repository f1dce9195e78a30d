//! Threshold rules that turn a windowed average + trajectory into a
//! recommendation (spec.md §4.4 rules 3-4).

use learning_types::{GlobalRecommendation, SkillRecommendation, Trajectory};

/// The three-way verdict shared by the global and per-skill rules; only the
/// label set differs at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Decrease,
    Maintain,
    Increase,
}

/// recent_avg is on a 0-100 scale.
pub fn classify(recent_avg: f64, trajectory: Trajectory) -> Verdict {
    if recent_avg >= 70.0 {
        if trajectory == Trajectory::Improving {
            Verdict::Increase
        } else {
            Verdict::Maintain
        }
    } else if recent_avg >= 40.0 {
        if trajectory == Trajectory::Declining {
            Verdict::Decrease
        } else {
            Verdict::Maintain
        }
    } else {
        Verdict::Decrease
    }
}

pub fn as_global(verdict: Verdict) -> GlobalRecommendation {
    match verdict {
        Verdict::Decrease => GlobalRecommendation::DecreaseDifficulty,
        Verdict::Maintain => GlobalRecommendation::Maintain,
        Verdict::Increase => GlobalRecommendation::IncreaseDifficulty,
    }
}

pub fn as_skill(verdict: Verdict) -> SkillRecommendation {
    match verdict {
        Verdict::Decrease => SkillRecommendation::Simplify,
        Verdict::Maintain => SkillRecommendation::Maintain,
        Verdict::Increase => SkillRecommendation::Challenge,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_and_improving_increases() {
        assert_eq!(classify(75.0, Trajectory::Improving), Verdict::Increase);
    }

    #[test]
    fn high_and_stable_maintains() {
        assert_eq!(classify(70.0, Trajectory::Stable), Verdict::Maintain);
    }

    #[test]
    fn mid_and_declining_decreases() {
        assert_eq!(classify(50.0, Trajectory::Declining), Verdict::Decrease);
    }

    #[test]
    fn mid_and_stable_maintains() {
        assert_eq!(classify(40.0, Trajectory::Stable), Verdict::Maintain);
    }

    #[test]
    fn below_forty_always_decreases() {
        assert_eq!(classify(10.0, Trajectory::Improving), Verdict::Decrease);
    }
}
