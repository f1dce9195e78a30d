//! Local (non-generator) validation of a generated plan against the
//! continuity rules spec.md §4.5 asks the generator to follow (spec +
//! schema compliance gets the generator there most of the time; this is
//! the belt holding up the suspenders).

use learner_store::{LearningPlan, Priority};
use learning_types::GlobalRecommendation;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanValidationError {
    #[error("weakness '{0}' is below 60% accuracy but was dropped from high priority")]
    WeaknessDropped(String),
    #[error("introduced {0} new focus areas, at most 1 is allowed per update")]
    TooManyNewFocusAreas(usize),
    #[error("dropped {0} focus areas, at most {1} is allowed per update")]
    TooManyDropped(usize, usize),
    #[error("difficulty_adjustment.recommendation ({0:?}) disagrees with DNA global recommendation ({1:?})")]
    DifficultyMismatch(GlobalRecommendation, GlobalRecommendation),
}

/// All four continuity rules from spec.md §4.5, run against the candidate
/// plan before it is ever persisted.
pub fn validate(
    previous: &LearningPlan,
    candidate: &LearningPlan,
    dna_recommendation: GlobalRecommendation,
    drop_max_per_update: usize,
) -> Result<(), PlanValidationError> {
    let previous_areas: HashSet<&str> = previous
        .top_weaknesses
        .iter()
        .map(|w| w.skill_area.as_str())
        .collect();
    let candidate_areas: HashSet<&str> = candidate
        .top_weaknesses
        .iter()
        .map(|w| w.skill_area.as_str())
        .collect();

    for weakness in &previous.top_weaknesses {
        if weakness.accuracy_observed < 0.6 {
            let still_high = candidate
                .top_weaknesses
                .iter()
                .any(|w| w.skill_area == weakness.skill_area && w.priority == Priority::High);
            if !still_high {
                return Err(PlanValidationError::WeaknessDropped(
                    weakness.skill_area.clone(),
                ));
            }
        }
    }

    let new_areas = candidate_areas.difference(&previous_areas).count();
    if new_areas > 1 {
        return Err(PlanValidationError::TooManyNewFocusAreas(new_areas));
    }

    let dropped_areas = previous_areas.difference(&candidate_areas).count();
    if dropped_areas > drop_max_per_update {
        return Err(PlanValidationError::TooManyDropped(
            dropped_areas,
            drop_max_per_update,
        ));
    }

    if candidate.difficulty_adjustment.recommendation != dna_recommendation {
        return Err(PlanValidationError::DifficultyMismatch(
            candidate.difficulty_adjustment.recommendation,
            dna_recommendation,
        ));
    }

    Ok(())
}
