//! Context gathering for a lesson build (spec.md §4.6 items 1-9).

use std::sync::Arc;

use learner_store::{
    CefrHistoryEntry, L1InterferencePattern, LearnerProfile, LearningDna, LearningPlan,
    SessionSkillObservation, SpacedItem, Store,
};
use learning_types::{Result, StudentId};

#[derive(Debug, Clone)]
pub struct LessonContext {
    pub profile: Option<LearnerProfile>,
    pub latest_plan: Option<LearningPlan>,
    pub lesson_history_lines: Vec<String>,
    pub last_lesson_primary_topic: Option<String>,
    pub last_lesson_quiz_fraction: Option<f64>,
    pub recent_observations: Vec<SessionSkillObservation>,
    pub cefr_history: Vec<CefrHistoryEntry>,
    pub latest_dna: Option<LearningDna>,
    pub l1_patterns: Vec<L1InterferencePattern>,
    pub due_spaced_items: Vec<SpacedItem>,
}

/// Formats one line of the "last N lesson objectives with quiz score"
/// projection (spec.md §4.6 item 3). Kept pure so the formatting is
/// unit-testable without a store.
pub fn format_lesson_history_line(objective: &str, quiz_fraction: Option<f64>) -> String {
    match quiz_fraction {
        Some(fraction) => format!("{objective} \u{2192} Quiz: {:.0}%", fraction * 100.0),
        None => format!("{objective} \u{2192} not yet tested"),
    }
}

/// Gathers items 1-2 and 4-9 concurrently (each an independent store read),
/// then walks the last `lesson_lookback` lessons sequentially to build the
/// quiz-score history line (each lesson's quiz/attempt lookup depends on
/// the lesson's own id, so it cannot join the first batch).
pub async fn gather_context(
    store: &Arc<dyn Store>,
    student_id: StudentId,
    lesson_lookback: usize,
    observation_lookback: usize,
) -> Result<LessonContext> {
    let (profile, latest_plan, recent_observations, cefr_history, latest_dna, l1_patterns, due_spaced_items) =
        tokio::try_join!(
            store.get_profile(student_id),
            store.get_latest_plan(student_id),
            store.list_recent_observations(student_id, observation_lookback),
            store.list_cefr_history(student_id, 5),
            store.get_latest_dna(student_id),
            store.list_active_l1_patterns(student_id),
            store.list_due_spaced_items(student_id, 10),
        )?;

    let recent_lessons = store.list_recent_lessons(student_id, lesson_lookback).await?;

    let mut lesson_history_lines = Vec::with_capacity(recent_lessons.len());
    let mut last_lesson_primary_topic = None;
    let mut last_lesson_quiz_fraction = None;

    for (idx, lesson) in recent_lessons.iter().enumerate() {
        let quiz = store.get_quiz_for_lesson(lesson.id).await?;
        let quiz_fraction = match &quiz {
            Some(quiz) => {
                let attempt = store.get_attempt_for_quiz(quiz.id, student_id).await?;
                attempt.map(|a| a.score)
            }
            None => None,
        };
        if idx == 0 {
            last_lesson_primary_topic = lesson.topics.first().cloned();
            last_lesson_quiz_fraction = quiz_fraction;
        }
        lesson_history_lines.push(format_lesson_history_line(&lesson.objective, quiz_fraction));
    }

    Ok(LessonContext {
        profile,
        latest_plan,
        lesson_history_lines,
        last_lesson_primary_topic,
        last_lesson_quiz_fraction,
        recent_observations,
        cefr_history,
        latest_dna,
        l1_patterns,
        due_spaced_items,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_tested_objective() {
        assert_eq!(
            format_lesson_history_line("past tense", Some(0.8)),
            "past tense \u{2192} Quiz: 80%"
        );
    }

    #[test]
    fn formats_untested_objective() {
        assert_eq!(
            format_lesson_history_line("past tense", None),
            "past tense \u{2192} not yet tested"
        );
    }
}
