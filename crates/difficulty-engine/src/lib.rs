//! Learning DNA computation (spec.md §4.4): turns a student's scored quiz
//! history into a difficulty recommendation, per-skill breakdown, and
//! trajectory, then appends the resulting snapshot via [`Store`].

mod classify;
mod windowing;

pub use classify::{as_global, as_skill, classify, Verdict};
pub use windowing::{trajectory, windowed_stats, ScoredPoint, WindowedStats, DNA_WINDOW, TRAJECTORY_WINDOW};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use learner_store::{DnaTrigger, LearningDna, Store};
use learning_types::{EngineConfig, GlobalRecommendation, Result, SkillRecommendation, StudentId};

/// Minimum number of data points (lifetime for global, per-skill for
/// skill-level) below which a recommendation cannot be made responsibly
/// (spec.md §4.4 "cold start").
const MIN_POINTS: usize = 2;

pub struct DifficultyEngine {
    store: Arc<dyn Store>,
    dna_window: usize,
}

impl DifficultyEngine {
    /// `dna_window` is `EngineConfig::dna_window` (spec.md §6 `DNA_WINDOW`).
    pub fn new(store: Arc<dyn Store>, dna_window: usize) -> Self {
        Self { store, dna_window }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &EngineConfig) -> Self {
        Self::new(store, config.dna_window)
    }

    /// Recomputes and persists a new Learning DNA snapshot for `student_id`.
    /// The store assigns the version (always `latest + 1`); this call never
    /// races other writers into a version conflict because DNA inserts are
    /// unconditional appends (see `learner_store::memory`).
    pub async fn recompute(
        &self,
        student_id: StudentId,
        trigger: DnaTrigger,
    ) -> Result<LearningDna> {
        let attempts = self.store.list_scored_attempts(student_id).await?;
        let mut ordered = attempts;
        ordered.sort_by_key(|a| a.submitted_at);

        let global_points: Vec<ScoredPoint> = ordered
            .iter()
            .map(|a| ScoredPoint {
                score_0_100: a.score * 100.0,
            })
            .collect();

        let stats = windowed_stats(&global_points, self.dna_window);
        let cold_start = stats.n_recent < MIN_POINTS;
        let trend = trajectory(&global_points);
        let global_recommendation = if cold_start {
            GlobalRecommendation::DecreaseDifficulty
        } else {
            as_global(classify(stats.recent_avg, trend))
        };

        let per_skill = self.per_skill_recommendations(student_id, &ordered).await?;

        let dna = LearningDna {
            id: 0,
            student_id,
            version: 0,
            recent_avg: stats.recent_avg,
            lifetime_avg: stats.lifetime_avg,
            per_skill,
            global_recommendation,
            trajectory: trend,
            cold_start,
            trigger_event: trigger,
            created_at: learning_types::now(),
        };

        self.store.insert_dna_snapshot(dna.clone()).await?;
        self.store.get_latest_dna(student_id).await?.ok_or_else(|| {
            learning_types::EngineError::NotFound(format!(
                "no DNA snapshot recorded for student {student_id}"
            ))
        })
    }

    async fn per_skill_recommendations(
        &self,
        student_id: StudentId,
        ordered_attempts: &[learner_store::QuizAttempt],
    ) -> Result<HashMap<String, SkillRecommendation>> {
        let mut tags: HashSet<String> = HashSet::new();
        for attempt in ordered_attempts {
            for item in self.store.get_attempt_items(attempt.id).await? {
                tags.insert(item.skill_tag);
            }
        }

        let mut per_skill = HashMap::new();
        for tag in tags {
            let items = self
                .store
                .list_attempt_items_for_skill(student_id, &tag)
                .await?;
            let points: Vec<ScoredPoint> = items
                .iter()
                .map(|item| ScoredPoint {
                    score_0_100: if item.is_correct { 100.0 } else { 0.0 },
                })
                .collect();

            let recommendation = if points.len() < MIN_POINTS {
                SkillRecommendation::InsufficientData
            } else {
                let stats = windowed_stats(&points, self.dna_window);
                let trend = trajectory(&points);
                as_skill(classify(stats.recent_avg, trend))
            };
            per_skill.insert(tag, recommendation);
        }
        Ok(per_skill)
    }
}
