//! Produces the next versioned `LearningPlan` from the previous plan, the
//! latest scored attempt, recent observations, and the current Learning DNA
//! (spec.md §4.5).

mod validation;

pub use validation::{validate, PlanValidationError};

use std::collections::HashMap;
use std::sync::Arc;

use generator_client::{GenerationRequest, GeneratorClient, SchemaId, UseCase};
use learner_store::{
    CefrHistoryEntry, DifficultyAdjustment, L1InterferencePattern, LearnerProfile, LearningDna,
    LearningPlan, QuizAttempt, QuizAttemptItem, SessionSkillObservation, Store, Weakness,
};
use learning_types::{EngineError, Result, StudentId};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Everything the generator needs to propose a plan update, assembled by
/// the caller (typically the session orchestrator's post-confirmation or
/// post-class pipeline) from a single `Store` snapshot read.
pub struct PlanUpdateContext {
    pub student_id: StudentId,
    pub previous_plan: LearningPlan,
    pub latest_attempt: Option<QuizAttempt>,
    pub latest_attempt_items: Vec<QuizAttemptItem>,
    pub recent_observations: Vec<SessionSkillObservation>,
    pub latest_dna: LearningDna,
    pub profile: LearnerProfile,
    pub l1_patterns: Vec<L1InterferencePattern>,
    pub cefr_history: Vec<CefrHistoryEntry>,
}

/// The generator's raw proposal, deserialized against the Plan schema
/// before any local validation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanGenOutput {
    pub summary: String,
    pub goals_next_2_weeks: Vec<String>,
    pub top_weaknesses: Vec<Weakness>,
    pub difficulty_adjustment: DifficultyAdjustment,
    pub grammar_focus: Vec<String>,
    pub vocabulary_focus: Vec<String>,
    pub teacher_guidance: HashMap<String, String>,
    pub recommended_drills: Vec<String>,
}

pub struct PlanUpdater {
    generator: Arc<dyn GeneratorClient>,
    store: Arc<dyn Store>,
    drop_max_per_update: usize,
}

impl PlanUpdater {
    pub fn new(generator: Arc<dyn GeneratorClient>, store: Arc<dyn Store>, drop_max_per_update: usize) -> Self {
        Self {
            generator,
            store,
            drop_max_per_update,
        }
    }

    /// Runs the update. On a failed local validation the candidate is
    /// discarded, a `warn` is logged naming the failed rule, and the
    /// previous plan is returned unchanged without writing a new version
    /// (spec.md §4.5 "the update is aborted").
    pub async fn update(&self, ctx: PlanUpdateContext) -> Result<LearningPlan> {
        let request = self.build_request(&ctx);
        let raw = self.generator.generate(request).await?;
        let generated: PlanGenOutput = serde_json::from_value(raw)
            .map_err(|e| EngineError::GenerationInvalid(e.to_string()))?;

        let candidate = LearningPlan {
            id: ctx.previous_plan.id,
            student_id: ctx.student_id,
            version: ctx.previous_plan.version + 1,
            summary: generated.summary,
            goals_next_2_weeks: generated.goals_next_2_weeks,
            top_weaknesses: generated.top_weaknesses,
            difficulty_adjustment: generated.difficulty_adjustment,
            grammar_focus: generated.grammar_focus,
            vocabulary_focus: generated.vocabulary_focus,
            teacher_guidance: generated.teacher_guidance,
            recommended_drills: generated.recommended_drills,
            created_at: learning_types::now(),
        };

        if let Err(rule) = validate(
            &ctx.previous_plan,
            &candidate,
            ctx.latest_dna.global_recommendation,
            self.drop_max_per_update,
        ) {
            warn!(student_id = ctx.student_id, rule = %rule, "plan update aborted");
            return Ok(ctx.previous_plan);
        }

        self.store.insert_next_plan_version(candidate.clone()).await?;
        Ok(candidate)
    }

    fn build_request(&self, ctx: &PlanUpdateContext) -> GenerationRequest {
        let system_prompt = "You update a language-learner's plan from their previous plan, \
            latest quiz attempt, teacher observations, and learning DNA. Keep high-priority \
            weaknesses under 60% accuracy, introduce at most one new focus area, drop at most \
            one, and align the difficulty directive with the DNA's global recommendation."
            .to_string();

        let user_prompt = format!(
            "Previous plan (v{}): {}\nLatest attempt: {}\nRecent observations: {}\nLearning DNA: {}\nProfile gaps: {}\nL1 patterns: {}\nCEFR history entries: {}",
            ctx.previous_plan.version,
            serde_json::to_string(&ctx.previous_plan).unwrap_or_default(),
            ctx.latest_attempt
                .as_ref()
                .map(|a| serde_json::to_string(a).unwrap_or_default())
                .unwrap_or_else(|| "none".to_string()),
            ctx.recent_observations.len(),
            serde_json::to_string(&ctx.latest_dna).unwrap_or_default(),
            ctx.profile.gaps.len(),
            ctx.l1_patterns.len(),
            ctx.cefr_history.len(),
        );

        GenerationRequest::new(
            UseCase::Plan,
            SchemaId::Plan,
            system_prompt,
            user_prompt,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generator_client::mock::MockGeneratorClient;
    use learner_store::{InMemoryStore, Priority};
    use learning_types::{Cefr, GlobalRecommendation};

    fn base_plan(student_id: StudentId) -> LearningPlan {
        LearningPlan {
            id: 1,
            student_id,
            version: 1,
            summary: "s".into(),
            goals_next_2_weeks: vec![],
            top_weaknesses: vec![Weakness {
                skill_area: "word_order".into(),
                accuracy_observed: 0.4,
                priority: Priority::High,
            }],
            difficulty_adjustment: DifficultyAdjustment {
                current_level: Cefr::A2,
                recommendation: GlobalRecommendation::Maintain,
                rationale: "steady".into(),
            },
            grammar_focus: vec![],
            vocabulary_focus: vec![],
            teacher_guidance: HashMap::new(),
            recommended_drills: vec![],
            created_at: learning_types::now(),
        }
    }

    fn dna(student_id: StudentId, rec: GlobalRecommendation) -> LearningDna {
        LearningDna {
            id: 1,
            student_id,
            version: 1,
            recent_avg: 50.0,
            lifetime_avg: 50.0,
            per_skill: HashMap::new(),
            global_recommendation: rec,
            trajectory: learning_types::Trajectory::Stable,
            cold_start: false,
            trigger_event: learner_store::DnaTrigger::ScoredAttempt,
            created_at: learning_types::now(),
        }
    }

    fn profile(student_id: StudentId) -> LearnerProfile {
        LearnerProfile {
            id: 1,
            student_id,
            gaps: vec![],
            priority_list: vec![],
            recommended_start_level: Cefr::A2,
            created_at: learning_types::now(),
        }
    }

    #[tokio::test]
    async fn dropping_a_low_accuracy_weakness_aborts_the_update() {
        let student_id = 1;
        let previous = base_plan(student_id);
        let generated = PlanGenOutput {
            summary: "new".into(),
            goals_next_2_weeks: vec![],
            top_weaknesses: vec![],
            difficulty_adjustment: previous.difficulty_adjustment.clone(),
            grammar_focus: vec![],
            vocabulary_focus: vec![],
            teacher_guidance: HashMap::new(),
            recommended_drills: vec![],
        };
        let generator = Arc::new(MockGeneratorClient::always(
            serde_json::to_value(&generated).unwrap(),
        ));
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let updater = PlanUpdater::new(generator, store, 1);

        let ctx = PlanUpdateContext {
            student_id,
            previous_plan: previous.clone(),
            latest_attempt: None,
            latest_attempt_items: vec![],
            recent_observations: vec![],
            latest_dna: dna(student_id, GlobalRecommendation::Maintain),
            profile: profile(student_id),
            l1_patterns: vec![],
            cefr_history: vec![],
        };

        let result = updater.update(ctx).await.unwrap();
        assert_eq!(result.version, previous.version);
        assert_eq!(result.summary, previous.summary);
    }

    #[tokio::test]
    async fn difficulty_mismatch_aborts_the_update() {
        let student_id = 1;
        let previous = base_plan(student_id);
        let mut generated_weaknesses = previous.top_weaknesses.clone();
        generated_weaknesses[0].priority = Priority::High;
        let generated = PlanGenOutput {
            summary: "new".into(),
            goals_next_2_weeks: vec![],
            top_weaknesses: generated_weaknesses,
            difficulty_adjustment: DifficultyAdjustment {
                current_level: Cefr::A2,
                recommendation: GlobalRecommendation::IncreaseDifficulty,
                rationale: "r".into(),
            },
            grammar_focus: vec![],
            vocabulary_focus: vec![],
            teacher_guidance: HashMap::new(),
            recommended_drills: vec![],
        };
        let generator = Arc::new(MockGeneratorClient::always(
            serde_json::to_value(&generated).unwrap(),
        ));
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let updater = PlanUpdater::new(generator, store, 1);

        let ctx = PlanUpdateContext {
            student_id,
            previous_plan: previous.clone(),
            latest_attempt: None,
            latest_attempt_items: vec![],
            recent_observations: vec![],
            latest_dna: dna(student_id, GlobalRecommendation::Maintain),
            profile: profile(student_id),
            l1_patterns: vec![],
            cefr_history: vec![],
        };

        let result = updater.update(ctx).await.unwrap();
        assert_eq!(result.version, previous.version);
    }

    #[tokio::test]
    async fn valid_update_persists_next_version() {
        let student_id = 1;
        let previous = base_plan(student_id);
        let mut generated_weaknesses = previous.top_weaknesses.clone();
        generated_weaknesses[0].priority = Priority::High;
        let generated = PlanGenOutput {
            summary: "new".into(),
            goals_next_2_weeks: vec!["practice word order".into()],
            top_weaknesses: generated_weaknesses,
            difficulty_adjustment: DifficultyAdjustment {
                current_level: Cefr::A2,
                recommendation: GlobalRecommendation::Maintain,
                rationale: "steady".into(),
            },
            grammar_focus: vec![],
            vocabulary_focus: vec![],
            teacher_guidance: HashMap::new(),
            recommended_drills: vec![],
        };
        let generator = Arc::new(MockGeneratorClient::always(
            serde_json::to_value(&generated).unwrap(),
        ));
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let updater = PlanUpdater::new(generator, store.clone(), 1);

        let ctx = PlanUpdateContext {
            student_id,
            previous_plan: previous.clone(),
            latest_attempt: None,
            latest_attempt_items: vec![],
            recent_observations: vec![],
            latest_dna: dna(student_id, GlobalRecommendation::Maintain),
            profile: profile(student_id),
            l1_patterns: vec![],
            cefr_history: vec![],
        };

        let result = updater.update(ctx).await.unwrap();
        assert_eq!(result.version, previous.version + 1);
        let stored = store.get_latest_plan(student_id).await.unwrap().unwrap();
        assert_eq!(stored.version, result.version);
    }
}
