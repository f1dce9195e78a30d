//! Gathers full student context and invokes the generator to produce a
//! five-phase lesson artifact and its canonical skill tags (spec.md §4.6).

mod context;

pub use context::{format_lesson_history_line, gather_context, LessonContext};

use std::sync::Arc;

use generator_client::{GenerationRequest, GeneratorClient, SchemaId, UseCase};
use learner_store::{LessonArtifact, LessonPhase, LessonSkillTag, Store};
use learning_types::{Cefr, Result, SessionId, StudentId, TagType};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillTagGen {
    pub tag_type: TagType,
    pub tag_value: String,
    pub cefr_level: Cefr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonGenOutput {
    pub objective: String,
    pub prompt_version: String,
    pub topics: Vec<String>,
    #[serde(default)]
    pub polish_explanation: Option<String>,
    pub warm_up: LessonPhase,
    pub presentation: LessonPhase,
    pub controlled_practice: LessonPhase,
    pub free_practice: LessonPhase,
    pub wrap_up: LessonPhase,
    pub skill_tags: Vec<SkillTagGen>,
}

pub struct LessonBuilder {
    generator: Arc<dyn GeneratorClient>,
    store: Arc<dyn Store>,
    lesson_lookback: usize,
    observation_lookback: usize,
}

impl LessonBuilder {
    pub fn new(
        generator: Arc<dyn GeneratorClient>,
        store: Arc<dyn Store>,
        lesson_lookback: usize,
        observation_lookback: usize,
    ) -> Self {
        Self {
            generator,
            store,
            lesson_lookback,
            observation_lookback,
        }
    }

    /// Builds and persists a lesson artifact plus its skill tags for
    /// `session_id`. Callers (the session orchestrator) are responsible for
    /// the idempotency check against `lesson_exists_for_session` before
    /// invoking this.
    pub async fn build(
        &self,
        session_id: SessionId,
        student_id: StudentId,
        difficulty: Cefr,
    ) -> Result<(LessonArtifact, Vec<LessonSkillTag>)> {
        let ctx = gather_context(
            &self.store,
            student_id,
            self.lesson_lookback,
            self.observation_lookback,
        )
        .await?;

        let request = self.build_request(&ctx, difficulty);
        let raw = self.generator.generate(request).await?;
        let generated: LessonGenOutput = serde_json::from_value(raw)
            .map_err(|e| learning_types::EngineError::GenerationInvalid(e.to_string()))?;

        if let (Some(previous_topic), false) = (
            &ctx.last_lesson_primary_topic,
            ctx.last_lesson_quiz_fraction.unwrap_or(1.0) < 0.5,
        ) {
            if generated.topics.iter().any(|t| t == previous_topic) {
                warn!(
                    student_id,
                    previous_topic = %previous_topic,
                    "generated lesson repeats previous topic despite passing score"
                );
            }
        }

        let tags: Vec<(TagType, String, Cefr)> = generated
            .skill_tags
            .iter()
            .map(|t| (t.tag_type, skill_taxonomy::normalize(&t.tag_value), t.cefr_level))
            .collect();

        let lesson = LessonArtifact {
            id: 0,
            session_id,
            student_id,
            objective: generated.objective,
            difficulty,
            prompt_version: generated.prompt_version,
            topics: generated.topics,
            polish_explanation: generated.polish_explanation,
            warm_up: generated.warm_up,
            presentation: generated.presentation,
            controlled_practice: generated.controlled_practice,
            free_practice: generated.free_practice,
            wrap_up: generated.wrap_up,
            created_at: learning_types::now(),
        };

        let skill_tags: Vec<LessonSkillTag> = tags
            .into_iter()
            .map(|(tag_type, tag_value, cefr_level)| LessonSkillTag {
                lesson_id: 0,
                tag_type,
                tag_value,
                cefr_level,
            })
            .collect();

        let lesson_id = self
            .store
            .insert_lesson_with_tags(lesson.clone(), skill_tags.clone())
            .await?;

        let stored = self.store.get_lesson(lesson_id).await?;
        let stored_tags = self.store.get_skill_tags_for_lesson(lesson_id).await?;
        Ok((stored, stored_tags))
    }

    fn build_request(&self, ctx: &LessonContext, difficulty: Cefr) -> GenerationRequest {
        let system_prompt = "You build a five-phase language lesson (warm_up, presentation, \
            controlled_practice, free_practice, wrap_up) as JSON, tagging each targeted skill \
            with a canonical tag. Never repeat the previous lesson's primary topic unless the \
            learner scored below 50% on its quiz."
            .to_string();

        let user_prompt = format!(
            "Difficulty: {difficulty}\nProfile gaps: {}\nLatest plan: {}\nLesson history: {}\nRecent observations: {}\nCEFR history entries: {}\nLearning DNA: {}\nActive L1 patterns: {}\nDue spaced items: {}",
            ctx.profile.as_ref().map(|p| p.gaps.len()).unwrap_or(0),
            ctx.latest_plan
                .as_ref()
                .map(|p| serde_json::to_string(p).unwrap_or_default())
                .unwrap_or_else(|| "none".to_string()),
            ctx.lesson_history_lines.join("; "),
            ctx.recent_observations.len(),
            ctx.cefr_history.len(),
            ctx.latest_dna
                .as_ref()
                .map(|d| serde_json::to_string(d).unwrap_or_default())
                .unwrap_or_else(|| "none".to_string()),
            ctx.l1_patterns.len(),
            ctx.due_spaced_items.len(),
        );

        GenerationRequest::new(UseCase::Lesson, SchemaId::Lesson, system_prompt, user_prompt)
    }
}
