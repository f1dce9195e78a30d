//! Drives the session state machine and the two pipelines it fires
//! (spec.md §4.7): post-confirmation (lesson + quiz, fail-soft) and
//! post-class (spaced-item extraction, conditional plan update).

mod quiz_derivation;
mod spaced_items;
mod state;

pub use spaced_items::extract_spaced_items;
pub use state::{transition, SessionEvent};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use learner_store::{Session, SessionCompletion, SessionStatus, Store};
use learning_types::{EngineConfig, Result, SessionId, StudentId};
use lesson_builder::LessonBuilder;
use plan_updater::{PlanUpdateContext, PlanUpdater};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Completed,
    Failed,
}

/// What `session.confirm` surfaces to its caller (spec.md §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PipelineReport {
    pub lesson_status: StepStatus,
    pub quiz_status: StepStatus,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PostClassReport {
    pub learning_points_extracted: usize,
    pub plan_update_triggered: bool,
}

pub struct SessionOrchestrator {
    store: Arc<dyn Store>,
    generator: Arc<dyn generator_client::GeneratorClient>,
    lesson_builder: Arc<LessonBuilder>,
    plan_updater: Arc<PlanUpdater>,
    step_timeout: Duration,
    teacher_notes_substantive_chars: usize,
}

impl SessionOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        generator: Arc<dyn generator_client::GeneratorClient>,
        lesson_builder: Arc<LessonBuilder>,
        plan_updater: Arc<PlanUpdater>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            generator,
            lesson_builder,
            plan_updater,
            step_timeout: config.generator_timeout_initial(),
            teacher_notes_substantive_chars: config.teacher_notes_substantive_chars,
        }
    }

    pub async fn create_request(
        &self,
        student_id: StudentId,
        teacher_id: learning_types::Id,
        scheduled_at: DateTime<Utc>,
        duration_min: u32,
    ) -> Result<Session> {
        let session = Session {
            id: 0,
            student_id,
            teacher_id,
            scheduled_at,
            duration_min,
            status: SessionStatus::Requested,
            completion: None,
            created_at: learning_types::now(),
        };
        let id = self.store.insert_session(session).await?;
        self.store.get_session(id).await
    }

    pub async fn cancel(&self, session_id: SessionId) -> Result<()> {
        let session = self.store.get_session(session_id).await?;
        let next = transition(session.status, SessionEvent::Cancel)?;
        self.store.update_session_status(session_id, next, None).await
    }

    /// Transitions `requested -> confirmed` and runs the post-confirmation
    /// pipeline. The transition always succeeds once the event is legal;
    /// pipeline step failures are reported in the returned `PipelineReport`
    /// without being propagated as an error (spec.md §7 "the orchestrator
    /// never fails a session transition because of a downstream generation
    /// error").
    ///
    /// Confirming an already-confirmed session is a no-op on the state
    /// machine (spec.md §8): it skips the transition and re-derives
    /// `PipelineReport` from what's actually in the store, so a session
    /// whose lesson or quiz build previously failed or timed out can be
    /// retried by calling `confirm` again, and one whose pipeline already
    /// completed never gets a duplicate lesson or quiz row.
    pub async fn confirm(&self, session_id: SessionId) -> Result<PipelineReport> {
        let session = self.store.get_session(session_id).await?;
        if session.status != SessionStatus::Confirmed {
            let next = transition(session.status, SessionEvent::Confirm)?;
            self.store.update_session_status(session_id, next, None).await?;
        }

        let lesson_status = if self.store.lesson_exists_for_session(session_id).await? {
            StepStatus::Completed
        } else {
            match self.run_with_timeout(self.build_lesson(session_id, &session)).await {
                Ok(Ok(())) => StepStatus::Completed,
                Ok(Err(err)) => {
                    warn!(session_id, error = %err, "lesson build failed");
                    StepStatus::Failed
                }
                Err(_) => {
                    warn!(session_id, "lesson build timed out");
                    StepStatus::Failed
                }
            }
        };

        let quiz_status = if lesson_status != StepStatus::Completed {
            StepStatus::Pending
        } else {
            match self.run_with_timeout(self.derive_and_store_quiz(session_id)).await {
                Ok(Ok(())) => StepStatus::Completed,
                Ok(Err(err)) => {
                    warn!(session_id, error = %err, "quiz derivation failed");
                    StepStatus::Failed
                }
                Err(_) => {
                    warn!(session_id, "quiz derivation timed out");
                    StepStatus::Failed
                }
            }
        };

        Ok(PipelineReport {
            lesson_status,
            quiz_status,
        })
    }

    async fn run_with_timeout<F, T>(&self, fut: F) -> std::result::Result<Result<T>, tokio::time::error::Elapsed>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.step_timeout, fut).await
    }

    async fn build_lesson(&self, session_id: SessionId, session: &Session) -> Result<()> {
        let student = self.store.get_student(session.student_id).await?;
        self.lesson_builder
            .build(session_id, session.student_id, student.current_level)
            .await?;
        Ok(())
    }

    async fn derive_and_store_quiz(&self, session_id: SessionId) -> Result<()> {
        let lesson = self
            .store
            .get_lesson_for_session(session_id)
            .await?
            .ok_or_else(|| learning_types::EngineError::NotFound(format!("lesson for session {session_id}")))?;
        if self.store.quiz_exists_for_lesson(lesson.id).await? {
            return Ok(());
        }
        let quiz = quiz_derivation::derive_quiz(&self.generator, &lesson).await?;
        self.store.insert_quiz(quiz).await?;
        Ok(())
    }

    /// Transitions `confirmed -> completed` and runs the post-class
    /// pipeline.
    pub async fn complete(
        &self,
        session_id: SessionId,
        teacher_notes: String,
        homework: String,
        summary: String,
    ) -> Result<PostClassReport> {
        let session = self.store.get_session(session_id).await?;
        let next = transition(session.status, SessionEvent::Complete)?;
        self.store
            .update_session_status(
                session_id,
                next,
                Some(SessionCompletion {
                    teacher_notes: teacher_notes.clone(),
                    homework,
                    summary,
                }),
            )
            .await?;

        let learning_points_extracted = match self.store.get_lesson_for_session(session_id).await? {
            Some(lesson) => {
                let tags = self.store.get_skill_tags_for_lesson(lesson.id).await?;
                let items = extract_spaced_items(session.student_id, &tags);
                let count = items.len();
                for item in items {
                    if let Err(err) = self.store.upsert_spaced_item(item).await {
                        warn!(session_id, error = %err, "failed to persist spaced item");
                    }
                }
                count
            }
            None => 0,
        };

        let plan_update_triggered = teacher_notes.trim().chars().count() >= self.teacher_notes_substantive_chars;
        if plan_update_triggered {
            if let Err(err) = self.trigger_plan_update_from_notes(session.student_id).await {
                warn!(session_id, error = %err, "teacher-notes-triggered plan update failed");
            } else {
                info!(session_id, "teacher-notes-triggered plan update applied");
            }
        }

        Ok(PostClassReport {
            learning_points_extracted,
            plan_update_triggered,
        })
    }

    async fn trigger_plan_update_from_notes(&self, student_id: StudentId) -> Result<()> {
        let Some(previous_plan) = self.store.get_latest_plan(student_id).await? else {
            return Ok(());
        };
        let Some(latest_dna) = self.store.get_latest_dna(student_id).await? else {
            return Ok(());
        };

        let (profile, recent_observations, cefr_history, l1_patterns, attempts) = tokio::try_join!(
            self.store.get_profile(student_id),
            self.store.list_recent_observations(student_id, 10),
            self.store.list_cefr_history(student_id, 5),
            self.store.list_active_l1_patterns(student_id),
            self.store.list_scored_attempts(student_id),
        )?;
        let Some(profile) = profile else {
            return Ok(());
        };

        let latest_attempt = attempts.iter().max_by_key(|a| a.submitted_at).cloned();
        let latest_attempt_items = match &latest_attempt {
            Some(attempt) => self.store.get_attempt_items(attempt.id).await?,
            None => vec![],
        };

        let ctx = PlanUpdateContext {
            student_id,
            previous_plan,
            latest_attempt,
            latest_attempt_items,
            recent_observations,
            latest_dna,
            profile,
            l1_patterns,
            cefr_history,
        };
        self.plan_updater.update(ctx).await?;
        Ok(())
    }
}
