//! `Engine` facade: one async method per spec.md §6 external operation,
//! wiring every component crate together. There is no HTTP routing layer
//! here — that remains the external collaborator's job (spec.md §1) — this
//! is the in-process entry point the `engine-cli` binary (and, in a real
//! deployment, an HTTP adapter) calls into.

use std::collections::HashMap;
use std::sync::Arc;

use assessment_intake::{DiagnosticOutput, IntakeFlow, PlacementOutput, StartOutput};
use chrono::{DateTime, Utc};
use difficulty_engine::DifficultyEngine;
use dispatcher::{Dispatcher, LifecycleEvent};
use generator_client::GeneratorClient;
use learner_store::{QuizAttempt, QuizAttemptItem, Session, Store};
use learning_types::{AssessmentId, EngineConfig, Id, QuizId, Result, SessionId, StudentId};
use lesson_builder::LessonBuilder;
use plan_updater::PlanUpdater;
use quiz_scorer::{QuizScoreResult, QuizScorer, StudentAnswers};
use reassessment_engine::ReassessmentEngine;
use session_orchestrator::{PipelineReport, PostClassReport, SessionOrchestrator};

pub struct Engine {
    store: Arc<dyn Store>,
    intake: Arc<IntakeFlow>,
    orchestrator: Arc<SessionOrchestrator>,
    scorer: Arc<QuizScorer>,
    dispatcher: Arc<Dispatcher>,
}

impl Engine {
    pub fn new(store: Arc<dyn Store>, generator: Arc<dyn GeneratorClient>, config: &EngineConfig) -> Self {
        let intake = Arc::new(IntakeFlow::new(generator.clone(), store.clone()));

        let lesson_builder = Arc::new(LessonBuilder::new(
            generator.clone(),
            store.clone(),
            config.lesson_lookback,
            config.observation_lookback,
        ));
        let plan_updater = Arc::new(PlanUpdater::new(
            generator.clone(),
            store.clone(),
            config.plan_drop_max_per_update,
        ));
        let orchestrator = Arc::new(SessionOrchestrator::new(
            store.clone(),
            generator.clone(),
            lesson_builder,
            plan_updater,
            config,
        ));

        let scorer = Arc::new(QuizScorer::new(generator.clone()));

        let difficulty_engine = Arc::new(DifficultyEngine::from_config(store.clone(), config));
        let reassessment = Arc::new(ReassessmentEngine::from_config(
            store.clone(),
            difficulty_engine.clone(),
            config,
        ));
        let dispatcher = Arc::new(Dispatcher::new(
            orchestrator.clone(),
            difficulty_engine,
            reassessment,
            config.max_concurrent_pipelines,
        ));

        Self {
            store,
            intake,
            orchestrator,
            scorer,
            dispatcher,
        }
    }

    // -- assessment.* --

    pub async fn assessment_start(&self, student_id: StudentId) -> Result<StartOutput> {
        self.intake.start(student_id).await
    }

    pub async fn assessment_submit_placement(
        &self,
        assessment_id: AssessmentId,
        answers: HashMap<String, String>,
    ) -> Result<PlacementOutput> {
        self.intake.submit_placement(assessment_id, answers).await
    }

    pub async fn assessment_submit_diagnostic(
        &self,
        assessment_id: AssessmentId,
        answers: HashMap<String, String>,
    ) -> Result<DiagnosticOutput> {
        self.intake.submit_diagnostic(assessment_id, answers).await
    }

    // -- session.* --

    pub async fn session_request(
        &self,
        student_id: StudentId,
        teacher_id: Id,
        scheduled_at: DateTime<Utc>,
        duration_min: u32,
    ) -> Result<Session> {
        self.orchestrator
            .create_request(student_id, teacher_id, scheduled_at, duration_min)
            .await
    }

    /// Runs the post-confirmation pipeline synchronously, matching spec.md
    /// §6's `session.confirm(session_id) -> { lesson_status, quiz_status }`
    /// response contract: the caller needs this result before returning.
    pub async fn session_confirm(&self, session_id: SessionId) -> Result<PipelineReport> {
        self.orchestrator.confirm(session_id).await
    }

    pub async fn session_cancel(&self, session_id: SessionId) -> Result<()> {
        self.orchestrator.cancel(session_id).await
    }

    /// Runs synchronously (spaced-item extraction + conditional plan
    /// update), then enqueues a `CompleteSession` no-op marker isn't
    /// necessary here since `session_orchestrator::complete` already
    /// performs the post-class pipeline inline; kept symmetric with
    /// `session_confirm` for callers that prefer routing everything
    /// through the `Engine` facade.
    pub async fn session_complete(
        &self,
        session_id: SessionId,
        teacher_notes: String,
        homework: String,
        summary: String,
    ) -> Result<PostClassReport> {
        self.orchestrator
            .complete(session_id, teacher_notes, homework, summary)
            .await
    }

    // -- quiz.* --

    /// Scores the attempt, persists it idempotently, then enqueues a
    /// `QuizSubmitted` event so the dispatcher recomputes the Learning DNA
    /// and checks reassessment eligibility under the per-student ordering
    /// and cross-student concurrency bound (spec.md §4.9, §5).
    pub async fn quiz_submit(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
        answers: StudentAnswers,
    ) -> Result<QuizScoreResult> {
        let quiz = self.store.get_quiz(quiz_id).await?;
        let student = self.store.get_student(student_id).await?;

        let result = self.scorer.score(&quiz.questions, &answers, student.current_level).await?;

        let items: Vec<QuizAttemptItem> = result
            .items
            .iter()
            .map(|item| QuizAttemptItem {
                attempt_id: 0,
                question_id: item.question_id.clone(),
                is_correct: item.is_correct,
                skill_tag: item.skill_tag.clone(),
                expected_answer: item.expected_answer.clone(),
                explanation: item.explanation.clone(),
                needs_ai_grading: item.needs_ai_grading,
            })
            .collect();

        let attempt = QuizAttempt {
            id: 0,
            quiz_id,
            student_id,
            score: result.overall_fraction,
            submitted_at: learning_types::now(),
        };

        let (_, inserted) = self.store.insert_attempt_if_absent(attempt, items).await?;
        if inserted {
            self.dispatcher
                .dispatch(student_id, LifecycleEvent::QuizSubmitted)
                .await?;
        }

        Ok(result)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
