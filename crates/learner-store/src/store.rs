//! The `Store` trait: the engine's sole shared mutable resource (spec.md §5).
//!
//! All methods are async so a real `sqlx`-backed implementation can suspend
//! on I/O, matching `brain-cognitive::agents::traits::BrainAgent`'s pattern
//! of async-trait-based collaborator interfaces.

use async_trait::async_trait;
use learning_types::{
    AssessmentId, AttemptId, LessonArtifactId, PlanId, ProfileId, QuizId, Result, SessionId,
    StudentId,
};

use crate::entities::*;

#[async_trait]
pub trait Store: Send + Sync {
    // -- students --
    async fn insert_student(&self, student: Student) -> Result<StudentId>;
    async fn get_student(&self, student_id: StudentId) -> Result<Student>;
    async fn set_student_level(&self, student_id: StudentId, level: learning_types::Cefr) -> Result<()>;

    // -- assessment / profile --
    async fn insert_assessment(&self, assessment: Assessment) -> Result<AssessmentId>;
    async fn get_latest_assessment(&self, student_id: StudentId) -> Result<Option<Assessment>>;
    async fn insert_profile(&self, profile: LearnerProfile) -> Result<ProfileId>;
    async fn get_profile(&self, student_id: StudentId) -> Result<Option<LearnerProfile>>;

    // -- plans (append-only, versioned) --
    /// Insert the next plan version. The store enforces
    /// `plan.version == previous_version + 1` (or `1` if there is none),
    /// returning `EngineError::StoreConflict` if another writer raced ahead.
    async fn insert_next_plan_version(&self, plan: LearningPlan) -> Result<PlanId>;
    async fn get_latest_plan(&self, student_id: StudentId) -> Result<Option<LearningPlan>>;
    async fn list_plan_versions(&self, student_id: StudentId) -> Result<Vec<LearningPlan>>;

    // -- sessions --
    async fn insert_session(&self, session: Session) -> Result<SessionId>;
    async fn get_session(&self, session_id: SessionId) -> Result<Session>;
    async fn update_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        completion: Option<SessionCompletion>,
    ) -> Result<()>;

    // -- lesson artifact + tags (written atomically) --
    async fn lesson_exists_for_session(&self, session_id: SessionId) -> Result<bool>;
    async fn insert_lesson_with_tags(
        &self,
        lesson: LessonArtifact,
        tags: Vec<LessonSkillTag>,
    ) -> Result<LessonArtifactId>;
    async fn get_lesson_for_session(&self, session_id: SessionId) -> Result<Option<LessonArtifact>>;
    async fn get_lesson(&self, lesson_id: LessonArtifactId) -> Result<LessonArtifact>;
    async fn list_recent_lessons(
        &self,
        student_id: StudentId,
        limit: usize,
    ) -> Result<Vec<LessonArtifact>>;
    async fn get_skill_tags_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<Vec<LessonSkillTag>>;

    // -- quizzes / attempts --
    async fn quiz_exists_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<bool>;
    async fn insert_quiz(&self, quiz: NextQuiz) -> Result<QuizId>;
    async fn get_quiz(&self, quiz_id: QuizId) -> Result<NextQuiz>;
    async fn get_quiz_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<Option<NextQuiz>>;
    /// Idempotent: returns the existing attempt if one already exists for
    /// `(quiz_id, student_id)` instead of inserting a second row.
    async fn insert_attempt_if_absent(
        &self,
        attempt: QuizAttempt,
        items: Vec<QuizAttemptItem>,
    ) -> Result<(AttemptId, bool)>;
    async fn get_attempt_for_quiz(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Option<QuizAttempt>>;
    async fn get_attempt_items(&self, attempt_id: AttemptId) -> Result<Vec<QuizAttemptItem>>;
    async fn list_scored_attempts(&self, student_id: StudentId) -> Result<Vec<QuizAttempt>>;
    async fn list_attempt_items_for_skill(
        &self,
        student_id: StudentId,
        skill_tag: &str,
    ) -> Result<Vec<QuizAttemptItem>>;

    // -- teacher observations --
    async fn insert_observation(&self, observation: SessionSkillObservation) -> Result<()>;
    async fn list_recent_observations(
        &self,
        student_id: StudentId,
        limit: usize,
    ) -> Result<Vec<SessionSkillObservation>>;

    // -- learning DNA (append-only) --
    async fn insert_dna_snapshot(&self, dna: LearningDna) -> Result<()>;
    async fn get_latest_dna(&self, student_id: StudentId) -> Result<Option<LearningDna>>;
    async fn list_dna_snapshots(&self, student_id: StudentId, limit: usize) -> Result<Vec<LearningDna>>;

    // -- L1 interference --
    async fn upsert_l1_pattern(&self, pattern: L1InterferencePattern) -> Result<()>;
    async fn list_active_l1_patterns(&self, student_id: StudentId) -> Result<Vec<L1InterferencePattern>>;

    // -- CEFR history --
    async fn append_cefr_history(&self, entry: CefrHistoryEntry) -> Result<()>;
    async fn list_cefr_history(&self, student_id: StudentId, limit: usize) -> Result<Vec<CefrHistoryEntry>>;
    async fn attempts_since_last_level_change(&self, student_id: StudentId) -> Result<usize>;

    // -- spaced repetition --
    async fn upsert_spaced_item(&self, item: SpacedItem) -> Result<()>;
    async fn list_due_spaced_items(&self, student_id: StudentId, limit: usize) -> Result<Vec<SpacedItem>>;
}
