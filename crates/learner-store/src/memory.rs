//! In-memory reference implementation of [`Store`].
//!
//! Mirrors the write-discipline spec.md §5 requires of a real store: plan
//! versions are inserted under a write lock that checks-then-appends
//! (serializing concurrent writers the way a `UNIQUE(student_id, version)`
//! constraint plus advisory lock would on a relational backend), lesson
//! artifact + skill tags are inserted together so a partial write is never
//! observable, and DNA snapshot inserts are unconditional appends that never
//! block on other tables.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use learning_types::{
    AssessmentId, AttemptId, Cefr, EngineError, Id, LessonArtifactId, PlanId, ProfileId, QuizId,
    Result, SessionId, StudentId,
};
use tokio::sync::RwLock;

use crate::entities::*;
use crate::store::Store;

#[derive(Default)]
struct Tables {
    students: HashMap<StudentId, Student>,
    assessments: HashMap<StudentId, Vec<Assessment>>,
    profiles: HashMap<StudentId, LearnerProfile>,
    plans: HashMap<StudentId, Vec<LearningPlan>>,
    sessions: HashMap<SessionId, Session>,
    lessons: HashMap<LessonArtifactId, LessonArtifact>,
    lesson_by_session: HashMap<SessionId, LessonArtifactId>,
    skill_tags: HashMap<LessonArtifactId, Vec<LessonSkillTag>>,
    quizzes: HashMap<QuizId, NextQuiz>,
    quiz_by_lesson: HashMap<LessonArtifactId, QuizId>,
    attempts: HashMap<AttemptId, QuizAttempt>,
    attempt_by_quiz_student: HashMap<(QuizId, StudentId), AttemptId>,
    attempt_items: HashMap<AttemptId, Vec<QuizAttemptItem>>,
    observations: HashMap<StudentId, Vec<SessionSkillObservation>>,
    dna: HashMap<StudentId, Vec<LearningDna>>,
    l1_patterns: HashMap<(StudentId, String, String), L1InterferencePattern>,
    cefr_history: HashMap<StudentId, Vec<CefrHistoryEntry>>,
    spaced_items: HashMap<Id, SpacedItem>,
}

struct IdGen {
    assessment: AtomicI64,
    profile: AtomicI64,
    plan: AtomicI64,
    session: AtomicI64,
    lesson: AtomicI64,
    quiz: AtomicI64,
    attempt: AtomicI64,
    observation: AtomicI64,
    cefr: AtomicI64,
    spaced: AtomicI64,
}

impl Default for IdGen {
    fn default() -> Self {
        Self {
            assessment: AtomicI64::new(1),
            profile: AtomicI64::new(1),
            plan: AtomicI64::new(1),
            session: AtomicI64::new(1),
            lesson: AtomicI64::new(1),
            quiz: AtomicI64::new(1),
            attempt: AtomicI64::new(1),
            observation: AtomicI64::new(1),
            cefr: AtomicI64::new(1),
            spaced: AtomicI64::new(1),
        }
    }
}

/// In-memory store. Suitable for tests and the `engine-cli` demo; a
/// production deployment swaps this for a `sqlx`-backed implementation of
/// the same [`Store`] trait.
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    ids: IdGen,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            ids: IdGen::default(),
        }
    }

    /// Seed a student directly (bypasses the assessment flow); used by tests
    /// and the demo CLI to set up fixtures.
    pub async fn seed_student(&self, student: Student) {
        let mut t = self.tables.write().await;
        t.students.insert(student.id, student);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert_student(&self, student: Student) -> Result<StudentId> {
        let mut t = self.tables.write().await;
        let id = student.id;
        t.students.insert(id, student);
        Ok(id)
    }

    async fn get_student(&self, student_id: StudentId) -> Result<Student> {
        let t = self.tables.read().await;
        t.students
            .get(&student_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("student {student_id}")))
    }

    async fn set_student_level(&self, student_id: StudentId, level: Cefr) -> Result<()> {
        let mut t = self.tables.write().await;
        let student = t
            .students
            .get_mut(&student_id)
            .ok_or_else(|| EngineError::NotFound(format!("student {student_id}")))?;
        student.current_level = level;
        Ok(())
    }

    async fn insert_assessment(&self, assessment: Assessment) -> Result<AssessmentId> {
        let mut t = self.tables.write().await;
        let id = self.ids.assessment.fetch_add(1, Ordering::SeqCst);
        let mut assessment = assessment;
        assessment.id = id;
        t.assessments
            .entry(assessment.student_id)
            .or_default()
            .push(assessment);
        Ok(id)
    }

    async fn get_latest_assessment(&self, student_id: StudentId) -> Result<Option<Assessment>> {
        let t = self.tables.read().await;
        Ok(t.assessments
            .get(&student_id)
            .and_then(|v| v.last())
            .cloned())
    }

    async fn insert_profile(&self, profile: LearnerProfile) -> Result<ProfileId> {
        let mut t = self.tables.write().await;
        let id = self.ids.profile.fetch_add(1, Ordering::SeqCst);
        let mut profile = profile;
        profile.id = id;
        let student_id = profile.student_id;
        t.profiles.insert(student_id, profile);
        Ok(id)
    }

    async fn get_profile(&self, student_id: StudentId) -> Result<Option<LearnerProfile>> {
        let t = self.tables.read().await;
        Ok(t.profiles.get(&student_id).cloned())
    }

    async fn insert_next_plan_version(&self, plan: LearningPlan) -> Result<PlanId> {
        let mut t = self.tables.write().await;
        let existing = t.plans.entry(plan.student_id).or_default();
        let expected_version = existing.last().map(|p| p.version + 1).unwrap_or(1);
        if plan.version != expected_version {
            return Err(EngineError::StoreConflict(format!(
                "expected next plan version {expected_version}, got {}",
                plan.version
            )));
        }
        let id = self.ids.plan.fetch_add(1, Ordering::SeqCst);
        let mut plan = plan;
        plan.id = id;
        existing.push(plan);
        Ok(id)
    }

    async fn get_latest_plan(&self, student_id: StudentId) -> Result<Option<LearningPlan>> {
        let t = self.tables.read().await;
        Ok(t.plans.get(&student_id).and_then(|v| v.last()).cloned())
    }

    async fn list_plan_versions(&self, student_id: StudentId) -> Result<Vec<LearningPlan>> {
        let t = self.tables.read().await;
        Ok(t.plans.get(&student_id).cloned().unwrap_or_default())
    }

    async fn insert_session(&self, session: Session) -> Result<SessionId> {
        let mut t = self.tables.write().await;
        let id = self.ids.session.fetch_add(1, Ordering::SeqCst);
        let mut session = session;
        session.id = id;
        t.sessions.insert(id, session);
        Ok(id)
    }

    async fn get_session(&self, session_id: SessionId) -> Result<Session> {
        let t = self.tables.read().await;
        t.sessions
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))
    }

    async fn update_session_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
        completion: Option<SessionCompletion>,
    ) -> Result<()> {
        let mut t = self.tables.write().await;
        let session = t
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| EngineError::NotFound(format!("session {session_id}")))?;
        session.status = status;
        if completion.is_some() {
            session.completion = completion;
        }
        Ok(())
    }

    async fn lesson_exists_for_session(&self, session_id: SessionId) -> Result<bool> {
        let t = self.tables.read().await;
        Ok(t.lesson_by_session.contains_key(&session_id))
    }

    async fn insert_lesson_with_tags(
        &self,
        lesson: LessonArtifact,
        tags: Vec<LessonSkillTag>,
    ) -> Result<LessonArtifactId> {
        let mut t = self.tables.write().await;
        if t.lesson_by_session.contains_key(&lesson.session_id) {
            return Err(EngineError::StoreConflict(format!(
                "lesson already exists for session {}",
                lesson.session_id
            )));
        }
        let id = self.ids.lesson.fetch_add(1, Ordering::SeqCst);
        let mut lesson = lesson;
        lesson.id = id;
        let tags: Vec<LessonSkillTag> = tags
            .into_iter()
            .map(|mut tag| {
                tag.lesson_id = id;
                tag
            })
            .collect();
        t.lesson_by_session.insert(lesson.session_id, id);
        t.lessons.insert(id, lesson);
        t.skill_tags.insert(id, tags);
        Ok(id)
    }

    async fn get_lesson_for_session(&self, session_id: SessionId) -> Result<Option<LessonArtifact>> {
        let t = self.tables.read().await;
        Ok(t.lesson_by_session
            .get(&session_id)
            .and_then(|id| t.lessons.get(id))
            .cloned())
    }

    async fn get_lesson(&self, lesson_id: LessonArtifactId) -> Result<LessonArtifact> {
        let t = self.tables.read().await;
        t.lessons
            .get(&lesson_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("lesson {lesson_id}")))
    }

    async fn list_recent_lessons(
        &self,
        student_id: StudentId,
        limit: usize,
    ) -> Result<Vec<LessonArtifact>> {
        let t = self.tables.read().await;
        let mut lessons: Vec<LessonArtifact> = t
            .lessons
            .values()
            .filter(|l| l.student_id == student_id)
            .cloned()
            .collect();
        lessons.sort_by_key(|l| l.created_at);
        lessons.reverse();
        lessons.truncate(limit);
        Ok(lessons)
    }

    async fn get_skill_tags_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<Vec<LessonSkillTag>> {
        let t = self.tables.read().await;
        Ok(t.skill_tags.get(&lesson_id).cloned().unwrap_or_default())
    }

    async fn quiz_exists_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<bool> {
        let t = self.tables.read().await;
        Ok(t.quiz_by_lesson.contains_key(&lesson_id))
    }

    async fn insert_quiz(&self, quiz: NextQuiz) -> Result<QuizId> {
        let mut t = self.tables.write().await;
        if t.quiz_by_lesson
            .contains_key(&quiz.derived_from_lesson_artifact_id)
        {
            return Err(EngineError::StoreConflict(format!(
                "quiz already derived from lesson {}",
                quiz.derived_from_lesson_artifact_id
            )));
        }
        if !t.lessons.contains_key(&quiz.derived_from_lesson_artifact_id) {
            return Err(EngineError::ValidationError(format!(
                "no such lesson artifact {}",
                quiz.derived_from_lesson_artifact_id
            )));
        }
        let id = self.ids.quiz.fetch_add(1, Ordering::SeqCst);
        let mut quiz = quiz;
        quiz.id = id;
        t.quiz_by_lesson
            .insert(quiz.derived_from_lesson_artifact_id, id);
        t.quizzes.insert(id, quiz);
        Ok(id)
    }

    async fn get_quiz(&self, quiz_id: QuizId) -> Result<NextQuiz> {
        let t = self.tables.read().await;
        t.quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("quiz {quiz_id}")))
    }

    async fn get_quiz_for_lesson(&self, lesson_id: LessonArtifactId) -> Result<Option<NextQuiz>> {
        let t = self.tables.read().await;
        Ok(t.quiz_by_lesson
            .get(&lesson_id)
            .and_then(|quiz_id| t.quizzes.get(quiz_id))
            .cloned())
    }

    async fn insert_attempt_if_absent(
        &self,
        attempt: QuizAttempt,
        items: Vec<QuizAttemptItem>,
    ) -> Result<(AttemptId, bool)> {
        let mut t = self.tables.write().await;
        let key = (attempt.quiz_id, attempt.student_id);
        if let Some(existing_id) = t.attempt_by_quiz_student.get(&key) {
            return Ok((*existing_id, false));
        }
        let id = self.ids.attempt.fetch_add(1, Ordering::SeqCst);
        let mut attempt = attempt;
        attempt.id = id;
        let items: Vec<QuizAttemptItem> = items
            .into_iter()
            .map(|mut item| {
                item.attempt_id = id;
                item
            })
            .collect();
        t.attempt_by_quiz_student.insert(key, id);
        t.attempts.insert(id, attempt);
        t.attempt_items.insert(id, items);
        Ok((id, true))
    }

    async fn get_attempt_for_quiz(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Option<QuizAttempt>> {
        let t = self.tables.read().await;
        Ok(t.attempt_by_quiz_student
            .get(&(quiz_id, student_id))
            .and_then(|id| t.attempts.get(id))
            .cloned())
    }

    async fn get_attempt_items(&self, attempt_id: AttemptId) -> Result<Vec<QuizAttemptItem>> {
        let t = self.tables.read().await;
        Ok(t.attempt_items.get(&attempt_id).cloned().unwrap_or_default())
    }

    async fn list_scored_attempts(&self, student_id: StudentId) -> Result<Vec<QuizAttempt>> {
        let t = self.tables.read().await;
        let mut attempts: Vec<QuizAttempt> = t
            .attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .cloned()
            .collect();
        attempts.sort_by_key(|a| a.submitted_at);
        Ok(attempts)
    }

    async fn list_attempt_items_for_skill(
        &self,
        student_id: StudentId,
        skill_tag: &str,
    ) -> Result<Vec<QuizAttemptItem>> {
        let t = self.tables.read().await;
        let mut attempts: Vec<&QuizAttempt> = t
            .attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .collect();
        attempts.sort_by_key(|a| a.submitted_at);

        let mut items = Vec::new();
        for attempt in attempts {
            if let Some(attempt_items) = t.attempt_items.get(&attempt.id) {
                items.extend(
                    attempt_items
                        .iter()
                        .filter(|i| i.skill_tag == skill_tag)
                        .cloned(),
                );
            }
        }
        Ok(items)
    }

    async fn insert_observation(&self, observation: SessionSkillObservation) -> Result<()> {
        let mut t = self.tables.write().await;
        let id = self.ids.observation.fetch_add(1, Ordering::SeqCst);
        let mut observation = observation;
        observation.id = id;
        t.observations
            .entry(observation.student_id)
            .or_default()
            .push(observation);
        Ok(())
    }

    async fn list_recent_observations(
        &self,
        student_id: StudentId,
        limit: usize,
    ) -> Result<Vec<SessionSkillObservation>> {
        let t = self.tables.read().await;
        let mut obs = t.observations.get(&student_id).cloned().unwrap_or_default();
        obs.sort_by_key(|o| o.created_at);
        obs.reverse();
        obs.truncate(limit);
        Ok(obs)
    }

    async fn insert_dna_snapshot(&self, dna: LearningDna) -> Result<()> {
        let mut t = self.tables.write().await;
        let bucket = t.dna.entry(dna.student_id).or_default();
        let next_version = bucket.last().map(|d| d.version + 1).unwrap_or(1);
        let mut dna = dna;
        dna.version = next_version;
        bucket.push(dna);
        Ok(())
    }

    async fn get_latest_dna(&self, student_id: StudentId) -> Result<Option<LearningDna>> {
        let t = self.tables.read().await;
        Ok(t.dna.get(&student_id).and_then(|v| v.last()).cloned())
    }

    async fn list_dna_snapshots(&self, student_id: StudentId, limit: usize) -> Result<Vec<LearningDna>> {
        let t = self.tables.read().await;
        Ok(t.dna
            .get(&student_id)
            .map(|v| {
                let start = v.len().saturating_sub(limit);
                v[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn upsert_l1_pattern(&self, pattern: L1InterferencePattern) -> Result<()> {
        let mut t = self.tables.write().await;
        let key = (
            pattern.student_id,
            pattern.pattern_category.clone(),
            pattern.pattern_detail.clone(),
        );
        t.l1_patterns
            .entry(key)
            .and_modify(|existing| {
                existing.occurrence_count += 1;
                existing.last_seen = pattern.last_seen;
                existing.status = pattern.status;
                existing.overcome_at = pattern.overcome_at;
            })
            .or_insert(pattern);
        Ok(())
    }

    async fn list_active_l1_patterns(&self, student_id: StudentId) -> Result<Vec<L1InterferencePattern>> {
        let t = self.tables.read().await;
        Ok(t.l1_patterns
            .values()
            .filter(|p| p.student_id == student_id && p.status == PatternStatus::Exhibited)
            .cloned()
            .collect())
    }

    async fn append_cefr_history(&self, entry: CefrHistoryEntry) -> Result<()> {
        let mut t = self.tables.write().await;
        let id = self.ids.cefr.fetch_add(1, Ordering::SeqCst);
        let mut entry = entry;
        entry.id = id;
        t.cefr_history.entry(entry.student_id).or_default().push(entry);
        Ok(())
    }

    async fn list_cefr_history(&self, student_id: StudentId, limit: usize) -> Result<Vec<CefrHistoryEntry>> {
        let t = self.tables.read().await;
        let mut history = t.cefr_history.get(&student_id).cloned().unwrap_or_default();
        history.sort_by_key(|e| e.created_at);
        history.reverse();
        history.truncate(limit);
        Ok(history)
    }

    async fn attempts_since_last_level_change(&self, student_id: StudentId) -> Result<usize> {
        let t = self.tables.read().await;
        let last_change_at = t
            .cefr_history
            .get(&student_id)
            .and_then(|h| h.iter().map(|e| e.created_at).max());
        let count = t
            .attempts
            .values()
            .filter(|a| a.student_id == student_id)
            .filter(|a| last_change_at.map(|t0| a.submitted_at > t0).unwrap_or(true))
            .count();
        Ok(count)
    }

    async fn upsert_spaced_item(&self, item: SpacedItem) -> Result<()> {
        let mut t = self.tables.write().await;
        let id = if item.id == 0 {
            self.ids.spaced.fetch_add(1, Ordering::SeqCst)
        } else {
            item.id
        };
        let mut item = item;
        item.id = id;
        t.spaced_items.insert(id, item);
        Ok(())
    }

    async fn list_due_spaced_items(&self, student_id: StudentId, limit: usize) -> Result<Vec<SpacedItem>> {
        let t = self.tables.read().await;
        let now = learning_types::now();
        let mut items: Vec<SpacedItem> = t
            .spaced_items
            .values()
            .filter(|i| i.student_id == student_id && i.next_review <= now)
            .cloned()
            .collect();
        items.sort_by_key(|i| i.next_review);
        items.truncate(limit);
        Ok(items)
    }
}
