//! Persistent entities (spec.md §3). Every JSON-shaped field is a typed
//! struct/enum, never an untyped map, per SPEC_FULL.md §3's representation
//! policy.

use chrono::{DateTime, Utc};
use learning_types::{
    AssessmentId, AttemptId, Cefr, DnaId, GlobalRecommendation, Id, LessonArtifactId, PlanId,
    ProfileId, QuizId, SessionId, SkillRecommendation, StudentId, TagType, Trajectory,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub native_language: String,
    pub current_level: Cefr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeakArea {
    pub skill_area: String,
    pub severity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    pub id: AssessmentId,
    pub student_id: StudentId,
    pub determined_level: Cefr,
    pub confidence: f64,
    pub weak_areas: Vec<WeakArea>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticGap {
    pub area: String,
    pub severity: f64,
    pub description: String,
    pub l1_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerProfile {
    pub id: ProfileId,
    pub student_id: StudentId,
    pub gaps: Vec<DiagnosticGap>,
    pub priority_list: Vec<String>,
    pub recommended_start_level: Cefr,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Maintenance,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Weakness {
    pub skill_area: String,
    pub accuracy_observed: f64,
    pub priority: Priority,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DifficultyAdjustment {
    pub current_level: Cefr,
    pub recommendation: GlobalRecommendation,
    pub rationale: String,
}

/// Versioned, append-only learning plan (spec.md §3 `LearningPlan`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPlan {
    pub id: PlanId,
    pub student_id: StudentId,
    pub version: u32,
    pub summary: String,
    pub goals_next_2_weeks: Vec<String>,
    pub top_weaknesses: Vec<Weakness>,
    pub difficulty_adjustment: DifficultyAdjustment,
    pub grammar_focus: Vec<String>,
    pub vocabulary_focus: Vec<String>,
    pub teacher_guidance: HashMap<String, String>,
    pub recommended_drills: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Read-model over the latest plan; not separately versioned (SPEC_FULL.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPath {
    pub student_id: StudentId,
    pub target_level: Cefr,
    pub current_level: Cefr,
    pub weekly_plan: Vec<String>,
    pub status: PathStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    OnTrack,
    Behind,
    Ahead,
    Stalled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Requested,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionCompletion {
    pub teacher_notes: String,
    pub homework: String,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub student_id: StudentId,
    pub teacher_id: Id,
    pub scheduled_at: DateTime<Utc>,
    pub duration_min: u32,
    pub status: SessionStatus,
    pub completion: Option<SessionCompletion>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonPhase {
    pub duration_min: u32,
    pub materials: Vec<String>,
    pub examples: Vec<String>,
    pub exercises: Vec<String>,
    pub success_criteria: Vec<String>,
}

/// Immutable 5-phase lesson JSON (spec.md §3 `LessonArtifact`, §6 Lesson schema).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonArtifact {
    pub id: LessonArtifactId,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub objective: String,
    pub difficulty: Cefr,
    pub prompt_version: String,
    pub topics: Vec<String>,
    pub polish_explanation: Option<String>,
    pub warm_up: LessonPhase,
    pub presentation: LessonPhase,
    pub controlled_practice: LessonPhase,
    pub free_practice: LessonPhase,
    pub wrap_up: LessonPhase,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSkillTag {
    pub lesson_id: LessonArtifactId,
    pub tag_type: TagType,
    pub tag_value: String,
    pub cefr_level: Cefr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    FillBlank,
    Translate,
    Reorder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    pub explanation: Option<String>,
    pub skill_tag: String,
}

/// Quiz JSON derived from a lesson artifact (spec.md §3 `NextQuiz`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextQuiz {
    pub id: QuizId,
    pub derived_from_lesson_artifact_id: LessonArtifactId,
    pub student_id: StudentId,
    pub title: String,
    pub questions: Vec<QuizQuestion>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: AttemptId,
    pub quiz_id: QuizId,
    pub student_id: StudentId,
    pub score: f64,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizAttemptItem {
    pub attempt_id: AttemptId,
    pub question_id: String,
    pub is_correct: bool,
    pub skill_tag: String,
    pub expected_answer: String,
    pub explanation: Option<String>,
    pub needs_ai_grading: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSkillObservation {
    pub id: Id,
    pub session_id: SessionId,
    pub student_id: StudentId,
    pub skill_tag: String,
    pub score: f64,
    pub cefr_level: Cefr,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnaTrigger {
    ScoredAttempt,
    TeacherNotes,
    Reassessment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningDna {
    pub id: DnaId,
    pub student_id: StudentId,
    pub version: u32,
    pub recent_avg: f64,
    pub lifetime_avg: f64,
    pub per_skill: HashMap<String, SkillRecommendation>,
    pub global_recommendation: GlobalRecommendation,
    pub trajectory: Trajectory,
    pub cold_start: bool,
    pub trigger_event: DnaTrigger,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternStatus {
    Exhibited,
    Overcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct L1InterferencePattern {
    pub student_id: StudentId,
    pub pattern_category: String,
    pub pattern_detail: String,
    pub status: PatternStatus,
    pub occurrence_count: u32,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub overcome_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CefrHistoryEntry {
    pub id: Id,
    pub student_id: StudentId,
    pub from_level: Cefr,
    pub to_level: Cefr,
    pub confidence: f64,
    pub source: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpacedItemKind {
    LearningPoint,
    VocabularyCard,
}

/// SM-2 spaced-repetition state (spec.md §3 `SpacedItem`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpacedItem {
    pub id: Id,
    pub student_id: StudentId,
    pub kind: SpacedItemKind,
    pub content: String,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SpacedItem {
    /// A freshly extracted item, not yet reviewed.
    pub fn new(id: Id, student_id: StudentId, kind: SpacedItemKind, content: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            student_id,
            kind,
            content,
            ease_factor: 2.5,
            interval_days: 0,
            repetitions: 0,
            next_review: now,
            created_at: now,
        }
    }

    /// SM-2 update given a 0-5 recall quality grade.
    pub fn apply_sm2(&mut self, quality: u8) {
        let quality = quality.min(5);
        if quality < 3 {
            self.repetitions = 0;
            self.interval_days = 1;
        } else {
            self.repetitions += 1;
            self.interval_days = match self.repetitions {
                1 => 1,
                2 => 6,
                _ => (self.interval_days as f64 * self.ease_factor).round() as u32,
            };
        }
        let q = quality as f64;
        self.ease_factor =
            (self.ease_factor + (0.1 - (5.0 - q) * (0.08 + (5.0 - q) * 0.02))).max(1.3);
        self.next_review = Utc::now() + chrono::Duration::days(self.interval_days as i64);
    }
}
