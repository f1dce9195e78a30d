//! Shared identifiers and small value types used across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Surrogate integer identifier, per spec.md §6 ("All IDs are surrogate integers").
pub type Id = i64;

pub type StudentId = Id;
pub type AssessmentId = Id;
pub type ProfileId = Id;
pub type PlanId = Id;
pub type SessionId = Id;
pub type LessonArtifactId = Id;
pub type QuizId = Id;
pub type AttemptId = Id;
pub type DnaId = Id;

/// CEFR proficiency band, including the intake `pending` state (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cefr {
    Pending,
    A1,
    A2,
    B1,
    B2,
    C1,
    C2,
}

impl Cefr {
    /// Ordered scale excluding `Pending`, lowest first. Used for promotion/demotion stepping.
    pub const SCALE: [Cefr; 6] = [
        Cefr::A1,
        Cefr::A2,
        Cefr::B1,
        Cefr::B2,
        Cefr::C1,
        Cefr::C2,
    ];

    pub fn next(self) -> Option<Cefr> {
        let idx = Self::SCALE.iter().position(|c| *c == self)?;
        Self::SCALE.get(idx + 1).copied()
    }

    pub fn previous(self) -> Option<Cefr> {
        let idx = Self::SCALE.iter().position(|c| *c == self)?;
        if idx == 0 {
            None
        } else {
            Self::SCALE.get(idx - 1).copied()
        }
    }
}

impl fmt::Display for Cefr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cefr::Pending => "pending",
            Cefr::A1 => "A1",
            Cefr::A2 => "A2",
            Cefr::B1 => "B1",
            Cefr::B2 => "B2",
            Cefr::C1 => "C1",
            Cefr::C2 => "C2",
        };
        write!(f, "{s}")
    }
}

/// A confidence value clamped to [0, 1]. Kept as a thin newtype so call sites
/// can't accidentally pass a raw percentage where a fraction is expected.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Confidence(f64);

impl Confidence {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Closed sum of skill-tag categories (spec.md §3 `LessonSkillTag.tag_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagType {
    Grammar,
    Vocabulary,
    Pronunciation,
    Conversation,
}

/// Recommendation a skill or the whole student can receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillRecommendation {
    Simplify,
    Maintain,
    Challenge,
    /// Cold-start marker: fewer than 2 attempts exist for this skill (spec.md §4.4).
    InsufficientData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalRecommendation {
    DecreaseDifficulty,
    Maintain,
    IncreaseDifficulty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trajectory {
    Improving,
    Stable,
    Declining,
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
