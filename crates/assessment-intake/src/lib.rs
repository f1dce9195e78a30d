//! Intake flow: placement → diagnostic → determined level (spec.md §6
//! `assessment.start` / `assessment.submit_placement` /
//! `assessment.submit_diagnostic`, §3 `Assessment` and `LearnerProfile`).
//!
//! Not one of spec.md §2's ten numbered components, but required to
//! implement the full external operation set; grounded on the same
//! gather-then-generate shape as `lesson_builder` and `plan_updater`. The
//! in-flight placement/diagnostic question set lives in this component's
//! own draft table rather than the `Store`, since spec.md §3 only commits
//! `Assessment` to the data model as the flow's *completed* outcome.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;
use std::sync::Arc;

use generator_client::{GenerationRequest, GeneratorClient, SchemaId, UseCase};
use learner_store::{Assessment, DiagnosticGap, LearnerProfile, Store, WeakArea};
use learning_types::{AssessmentId, Cefr, EngineError, Result, StudentId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub skill_tag: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ScoredQuestion {
    id: String,
    text: String,
    options: Vec<String>,
    correct_answer: String,
    skill_tag: String,
}

impl ScoredQuestion {
    fn view(&self) -> QuestionView {
        QuestionView {
            id: self.id.clone(),
            text: self.text.clone(),
            options: self.options.clone(),
            skill_tag: self.skill_tag.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuestionGenOutput {
    questions: Vec<ScoredQuestion>,
}

struct Draft {
    student_id: StudentId,
    placement: Vec<ScoredQuestion>,
    bracket: Option<Cefr>,
    diagnostic: Vec<ScoredQuestion>,
}

pub struct StartOutput {
    pub assessment_id: AssessmentId,
    pub placement_questions: Vec<QuestionView>,
}

pub struct PlacementOutput {
    pub bracket: Cefr,
    pub diagnostic_questions: Vec<QuestionView>,
}

pub struct DiagnosticOutput {
    pub level: Cefr,
    pub confidence: f64,
    pub weak_areas: Vec<WeakArea>,
}

/// Runs the placement → diagnostic intake flow and writes the resulting
/// `Assessment` + `LearnerProfile` once diagnostic answers are scored.
pub struct IntakeFlow {
    generator: Arc<dyn GeneratorClient>,
    store: Arc<dyn Store>,
    drafts: Mutex<HashMap<AssessmentId, Draft>>,
    next_id: AtomicI64,
}

fn score_questions(questions: &[ScoredQuestion], answers: &HashMap<String, String>) -> (f64, HashMap<String, f64>) {
    let mut per_tag: HashMap<String, (usize, usize)> = HashMap::new();
    let mut correct = 0usize;
    for q in questions {
        let given = answers.get(&q.id).map(|s| s.trim().to_lowercase());
        let expected = q.correct_answer.trim().to_lowercase();
        let is_correct = given.as_deref() == Some(expected.as_str());
        if is_correct {
            correct += 1;
        }
        let tag = skill_taxonomy::normalize(&q.skill_tag);
        let entry = per_tag.entry(tag).or_insert((0, 0));
        entry.1 += 1;
        if is_correct {
            entry.0 += 1;
        }
    }
    let overall = if questions.is_empty() {
        0.0
    } else {
        correct as f64 / questions.len() as f64
    };
    let per_tag_fraction = per_tag
        .into_iter()
        .map(|(tag, (c, n))| (tag, if n == 0 { 0.0 } else { c as f64 / n as f64 }))
        .collect();
    (overall, per_tag_fraction)
}

/// Maps a 0-1 placement fraction onto the six-level CEFR scale.
fn bracket_from_fraction(fraction: f64) -> Cefr {
    let idx = ((fraction * (Cefr::SCALE.len() - 1) as f64).round() as usize).min(Cefr::SCALE.len() - 1);
    Cefr::SCALE[idx]
}

impl IntakeFlow {
    pub fn new(generator: Arc<dyn GeneratorClient>, store: Arc<dyn Store>) -> Self {
        Self {
            generator,
            store,
            drafts: Mutex::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub async fn start(&self, student_id: StudentId) -> Result<StartOutput> {
        let request = GenerationRequest::new(
            UseCase::Assessment,
            SchemaId::Assessment,
            "You write a short placement quiz spanning A1 through C2 difficulty, \
                tagging each question with a canonical skill tag."
                .to_string(),
            format!("Generate 8 placement questions for student {student_id}."),
        );
        let raw = self.generator.generate(request).await?;
        let parsed: QuestionGenOutput = serde_json::from_value(raw)
            .map_err(|e| EngineError::GenerationInvalid(e.to_string()))?;

        let assessment_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let views = parsed.questions.iter().map(ScoredQuestion::view).collect();
        self.drafts.lock().unwrap().insert(
            assessment_id,
            Draft {
                student_id,
                placement: parsed.questions,
                bracket: None,
                diagnostic: Vec::new(),
            },
        );

        Ok(StartOutput {
            assessment_id,
            placement_questions: views,
        })
    }

    pub async fn submit_placement(
        &self,
        assessment_id: AssessmentId,
        answers: HashMap<String, String>,
    ) -> Result<PlacementOutput> {
        let placement_questions = {
            let drafts = self.drafts.lock().unwrap();
            let draft = drafts
                .get(&assessment_id)
                .ok_or_else(|| EngineError::NotFound(format!("assessment draft {assessment_id}")))?;
            draft.placement.clone()
        };

        let (fraction, _) = score_questions(&placement_questions, &answers);
        let bracket = bracket_from_fraction(fraction);

        let request = GenerationRequest::new(
            UseCase::Assessment,
            SchemaId::Assessment,
            format!(
                "You write a focused diagnostic quiz for a learner who placed around {bracket}, \
                tagging each question with a canonical skill tag."
            ),
            format!("Generate 8 diagnostic questions around CEFR level {bracket}."),
        );
        let raw = self.generator.generate(request).await?;
        let parsed: QuestionGenOutput = serde_json::from_value(raw)
            .map_err(|e| EngineError::GenerationInvalid(e.to_string()))?;
        let views = parsed.questions.iter().map(ScoredQuestion::view).collect();

        let mut drafts = self.drafts.lock().unwrap();
        let draft = drafts
            .get_mut(&assessment_id)
            .ok_or_else(|| EngineError::NotFound(format!("assessment draft {assessment_id}")))?;
        draft.bracket = Some(bracket);
        draft.diagnostic = parsed.questions;

        Ok(PlacementOutput {
            bracket,
            diagnostic_questions: views,
        })
    }

    pub async fn submit_diagnostic(
        &self,
        assessment_id: AssessmentId,
        answers: HashMap<String, String>,
    ) -> Result<DiagnosticOutput> {
        let (student_id, bracket, diagnostic_questions) = {
            let drafts = self.drafts.lock().unwrap();
            let draft = drafts
                .get(&assessment_id)
                .ok_or_else(|| EngineError::NotFound(format!("assessment draft {assessment_id}")))?;
            let bracket = draft
                .bracket
                .ok_or_else(|| EngineError::ValidationError("placement not yet submitted".to_string()))?;
            (draft.student_id, bracket, draft.diagnostic.clone())
        };

        let (fraction, per_tag_fraction) = score_questions(&diagnostic_questions, &answers);

        // Nudge the placement bracket by diagnostic performance, one level
        // at most in either direction.
        let level = if fraction >= 0.8 {
            bracket.next().unwrap_or(bracket)
        } else if fraction < 0.3 {
            bracket.previous().unwrap_or(bracket)
        } else {
            bracket
        };

        // Confidence rises with how decisively the diagnostic score lands
        // away from the 50% boundary.
        let confidence = (0.5 + (fraction - 0.5).abs()).min(1.0);

        let weak_areas: Vec<WeakArea> = per_tag_fraction
            .iter()
            .filter(|(_, acc)| **acc < 0.6)
            .map(|(tag, acc)| WeakArea {
                skill_area: tag.clone(),
                severity: 1.0 - acc,
            })
            .collect();

        let assessment = Assessment {
            id: 0,
            student_id,
            determined_level: level,
            confidence,
            weak_areas: weak_areas.clone(),
            completed_at: learning_types::now(),
        };
        self.store.insert_assessment(assessment).await?;
        self.store.set_student_level(student_id, level).await?;

        let gaps: Vec<DiagnosticGap> = weak_areas
            .iter()
            .map(|w| DiagnosticGap {
                area: w.skill_area.clone(),
                severity: w.severity,
                description: format!("diagnostic accuracy below 60% on {}", w.skill_area),
                l1_context: None,
            })
            .collect();
        let priority_list = weak_areas.iter().map(|w| w.skill_area.clone()).collect();
        self.store
            .insert_profile(LearnerProfile {
                id: 0,
                student_id,
                gaps,
                priority_list,
                recommended_start_level: level,
                created_at: learning_types::now(),
            })
            .await?;

        self.drafts.lock().unwrap().remove(&assessment_id);

        Ok(DiagnosticOutput {
            level,
            confidence,
            weak_areas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use generator_client::mock::MockGeneratorClient;
    use learner_store::{InMemoryStore, Student};

    fn placement_gen() -> serde_json::Value {
        serde_json::json!({
            "questions": (0..8).map(|i| serde_json::json!({
                "id": format!("p{i}"),
                "text": "question",
                "options": ["a", "b"],
                "correct_answer": "a",
                "skill_tag": "word_order",
            })).collect::<Vec<_>>(),
        })
    }

    fn diagnostic_gen(correct: &str) -> serde_json::Value {
        serde_json::json!({
            "questions": (0..5).map(|i| serde_json::json!({
                "id": format!("d{i}"),
                "text": "question",
                "options": ["a", "b"],
                "correct_answer": correct,
                "skill_tag": "articles_indefinite",
            })).collect::<Vec<_>>(),
        })
    }

    #[tokio::test]
    async fn full_intake_sets_student_level_and_profile() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        store
            .insert_student(Student {
                id: 1,
                native_language: "es".into(),
                current_level: Cefr::Pending,
            })
            .await
            .unwrap();

        let generator = Arc::new(MockGeneratorClient::new(vec![
            generator_client::mock::Canned::Value(placement_gen()),
            generator_client::mock::Canned::Value(diagnostic_gen("a")),
        ]));
        let flow = IntakeFlow::new(generator, store.clone());

        let start = flow.start(1).await.unwrap();
        assert_eq!(start.placement_questions.len(), 8);

        let mut placement_answers = HashMap::new();
        for q in &start.placement_questions {
            placement_answers.insert(q.id.clone(), "a".to_string());
        }
        let placement = flow
            .submit_placement(start.assessment_id, placement_answers)
            .await
            .unwrap();
        assert_eq!(placement.diagnostic_questions.len(), 5);

        let mut diagnostic_answers = HashMap::new();
        for q in &placement.diagnostic_questions {
            diagnostic_answers.insert(q.id.clone(), "a".to_string());
        }
        let diagnostic = flow
            .submit_diagnostic(start.assessment_id, diagnostic_answers)
            .await
            .unwrap();

        assert!(diagnostic.weak_areas.is_empty());
        let student = store.get_student(1).await.unwrap();
        assert_eq!(student.current_level, diagnostic.level);
        assert!(store.get_profile(1).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn poor_diagnostic_performance_yields_weak_areas_and_lower_level() {
        let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        store
            .insert_student(Student {
                id: 1,
                native_language: "es".into(),
                current_level: Cefr::Pending,
            })
            .await
            .unwrap();

        let generator = Arc::new(MockGeneratorClient::new(vec![
            generator_client::mock::Canned::Value(placement_gen()),
            generator_client::mock::Canned::Value(diagnostic_gen("a")),
        ]));
        let flow = IntakeFlow::new(generator, store.clone());

        let start = flow.start(1).await.unwrap();
        let mut placement_answers = HashMap::new();
        for q in &start.placement_questions {
            placement_answers.insert(q.id.clone(), "a".to_string());
        }
        let placement = flow
            .submit_placement(start.assessment_id, placement_answers)
            .await
            .unwrap();

        // Answer everything wrong.
        let mut diagnostic_answers = HashMap::new();
        for q in &placement.diagnostic_questions {
            diagnostic_answers.insert(q.id.clone(), "b".to_string());
        }
        let diagnostic = flow
            .submit_diagnostic(start.assessment_id, diagnostic_answers)
            .await
            .unwrap();

        assert!(!diagnostic.weak_areas.is_empty());
        assert!(diagnostic.level <= placement.bracket);
    }
}
