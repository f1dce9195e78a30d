//! Derives a `NextQuiz` from a freshly built lesson artifact (spec.md §4.7
//! post-confirmation pipeline step 3).

use std::sync::Arc;

use generator_client::{GenerationRequest, GeneratorClient, SchemaId, UseCase};
use learner_store::{LessonArtifact, NextQuiz, QuestionType, QuizQuestion};
use learning_types::{EngineError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestionGen {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
    pub skill_tag: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizGenOutput {
    pub title: String,
    pub questions: Vec<QuizQuestionGen>,
}

pub async fn derive_quiz(
    generator: &Arc<dyn GeneratorClient>,
    lesson: &LessonArtifact,
) -> Result<NextQuiz> {
    let system_prompt = "You write a short quiz covering the lesson's targeted skills, \
        using only canonical skill tags."
        .to_string();
    let user_prompt = format!(
        "Lesson objective: {}\nDifficulty: {}\nTopics: {}",
        lesson.objective,
        lesson.difficulty,
        lesson.topics.join(", ")
    );

    let request = GenerationRequest::new(UseCase::Quiz, SchemaId::Quiz, system_prompt, user_prompt);
    let raw = generator.generate(request).await?;
    let generated: QuizGenOutput =
        serde_json::from_value(raw).map_err(|e| EngineError::GenerationInvalid(e.to_string()))?;

    let questions: Vec<QuizQuestion> = generated
        .questions
        .into_iter()
        .map(|q| QuizQuestion {
            id: q.id,
            question_type: q.question_type,
            text: q.text,
            options: q.options,
            correct_answer: q.correct_answer,
            explanation: q.explanation,
            skill_tag: skill_taxonomy::normalize(&q.skill_tag),
        })
        .collect();

    Ok(NextQuiz {
        id: 0,
        derived_from_lesson_artifact_id: lesson.id,
        student_id: lesson.student_id,
        title: generated.title,
        questions,
        created_at: learning_types::now(),
    })
}
