use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Arg, Command};
use engine_cli::Engine;
use generator_client::{GenerationRequest, GeneratorClient, UseCase};
use learner_store::{InMemoryStore, Store};
use learning_types::{now, Cefr, EngineConfig};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stands in for the external generator in the demo loop: routes on
/// `use_case` and returns fixed, internally-consistent JSON so the demo
/// can score its own canned answers against it. Not a test double -
/// `generator_client::mock::MockGeneratorClient` already covers that role
/// for unit and integration tests.
struct DemoGenerator;

#[async_trait]
impl GeneratorClient for DemoGenerator {
    async fn generate(&self, request: GenerationRequest) -> learning_types::Result<Value> {
        let response = match request.use_case {
            UseCase::Assessment => assessment_questions(),
            UseCase::Lesson => lesson_plan(),
            UseCase::Quiz => quiz_questions(),
            UseCase::Plan => plan_update(),
            UseCase::AssessmentGrading => json!({
                "is_correct": true,
                "partial_credit": 0.85,
                "feedback": "Close enough, minor word choice difference.",
            }),
            UseCase::Reassessment => json!({}),
        };
        Ok(response)
    }
}

fn assessment_questions() -> Value {
    json!({
        "questions": [
            {"id": "p1", "text": "Fill in: I ___ to school every day.", "options": [], "correct_answer": "go", "skill_tag": "present_simple"},
            {"id": "p2", "text": "Fill in: She ___ a doctor.", "options": [], "correct_answer": "is", "skill_tag": "verb_to_be"},
            {"id": "p3", "text": "Choose the article: ___ apple", "options": ["a", "an"], "correct_answer": "an", "skill_tag": "articles_indefinite"},
            {"id": "p4", "text": "Reorder: visits / my / Sunday / grandmother / on / she", "options": [], "correct_answer": "she visits my grandmother on sunday", "skill_tag": "word_order"},
            {"id": "p5", "text": "Translate: Good morning", "options": [], "correct_answer": "buenos dias", "skill_tag": "small_talk"},
            {"id": "p6", "text": "Fill in: They ___ been here since noon.", "options": [], "correct_answer": "have", "skill_tag": "present_perfect"},
            {"id": "p7", "text": "True or false: 'less' is used with countable nouns.", "options": [], "correct_answer": "false", "skill_tag": "quantifiers"},
            {"id": "p8", "text": "Fill in: If I ___ rich, I would travel.", "options": [], "correct_answer": "were", "skill_tag": "conditionals"},
        ]
    })
}

fn lesson_plan() -> Value {
    let phase = |label: &str| {
        json!({
            "duration_min": 10,
            "materials": [format!("{label} handout")],
            "examples": [format!("{label} example sentence")],
            "exercises": [format!("{label} drill")],
            "success_criteria": [format!("can complete the {label} drill unaided")],
        })
    };
    json!({
        "objective": "Practice present perfect for recent experiences",
        "prompt_version": "v1",
        "topics": ["present_perfect", "word_order"],
        "warm_up": phase("warm up"),
        "presentation": phase("presentation"),
        "controlled_practice": phase("controlled practice"),
        "free_practice": phase("free practice"),
        "wrap_up": phase("wrap up"),
        "skill_tags": [
            {"tag_type": "grammar", "tag_value": "present_perfect", "cefr_level": "b1"},
            {"tag_type": "grammar", "tag_value": "word_order", "cefr_level": "a2"},
        ],
    })
}

fn quiz_questions() -> Value {
    json!({
        "title": "Present perfect check-in",
        "questions": [
            {"id": "q1", "type": "fill_blank", "text": "I ___ already eaten.", "options": [], "correct_answer": "have", "explanation": null, "skill_tag": "present_perfect"},
            {"id": "q2", "type": "true_false", "text": "'Have you ever...' asks about a specific past moment.", "options": [], "correct_answer": "false", "explanation": null, "skill_tag": "present_perfect"},
            {"id": "q3", "type": "reorder", "text": "yet / finished / I / haven't / my / homework", "options": [], "correct_answer": "i haven't finished my homework yet", "explanation": null, "skill_tag": "word_order"},
        ]
    })
}

fn plan_update() -> Value {
    json!({
        "summary": "Keep building present perfect fluency while reinforcing word order.",
        "goals_next_2_weeks": ["Use present perfect in free conversation", "Self-correct word order errors"],
        "top_weaknesses": [
            {"skill_area": "word_order", "accuracy_observed": 0.6, "priority": "high"},
        ],
        "difficulty_adjustment": {
            "current_level": "b1",
            "recommendation": "maintain",
            "rationale": "Scores are stable within the target band.",
        },
        "grammar_focus": ["present_perfect"],
        "vocabulary_focus": ["daily_routines"],
        "teacher_guidance": {"focus": "Drill word order with short dictation exercises."},
        "recommended_drills": ["present_perfect_gapfill", "word_order_reorder"],
    })
}

fn answers_for(ids_and_values: &[(&str, &str)]) -> HashMap<String, String> {
    ids_and_values
        .iter()
        .map(|(id, value)| (id.to_string(), value.to_string()))
        .collect()
}

async fn run_demo(config: &EngineConfig) -> Result<()> {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
    let generator: Arc<dyn GeneratorClient> = Arc::new(DemoGenerator);
    let engine = Engine::new(store.clone(), generator, config);

    let student_id = store
        .insert_student(learner_store::Student {
            id: 0,
            native_language: "es".to_string(),
            current_level: Cefr::Pending,
        })
        .await
        .context("insert demo student")?;
    println!("Created student {student_id}");

    let start = engine.assessment_start(student_id).await.context("assessment.start")?;
    println!(
        "Assessment {} issued {} placement questions",
        start.assessment_id,
        start.placement_questions.len()
    );

    // Six of eight correct: a placement fraction of 0.75.
    let placement_answers = answers_for(&[
        ("p1", "go"),
        ("p2", "is"),
        ("p3", "an"),
        ("p4", "she visits my grandmother on sunday"),
        ("p5", "buenos dias"),
        ("p6", "have"),
        ("p7", "wrong"),
        ("p8", "wrong"),
    ]);
    let placement = engine
        .assessment_submit_placement(start.assessment_id, placement_answers)
        .await
        .context("assessment.submit_placement")?;
    println!(
        "Placement bracket {:?}, {} diagnostic questions issued",
        placement.bracket,
        placement.diagnostic_questions.len()
    );

    let diagnostic_answers = answers_for(&[
        ("p1", "go"),
        ("p2", "is"),
        ("p3", "an"),
        ("p4", "she visits my grandmother on sunday"),
        ("p5", "buenos dias"),
        ("p6", "have"),
        ("p7", "wrong"),
        ("p8", "wrong"),
    ]);
    let diagnostic = engine
        .assessment_submit_diagnostic(start.assessment_id, diagnostic_answers)
        .await
        .context("assessment.submit_diagnostic")?;
    println!(
        "Determined level {:?} (confidence {:.2}), {} weak area(s)",
        diagnostic.level,
        diagnostic.confidence,
        diagnostic.weak_areas.len()
    );

    let session = engine
        .session_request(student_id, 1, now(), 30)
        .await
        .context("session.request")?;
    println!("Session {} requested", session.id);

    let pipeline = engine.session_confirm(session.id).await.context("session.confirm")?;
    println!(
        "Session confirmed: lesson={:?}, quiz={:?}",
        pipeline.lesson_status, pipeline.quiz_status
    );

    let lesson = store
        .get_lesson_for_session(session.id)
        .await?
        .context("lesson should exist after confirm")?;
    let quiz = store
        .get_quiz_for_lesson(lesson.id)
        .await?
        .context("quiz should exist after confirm")?;

    let quiz_answers = answers_for(&[
        ("q1", "have"),
        ("q2", "false"),
        ("q3", "i haven't finished my homework yet"),
    ]);
    let score = engine
        .quiz_submit(quiz.id, student_id, quiz_answers)
        .await
        .context("quiz.submit")?;
    println!("Quiz scored {:.2}", score.overall_fraction);

    let notes = "Student handled present perfect well today but still mixes up word order \
        in longer sentences; keep drilling reordering exercises and revisit quantifiers next week.";
    let post_class = engine
        .session_complete(session.id, notes.to_string(), "Workbook page 12".to_string(), "Good progress".to_string())
        .await
        .context("session.complete")?;
    println!(
        "Session completed: {} spaced item(s) extracted, plan update triggered={}",
        post_class.learning_points_extracted, post_class.plan_update_triggered
    );

    // Give the dispatcher's per-student worker a moment to recompute the
    // Learning DNA and check reassessment eligibility for the submitted quiz.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    if let Some(dna) = store.get_latest_dna(student_id).await? {
        println!(
            "Learning DNA snapshot v{}: recent avg {:.1}%, trajectory {:?}",
            dna.version, dna.recent_avg, dna.trajectory
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("engine-cli")
        .about("Adaptive learning orchestrator - manual inspection CLI")
        .subcommand(Command::new("demo").about("Run one full intake + session + quiz loop against an in-memory store"))
        .subcommand(Command::new("config").about("Print the loaded engine configuration"))
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Optional TOML config file (overrides defaults; overridden by ENGINE_* env vars)")
                .global(true),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(|s| s.as_str());
    let config = EngineConfig::load(config_path).context("load engine configuration")?;

    match matches.subcommand() {
        Some(("config", _)) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Some(("demo", _)) | None => {
            info!("running demo loop");
            run_demo(&config).await?;
        }
        _ => unreachable!(),
    }

    Ok(())
}
