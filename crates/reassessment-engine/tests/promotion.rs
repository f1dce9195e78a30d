//! CEFR promotion and demotion scenarios driven through `ReassessmentEngine`,
//! checking the side effects `evaluate()` applies (student level, CEFR
//! history, and a fresh DNA snapshot) rather than just the returned outcome.

use std::collections::HashMap;
use std::sync::Arc;

use difficulty_engine::DifficultyEngine;
use learner_store::{
    DnaTrigger, InMemoryStore, LearningDna, LessonArtifact, LessonPhase, NextQuiz, QuestionType,
    QuizAttempt, QuizAttemptItem, QuizQuestion, Session, SessionStatus, Store, Student,
};
use learning_types::{now, Cefr, EngineConfig, GlobalRecommendation, Trajectory};
use reassessment_engine::{Direction, ReassessmentEngine};

fn phase() -> LessonPhase {
    LessonPhase {
        duration_min: 5,
        materials: vec![],
        examples: vec![],
        exercises: vec![],
        success_criteria: vec![],
    }
}

async fn seed_attempt(store: &Arc<InMemoryStore>, student_id: i64, n: i64, score: f64) {
    store
        .insert_session(Session {
            id: n,
            student_id,
            teacher_id: 1,
            scheduled_at: now(),
            duration_min: 30,
            status: SessionStatus::Confirmed,
            completion: None,
            created_at: now(),
        })
        .await
        .unwrap();
    store
        .insert_lesson_with_tags(
            LessonArtifact {
                id: n,
                session_id: n,
                student_id,
                objective: "o".into(),
                difficulty: Cefr::B1,
                prompt_version: "v1".into(),
                topics: vec![],
                polish_explanation: None,
                warm_up: phase(),
                presentation: phase(),
                controlled_practice: phase(),
                free_practice: phase(),
                wrap_up: phase(),
                created_at: now(),
            },
            vec![],
        )
        .await
        .unwrap();
    store
        .insert_quiz(NextQuiz {
            id: n,
            derived_from_lesson_artifact_id: n,
            student_id,
            title: "q".into(),
            questions: vec![QuizQuestion {
                id: "q1".into(),
                question_type: QuestionType::MultipleChoice,
                text: "t".into(),
                options: None,
                correct_answer: "x".into(),
                explanation: None,
                skill_tag: "word_order".into(),
            }],
            created_at: now(),
        })
        .await
        .unwrap();
    store
        .insert_attempt_if_absent(
            QuizAttempt {
                id: 0,
                quiz_id: n,
                student_id,
                score,
                submitted_at: now(),
            },
            vec![QuizAttemptItem {
                attempt_id: 0,
                question_id: "q1".into(),
                is_correct: score >= 0.5,
                skill_tag: "word_order".into(),
                expected_answer: "x".into(),
                explanation: None,
                needs_ai_grading: false,
            }],
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn promoting_persists_level_history_and_a_fresh_dna_snapshot() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_student(Student {
            id: 1,
            native_language: "es".into(),
            current_level: Cefr::A2,
        })
        .await
        .unwrap();

    let scores = [0.3, 0.3, 0.35, 0.4, 0.4, 0.8, 0.85, 0.85, 0.9, 0.9];
    for (i, s) in scores.iter().enumerate() {
        seed_attempt(&store, 1, i as i64 + 1, *s).await;
    }

    let config = EngineConfig::default();
    let difficulty_engine = Arc::new(DifficultyEngine::from_config(store.clone(), &config));
    let reassess = ReassessmentEngine::from_config(store.clone(), difficulty_engine, &config);

    let outcome = reassess.evaluate(1, Some(0.9)).await.unwrap().unwrap();
    assert_eq!(outcome.direction, Direction::Promote);
    assert_eq!(outcome.from_level, Cefr::A2);
    assert_eq!(outcome.to_level, Cefr::B1);

    let student = store.get_student(1).await.unwrap();
    assert_eq!(student.current_level, Cefr::B1);

    let history = store.list_cefr_history(1, 5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].from_level, Cefr::A2);
    assert_eq!(history[0].to_level, Cefr::B1);
    assert_eq!(history[0].source, "reassessment");

    let dna = store.get_latest_dna(1).await.unwrap().unwrap();
    assert_eq!(dna.trigger_event, DnaTrigger::Reassessment);

    // A second call with the level-change history now present resets the
    // attempts-since-change gate, so it must not promote again immediately.
    let second = reassess.evaluate(1, Some(0.9)).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn demoting_requires_two_consecutive_declining_dna_windows() {
    let store = Arc::new(InMemoryStore::new());
    store
        .insert_student(Student {
            id: 1,
            native_language: "es".into(),
            current_level: Cefr::B1,
        })
        .await
        .unwrap();

    // Earlier half averages ~68%, later half ~24% -- a clear decline that
    // also leaves the trailing 5-attempt average under B1's 35% floor.
    let scores = [0.7, 0.7, 0.65, 0.65, 0.7, 0.30, 0.28, 0.25, 0.20, 0.15];
    for (i, s) in scores.iter().enumerate() {
        seed_attempt(&store, 1, i as i64 + 1, *s).await;
    }

    let config = EngineConfig::default();
    let difficulty_engine = Arc::new(DifficultyEngine::from_config(store.clone(), &config));
    let reassess = ReassessmentEngine::from_config(store.clone(), difficulty_engine, &config);

    // Only one declining DNA snapshot on record: must not demote yet.
    store
        .insert_dna_snapshot(declining_snapshot(1))
        .await
        .unwrap();
    let outcome = reassess.evaluate(1, None).await.unwrap();
    assert!(outcome.is_none());

    // A second consecutive declining snapshot clears the gate.
    store
        .insert_dna_snapshot(declining_snapshot(1))
        .await
        .unwrap();
    let outcome = reassess.evaluate(1, None).await.unwrap().unwrap();
    assert_eq!(outcome.direction, Direction::Demote);
    assert_eq!(outcome.from_level, Cefr::B1);
    assert_eq!(outcome.to_level, Cefr::A2);

    let student = store.get_student(1).await.unwrap();
    assert_eq!(student.current_level, Cefr::A2);
}

fn declining_snapshot(student_id: i64) -> LearningDna {
    LearningDna {
        id: 0,
        student_id,
        version: 0,
        recent_avg: 24.0,
        lifetime_avg: 46.0,
        per_skill: HashMap::new(),
        global_recommendation: GlobalRecommendation::DecreaseDifficulty,
        trajectory: Trajectory::Declining,
        cold_start: false,
        trigger_event: DnaTrigger::ScoredAttempt,
        created_at: now(),
    }
}
