//! Mock session example: drive the exam engine from code.
//!
//! Builds a small question set in memory, sits it against the in-memory
//! backends (the result store fails once to show the retry path), and
//! prints the scored attempt.
//!
//! ```bash
//! cargo run -p examkit-cli --example mock_session
//! ```

use std::sync::Arc;
use std::time::Duration;

use examkit_core::engine::{EngineConfig, ExamEngine, NoopObserver};
use examkit_core::model::{
    AnswerOption, Question, QuestionSet, SessionConfig, TestSelection, TestType,
};
use examkit_providers::mock::{MockContentProvider, MockResultStore};

fn question(id: &str, topic: &str, prompt: &str, answer: &str) -> Question {
    Question {
        id: id.to_string(),
        position: 0,
        prompt: prompt.to_string(),
        options: vec![
            AnswerOption::new("A", "first"),
            AnswerOption::new("B", "second"),
            AnswerOption::new("C", "third"),
        ],
        answer: answer.to_string(),
        explanation: String::new(),
        topic: topic.to_string(),
        points: 1,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let questions = QuestionSet::new(
        "practice",
        vec![
            question("p-1", "warm-up", "Pick the first option", "A"),
            question("p-2", "warm-up", "Pick the second option", "B"),
            question("p-3", "finale", "Pick the third option", "C"),
        ],
    )?;

    let store = Arc::new(MockResultStore::failing(1));
    let engine = ExamEngine::new(
        Arc::new(MockContentProvider::new(questions)),
        store.clone(),
        EngineConfig {
            retry_delay: Duration::from_millis(50),
            ..EngineConfig::default()
        },
    );

    let selection = TestSelection::new(
        "practice",
        SessionConfig {
            question_count: 3,
            duration_secs: 120,
            test_type: TestType::Quick,
        },
    );
    let handle = engine.start(selection, Arc::new(NoopObserver)).await?;

    handle
        .with_session(|s| {
            s.select_answer(1, "A")?;
            s.next()?;
            s.select_answer(2, "C")?;
            s.toggle_flag(2)?;
            s.go_to(3)
        })
        .await?;

    let summary = handle.with_session(|s| s.request_submit()).await?;
    println!(
        "{} answered, {} unanswered, {} flagged",
        summary.answered, summary.unanswered, summary.flagged
    );

    let record = handle.submit().await?;
    let result = &record.result;
    println!(
        "Score: {}/{} ({}%) after {} store call(s)",
        result.correct_count,
        result.total_questions,
        result.percentage,
        store.call_count()
    );
    for topic in &result.per_topic {
        println!("  {:<10} {}/{}", topic.topic, topic.correct, topic.total);
    }

    Ok(())
}
