//! Core data model types for examkit.
//!
//! Questions, question sets, and the configuration a session is created with.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QuestionSetError;

/// One labeled choice of a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerOption {
    /// Short label the student selects (e.g. "A").
    pub label: String,
    /// Option text.
    pub text: String,
}

impl AnswerOption {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// A single exam question.
///
/// `answer` and `explanation` are never shown during a session; use
/// [`Question::view`] for anything the navigator renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Stable identifier.
    pub id: String,
    /// 1-based position within the session. Assigned by [`QuestionSet::new`].
    #[serde(default)]
    pub position: usize,
    /// Question text.
    pub prompt: String,
    /// Ordered options.
    pub options: Vec<AnswerOption>,
    /// Label of the correct option.
    pub answer: String,
    /// Explanation shown during review.
    #[serde(default)]
    pub explanation: String,
    /// Topic tag used for the per-topic breakdown.
    #[serde(default)]
    pub topic: String,
    /// Point value.
    #[serde(default = "default_points")]
    pub points: u32,
}

fn default_points() -> u32 {
    1
}

impl Question {
    /// Returns `true` if `label` is one of this question's options.
    pub fn has_option(&self, label: &str) -> bool {
        self.options.iter().any(|o| o.label == label)
    }

    /// Returns the option with the given label.
    pub fn option(&self, label: &str) -> Option<&AnswerOption> {
        self.options.iter().find(|o| o.label == label)
    }

    /// The student-facing view of this question.
    pub fn view(&self) -> QuestionView<'_> {
        QuestionView {
            id: &self.id,
            position: self.position,
            prompt: &self.prompt,
            options: &self.options,
            topic: &self.topic,
        }
    }

    fn check(&self) -> Result<(), QuestionSetError> {
        if self.options.is_empty() {
            return Err(QuestionSetError::NoOptions {
                question_id: self.id.clone(),
            });
        }
        let mut labels = HashSet::new();
        for option in &self.options {
            if !labels.insert(option.label.as_str()) {
                return Err(QuestionSetError::DuplicateOption {
                    question_id: self.id.clone(),
                    label: option.label.clone(),
                });
            }
        }
        if !labels.contains(self.answer.as_str()) {
            return Err(QuestionSetError::UnknownAnswer {
                question_id: self.id.clone(),
                label: self.answer.clone(),
            });
        }
        Ok(())
    }
}

/// Student-facing projection of a [`Question`], without the answer key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuestionView<'a> {
    pub id: &'a str,
    pub position: usize,
    pub prompt: &'a str,
    pub options: &'a [AnswerOption],
    pub topic: &'a str,
}

/// Immutable, ordered questions for one session.
///
/// Construction checks every invariant: at least one question, unique
/// question ids, unique option labels, and an answer that is one of the
/// options. Positions are reassigned to `1..=N` in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionSetData")]
pub struct QuestionSet {
    subject: String,
    questions: Vec<Question>,
}

#[derive(Deserialize)]
struct QuestionSetData {
    subject: String,
    questions: Vec<Question>,
}

impl TryFrom<QuestionSetData> for QuestionSet {
    type Error = QuestionSetError;

    fn try_from(data: QuestionSetData) -> Result<Self, Self::Error> {
        QuestionSet::new(data.subject, data.questions)
    }
}

impl QuestionSet {
    pub fn new(
        subject: impl Into<String>,
        mut questions: Vec<Question>,
    ) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }
        let subject = subject.into();
        let mut ids = HashSet::new();
        for (idx, question) in questions.iter_mut().enumerate() {
            if !ids.insert(question.id.clone()) {
                return Err(QuestionSetError::DuplicateQuestionId(question.id.clone()));
            }
            question.check()?;
            question.position = idx + 1;
            if question.topic.is_empty() {
                question.topic = subject.clone();
            }
        }
        Ok(Self { subject, questions })
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Number of questions (N). Always at least 1.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Always `false`; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Returns `true` if `position` is within `1..=N`.
    pub fn contains(&self, position: usize) -> bool {
        (1..=self.questions.len()).contains(&position)
    }

    /// The question at a 1-based position.
    pub fn get(&self, position: usize) -> Option<&Question> {
        position
            .checked_sub(1)
            .and_then(|idx| self.questions.get(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Sum of the point values of all questions.
    pub fn points_possible(&self) -> u64 {
        self.questions.iter().map(|q| u64::from(q.points)).sum()
    }
}

/// Kind of test, as offered by the test selection screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// Short practice drawn from one subject.
    Quick,
    /// Full-length test for one subject.
    Subject,
    /// Mixed-subject mock examination.
    Mock,
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestType::Quick => write!(f, "quick"),
            TestType::Subject => write!(f, "subject"),
            TestType::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" | "quick-test" => Ok(TestType::Quick),
            "subject" | "subject-test" => Ok(TestType::Subject),
            "mock" | "mock-exam" => Ok(TestType::Mock),
            other => Err(format!("unknown test type: {other}")),
        }
    }
}

/// Per-session configuration, supplied at session creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Number of questions to request from the content provider.
    pub question_count: usize,
    /// Countdown length in seconds.
    pub duration_secs: u32,
    pub test_type: TestType,
}

impl SessionConfig {
    /// Check that the configuration can start a session.
    pub fn validate(&self) -> Result<(), String> {
        if self.question_count == 0 {
            return Err("question_count must be at least 1".into());
        }
        if self.duration_secs == 0 {
            return Err("duration_secs must be at least 1".into());
        }
        Ok(())
    }
}

/// What the student chose to sit: a subject plus the session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSelection {
    pub subject: String,
    pub config: SessionConfig,
}

impl TestSelection {
    pub fn new(subject: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            subject: subject.into(),
            config,
        }
    }
}

/// A subject's question bank, as loaded from disk or a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionBank {
    /// Subject key used in test selections (e.g. "mathematics").
    pub subject: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}
