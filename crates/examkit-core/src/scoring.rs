//! Result compiler.
//!
//! Turns the final answers of a session into an immutable [`ExamResult`]
//! and the per-question review dataset. Everything here is a pure function
//! of its inputs: the creation timestamp is passed in, so compiling the same
//! inputs twice yields identical results.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CompileError;
use crate::model::{AnswerOption, QuestionSet};
use crate::state::{AnswerRecord, FlagSet};

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitTrigger {
    /// The student confirmed submission.
    Manual,
    /// The countdown reached zero.
    Expired,
}

/// Clock readings at the moment of submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub duration_secs: u32,
    pub remaining_secs: u32,
}

impl Timing {
    pub fn time_taken_secs(&self) -> u32 {
        self.duration_secs.saturating_sub(self.remaining_secs)
    }
}

/// Correctness for one topic tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicScore {
    pub topic: String,
    pub total: usize,
    pub correct: usize,
    pub percentage: u32,
}

/// Scored outcome of one session. Never mutated after compilation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamResult {
    pub total_questions: usize,
    pub answered_count: usize,
    pub correct_count: usize,
    /// Whole percent, rounded half up.
    pub percentage: u32,
    pub points_earned: u64,
    pub points_possible: u64,
    pub time_taken_secs: u32,
    /// Topics in order of first appearance in the question set.
    pub per_topic: Vec<TopicScore>,
    pub trigger: SubmitTrigger,
    pub created_at: DateTime<Utc>,
}

/// One row of the post-test review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewItem {
    pub position: usize,
    pub question_id: String,
    pub topic: String,
    pub prompt: String,
    pub options: Vec<AnswerOption>,
    pub selected: Option<String>,
    pub correct_answer: String,
    pub is_correct: bool,
    pub flagged: bool,
    pub explanation: String,
    pub points: u32,
}

/// `round(100 * correct / total)` with halves rounded up, in integer math.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let pct = (200 * correct + total) / (2 * total);
    u32::try_from(pct).unwrap_or(u32::MAX)
}

/// Score the final answers against the question set.
///
/// Unanswered questions count as incorrect. Fails if any answer references
/// a position outside the set.
pub fn compile_result(
    questions: &QuestionSet,
    answers: &AnswerRecord,
    timing: Timing,
    trigger: SubmitTrigger,
    created_at: DateTime<Utc>,
) -> Result<ExamResult, CompileError> {
    check_positions(questions, answers)?;

    let mut correct_count = 0usize;
    let mut points_earned = 0u64;
    // (topic, total, correct) in first-appearance order
    let mut topics: Vec<(String, usize, usize)> = Vec::new();
    let mut topic_index: HashMap<&str, usize> = HashMap::new();

    for question in questions.iter() {
        let correct = answers.get(question.position) == Some(question.answer.as_str());
        if correct {
            correct_count += 1;
            points_earned += u64::from(question.points);
        }

        let idx = *topic_index.entry(question.topic.as_str()).or_insert_with(|| {
            topics.push((question.topic.clone(), 0, 0));
            topics.len() - 1
        });
        topics[idx].1 += 1;
        if correct {
            topics[idx].2 += 1;
        }
    }

    let total_questions = questions.len();
    let per_topic = topics
        .into_iter()
        .map(|(topic, total, correct)| TopicScore {
            topic,
            total,
            correct,
            percentage: percentage(correct, total),
        })
        .collect();

    Ok(ExamResult {
        total_questions,
        answered_count: answers.len(),
        correct_count,
        percentage: percentage(correct_count, total_questions),
        points_earned,
        points_possible: questions.points_possible(),
        time_taken_secs: timing.time_taken_secs(),
        per_topic,
        trigger,
        created_at,
    })
}

/// Build the per-question review dataset, in position order.
pub fn build_review(
    questions: &QuestionSet,
    answers: &AnswerRecord,
    flags: &FlagSet,
) -> Result<Vec<ReviewItem>, CompileError> {
    check_positions(questions, answers)?;

    Ok(questions
        .iter()
        .map(|q| {
            let selected = answers.get(q.position).map(str::to_string);
            ReviewItem {
                position: q.position,
                question_id: q.id.clone(),
                topic: q.topic.clone(),
                prompt: q.prompt.clone(),
                options: q.options.clone(),
                is_correct: selected.as_deref() == Some(q.answer.as_str()),
                selected,
                correct_answer: q.answer.clone(),
                flagged: flags.contains(q.position),
                explanation: q.explanation.clone(),
                points: q.points,
            }
        })
        .collect())
}

fn check_positions(questions: &QuestionSet, answers: &AnswerRecord) -> Result<(), CompileError> {
    match answers.iter().find(|(p, _)| !questions.contains(*p)) {
        Some((position, _)) => Err(CompileError::IncompleteQuestionSet {
            position,
            total: questions.len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{question, question_set};
    use crate::time::fixed_clock;

    fn timing() -> Timing {
        Timing {
            duration_secs: 600,
            remaining_secs: 150,
        }
    }

    #[test]
    fn three_of_five_is_sixty_percent() {
        let set = question_set(5);
        let answers: AnswerRecord = [(1, "A"), (2, "A"), (3, "A"), (4, "B")].into_iter().collect();
        let result = compile_result(
            &set,
            &answers,
            timing(),
            SubmitTrigger::Manual,
            fixed_clock().now(),
        )
        .unwrap();
        assert_eq!(result.correct_count, 3);
        assert_eq!(result.percentage, 60);
        assert_eq!(result.answered_count, 4);
        assert_eq!(result.total_questions, 5);
        assert_eq!(result.time_taken_secs, 450);
        assert_eq!(result.points_earned, 3);
        assert_eq!(result.points_possible, 5);
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33); // 33.33
        assert_eq!(percentage(2, 3), 67); // 66.67
        assert_eq!(percentage(0, 40), 0);
        assert_eq!(percentage(40, 40), 100);
        assert_eq!(percentage(0, 0), 0);
    }

    #[test]
    fn unanswered_count_as_incorrect() {
        let set = question_set(4);
        let result = compile_result(
            &set,
            &AnswerRecord::new(),
            timing(),
            SubmitTrigger::Expired,
            fixed_clock().now(),
        )
        .unwrap();
        assert_eq!(result.total_questions, 4);
        assert_eq!(result.correct_count, 0);
        assert_eq!(result.percentage, 0);
    }

    #[test]
    fn compilation_is_deterministic() {
        let set = question_set(6);
        let answers: AnswerRecord = [(1, "A"), (3, "C"), (6, "A")].into_iter().collect();
        let at = fixed_clock().now();
        let a = compile_result(&set, &answers, timing(), SubmitTrigger::Manual, at).unwrap();
        let b = compile_result(&set, &answers, timing(), SubmitTrigger::Manual, at).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn topic_breakdown_groups_in_first_appearance_order() {
        let set = QuestionSet::new(
            "science",
            vec![
                question("q1", "optics", "A"),
                question("q2", "mechanics", "B"),
                question("q3", "optics", "C"),
                question("q4", "optics", "D"),
            ],
        )
        .unwrap();
        let answers: AnswerRecord = [(1, "A"), (2, "A"), (3, "C")].into_iter().collect();
        let result = compile_result(
            &set,
            &answers,
            timing(),
            SubmitTrigger::Manual,
            fixed_clock().now(),
        )
        .unwrap();

        assert_eq!(result.per_topic.len(), 2);
        assert_eq!(result.per_topic[0].topic, "optics");
        assert_eq!(result.per_topic[0].total, 3);
        assert_eq!(result.per_topic[0].correct, 2);
        assert_eq!(result.per_topic[0].percentage, 67);
        assert_eq!(result.per_topic[1].topic, "mechanics");
        assert_eq!(result.per_topic[1].correct, 0);
    }

    #[test]
    fn weighted_points() {
        let mut heavy = question("q2", "t", "B");
        heavy.points = 3;
        let set = QuestionSet::new("x", vec![question("q1", "t", "A"), heavy]).unwrap();
        let answers: AnswerRecord = [(2, "B")].into_iter().collect();
        let result = compile_result(
            &set,
            &answers,
            timing(),
            SubmitTrigger::Manual,
            fixed_clock().now(),
        )
        .unwrap();
        assert_eq!(result.points_earned, 3);
        assert_eq!(result.points_possible, 4);
        assert_eq!(result.percentage, 50);
    }

    #[test]
    fn large_point_values_do_not_overflow() {
        let mut huge = question("q1", "t", "A");
        huge.points = u32::MAX;
        let mut small = question("q2", "t", "B");
        small.points = 2;
        let set = QuestionSet::new("x", vec![huge, small]).unwrap();
        let answers: AnswerRecord = [(1, "A"), (2, "B")].into_iter().collect();
        let result = compile_result(
            &set,
            &answers,
            timing(),
            SubmitTrigger::Manual,
            fixed_clock().now(),
        )
        .unwrap();
        let expected = u64::from(u32::MAX) + 2;
        assert_eq!(result.points_earned, expected);
        assert_eq!(result.points_possible, expected);
        assert_eq!(set.points_possible(), expected);
    }

    #[test]
    fn answer_outside_set_is_rejected() {
        let set = question_set(3);
        let answers: AnswerRecord = [(1, "A"), (7, "B")].into_iter().collect();
        let err = compile_result(
            &set,
            &answers,
            timing(),
            SubmitTrigger::Manual,
            fixed_clock().now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            CompileError::IncompleteQuestionSet {
                position: 7,
                total: 3
            }
        );
        assert!(build_review(&set, &answers, &FlagSet::new()).is_err());
    }

    #[test]
    fn review_marks_selection_and_flags() {
        let set = question_set(3);
        let answers: AnswerRecord = [(1, "A"), (2, "D")].into_iter().collect();
        let mut flags = FlagSet::new();
        flags.toggle(2);
        let review = build_review(&set, &answers, &flags).unwrap();

        assert_eq!(review.len(), 3);
        assert!(review[0].is_correct);
        assert_eq!(review[1].selected.as_deref(), Some("D"));
        assert!(!review[1].is_correct);
        assert!(review[1].flagged);
        assert_eq!(review[2].selected, None);
        assert_eq!(review[2].correct_answer, "A");
    }
}
