//! Session state store: answers, flags, position, clock, and phase.
//!
//! Everything here is readable by anyone holding a `&SessionState`, but the
//! mutators are crate-private so only the controller changes it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::SessionClock;
use crate::model::QuestionSet;

/// Coarse lifecycle stage of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    InProgress,
    Submitting,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::InProgress => write!(f, "in progress"),
            Phase::Submitting => write!(f, "submitting"),
            Phase::Completed => write!(f, "completed"),
        }
    }
}

/// Selected option label per position. Absent means unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord(BTreeMap<usize, String>);

impl AnswerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `label` for `position`, returning the label it replaced.
    pub fn record(&mut self, position: usize, label: impl Into<String>) -> Option<String> {
        self.0.insert(position, label.into())
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(&position).map(String::as_str)
    }

    pub fn is_answered(&self, position: usize) -> bool {
        self.0.contains_key(&position)
    }

    /// Number of answered positions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Answers in position order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.0.iter().map(|(p, l)| (*p, l.as_str()))
    }
}

impl<L: Into<String>> FromIterator<(usize, L)> for AnswerRecord {
    fn from_iter<T: IntoIterator<Item = (usize, L)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(p, l)| (p, l.into())).collect())
    }
}

/// Positions marked for review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagSet(BTreeSet<usize>);

impl FlagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flip membership of `position`; returns whether it is now flagged.
    pub fn toggle(&mut self, position: usize) -> bool {
        if self.0.remove(&position) {
            false
        } else {
            self.0.insert(position);
            true
        }
    }

    pub fn contains(&self, position: usize) -> bool {
        self.0.contains(&position)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }
}

/// Authoritative state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    questions: QuestionSet,
    current_position: usize,
    answers: AnswerRecord,
    flags: FlagSet,
    clock: SessionClock,
    phase: Phase,
}

impl SessionState {
    /// Fresh state positioned on question 1 with an unstarted clock.
    pub fn new(questions: QuestionSet) -> Self {
        Self {
            questions,
            current_position: 1,
            answers: AnswerRecord::new(),
            flags: FlagSet::new(),
            clock: SessionClock::new(),
            phase: Phase::InProgress,
        }
    }

    pub fn questions(&self) -> &QuestionSet {
        &self.questions
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn current_position(&self) -> usize {
        self.current_position
    }

    pub fn answers(&self) -> &AnswerRecord {
        &self.answers
    }

    pub fn flags(&self) -> &FlagSet {
        &self.flags
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    pub fn remaining_secs(&self) -> u32 {
        self.clock.remaining_secs()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_current_position(&mut self, position: usize) {
        self.current_position = position;
    }

    pub(crate) fn answers_mut(&mut self) -> &mut AnswerRecord {
        &mut self.answers
    }

    pub(crate) fn flags_mut(&mut self) -> &mut FlagSet {
        &mut self.flags
    }

    pub(crate) fn clock_mut(&mut self) -> &mut SessionClock {
        &mut self.clock
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }
}
