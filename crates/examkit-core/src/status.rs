//! Navigator status projection.
//!
//! Pure functions over a [`SessionState`]. The navigator grid is always
//! derived from the authoritative state, never kept as its own copy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::SessionState;

/// Display status of one position in the navigator grid.
///
/// Precedence: current > flagged > answered > unanswered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Current,
    Flagged,
    Answered,
    Unanswered,
}

impl QuestionStatus {
    /// One-character marker for text grids.
    pub fn marker(self) -> char {
        match self {
            QuestionStatus::Current => '>',
            QuestionStatus::Flagged => '?',
            QuestionStatus::Answered => '*',
            QuestionStatus::Unanswered => '.',
        }
    }
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Current => write!(f, "current"),
            QuestionStatus::Flagged => write!(f, "flagged"),
            QuestionStatus::Answered => write!(f, "answered"),
            QuestionStatus::Unanswered => write!(f, "unanswered"),
        }
    }
}

/// Status of `position`. Positions outside the set report `Unanswered`.
pub fn status(position: usize, state: &SessionState) -> QuestionStatus {
    if position == state.current_position() {
        QuestionStatus::Current
    } else if state.flags().contains(position) {
        QuestionStatus::Flagged
    } else if state.answers().is_answered(position) {
        QuestionStatus::Answered
    } else {
        QuestionStatus::Unanswered
    }
}

/// Status of every position, in order (index 0 is position 1).
pub fn navigator_grid(state: &SessionState) -> Vec<QuestionStatus> {
    (1..=state.total_questions())
        .map(|position| status(position, state))
        .collect()
}

/// Answered / unanswered / flagged counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub flagged: usize,
}

pub fn progress(state: &SessionState) -> Progress {
    let total = state.total_questions();
    let answered = (1..=total)
        .filter(|p| state.answers().is_answered(*p))
        .count();
    Progress {
        total,
        answered,
        unanswered: total - answered,
        flagged: state.flags().len(),
    }
}
