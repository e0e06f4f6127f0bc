//! The session controller.
//!
//! [`ExamSession`] is the only owner of a [`SessionState`]. It accepts
//! mutations only while the session is `InProgress`, forwards clock ticks,
//! and on submission compiles the result and holds it until the caller
//! confirms it was stored:
//!
//! ```text
//! InProgress --confirm_submit / force_submit--> Submitting --complete_submission--> Completed
//! ```
//!
//! The controller does no I/O; see [`crate::engine`] for the async driver.

use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{ClockTick, Urgency};
use crate::error::SessionError;
use crate::model::{QuestionSet, QuestionView, TestSelection};
use crate::report::AttemptRecord;
use crate::scoring::{build_review, compile_result, SubmitTrigger, Timing};
use crate::state::{Phase, SessionState};
use crate::status::{self, Progress, QuestionStatus};
use crate::time::WallClock;

/// Counts reported before the student confirms submission.
pub type SubmitSummary = Progress;

/// What a controller tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing happened: the session is no longer in progress.
    Idle,
    /// One second elapsed.
    Running {
        remaining_secs: u32,
        urgency: Urgency,
    },
    /// Time ran out and the session was force-submitted.
    Expired(Box<AttemptRecord>),
}

#[derive(Debug, Clone)]
pub struct ExamSession {
    id: Uuid,
    selection: TestSelection,
    state: SessionState,
    wall_clock: WallClock,
    submission: Option<AttemptRecord>,
}

impl ExamSession {
    /// Create a session over `questions` and start its countdown.
    pub fn start(selection: TestSelection, questions: QuestionSet) -> Result<Self, SessionError> {
        Self::from_state(selection, SessionState::new(questions))
    }

    /// Create a session around an existing state and start its countdown.
    ///
    /// Fails with `AlreadyStarted` if the state's clock is already running.
    pub fn from_state(
        selection: TestSelection,
        mut state: SessionState,
    ) -> Result<Self, SessionError> {
        state.clock_mut().start(selection.config.duration_secs)?;
        let id = Uuid::new_v4();
        info!(
            session = %id,
            subject = %selection.subject,
            test_type = %selection.config.test_type,
            questions = state.total_questions(),
            duration_secs = selection.config.duration_secs,
            "session started"
        );
        Ok(Self {
            id,
            selection,
            state,
            wall_clock: WallClock::default(),
            submission: None,
        })
    }

    /// Use `wall_clock` to timestamp the result.
    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn selection(&self) -> &TestSelection {
        &self.selection
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn current_position(&self) -> usize {
        self.state.current_position()
    }

    pub fn total_questions(&self) -> usize {
        self.state.total_questions()
    }

    /// The question at the current position, without its answer key.
    pub fn current_question(&self) -> Option<QuestionView<'_>> {
        self.state
            .questions()
            .get(self.state.current_position())
            .map(|q| q.view())
    }

    pub fn remaining_secs(&self) -> u32 {
        self.state.remaining_secs()
    }

    pub fn urgency(&self) -> Urgency {
        self.state.clock().urgency()
    }

    /// Navigator status of one position.
    pub fn status(&self, position: usize) -> Result<QuestionStatus, SessionError> {
        self.check_position(position)?;
        Ok(status::status(position, &self.state))
    }

    /// Navigator status of every position.
    pub fn navigator(&self) -> Vec<QuestionStatus> {
        status::navigator_grid(&self.state)
    }

    pub fn progress(&self) -> Progress {
        status::progress(&self.state)
    }

    /// Record `label` as the answer for `position`, replacing any earlier one.
    pub fn select_answer(&mut self, position: usize, label: &str) -> Result<(), SessionError> {
        self.ensure_in_progress()?;
        self.check_position(position)?;
        let offered = self
            .state
            .questions()
            .get(position)
            .is_some_and(|q| q.has_option(label));
        if !offered {
            return Err(SessionError::InvalidOption {
                position,
                label: label.to_string(),
            });
        }
        let previous = self.state.answers_mut().record(position, label);
        debug!(session = %self.id, position, label, ?previous, "answer recorded");
        Ok(())
    }

    /// Flip the review flag on `position`; returns whether it is now flagged.
    pub fn toggle_flag(&mut self, position: usize) -> Result<bool, SessionError> {
        self.ensure_in_progress()?;
        self.check_position(position)?;
        let flagged = self.state.flags_mut().toggle(position);
        debug!(session = %self.id, position, flagged, "flag toggled");
        Ok(flagged)
    }

    /// Move to `position`. Skipping unanswered questions is allowed.
    pub fn go_to(&mut self, position: usize) -> Result<usize, SessionError> {
        self.ensure_in_progress()?;
        self.check_position(position)?;
        self.state.set_current_position(position);
        Ok(position)
    }

    /// Move forward one question; stays put on the last question.
    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.ensure_in_progress()?;
        let current = self.state.current_position();
        if current < self.state.total_questions() {
            self.go_to(current + 1)
        } else {
            Ok(current)
        }
    }

    /// Move back one question; stays put on the first question.
    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.ensure_in_progress()?;
        let current = self.state.current_position();
        if current > 1 {
            self.go_to(current - 1)
        } else {
            Ok(current)
        }
    }

    /// Report answered/unanswered counts so the caller can ask for
    /// confirmation. Does not change the phase.
    pub fn request_submit(&self) -> Result<SubmitSummary, SessionError> {
        self.ensure_in_progress()?;
        Ok(self.progress())
    }

    /// Submit after the student confirmed. Unanswered questions are allowed.
    pub fn confirm_submit(&mut self) -> Result<AttemptRecord, SessionError> {
        self.ensure_in_progress()?;
        self.enter_submitting(SubmitTrigger::Manual)
    }

    /// Submit without confirmation, as on timer expiry.
    ///
    /// Only the first call on an in-progress session submits; later calls
    /// return `Ok(None)`.
    pub fn force_submit(&mut self) -> Result<Option<AttemptRecord>, SessionError> {
        if self.state.phase() != Phase::InProgress {
            debug!(session = %self.id, phase = %self.state.phase(), "force submit ignored");
            return Ok(None);
        }
        self.enter_submitting(SubmitTrigger::Expired).map(Some)
    }

    /// Advance the countdown by one second, force-submitting on expiry.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        if self.state.phase() != Phase::InProgress {
            return Ok(TickOutcome::Idle);
        }
        match self.state.clock_mut().tick() {
            ClockTick::Idle => Ok(TickOutcome::Idle),
            ClockTick::Running { remaining_secs } => Ok(TickOutcome::Running {
                remaining_secs,
                urgency: Urgency::from_remaining(remaining_secs),
            }),
            ClockTick::Expired => {
                info!(session = %self.id, "time expired");
                Ok(match self.force_submit()? {
                    Some(record) => TickOutcome::Expired(Box::new(record)),
                    None => TickOutcome::Idle,
                })
            }
        }
    }

    /// The compiled submission, once the session has left `InProgress`.
    ///
    /// While `Submitting` this is the record to (re)send to the result store.
    pub fn submission(&self) -> Option<&AttemptRecord> {
        self.submission.as_ref()
    }

    /// Mark the pending submission as durably stored.
    pub fn complete_submission(&mut self) -> Result<&AttemptRecord, SessionError> {
        let phase = self.state.phase();
        if phase != Phase::Submitting {
            return Err(SessionError::NotSubmitting { phase });
        }
        let Some(record) = self.submission.as_ref() else {
            return Err(SessionError::NotSubmitting { phase });
        };
        self.state.set_phase(Phase::Completed);
        info!(
            session = %self.id,
            correct = record.result.correct_count,
            total = record.result.total_questions,
            "session completed"
        );
        Ok(record)
    }

    fn enter_submitting(&mut self, trigger: SubmitTrigger) -> Result<AttemptRecord, SessionError> {
        let timing = Timing {
            duration_secs: self.state.clock().duration_secs(),
            remaining_secs: self.state.remaining_secs(),
        };
        let questions = self.state.questions();
        let result = compile_result(
            questions,
            self.state.answers(),
            timing,
            trigger,
            self.wall_clock.now(),
        )?;
        let review = build_review(questions, self.state.answers(), self.state.flags())?;

        let record = AttemptRecord {
            id: self.id,
            subject: self.selection.subject.clone(),
            test_type: self.selection.config.test_type,
            result,
            review,
        };

        self.state.clock_mut().stop();
        self.state.set_phase(Phase::Submitting);
        self.submission = Some(record.clone());
        info!(
            session = %self.id,
            ?trigger,
            answered = record.result.answered_count,
            total = record.result.total_questions,
            "session submitting"
        );
        Ok(record)
    }

    fn ensure_in_progress(&self) -> Result<(), SessionError> {
        match self.state.phase() {
            Phase::InProgress => Ok(()),
            phase => Err(SessionError::SessionClosed { phase }),
        }
    }

    fn check_position(&self, position: usize) -> Result<(), SessionError> {
        if self.state.questions().contains(position) {
            Ok(())
        } else {
            Err(SessionError::InvalidPosition {
                position,
                total: self.state.total_questions(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{question, question_set};
    use crate::model::{SessionConfig, TestType};
    use crate::time::fixed_clock;

    fn selection(n: usize, duration_secs: u32, test_type: TestType) -> TestSelection {
        TestSelection::new(
            "general",
            SessionConfig {
                question_count: n,
                duration_secs,
                test_type,
            },
        )
    }

    fn session(n: usize) -> ExamSession {
        ExamSession::start(selection(n, 600, TestType::Quick), question_set(n))
            .unwrap()
            .with_wall_clock(fixed_clock())
    }

    #[test]
    fn starts_in_progress_on_first_question() {
        let s = session(5);
        assert_eq!(s.phase(), Phase::InProgress);
        assert_eq!(s.current_position(), 1);
        assert_eq!(s.remaining_secs(), 600);
        assert_eq!(s.current_question().unwrap().id, "q1");
    }

    #[test]
    fn starting_an_already_started_state_fails() {
        let mut state = SessionState::new(question_set(2));
        state.clock_mut().start(30).unwrap();
        let err = ExamSession::from_state(selection(2, 30, TestType::Quick), state).unwrap_err();
        assert_eq!(err, SessionError::AlreadyStarted);
    }

    #[test]
    fn select_answer_validates_position_and_option() {
        let mut s = session(3);
        assert_eq!(
            s.select_answer(0, "A"),
            Err(SessionError::InvalidPosition {
                position: 0,
                total: 3
            })
        );
        assert_eq!(
            s.select_answer(4, "A"),
            Err(SessionError::InvalidPosition {
                position: 4,
                total: 3
            })
        );
        assert_eq!(
            s.select_answer(2, "Z"),
            Err(SessionError::InvalidOption {
                position: 2,
                label: "Z".into()
            })
        );
        assert!(s.state().answers().is_empty());
    }

    #[test]
    fn last_answer_wins_and_position_is_unchanged() {
        let mut s = session(5);
        s.select_answer(3, "B").unwrap();
        s.select_answer(3, "D").unwrap();
        s.select_answer(3, "D").unwrap();
        assert_eq!(s.state().answers().get(3), Some("D"));
        assert_eq!(s.state().answers().len(), 1);
        assert_eq!(s.current_position(), 1);
    }

    #[test]
    fn even_toggles_restore_flag() {
        let mut s = session(3);
        for _ in 0..4 {
            s.toggle_flag(2).unwrap();
        }
        assert!(!s.state().flags().contains(2));
        assert!(s.toggle_flag(2).unwrap());
        assert!(s.state().flags().contains(2));
    }

    #[test]
    fn navigation_is_unconstrained_and_clamped_at_edges() {
        let mut s = session(3);
        assert_eq!(s.previous().unwrap(), 1);
        assert_eq!(s.go_to(3).unwrap(), 3);
        assert_eq!(s.next().unwrap(), 3);
        assert_eq!(s.previous().unwrap(), 2);
        assert!(matches!(
            s.go_to(9),
            Err(SessionError::InvalidPosition { .. })
        ));
        assert_eq!(s.current_position(), 2);
    }

    #[test]
    fn current_status_overrides_answered_and_flagged() {
        let mut s = session(3);
        s.select_answer(2, "A").unwrap();
        s.toggle_flag(2).unwrap();
        s.go_to(2).unwrap();
        assert_eq!(s.status(2).unwrap(), QuestionStatus::Current);
        s.next().unwrap();
        assert_eq!(s.status(2).unwrap(), QuestionStatus::Flagged);
        assert!(s.status(4).is_err());
    }

    #[test]
    fn request_submit_reports_counts_without_transition() {
        let mut s = session(4);
        s.select_answer(1, "A").unwrap();
        s.select_answer(2, "C").unwrap();
        s.toggle_flag(4).unwrap();
        let summary = s.request_submit().unwrap();
        assert_eq!(summary.answered, 2);
        assert_eq!(summary.unanswered, 2);
        assert_eq!(summary.flagged, 1);
        assert_eq!(summary.answered + summary.unanswered, summary.total);
        assert_eq!(s.phase(), Phase::InProgress);
    }

    #[test]
    fn confirm_submit_moves_to_submitting_then_completed() {
        let mut s = session(5);
        s.select_answer(1, "A").unwrap();
        s.select_answer(2, "A").unwrap();
        s.tick().unwrap();
        let record = s.confirm_submit().unwrap();
        assert_eq!(s.phase(), Phase::Submitting);
        assert_eq!(record.id, s.id());
        assert_eq!(record.result.correct_count, 2);
        assert_eq!(record.result.time_taken_secs, 1);
        assert_eq!(record.result.trigger, SubmitTrigger::Manual);
        assert_eq!(s.submission(), Some(&record));

        assert_eq!(s.complete_submission().unwrap(), &record);
        assert_eq!(s.phase(), Phase::Completed);
    }

    #[test]
    fn mutations_after_submit_are_closed() {
        let mut s = session(3);
        s.confirm_submit().unwrap();
        let closed = SessionError::SessionClosed {
            phase: Phase::Submitting,
        };
        assert_eq!(s.select_answer(1, "A"), Err(closed.clone()));
        assert_eq!(s.toggle_flag(1), Err(closed.clone()));
        assert_eq!(s.go_to(2), Err(closed.clone()));
        assert_eq!(s.next(), Err(closed.clone()));
        assert_eq!(s.request_submit(), Err(closed.clone()));
        assert_eq!(s.confirm_submit(), Err(closed));
        assert_eq!(s.tick(), Ok(TickOutcome::Idle));
    }

    #[test]
    fn complete_requires_submitting() {
        let mut s = session(2);
        assert_eq!(
            s.complete_submission(),
            Err(SessionError::NotSubmitting {
                phase: Phase::InProgress
            })
        );
        s.confirm_submit().unwrap();
        s.complete_submission().unwrap();
        assert!(s.complete_submission().is_err());
    }

    #[test]
    fn force_submit_is_idempotent() {
        let mut s = session(3);
        let first = s.force_submit().unwrap();
        assert!(first.is_some());
        assert_eq!(first.unwrap().result.trigger, SubmitTrigger::Expired);
        assert_eq!(s.force_submit().unwrap(), None);
        assert_eq!(s.phase(), Phase::Submitting);
    }

    #[test]
    fn expiry_submits_exactly_once() {
        let mut s = ExamSession::start(selection(2, 3, TestType::Quick), question_set(2)).unwrap();
        let mut expirations = 0;
        for _ in 0..20 {
            if let TickOutcome::Expired(record) = s.tick().unwrap() {
                expirations += 1;
                assert_eq!(record.result.time_taken_secs, 3);
            }
        }
        assert_eq!(expirations, 1);
        assert_eq!(s.phase(), Phase::Submitting);
    }

    #[test]
    fn tick_reports_urgency() {
        let mut s = ExamSession::start(selection(1, 62, TestType::Quick), question_set(1)).unwrap();
        assert_eq!(
            s.tick().unwrap(),
            TickOutcome::Running {
                remaining_secs: 61,
                urgency: Urgency::Warning
            }
        );
        assert_eq!(
            s.tick().unwrap(),
            TickOutcome::Running {
                remaining_secs: 60,
                urgency: Urgency::Critical
            }
        );
    }

    #[test]
    fn subject_test_expiry_scenario() {
        let questions: Vec<_> = (1..=40)
            .map(|i| question(&format!("q{i}"), "biology", "A"))
            .collect();
        let set = QuestionSet::new("biology", questions).unwrap();
        let mut s = ExamSession::start(selection(40, 2400, TestType::Subject), set)
            .unwrap()
            .with_wall_clock(fixed_clock());

        for position in 1..=38 {
            s.select_answer(position, "A").unwrap();
        }
        s.toggle_flag(5).unwrap();
        s.toggle_flag(12).unwrap();

        let mut records = Vec::new();
        for _ in 0..2400 {
            if let TickOutcome::Expired(record) = s.tick().unwrap() {
                records.push(record);
            }
        }
        assert_eq!(records.len(), 1);
        // A stray tick after expiry does not produce a second result.
        assert_eq!(s.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(s.force_submit().unwrap(), None);

        let record = &records[0];
        assert_eq!(record.result.total_questions, 40);
        assert_eq!(record.result.correct_count, 38);
        assert_eq!(record.result.percentage, 95);
        assert_eq!(record.result.time_taken_secs, 2400);
        assert_eq!(record.result.trigger, SubmitTrigger::Expired);
        assert!(!record.review[38].is_correct);
        assert!(!record.review[39].is_correct);
        assert!(record.review[4].flagged);
        assert!(record.review[11].flagged);
    }

    #[test]
    fn answer_counts_always_sum_to_total() {
        let mut s = session(6);
        for (position, label) in [(1, "A"), (3, "B"), (3, "C"), (6, "D"), (2, "A")] {
            s.select_answer(position, label).unwrap();
            let p = s.progress();
            assert_eq!(p.answered + p.unanswered, 6);
        }
        assert_eq!(s.progress().answered, 4);
    }
}
