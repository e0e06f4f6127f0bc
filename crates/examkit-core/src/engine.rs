//! Async session engine.
//!
//! Fetches a question set from a [`ContentProvider`], wraps the
//! [`ExamSession`] controller in a lock, drives its clock from a single
//! ticker task, and persists the submitted attempt to a [`ResultStore`]
//! with retries.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::clock::Urgency;
use crate::error::{EngineError, SessionError};
use crate::model::TestSelection;
use crate::report::AttemptRecord;
use crate::session::{ExamSession, TickOutcome};
use crate::state::Phase;
use crate::time::WallClock;
use crate::traits::{ContentProvider, ResultStore};

/// Upper bound for the persistence backoff.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Configuration for the session engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Interval between clock ticks. One second outside of tests.
    pub tick_period: Duration,
    /// Retries after a failed persist (not counting the first attempt).
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            max_retries: 3,
            retry_delay: Duration::from_millis(500),
        }
    }
}

/// Session event reporting, for front-ends that render the timer.
pub trait SessionObserver: Send + Sync {
    fn on_tick(&self, remaining_secs: u32, urgency: Urgency);
    fn on_expired(&self);
    fn on_submitted(&self, record: &AttemptRecord);
    fn on_submit_error(&self, error: &EngineError);
}

/// No-op observer.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_tick(&self, _: u32, _: Urgency) {}
    fn on_expired(&self) {}
    fn on_submitted(&self, _: &AttemptRecord) {}
    fn on_submit_error(&self, _: &EngineError) {}
}

/// Starts sessions against a content provider and a result store.
pub struct ExamEngine {
    content: Arc<dyn ContentProvider>,
    store: Arc<dyn ResultStore>,
    config: EngineConfig,
    wall_clock: WallClock,
}

impl ExamEngine {
    pub fn new(
        content: Arc<dyn ContentProvider>,
        store: Arc<dyn ResultStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            content,
            store,
            config,
            wall_clock: WallClock::default(),
        }
    }

    pub fn with_wall_clock(mut self, wall_clock: WallClock) -> Self {
        self.wall_clock = wall_clock;
        self
    }

    /// Fetch questions, start the session, and start its ticker.
    ///
    /// A content provider failure is returned as-is; no session exists
    /// afterwards.
    pub async fn start(
        &self,
        selection: TestSelection,
        observer: Arc<dyn SessionObserver>,
    ) -> Result<SessionHandle, EngineError> {
        selection
            .config
            .validate()
            .map_err(EngineError::InvalidConfig)?;

        let questions = self
            .content
            .fetch_question_set(&selection)
            .await
            .map_err(EngineError::Content)?;

        if questions.len() != selection.config.question_count {
            warn!(
                provider = self.content.name(),
                requested = selection.config.question_count,
                received = questions.len(),
                "question count differs from the requested count"
            );
        }

        let session = ExamSession::start(selection, questions)?.with_wall_clock(self.wall_clock);
        let session = Arc::new(Mutex::new(session));
        let submitter = Submitter {
            store: Arc::clone(&self.store),
            max_retries: self.config.max_retries,
            retry_delay: self.config.retry_delay,
        };
        let ticker = spawn_ticker(
            Arc::clone(&session),
            submitter.clone(),
            Arc::clone(&observer),
            self.config.tick_period,
        );

        Ok(SessionHandle {
            session,
            submitter,
            observer,
            ticker,
        })
    }
}

/// Cancellation handle for a session's ticker task.
///
/// Dropping the handle cancels the task.
pub struct TickerHandle {
    task: JoinHandle<()>,
}

impl TickerHandle {
    /// Stop the ticker. Safe to call more than once.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Student-facing access to a running session.
///
/// Dereferences to the controller for reads, and exposes only the edits a
/// student makes while sitting the test. Submission goes through
/// [`SessionHandle::submit`] so the attempt is always persisted before the
/// session completes:
///
/// ```compile_fail
/// # async fn sit(handle: examkit_core::engine::SessionHandle) {
/// handle.with_session(|s| s.confirm_submit()).await;
/// # }
/// ```
pub struct SessionControls<'a> {
    session: &'a mut ExamSession,
}

impl SessionControls<'_> {
    pub fn select_answer(&mut self, position: usize, label: &str) -> Result<(), SessionError> {
        self.session.select_answer(position, label)
    }

    pub fn toggle_flag(&mut self, position: usize) -> Result<bool, SessionError> {
        self.session.toggle_flag(position)
    }

    pub fn go_to(&mut self, position: usize) -> Result<usize, SessionError> {
        self.session.go_to(position)
    }

    pub fn next(&mut self) -> Result<usize, SessionError> {
        self.session.next()
    }

    pub fn previous(&mut self) -> Result<usize, SessionError> {
        self.session.previous()
    }
}

impl Deref for SessionControls<'_> {
    type Target = ExamSession;

    fn deref(&self) -> &ExamSession {
        self.session
    }
}

/// A running session: the locked controller plus its ticker.
pub struct SessionHandle {
    session: Arc<Mutex<ExamSession>>,
    submitter: Submitter,
    observer: Arc<dyn SessionObserver>,
    ticker: TickerHandle,
}

impl SessionHandle {
    /// Run `f` against the session while holding the session lock.
    pub async fn with_session<R>(&self, f: impl FnOnce(&mut SessionControls<'_>) -> R) -> R {
        let mut session = self.session.lock().await;
        f(&mut SessionControls {
            session: &mut *session,
        })
    }

    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    /// The submitted attempt, once the session has left `InProgress`.
    pub async fn submission(&self) -> Option<AttemptRecord> {
        self.session.lock().await.submission().cloned()
    }

    /// Confirmed manual submission: stops the ticker, compiles the result,
    /// and persists it.
    ///
    /// On `PersistenceFailure` the session stays in `Submitting`; call
    /// [`SessionHandle::retry_submit`].
    pub async fn submit(&self) -> Result<AttemptRecord, EngineError> {
        let record = {
            let mut session = self.session.lock().await;
            let record = session.confirm_submit()?;
            self.ticker.cancel();
            record
        };
        self.finish(record).await
    }

    /// Persist the pending submission again after a failure.
    pub async fn retry_submit(&self) -> Result<AttemptRecord, EngineError> {
        let record = {
            let session = self.session.lock().await;
            let phase = session.phase();
            match (phase, session.submission()) {
                (Phase::Submitting, Some(record)) => record.clone(),
                _ => return Err(SessionError::NotSubmitting { phase }.into()),
            }
        };
        info!(session = %record.id, "retrying submission");
        self.finish(record).await
    }

    pub fn ticker(&self) -> &TickerHandle {
        &self.ticker
    }

    async fn finish(&self, record: AttemptRecord) -> Result<AttemptRecord, EngineError> {
        match self.submitter.finish(&self.session, record).await {
            Ok(record) => {
                self.observer.on_submitted(&record);
                Ok(record)
            }
            Err(e) => {
                self.observer.on_submit_error(&e);
                Err(e)
            }
        }
    }
}

#[derive(Clone)]
struct Submitter {
    store: Arc<dyn ResultStore>,
    max_retries: u32,
    retry_delay: Duration,
}

impl Submitter {
    /// Persist with exponential backoff. Permanent errors are not retried.
    async fn persist(&self, record: &AttemptRecord) -> Result<(), EngineError> {
        let mut attempts = 0u32;
        let mut delay = self.retry_delay;
        loop {
            attempts += 1;
            match self.store.persist(record).await {
                Ok(()) => {
                    debug!(store = self.store.name(), session = %record.id, attempts, "attempt persisted");
                    return Ok(());
                }
                Err(e) if e.is_permanent() || attempts > self.max_retries => {
                    warn!(store = self.store.name(), session = %record.id, attempts, error = %e, "giving up on persist");
                    return Err(EngineError::PersistenceFailure {
                        attempts,
                        source: e,
                    });
                }
                Err(e) => {
                    warn!(store = self.store.name(), session = %record.id, attempts, error = %e, "persist failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(MAX_RETRY_DELAY);
                }
            }
        }
    }

    /// Persist, then move the session to `Completed`.
    async fn finish(
        &self,
        session: &Mutex<ExamSession>,
        record: AttemptRecord,
    ) -> Result<AttemptRecord, EngineError> {
        self.persist(&record).await?;
        let mut session = session.lock().await;
        match session.complete_submission() {
            Ok(completed) => Ok(completed.clone()),
            // Another path (ticker or a retry) completed it first.
            Err(SessionError::NotSubmitting {
                phase: Phase::Completed,
            }) => Ok(record),
            Err(e) => Err(e.into()),
        }
    }
}

fn spawn_ticker(
    session: Arc<Mutex<ExamSession>>,
    submitter: Submitter,
    observer: Arc<dyn SessionObserver>,
    period: Duration,
) -> TickerHandle {
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let outcome = session.lock().await.tick();
            match outcome {
                Ok(TickOutcome::Running {
                    remaining_secs,
                    urgency,
                }) => observer.on_tick(remaining_secs, urgency),
                Ok(TickOutcome::Expired(record)) => {
                    observer.on_expired();
                    match submitter.finish(&session, *record).await {
                        Ok(record) => observer.on_submitted(&record),
                        Err(e) => {
                            warn!(error = %e, "submission after expiry failed");
                            observer.on_submit_error(&e);
                        }
                    }
                    break;
                }
                Ok(TickOutcome::Idle) => break,
                Err(e) => {
                    warn!(error = %e, "tick failed");
                    break;
                }
            }
        }
        debug!("ticker stopped");
    });
    TickerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use crate::error::ProviderError;
    use crate::model::fixtures::question_set;
    use crate::model::{QuestionSet, SessionConfig, TestType};
    use crate::scoring::SubmitTrigger;
    use crate::time::fixed_clock;

    struct StaticContent(Option<QuestionSet>);

    #[async_trait]
    impl ContentProvider for StaticContent {
        fn name(&self) -> &str {
            "static"
        }

        async fn fetch_question_set(
            &self,
            _selection: &TestSelection,
        ) -> Result<QuestionSet, ProviderError> {
            self.0
                .clone()
                .ok_or_else(|| ProviderError::Unavailable("backend down".into()))
        }
    }

    /// Fails the first `failures` persists with `error`, then stores.
    struct FlakyStore {
        failures: AtomicU32,
        permanent: bool,
        calls: AtomicU32,
        saved: std::sync::Mutex<Vec<AttemptRecord>>,
    }

    impl FlakyStore {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                permanent: false,
                calls: AtomicU32::new(0),
                saved: std::sync::Mutex::new(Vec::new()),
            }
        }

        fn saved(&self) -> Vec<AttemptRecord> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResultStore for FlakyStore {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn persist(&self, record: &AttemptRecord) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(if self.permanent {
                    ProviderError::Api {
                        status: 400,
                        message: "rejected".into(),
                    }
                } else {
                    ProviderError::Network("connection reset".into())
                });
            }
            self.saved.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        ticks: AtomicU32,
        expired: AtomicU32,
        submitted: AtomicU32,
        errors: AtomicU32,
    }

    impl SessionObserver for CountingObserver {
        fn on_tick(&self, _: u32, _: Urgency) {
            self.ticks.fetch_add(1, Ordering::SeqCst);
        }
        fn on_expired(&self) {
            self.expired.fetch_add(1, Ordering::SeqCst);
        }
        fn on_submitted(&self, _: &AttemptRecord) {
            self.submitted.fetch_add(1, Ordering::SeqCst);
        }
        fn on_submit_error(&self, _: &EngineError) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn selection(duration_secs: u32) -> TestSelection {
        TestSelection::new(
            "general",
            SessionConfig {
                question_count: 5,
                duration_secs,
                test_type: TestType::Quick,
            },
        )
    }

    fn engine(store: Arc<FlakyStore>, max_retries: u32) -> ExamEngine {
        ExamEngine::new(
            Arc::new(StaticContent(Some(question_set(5)))),
            store,
            EngineConfig {
                tick_period: Duration::from_secs(1),
                max_retries,
                retry_delay: Duration::from_millis(100),
            },
        )
        .with_wall_clock(fixed_clock())
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_force_submits_once_and_persists() {
        let store = Arc::new(FlakyStore::new(0));
        let observer = Arc::new(CountingObserver::default());
        let handle = engine(Arc::clone(&store), 0)
            .start(selection(3), observer.clone())
            .await
            .unwrap();

        handle
            .with_session(|s| s.select_answer(1, "A"))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(handle.phase().await, Phase::Completed);
        assert!(handle.ticker().is_finished());
        let saved = store.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].result.trigger, SubmitTrigger::Expired);
        assert_eq!(saved[0].result.correct_count, 1);
        assert_eq!(saved[0].result.time_taken_secs, 3);
        assert_eq!(observer.ticks.load(Ordering::SeqCst), 2);
        assert_eq!(observer.expired.load(Ordering::SeqCst), 1);
        assert_eq!(observer.submitted.load(Ordering::SeqCst), 1);

        // Late operations are closed, not errors of the engine.
        let late = handle.with_session(|s| s.select_answer(2, "A")).await;
        assert!(late.unwrap_err().is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn manual_submit_cancels_ticker() {
        let store = Arc::new(FlakyStore::new(0));
        let handle = engine(Arc::clone(&store), 0)
            .start(selection(5), Arc::new(NoopObserver))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let summary = handle.with_session(|s| s.request_submit()).await.unwrap();
        assert_eq!(summary.unanswered, 5);

        let record = handle.submit().await.unwrap();
        assert_eq!(record.result.trigger, SubmitTrigger::Manual);
        assert_eq!(record.result.time_taken_secs, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(handle.ticker().is_finished());
        assert_eq!(store.saved().len(), 1);
        assert_eq!(handle.phase().await, Phase::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn persistence_failure_keeps_session_submitting_until_retry() {
        let store = Arc::new(FlakyStore::new(3));
        let observer = Arc::new(CountingObserver::default());
        let handle = engine(Arc::clone(&store), 1)
            .start(selection(600), observer.clone())
            .await
            .unwrap();

        handle
            .with_session(|s| s.select_answer(2, "A"))
            .await
            .unwrap();

        let err = handle.submit().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(
            err,
            EngineError::PersistenceFailure { attempts: 2, .. }
        ));
        assert_eq!(handle.phase().await, Phase::Submitting);
        assert_eq!(observer.errors.load(Ordering::SeqCst), 1);

        // Answers are preserved and no new mutations are accepted.
        let pending = handle.submission().await.unwrap();
        assert_eq!(pending.result.answered_count, 1);
        assert!(handle
            .with_session(|s| s.select_answer(3, "A"))
            .await
            .unwrap_err()
            .is_closed());

        // One failure left, then success on the retry's second attempt.
        let record = handle.retry_submit().await.unwrap();
        assert_eq!(record, pending);
        assert_eq!(handle.phase().await, Phase::Completed);
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn session_edits_never_complete_without_the_store() {
        let store = Arc::new(FlakyStore::new(0));
        let handle = engine(Arc::clone(&store), 0)
            .start(selection(600), Arc::new(NoopObserver))
            .await
            .unwrap();

        let summary = handle
            .with_session(|s| {
                s.select_answer(1, "A")?;
                s.toggle_flag(1)?;
                s.next()?;
                s.select_answer(2, "B")?;
                s.go_to(5)?;
                s.previous()?;
                s.request_submit()
            })
            .await
            .unwrap();
        assert_eq!(summary.answered, 2);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(handle.phase().await, Phase::InProgress);
        assert!(handle.submission().await.is_none());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);

        let record = handle.submit().await.unwrap();
        assert_eq!(handle.phase().await, Phase::Completed);
        assert_eq!(store.saved(), vec![record]);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_errors_are_not_retried() {
        let mut flaky = FlakyStore::new(1);
        flaky.permanent = true;
        let store = Arc::new(flaky);
        let handle = engine(Arc::clone(&store), 5)
            .start(selection(600), Arc::new(NoopObserver))
            .await
            .unwrap();

        let err = handle.submit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::PersistenceFailure { attempts: 1, .. }
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_without_pending_submission_fails() {
        let store = Arc::new(FlakyStore::new(0));
        let handle = engine(store, 0)
            .start(selection(600), Arc::new(NoopObserver))
            .await
            .unwrap();
        let err = handle.retry_submit().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Session(SessionError::NotSubmitting {
                phase: Phase::InProgress
            })
        ));
    }

    #[tokio::test]
    async fn content_failure_prevents_start() {
        let engine = ExamEngine::new(
            Arc::new(StaticContent(None)),
            Arc::new(FlakyStore::new(0)),
            EngineConfig::default(),
        );
        let err = engine
            .start(selection(60), Arc::new(NoopObserver))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            EngineError::Content(ProviderError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let engine = engine(Arc::new(FlakyStore::new(0)), 0);
        let err = engine
            .start(selection(0), Arc::new(NoopObserver))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }
}
