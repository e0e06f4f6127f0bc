//! In-memory backends for testing the session engine without I/O.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use examkit_core::model::{QuestionSet, TestSelection};
use examkit_core::report::AttemptRecord;
use examkit_core::traits::{ContentProvider, ResultStore};

use crate::error::ProviderError;

/// A content provider that serves one fixed question set.
pub struct MockContentProvider {
    set: Option<QuestionSet>,
    call_count: AtomicU32,
    last_selection: Mutex<Option<TestSelection>>,
}

impl MockContentProvider {
    pub fn new(set: QuestionSet) -> Self {
        Self {
            set: Some(set),
            call_count: AtomicU32::new(0),
            last_selection: Mutex::new(None),
        }
    }

    /// A provider whose every fetch fails with `Unavailable`.
    pub fn unavailable() -> Self {
        Self {
            set: None,
            call_count: AtomicU32::new(0),
            last_selection: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_selection(&self) -> Option<TestSelection> {
        self.last_selection
            .lock()
            .ok()
            .and_then(|s| s.clone())
    }
}

#[async_trait]
impl ContentProvider for MockContentProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_question_set(
        &self,
        selection: &TestSelection,
    ) -> Result<QuestionSet, ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut last) = self.last_selection.lock() {
            *last = Some(selection.clone());
        }
        self.set
            .clone()
            .ok_or_else(|| ProviderError::Unavailable("mock content unavailable".into()))
    }
}

/// A result store that keeps records in memory.
///
/// Can be told to fail the next N persists with a transient network error.
#[derive(Default)]
pub struct MockResultStore {
    failures_left: AtomicU32,
    call_count: AtomicU32,
    records: Mutex<Vec<AttemptRecord>>,
}

impl MockResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls to `persist`.
    pub fn failing(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Records stored so far, in persist order.
    pub fn records(&self) -> Vec<AttemptRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ResultStore for MockResultStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn persist(&self, record: &AttemptRecord) -> Result<(), ProviderError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);

        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProviderError::Network("mock connection reset".into()));
        }

        let mut records = self
            .records
            .lock()
            .map_err(|_| ProviderError::Io("mock store poisoned".into()))?;
        // Same id means a retried submission.
        records.retain(|r| r.id != record.id);
        records.push(record.clone());
        Ok(())
    }
}
