//! Collaborator traits: where questions come from and where results go.
//!
//! Implemented by the `examkit-providers` crate (file, HTTP, and mock
//! backends).

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::model::{QuestionSet, TestSelection};
use crate::report::AttemptRecord;

/// Source of question sets (the test content provider).
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Human-readable backend name (e.g. "file").
    fn name(&self) -> &str;

    /// Fetch the ordered question set for a selection.
    ///
    /// Implementations should return at most
    /// `selection.config.question_count` questions.
    async fn fetch_question_set(
        &self,
        selection: &TestSelection,
    ) -> Result<QuestionSet, ProviderError>;
}

/// Durable storage for submitted attempts (the result persistence service).
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Human-readable backend name (e.g. "json").
    fn name(&self) -> &str;

    /// Store an attempt. Must be safe to call again with the same record
    /// after a failure.
    async fn persist(&self, record: &AttemptRecord) -> Result<(), ProviderError>;
}
