//! Error types for the session engine and its collaborators.
//!
//! Session errors separate caller misuse (`InvalidPosition`, `InvalidOption`)
//! from late calls on a finished session (`SessionClosed`), so a stray timer
//! tick or a double click can be ignored without masking real bugs.
//! `ProviderError` is defined here so the engine can classify collaborator
//! failures for retry decisions without string matching.

use thiserror::Error;

use crate::state::Phase;

/// Errors returned by the session controller and its clock.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The position is outside `1..=total`.
    #[error("position {position} is outside 1..={total}")]
    InvalidPosition { position: usize, total: usize },

    /// The label is not one of the question's options.
    #[error("option '{label}' is not offered by question {position}")]
    InvalidOption { position: usize, label: String },

    /// The operation arrived after the session left `InProgress`.
    #[error("session is closed ({phase})")]
    SessionClosed { phase: Phase },

    /// The clock was started twice.
    #[error("session clock already started")]
    AlreadyStarted,

    /// A submission step was requested while nothing is being submitted.
    #[error("no submission in progress ({phase})")]
    NotSubmitting { phase: Phase },

    /// The result compiler rejected the final answers.
    #[error(transparent)]
    Compile(#[from] CompileError),
}

impl SessionError {
    /// Returns `true` for late calls on a finished session, which callers may
    /// treat as a no-op.
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::SessionClosed { .. })
    }
}

/// Errors raised by the result compiler.
///
/// These indicate corrupted session state and are never expected under
/// correct controller use.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An answer references a position the question set does not have.
    #[error("answer recorded for position {position}, but the question set has {total} questions")]
    IncompleteQuestionSet { position: usize, total: usize },
}

/// Errors raised while building a question set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestionSetError {
    #[error("question set is empty")]
    Empty,

    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(String),

    #[error("question {question_id} has no options")]
    NoOptions { question_id: String },

    #[error("question {question_id} repeats option label '{label}'")]
    DuplicateOption { question_id: String, label: String },

    #[error("question {question_id} names answer '{label}', which is not an option")]
    UnknownAnswer { question_id: String, label: String },
}

/// Errors from the external collaborators (content provider, result store).
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The backend could not be reached or refused service.
    #[error("service unavailable: {0}")]
    Unavailable(String),

    /// The requested subject, bank, or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The backend returned content that does not form a valid question set.
    #[error("invalid content: {0}")]
    InvalidContent(String),

    /// Local storage failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ProviderError {
    /// Returns `true` if this error is permanent and should not be retried.
    pub fn is_permanent(&self) -> bool {
        match self {
            ProviderError::NotFound(_) | ProviderError::InvalidContent(_) => true,
            ProviderError::Api { status, .. } => (400..500).contains(status) && *status != 429,
            _ => false,
        }
    }
}

impl From<QuestionSetError> for ProviderError {
    fn from(e: QuestionSetError) -> Self {
        ProviderError::InvalidContent(e.to_string())
    }
}

impl From<std::io::Error> for ProviderError {
    fn from(e: std::io::Error) -> Self {
        ProviderError::Io(e.to_string())
    }
}

/// Errors surfaced by the async session engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The session configuration was rejected before any fetch.
    #[error("invalid session configuration: {0}")]
    InvalidConfig(String),

    /// The question set could not be fetched, so the session never started.
    #[error("could not load questions: {0}")]
    Content(#[source] ProviderError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// The result could not be stored. The session stays in `Submitting`
    /// and the same result can be resubmitted.
    #[error("could not submit, please retry ({attempts} attempt(s)): {source}")]
    PersistenceFailure {
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

impl EngineError {
    /// Returns `true` if the caller can retry the failed operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::PersistenceFailure { .. })
    }
}
