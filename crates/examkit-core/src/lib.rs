//! examkit-core: Timed examination session engine.
//!
//! This crate holds the exam data model, the session state machine and its
//! countdown clock, the navigator status projection, and the deterministic
//! result compiler. The async [`engine`] drives a session against the
//! collaborator traits in [`traits`].

pub mod clock;
pub mod engine;
pub mod error;
pub mod model;
pub mod parser;
pub mod report;
pub mod scoring;
pub mod session;
pub mod state;
pub mod status;
pub mod time;
pub mod traits;

pub use engine::{EngineConfig, ExamEngine, SessionControls, SessionHandle, SessionObserver};
pub use error::{CompileError, EngineError, ProviderError, QuestionSetError, SessionError};
pub use session::ExamSession;
