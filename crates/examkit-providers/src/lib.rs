//! examkit-providers: content and result-store backends.
//!
//! Implements the `ContentProvider` and `ResultStore` traits for local
//! question banks, JSON result directories, and HTTP backends, plus
//! in-memory mocks for tests.

pub mod config;
pub mod error;
pub mod file;
pub mod http;
pub mod mock;

pub use config::{
    create_content_provider, create_result_store, load_config, load_config_from, ContentConfig,
    ExamkitConfig, ResultsConfig,
};
pub use error::ProviderError;
