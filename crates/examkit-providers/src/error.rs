//! Provider error types.
//!
//! Backends report failures with the core [`ProviderError`] so the session
//! engine can decide whether a failed persist is worth retrying. The helpers
//! here map transport failures onto it.

pub use examkit_core::error::ProviderError;

/// Map a `reqwest` send failure.
pub(crate) fn from_reqwest(e: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else {
        ProviderError::Network(e.to_string())
    }
}

/// Map an HTTP error status and body.
pub(crate) fn from_status(status: u16, body: String) -> ProviderError {
    match status {
        404 => ProviderError::NotFound(body),
        503 => ProviderError::Unavailable(body),
        _ => ProviderError::Api {
            status,
            message: body,
        },
    }
}
