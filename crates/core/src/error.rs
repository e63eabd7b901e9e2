//! Unified error types for kiri-offline.
//!
//! Everything the worker can fail on funnels through [`Error`]; module-local
//! concerns (URL resolution, configuration) keep their own error types and
//! are converted at the boundary where they meet the worker.

use tokio_rusqlite::rusqlite;

/// Unified error type shared by the cache store, the fetch pipeline, and the
/// worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache store operation failed.
    #[error("cache store error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("cache store migration failed: {0}")]
    MigrationFailed(String),

    /// Asset manifest could not be read or parsed.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// A resource identifier could not be resolved to a fetchable URL.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// An intercepted request could not be relayed upstream.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport-level fetch failure (connect, timeout, read).
    ///
    /// A completed HTTP exchange with a non-success status is NOT this error;
    /// the fetch strategies distinguish transport failure from HTTP outcome.
    #[error("upstream fetch failed: {0}")]
    Fetch(String),

    /// Response body exceeded the configured size limit.
    #[error("upstream response too large: {0}")]
    FetchTooLarge(String),

    /// Install-time population of the cache generation failed.
    ///
    /// Fatal for the worker version: it never becomes activatable and any
    /// previously active generation is left untouched.
    #[error("install failed: {0}")]
    InstallFailed(String),

    /// An event arrived in a lifecycle state that does not allow it.
    #[error("invalid worker state: expected {expected}, was {actual}")]
    InvalidState { expected: String, actual: String },
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
