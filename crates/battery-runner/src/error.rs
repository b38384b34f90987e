use std::path::PathBuf;
use thiserror::Error;

/// Fatal harness errors. Test-case failures are not errors; they are recorded
/// as [`crate::driver::Outcome::Failure`] and the session keeps looping.
#[derive(Debug, Error)]
pub enum BatteryError {
    /// No runnable test suites, or a malformed suite registration.
    #[error("registry error: {0}")]
    Registry(String),

    /// The optional pre-loop compile collaborator failed.
    #[error("compile step failed: {0}")]
    Build(String),

    /// Sandbox create/remove failed. This is an environment problem, not a
    /// test problem; continuing without isolation would contaminate every
    /// later attempt, so the session aborts.
    #[error("sandbox {op} failed for {path}: {source}")]
    Sandbox {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The durable progress log or report could not be written.
    #[error("record keeping failed for {path}: {message}")]
    Record { path: PathBuf, message: String },
}
