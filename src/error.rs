//! Error taxonomy for the orchestration core.
//!
//! Collaborator failures are recoverable by stage-local fallbacks;
//! validation failures terminate the run with `error` set; not-found is
//! surfaced at the store/controller boundary. No variant ever crosses a
//! stage boundary uncaught: the executor converts stage errors into
//! well-formed error partials.

use thiserror::Error;
use uuid::Uuid;

/// Crate-wide result alias
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// An external collaborator call failed (generator, pinning, ledger)
    #[error("collaborator call failed: {0}")]
    Collaborator(String),

    /// A stage's required inputs are missing from the record
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown run id
    #[error("run {0} not found")]
    NotFound(Uuid),

    /// A run id was created twice
    #[error("run {0} already exists")]
    AlreadyExists(Uuid),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Collaborator(err.to_string())
    }
}
