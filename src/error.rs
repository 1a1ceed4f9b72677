use std::time::Duration;

use thiserror::Error;

use crate::models::RunSummary;

/// Errors raised at the browsing session boundary.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("timed out after {waited:?} waiting for {what}")]
    Timeout { what: String, waited: Duration },

    #[error("browser interaction failed: {0}")]
    Interaction(String),

    #[error("browser session unavailable: {0}")]
    Unavailable(String),
}

impl SessionError {
    /// Only a dead session stops the whole run; everything else is local to one posting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Unavailable(_))
    }
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("results container did not render within {waited:?}")]
    LocatorTimeout { waited: Duration },

    #[error(transparent)]
    Session(SessionError),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("failed to write application record: {0}")]
    Write(#[from] rusqlite::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0} environment variable not set")]
    MissingCredentials(&'static str),

    #[error("login was not accepted: {0}")]
    Rejected(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("browser session lost, run halted after {} posting(s): {reason}", .summary.total())]
    SessionLost { reason: String, summary: RunSummary },
}
