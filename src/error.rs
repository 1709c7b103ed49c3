//! Errors that abort a run before any target is touched.
//!
//! Everything that can go wrong on a single target is reported as a status line and recorded in
//! that target's [TargetOutcome] instead; see [mod@crate::copy_user].
//!
//! [TargetOutcome]: crate::copy_user::TargetOutcome

use crate::account::RecordError;
use thiserror::Error;

/// A fatal-to-run error.
#[derive(Debug, Error)]
pub enum Error {
    /// The invocation is missing something, or something in it is malformed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The source host did not answer the reachability probe.
    #[error("source host {0} is unreachable")]
    SourceUnreachable(String),

    /// The passwd lookup on the source host returned no record.
    #[error("source account {user} not found on {host}")]
    SourceAccountNotFound { user: String, host: String },

    /// The lookup command itself could not be run on the source host.
    #[error("failed to query {host}")]
    SourceLookup {
        host: String,
        source: anyhow::Error,
    },

    /// The source host returned a passwd entry we could not make sense of.
    #[error("malformed account record from source host")]
    Record(#[from] RecordError),
}

impl Error {
    /// Creates an [Error::InvalidConfig].
    pub fn config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }
}
