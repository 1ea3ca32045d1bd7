//! Error types for the harness.
//!
//! Errors are split by the lifecycle stage that produced them, mirroring the
//! failure taxonomy of a suite run:
//!
//! | Error | Stage | Effect on the run |
//! |-------|-------|-------------------|
//! | [`SetupError`] | principal purge / registration | fatal, no scenario runs |
//! | [`SyncError`] | per-scenario resync | fatal, remaining scenarios are skipped |
//! | [`ContractViolation`] | scenario assertion | the scenario fails |
//! | [`ClientError`] | any HTTP exchange | wrapped by one of the above or reported as errored |
//!
//! Expected-negative responses (404 for a missing post, 500 for a duplicate
//! id) are never errors; scenarios assert them.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the HTTP client layer.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("cannot resolve path {path} against base URL: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{method} {path} failed: {source}")]
    Transport {
        method: String,
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{method} {path} returned {status}: {body}")]
    UnexpectedStatus {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response of {method} {path}: {source}")]
    Decode {
        method: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Suite setup failures: principal purge and registration.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("failed to list principals: {0}")]
    ListPrincipals(#[source] ClientError),

    #[error("failed to delete principal {id} after removing {removed} of {total}: {source}")]
    DeletePrincipal {
        id: u64,
        removed: usize,
        total: usize,
        #[source]
        source: ClientError,
    },

    #[error("registration of {email} was rejected: {source}")]
    Register {
        email: String,
        #[source]
        source: ClientError,
    },

    #[error("registration response for {email} carried no access token")]
    MissingToken { email: String },
}

/// The phase of a resync in which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Listing the current remote collection.
    Fetch,
    /// Deleting every listed post.
    Drain,
    /// Recreating the baseline posts.
    Seed,
    /// Comparing the remote collection with the baseline.
    Verify,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncPhase::Fetch => write!(f, "fetch"),
            SyncPhase::Drain => write!(f, "drain"),
            SyncPhase::Seed => write!(f, "seed"),
            SyncPhase::Verify => write!(f, "verify"),
        }
    }
}

/// A resync failure with partial-progress counts.
///
/// After a `SyncError` the remote collection is in an indeterminate state:
/// `completed` items of the phase were applied, the rest were not.
#[derive(Error, Debug)]
#[error("{phase} phase stopped after {completed} of {total} item(s): {cause}")]
pub struct SyncError {
    pub phase: SyncPhase,
    pub completed: usize,
    pub total: usize,
    /// Id of the post being processed when the phase stopped.
    pub id: Option<u64>,
    #[source]
    pub cause: SyncCause,
}

/// Underlying cause of a [`SyncError`].
#[derive(Error, Debug)]
pub enum SyncCause {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("remote collection diverges from baseline: {0}")]
    Diverged(String),

    #[error("remote item has no integer id and cannot be deleted: {0}")]
    MissingId(String),
}

/// A response did not satisfy the contract asserted by a scenario.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{request}: {message}")]
pub struct ContractViolation {
    /// The request under test, e.g. `GET /posts/1`.
    pub request: String,
    pub message: String,
}

impl ContractViolation {
    pub fn new(request: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            message: message.into(),
        }
    }
}

/// Errors loading or indexing the baseline snapshot.
#[derive(Error, Debug)]
pub enum BaselineError {
    #[error("failed to read baseline {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse baseline: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("baseline contains duplicate post id {0}")]
    DuplicateId(u64),

    #[error("baseline has {len} post(s), index {index} is out of range")]
    MissingIndex { index: usize, len: usize },
}

/// Errors reading the persisted store directly.
#[derive(Error, Debug)]
pub enum LiveStateError {
    #[error("store file {0} does not exist")]
    NotFound(PathBuf),

    #[error("failed to read store file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store file {0} has no `posts` collection")]
    MissingPosts(PathBuf),
}

/// Umbrella error for harness operations.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Contract(#[from] ContractViolation),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error(transparent)]
    LiveState(#[from] LiveStateError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_reports_progress() {
        let err = SyncError {
            phase: SyncPhase::Drain,
            completed: 2,
            total: 5,
            id: Some(3),
            cause: SyncCause::Client(ClientError::UnexpectedStatus {
                method: "DELETE".to_string(),
                path: "/posts/3".to_string(),
                status: 500,
                body: "boom".to_string(),
            }),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("drain phase stopped after 2 of 5"));
        assert!(msg.contains("DELETE /posts/3 returned 500"));
    }

    #[test]
    fn test_contract_violation_display() {
        let violation = ContractViolation::new("GET /posts/1", "expected status 200, got 404");
        assert_eq!(
            violation.to_string(),
            "GET /posts/1: expected status 200, got 404"
        );
    }

    #[test]
    fn test_harness_error_from_contract() {
        let err: HarnessError = ContractViolation::new("GET /posts", "bad").into();
        assert!(matches!(err, HarnessError::Contract(_)));
    }
}
