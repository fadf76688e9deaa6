//! Shared primitives for all Rust crates in the handoff workspace.

#![forbid(unsafe_code)]

/// Time source abstraction shared by services and adapters.
pub mod clock;
/// Helpers that keep personal data out of operational logs.
pub mod redact;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use clock::{Clock, FixedClock, SystemClock};

/// Result type used across handoff crates.
pub type AppResult<T> = Result<T, AppError>;

/// Stable identifier of a user in the shared relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(i64);

impl SubjectId {
    /// Creates a validated subject identifier.
    pub fn new(value: i64) -> AppResult<Self> {
        if value <= 0 {
            return Err(AppError::Validation(format!(
                "subject id must be positive, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the underlying numeric value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for SubjectId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Error taxonomy of the handoff protocol.
///
/// Redemption paths surface `StorageUnavailable` to callers unchanged; only
/// counting paths such as rate limiting are allowed to swallow it.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input is structurally malformed (wrong segment count, bad encoding).
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// Signature did not match the recomputed value.
    #[error("invalid signature")]
    InvalidSignature,

    /// Required claims are missing or inconsistent.
    #[error("invalid claims: {0}")]
    InvalidClaims(String),

    /// Payload carries an action tag this build does not understand.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// Credential is past its expiry instant.
    #[error("credential expired")]
    Expired,

    /// Credential was already redeemed.
    #[error("credential already used")]
    AlreadyUsed,

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// App tag is not on the allow-list.
    #[error("unauthorized app: {0}")]
    UnauthorizedApp(String),

    /// Credential is valid but scoped to a different app or site.
    #[error("scope mismatch: {0}")]
    ScopeMismatch(String),

    /// Caller is not a party to the resource it tried to mutate.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller exceeded a rate limit window.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Backing store could not be reached.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}
