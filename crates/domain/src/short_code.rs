use chrono::{DateTime, Utc};
use handoff_core::SubjectId;

use crate::AppTag;

/// Lifetime of a short code.
pub const SHORT_CODE_TTL_SECONDS: i64 = 60;

/// Random bytes behind each short code.
pub const SHORT_CODE_BYTES: usize = 16;

/// Rendered length of a short code (lowercase hex).
pub const SHORT_CODE_LENGTH: usize = SHORT_CODE_BYTES * 2;

/// Persisted short code row.
///
/// The raw code is never stored; rows are keyed by its SHA-256 hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortCodeRecord {
    /// SHA-256 hash of the code, lowercase hex.
    pub code_hash: String,
    /// App that issued the code.
    pub app: AppTag,
    /// Subject handed off by the code.
    pub subject_id: SubjectId,
    /// Subject email.
    pub email: String,
    /// Where the receiving app should send the user afterwards.
    pub redirect_url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether the code has been redeemed.
    pub used: bool,
}

impl ShortCodeRecord {
    /// Returns `true` once `now` has reached the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Returns `true` when `value` has the exact shape of an issued short code.
#[must_use]
pub fn is_well_formed_short_code(value: &str) -> bool {
    is_lower_hex(value, SHORT_CODE_LENGTH)
}

pub(crate) fn is_lower_hex(value: &str, expected_len: usize) -> bool {
    value.len() == expected_len
        && value
            .bytes()
            .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
}
