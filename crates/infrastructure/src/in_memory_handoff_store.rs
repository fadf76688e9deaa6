//! In-memory store implementing every handoff repository port.
//!
//! Each table sits behind its own lock, and every conditional write takes the
//! write lock for its whole check-and-set so it matches the single-statement
//! updates of the PostgreSQL adapters.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use handoff_application::AttemptInfo;
use handoff_core::{AppError, AppResult};
use handoff_domain::{AccessGrant, PendingToken, ShortCodeRecord};
use tokio::sync::RwLock;
use uuid::Uuid;

mod access_grants;
mod rate_limits;
mod short_codes;

/// In-memory handoff store.
#[derive(Debug, Default)]
pub struct InMemoryHandoffStore {
    short_codes: RwLock<HashMap<String, ShortCodeRecord>>,
    pending_tokens: RwLock<HashMap<String, PendingToken>>,
    grants: RwLock<HashMap<Uuid, AccessGrant>>,
    rate_limits: RwLock<HashMap<String, AttemptInfo>>,
    unavailable: AtomicBool,
}

impl InMemoryHandoffStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: every call fails with
    /// [`AppError::StorageUnavailable`] until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::StorageUnavailable(
                "in-memory store is marked unavailable".to_owned(),
            ));
        }

        Ok(())
    }
}
