//! Opaque, single-use short codes handing a user from one app to another.
//!
//! Codes are random, live for a minute and are stored as SHA-256 hashes. A
//! redemption succeeds only when the conditional "mark used" write reports
//! that it flipped the row.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use handoff_core::redact::redact_code;
use handoff_core::{AppError, AppResult, Clock, SubjectId};
use handoff_domain::{
    AppTag, EmailAddress, RedirectTarget, SHORT_CODE_BYTES, SHORT_CODE_TTL_SECONDS,
    ShortCodeRecord, is_well_formed_short_code,
};

use crate::token_crypto::{generate_credential, hash_credential};

/// Repository port for short code persistence.
#[async_trait]
pub trait ShortCodeRepository: Send + Sync {
    /// Stores a freshly issued code.
    async fn insert_short_code(&self, record: &ShortCodeRecord) -> AppResult<()>;

    /// Finds a code by its hash regardless of state.
    async fn find_short_code(&self, code_hash: &str) -> AppResult<Option<ShortCodeRecord>>;

    /// Flips `used` from false to true while the code is unexpired at `now`.
    ///
    /// Returns `true` only for the caller whose write changed the row.
    async fn mark_short_code_used(&self, code_hash: &str, now: DateTime<Utc>) -> AppResult<bool>;

    /// Deletes codes that expired before the cutoff.
    async fn delete_expired_short_codes(&self, before: DateTime<Utc>) -> AppResult<u64>;
}

/// Input for issuing a short code.
#[derive(Debug, Clone)]
pub struct IssueShortCodeInput {
    /// Subject being handed off.
    pub subject_id: SubjectId,
    /// Subject email.
    pub email: String,
    /// Issuing app.
    pub app: AppTag,
    /// Where the receiving app should return the user.
    pub redirect_url: Option<String>,
}

/// A newly issued code and the row persisted for it.
#[derive(Debug, Clone)]
pub struct IssuedShortCode {
    /// Raw code; only ever returned here.
    pub code: String,
    /// Persisted record.
    pub record: ShortCodeRecord,
}

/// A failed redemption.
///
/// `app` is set once the code's row was found, so expired and spent codes
/// can still be routed to the app that issued them.
#[derive(Debug)]
pub struct ShortCodeRejection {
    /// App that issued the code, when known.
    pub app: Option<AppTag>,
    /// Why the redemption failed.
    pub error: AppError,
}

impl From<AppError> for ShortCodeRejection {
    fn from(error: AppError) -> Self {
        Self { app: None, error }
    }
}

/// Application service issuing and redeeming short codes.
#[derive(Clone)]
pub struct ShortCodeService {
    repository: Arc<dyn ShortCodeRepository>,
    clock: Arc<dyn Clock>,
}

impl ShortCodeService {
    /// Creates a new short code service.
    #[must_use]
    pub fn new(repository: Arc<dyn ShortCodeRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repository, clock }
    }

    /// Issues a new code valid for [`SHORT_CODE_TTL_SECONDS`].
    pub async fn issue(&self, input: IssueShortCodeInput) -> AppResult<IssuedShortCode> {
        let email = EmailAddress::new(input.email)?;
        let redirect_url = input
            .redirect_url
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(RedirectTarget::parse)
            .transpose()?
            .map(|target| target.into_url().to_string());

        let (code, code_hash) = generate_credential(SHORT_CODE_BYTES)?;
        let now = self.clock.now();
        let record = ShortCodeRecord {
            code_hash,
            app: input.app,
            subject_id: input.subject_id,
            email: email.into(),
            redirect_url,
            created_at: now,
            expires_at: now + Duration::seconds(SHORT_CODE_TTL_SECONDS),
            used: false,
        };

        self.repository.insert_short_code(&record).await?;

        info!(
            app = %record.app,
            code = %redact_code(&code),
            "issued short code"
        );

        Ok(IssuedShortCode { code, record })
    }

    /// Redeems a code exactly once.
    ///
    /// The code is marked used before this returns; callers build their
    /// redirect from the returned record.
    pub async fn redeem(&self, code: &str) -> AppResult<ShortCodeRecord> {
        self.redeem_for_redirect(code)
            .await
            .map_err(|rejection| rejection.error)
    }

    /// Redeems a code, keeping the issuing app on failures where the row
    /// was found so the caller can send the user back to that app.
    pub async fn redeem_for_redirect(
        &self,
        code: &str,
    ) -> Result<ShortCodeRecord, ShortCodeRejection> {
        if !is_well_formed_short_code(code) {
            return Err(AppError::InvalidFormat(
                "short code must be 32 lowercase hex characters".to_owned(),
            )
            .into());
        }

        let code_hash = hash_credential(code);
        let record = self
            .repository
            .find_short_code(&code_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("short code does not exist".to_owned()))?;

        let rejected = |error: AppError| ShortCodeRejection {
            app: Some(record.app.clone()),
            error,
        };

        if record.is_expired_at(self.clock.now()) {
            return Err(rejected(AppError::Expired));
        }

        if record.used {
            return Err(rejected(AppError::AlreadyUsed));
        }

        let now = self.clock.now();
        let marked = self
            .repository
            .mark_short_code_used(&code_hash, now)
            .await
            .map_err(rejected)?;

        if !marked {
            if record.is_expired_at(now) {
                info!(
                    app = %record.app,
                    code = %redact_code(code),
                    "short code expired before it could be marked used"
                );
                return Err(rejected(AppError::Expired));
            }

            warn!(
                app = %record.app,
                code = %redact_code(code),
                "short code redemption lost a concurrent race"
            );
            return Err(rejected(AppError::AlreadyUsed));
        }

        info!(
            app = %record.app,
            code = %redact_code(code),
            "redeemed short code"
        );

        Ok(ShortCodeRecord {
            used: true,
            ..record
        })
    }
}

#[cfg(test)]
mod tests;
