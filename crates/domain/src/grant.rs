//! Access-grant offers and the durable grants they turn into.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use handoff_core::{AppError, AppResult, SubjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::AppTag;
use crate::short_code::is_lower_hex;

/// Random bytes behind each pending token.
pub const PENDING_TOKEN_BYTES: usize = 24;

/// Rendered length of a pending token (lowercase hex).
pub const PENDING_TOKEN_LENGTH: usize = PENDING_TOKEN_BYTES * 2;

/// Default lifetime of a pending token in minutes.
pub const DEFAULT_PENDING_TOKEN_TTL_MINUTES: i64 = 10;

const OFFER_FIELD_MAX_LENGTH: usize = 80;

/// Kind of relationship an offer creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAction {
    /// Link a supervisor's app to the issuer's data.
    Link,
    /// Assign the grantee to one of the issuer's crews.
    Assign,
    /// Let the grantee join one of the issuer's job sites.
    JoinSite,
}

impl GrantAction {
    /// Returns a stable storage and transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Assign => "assign",
            Self::JoinSite => "join_site",
        }
    }
}

impl FromStr for GrantAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "link" => Ok(Self::Link),
            "assign" => Ok(Self::Assign),
            "join_site" => Ok(Self::JoinSite),
            _ => Err(AppError::UnknownAction(value.to_owned())),
        }
    }
}

/// What the issuer offers, including the action's parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum GrantOffer {
    /// Generic link with an optional human label.
    Link {
        /// Label shown to both parties.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Crew assignment.
    Assign {
        /// Crew name.
        crew: String,
    },
    /// Job-site membership.
    JoinSite {
        /// Site identifier.
        site_id: String,
    },
}

impl GrantOffer {
    /// Returns the action kind of this offer.
    #[must_use]
    pub fn action(&self) -> GrantAction {
        match self {
            Self::Link { .. } => GrantAction::Link,
            Self::Assign { .. } => GrantAction::Assign,
            Self::JoinSite { .. } => GrantAction::JoinSite,
        }
    }

    /// Returns the label a grant created from this offer carries.
    #[must_use]
    pub fn grant_label(&self) -> Option<String> {
        match self {
            Self::Link { label } => label.clone(),
            Self::Assign { crew } => Some(crew.clone()),
            Self::JoinSite { site_id } => Some(site_id.clone()),
        }
    }

    /// Checks parameter shape.
    pub fn validate(&self) -> AppResult<()> {
        match self {
            Self::Link { label: None } => Ok(()),
            Self::Link { label: Some(label) } => validate_offer_field("label", label),
            Self::Assign { crew } => validate_offer_field("crew", crew),
            Self::JoinSite { site_id } => validate_offer_field("site_id", site_id),
        }
    }
}

fn validate_offer_field(name: &str, value: &str) -> AppResult<()> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    if value.chars().count() > OFFER_FIELD_MAX_LENGTH {
        return Err(AppError::Validation(format!(
            "{name} must not exceed {OFFER_FIELD_MAX_LENGTH} characters"
        )));
    }

    Ok(())
}

/// Persisted, single-use access-grant offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingToken {
    /// SHA-256 hash of the token, lowercase hex.
    pub token_hash: String,
    /// Subject making the offer; becomes the grantor.
    pub issuer_id: SubjectId,
    /// App the resulting grant is scoped to.
    pub app_scope: AppTag,
    /// Offered action and parameters.
    pub offer: GrantOffer,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Consumption timestamp; set exactly once.
    pub consumed_at: Option<DateTime<Utc>>,
}

impl PendingToken {
    /// Returns the action kind of the offer.
    #[must_use]
    pub fn action(&self) -> GrantAction {
        self.offer.action()
    }

    /// Returns `true` once `now` has reached the expiry instant.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Returns `true` when `value` has the exact shape of an issued pending token.
#[must_use]
pub fn is_well_formed_pending_token(value: &str) -> bool {
    is_lower_hex(value, PENDING_TOKEN_LENGTH)
}

/// Lifecycle state of an access grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantStatus {
    /// Grant is in force.
    Active,
    /// Grant was revoked; terminal.
    Revoked,
}

impl GrantStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Revoked => "revoked",
        }
    }
}

impl FromStr for GrantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "revoked" => Ok(Self::Revoked),
            _ => Err(AppError::Internal(format!(
                "unknown grant status value '{value}'"
            ))),
        }
    }
}

/// Durable relationship letting the grantee see the grantor's data in one app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// Grant id.
    pub id: Uuid,
    /// Subject whose data is shared.
    pub grantor_id: SubjectId,
    /// Subject receiving access.
    pub grantee_id: SubjectId,
    /// App the grant is scoped to.
    pub app_scope: AppTag,
    /// Optional human label.
    pub label: Option<String>,
    /// Lifecycle state.
    pub status: GrantStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Revocation timestamp.
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessGrant {
    /// Builds a fresh active grant.
    #[must_use]
    pub fn new_active(
        grantor_id: SubjectId,
        grantee_id: SubjectId,
        app_scope: AppTag,
        label: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            grantor_id,
            grantee_id,
            app_scope,
            label,
            status: GrantStatus::Active,
            created_at,
            revoked_at: None,
        }
    }

    /// Returns whether the grant is still in force.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }

    /// Returns whether `subject_id` is the grantor or the grantee.
    #[must_use]
    pub fn involves(&self, subject_id: SubjectId) -> bool {
        self.grantor_id == subject_id || self.grantee_id == subject_id
    }
}
