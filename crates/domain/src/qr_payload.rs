//! Payloads rendered into scannable codes.
//!
//! A payload only references a pending token; it never carries authority on
//! its own. The wire form is compact JSON tagged by `action`:
//!
//! ```text
//! {"action":"join_site","app":"timekeeper","token":"…","site_id":"north-yard"}
//! ```

use std::str::FromStr;

use handoff_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

use crate::{AppTag, GrantAction, GrantOffer};

/// Upper bound on an encoded payload, well inside the byte capacity of a
/// medium error-correction QR code.
pub const QR_PAYLOAD_MAX_BYTES: usize = 512;

/// Structured content of a scannable code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum QrPayload {
    /// Link offer.
    Link {
        /// App the offer is scoped to.
        app: AppTag,
        /// Pending token.
        token: String,
        /// Optional label.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Crew assignment offer.
    Assign {
        /// App the offer is scoped to.
        app: AppTag,
        /// Pending token.
        token: String,
        /// Crew name.
        crew: String,
    },
    /// Job-site membership offer.
    JoinSite {
        /// App the offer is scoped to.
        app: AppTag,
        /// Pending token.
        token: String,
        /// Site identifier.
        site_id: String,
    },
}

impl QrPayload {
    /// Builds the payload advertising `offer` under `token`.
    #[must_use]
    pub fn for_offer(app: AppTag, token: impl Into<String>, offer: &GrantOffer) -> Self {
        let token = token.into();
        match offer {
            GrantOffer::Link { label } => Self::Link {
                app,
                token,
                label: label.clone(),
            },
            GrantOffer::Assign { crew } => Self::Assign {
                app,
                token,
                crew: crew.clone(),
            },
            GrantOffer::JoinSite { site_id } => Self::JoinSite {
                app,
                token,
                site_id: site_id.clone(),
            },
        }
    }

    /// Returns the app tag.
    #[must_use]
    pub fn app(&self) -> &AppTag {
        match self {
            Self::Link { app, .. } | Self::Assign { app, .. } | Self::JoinSite { app, .. } => app,
        }
    }

    /// Returns the referenced pending token.
    #[must_use]
    pub fn token(&self) -> &str {
        match self {
            Self::Link { token, .. } | Self::Assign { token, .. } | Self::JoinSite { token, .. } => {
                token.as_str()
            }
        }
    }

    /// Returns the action tag.
    #[must_use]
    pub fn action(&self) -> GrantAction {
        match self {
            Self::Link { .. } => GrantAction::Link,
            Self::Assign { .. } => GrantAction::Assign,
            Self::JoinSite { .. } => GrantAction::JoinSite,
        }
    }

    /// Returns the offer this payload claims to carry.
    #[must_use]
    pub fn offer(&self) -> GrantOffer {
        match self {
            Self::Link { label, .. } => GrantOffer::Link {
                label: label.clone(),
            },
            Self::Assign { crew, .. } => GrantOffer::Assign { crew: crew.clone() },
            Self::JoinSite { site_id, .. } => GrantOffer::JoinSite {
                site_id: site_id.clone(),
            },
        }
    }

    /// Serializes the payload to its compact wire form.
    pub fn encode(&self) -> AppResult<String> {
        let encoded = serde_json::to_string(self)
            .map_err(|error| AppError::Internal(format!("failed to encode QR payload: {error}")))?;

        if encoded.len() > QR_PAYLOAD_MAX_BYTES {
            return Err(AppError::Validation(format!(
                "QR payload is {} bytes, limit is {QR_PAYLOAD_MAX_BYTES}",
                encoded.len()
            )));
        }

        Ok(encoded)
    }

    /// Parses a scanned payload.
    ///
    /// Unrecognized `action` tags fail with [`AppError::UnknownAction`]; every
    /// other defect is [`AppError::InvalidFormat`].
    pub fn decode(value: &str) -> AppResult<Self> {
        if value.len() > QR_PAYLOAD_MAX_BYTES {
            return Err(AppError::InvalidFormat(format!(
                "QR payload exceeds {QR_PAYLOAD_MAX_BYTES} bytes"
            )));
        }

        let document: serde_json::Value = serde_json::from_str(value)
            .map_err(|error| AppError::InvalidFormat(format!("QR payload is not JSON: {error}")))?;

        let action = document
            .get("action")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                AppError::InvalidFormat("QR payload is missing an action tag".to_owned())
            })?;
        GrantAction::from_str(action)?;

        serde_json::from_value(document)
            .map_err(|error| AppError::InvalidFormat(format!("invalid QR payload: {error}")))
    }
}

#[cfg(test)]
mod tests;
