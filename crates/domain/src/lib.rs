//! Domain entities and invariants of the handoff protocol.

#![forbid(unsafe_code)]

mod claims;
mod grant;
mod identity;
mod qr_payload;
mod redirect_target;
mod short_code;

pub use claims::TokenClaims;
pub use grant::{
    AccessGrant, DEFAULT_PENDING_TOKEN_TTL_MINUTES, GrantAction, GrantOffer, GrantStatus,
    PENDING_TOKEN_BYTES, PENDING_TOKEN_LENGTH, PendingToken, is_well_formed_pending_token,
};
pub use identity::{APP_TAG_MAX_LENGTH, AppTag, EmailAddress};
pub use qr_payload::{QR_PAYLOAD_MAX_BYTES, QrPayload};
pub use redirect_target::{DestinationKind, RedirectTarget};
pub use short_code::{
    SHORT_CODE_BYTES, SHORT_CODE_LENGTH, SHORT_CODE_TTL_SECONDS, ShortCodeRecord,
    is_well_formed_short_code,
};
