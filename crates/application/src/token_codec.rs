//! Compact signed identity tokens passed across redirect boundaries.
//!
//! Wire form is three base64url (unpadded) segments joined by `.`: a fixed
//! `HS256` header, the JSON claims, and an HMAC-SHA256 over
//! `header.payload`. Tokens are never persisted; replay is bounded by the
//! short validity window chosen at issue time.

use std::collections::BTreeSet;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use handoff_core::{AppError, AppResult, Clock, SubjectId};
use handoff_domain::{AppTag, EmailAddress, TokenClaims};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::token_crypto::random_hex;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_HEADER: &str = r#"{"alg":"HS256","typ":"JWT"}"#;
const TOKEN_ALGORITHM: &str = "HS256";
const TOKEN_ID_BYTES: usize = 16;

/// Minimum accepted signing secret length in bytes.
pub const MIN_SIGNING_SECRET_BYTES: usize = 32;

/// Default tolerance for issuer clocks running ahead of the verifier.
pub const DEFAULT_MAX_CLOCK_SKEW_SECONDS: i64 = 30;

/// Issued token together with the claims it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    /// Encoded `header.payload.signature` string.
    pub value: String,
    /// Claims embedded in the payload segment.
    pub claims: TokenClaims,
}

#[derive(Debug, Deserialize)]
struct TokenHeader {
    alg: String,
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: Option<i64>,
    email: Option<String>,
    app: Option<String>,
    iat: Option<i64>,
    exp: Option<i64>,
    jti: Option<String>,
}

/// Issues and verifies signed identity tokens.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Arc<[u8]>,
    allowed_apps: Arc<BTreeSet<AppTag>>,
    clock: Arc<dyn Clock>,
    max_clock_skew: Duration,
}

impl TokenCodec {
    /// Creates a codec with a server-held secret and the apps allowed to
    /// appear in the `app` claim.
    pub fn new(
        secret: &[u8],
        allowed_apps: impl IntoIterator<Item = AppTag>,
        clock: Arc<dyn Clock>,
    ) -> AppResult<Self> {
        if secret.len() < MIN_SIGNING_SECRET_BYTES {
            return Err(AppError::Validation(format!(
                "token signing secret must be at least {MIN_SIGNING_SECRET_BYTES} bytes"
            )));
        }

        let allowed_apps: BTreeSet<AppTag> = allowed_apps.into_iter().collect();
        if allowed_apps.is_empty() {
            return Err(AppError::Validation(
                "at least one app must be allowed to issue tokens".to_owned(),
            ));
        }

        Ok(Self {
            secret: Arc::from(secret),
            allowed_apps: Arc::new(allowed_apps),
            clock,
            max_clock_skew: Duration::seconds(DEFAULT_MAX_CLOCK_SKEW_SECONDS),
        })
    }

    /// Overrides how far in the future an `iat` claim may lie.
    #[must_use]
    pub fn with_max_clock_skew(mut self, max_clock_skew: Duration) -> Self {
        self.max_clock_skew = max_clock_skew;
        self
    }

    /// Returns whether `app` is on the allow-list.
    #[must_use]
    pub fn is_allowed(&self, app: &AppTag) -> bool {
        self.allowed_apps.contains(app)
    }

    /// Issues a token vouching for `subject_id` on behalf of `app`.
    pub fn issue(
        &self,
        subject_id: SubjectId,
        email: &str,
        app: &AppTag,
        ttl: Duration,
    ) -> AppResult<SignedToken> {
        if ttl.num_seconds() <= 0 {
            return Err(AppError::Validation(
                "token ttl must be at least one second".to_owned(),
            ));
        }

        if !self.is_allowed(app) {
            return Err(AppError::UnauthorizedApp(app.to_string()));
        }

        let email = EmailAddress::new(email)?;
        let issued_at = self.clock.now().timestamp();
        let claims = TokenClaims {
            sub: subject_id,
            email: email.into(),
            app: app.clone(),
            iat: issued_at,
            exp: issued_at + ttl.num_seconds(),
            jti: random_hex(TOKEN_ID_BYTES)?,
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|error| AppError::Internal(format!("failed to encode claims: {error}")))?;
        let value = self.encode_signed(&payload)?;

        Ok(SignedToken { value, claims })
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks run in a fixed order: shape, signature, encoding, expiry,
    /// required claims, then the app allow-list.
    pub fn verify(&self, token: &str) -> AppResult<TokenClaims> {
        let segments: Vec<&str> = token.split('.').collect();
        let [header, payload, signature] = segments.as_slice() else {
            return Err(AppError::InvalidFormat(format!(
                "token must have 3 segments, found {}",
                segments.len()
            )));
        };

        if header.is_empty() || payload.is_empty() || signature.is_empty() {
            return Err(AppError::InvalidFormat(
                "token segments must not be empty".to_owned(),
            ));
        }

        let signing_input = &token[..header.len() + 1 + payload.len()];
        let expected_signature = self.sign(signing_input.as_bytes())?;
        let signature_matches = expected_signature.len() == signature.len()
            && bool::from(expected_signature.as_bytes().ct_eq(signature.as_bytes()));
        if !signature_matches {
            return Err(AppError::InvalidSignature);
        }

        let header: TokenHeader = decode_segment(header, "header")?;
        if header.alg != TOKEN_ALGORITHM {
            return Err(AppError::InvalidFormat(format!(
                "unsupported token algorithm '{}'",
                header.alg
            )));
        }

        let raw: RawClaims = decode_segment(payload, "payload")?;
        self.validate_claims(raw)
    }

    fn validate_claims(&self, raw: RawClaims) -> AppResult<TokenClaims> {
        let now = self.clock.now();

        let exp = raw.exp.ok_or_else(|| missing_claim("exp"))?;
        if now.timestamp() >= exp {
            return Err(AppError::Expired);
        }

        let sub = raw.sub.ok_or_else(|| missing_claim("sub"))?;
        let email = raw.email.ok_or_else(|| missing_claim("email"))?;
        let app = raw.app.ok_or_else(|| missing_claim("app"))?;
        let iat = raw.iat.ok_or_else(|| missing_claim("iat"))?;
        let jti = raw.jti.ok_or_else(|| missing_claim("jti"))?;

        let sub = SubjectId::new(sub)
            .map_err(|error| AppError::InvalidClaims(format!("invalid sub claim: {error}")))?;

        if email.trim().is_empty() || jti.trim().is_empty() {
            return Err(AppError::InvalidClaims(
                "email and jti claims must not be empty".to_owned(),
            ));
        }

        if iat > exp {
            return Err(AppError::InvalidClaims(
                "token expires before it was issued".to_owned(),
            ));
        }

        if iat > (now + self.max_clock_skew).timestamp() {
            return Err(AppError::InvalidClaims(
                "token was issued in the future".to_owned(),
            ));
        }

        let app = AppTag::new(app.as_str())
            .map_err(|_| AppError::UnauthorizedApp(app.clone()))?;
        if !self.is_allowed(&app) {
            return Err(AppError::UnauthorizedApp(app.to_string()));
        }

        Ok(TokenClaims {
            sub,
            email,
            app,
            iat,
            exp,
            jti,
        })
    }

    fn encode_signed(&self, payload: &[u8]) -> AppResult<String> {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(TOKEN_HEADER),
            URL_SAFE_NO_PAD.encode(payload)
        );
        let signature = self.sign(signing_input.as_bytes())?;

        Ok(format!("{signing_input}.{signature}"))
    }

    fn sign(&self, signing_input: &[u8]) -> AppResult<String> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.secret)
            .map_err(|error| AppError::Internal(format!("invalid signing key: {error}")))?;
        mac.update(signing_input);

        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

fn decode_segment<T: serde::de::DeserializeOwned>(segment: &str, name: &str) -> AppResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|error| AppError::InvalidFormat(format!("token {name} is not base64url: {error}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|error| AppError::InvalidFormat(format!("token {name} is not valid JSON: {error}")))
}

fn missing_claim(name: &str) -> AppError {
    AppError::InvalidClaims(format!("missing {name} claim"))
}
