use handoff_core::SubjectId;
use serde::{Deserialize, Serialize};

use crate::AppTag;

/// Claims asserted by a signed identity token.
///
/// `iat` and `exp` are unix timestamps in seconds; the token is valid while
/// `exp` is strictly greater than the verifier's clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject the token vouches for.
    pub sub: SubjectId,
    /// Subject email, used to prefill the receiving app.
    pub email: String,
    /// App that issued the token.
    pub app: AppTag,
    /// Issued-at timestamp.
    pub iat: i64,
    /// Expiry timestamp.
    pub exp: i64,
    /// Random token id.
    pub jti: String,
}
