//! Browser-facing responses of the public handoff flows.
//!
//! Web destinations receive a `303 See Other`. Native app schemes receive a
//! tiny HTML page that refreshes into the deep link, since browsers do not
//! reliably follow redirects into custom schemes.

use std::collections::BTreeMap;

use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use handoff_core::{AppError, AppResult, SubjectId};
use handoff_domain::{AppTag, DestinationKind, RedirectTarget};
use url::Url;

/// Public flow a redirect belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffFlow {
    /// `GET /r/{code}`.
    ShortCode,
    /// `GET /handoff?token=`.
    SignedToken,
}

impl HandoffFlow {
    /// Label used in logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShortCode => "short_code",
            Self::SignedToken => "signed_token",
        }
    }

    /// Maps a failure to the `error` parameter receiving apps understand.
    #[must_use]
    pub fn error_code(self, error: &AppError) -> &'static str {
        match (self, error) {
            (_, AppError::RateLimited(_)) => "rate_limited",
            (Self::ShortCode, AppError::InvalidFormat(_) | AppError::NotFound(_)) => {
                "invalid_code"
            }
            (Self::ShortCode, AppError::Expired) => "expired_code",
            (Self::ShortCode, AppError::AlreadyUsed) => "used_code",
            (
                Self::SignedToken,
                AppError::InvalidFormat(_) | AppError::InvalidSignature | AppError::InvalidClaims(_),
            ) => "invalid_token",
            (Self::SignedToken, AppError::Expired) => "expired_token",
            (Self::SignedToken, AppError::UnauthorizedApp(_)) => "unauthorized_app",
            _ => "unavailable",
        }
    }
}

/// Where each app receives handed-off users.
#[derive(Debug, Clone)]
pub struct HandoffDestinations {
    fallback: RedirectTarget,
    per_app: BTreeMap<AppTag, RedirectTarget>,
}

impl HandoffDestinations {
    #[must_use]
    pub fn new(fallback: RedirectTarget, per_app: BTreeMap<AppTag, RedirectTarget>) -> Self {
        Self { fallback, per_app }
    }

    /// Destination of `app`, or the fallback when it has none of its own.
    #[must_use]
    pub fn for_app(&self, app: &AppTag) -> &RedirectTarget {
        self.per_app.get(app).unwrap_or(&self.fallback)
    }

    /// Destination used when the app is unknown, such as unknown codes.
    #[must_use]
    pub fn fallback(&self) -> &RedirectTarget {
        &self.fallback
    }
}

/// Hands the user to `target` with their identity attached.
pub fn success_redirect(
    target: &RedirectTarget,
    subject_id: SubjectId,
    email: &str,
    redirect: Option<&str>,
) -> Response {
    let user_id = subject_id.to_string();
    let mut pairs = vec![("user_id", user_id.as_str()), ("prefilled_email", email)];
    if let Some(redirect) = redirect {
        pairs.push(("redirect", redirect));
    }

    respond(target.kind(), with_query(target.url(), &pairs))
}

/// Sends the user to `target` carrying only an `error` code.
pub fn failure_redirect(target: &RedirectTarget, error_code: &str) -> Response {
    respond(target.kind(), with_query(target.url(), &[("error", error_code)]))
}

/// Builds an absolute link under the public base URL.
pub fn public_link(base: &Url, segments: &[&str]) -> AppResult<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| AppError::Internal("public base url cannot carry a path".to_owned()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn with_query(url: &Url, pairs: &[(&str, &str)]) -> Url {
    let mut url = url.clone();
    url.query_pairs_mut().extend_pairs(pairs);
    url
}

fn respond(kind: DestinationKind, url: Url) -> Response {
    let common_headers = [
        (header::CACHE_CONTROL, "no-store"),
        (header::REFERRER_POLICY, "no-referrer"),
    ];

    match kind {
        DestinationKind::Web => (
            StatusCode::SEE_OTHER,
            common_headers,
            [(header::LOCATION, url.as_str())],
        )
            .into_response(),
        DestinationKind::NativeApp => {
            (StatusCode::OK, common_headers, Html(bounce_page(&url))).into_response()
        }
    }
}

fn bounce_page(url: &Url) -> String {
    let href = escape_html(url.as_str());
    format!(
        "<!doctype html>\n\
         <html lang=\"en\">\n\
         <head>\n\
         <meta charset=\"utf-8\">\n\
         <meta name=\"referrer\" content=\"no-referrer\">\n\
         <meta http-equiv=\"refresh\" content=\"0;url={href}\">\n\
         <title>Opening app</title>\n\
         </head>\n\
         <body>\n\
         <p>Opening the app. <a href=\"{href}\">Continue</a> if nothing happens.</p>\n\
         </body>\n\
         </html>\n"
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for character in value.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}
