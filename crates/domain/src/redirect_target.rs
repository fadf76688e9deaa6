use handoff_core::{AppError, AppResult};
use url::Url;

const BLOCKED_SCHEMES: &[&str] = &["javascript", "data", "file", "blob", "vbscript", "about"];

/// How a destination is reached from a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    /// Ordinary `http`/`https` page.
    Web,
    /// Custom URL scheme registered by a native app.
    NativeApp,
}

/// Validated handoff destination.
///
/// The kind is derived from the URL scheme and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    url: Url,
    kind: DestinationKind,
}

impl RedirectTarget {
    /// Parses and classifies a destination URL.
    pub fn parse(value: &str) -> AppResult<Self> {
        let url = Url::parse(value.trim())
            .map_err(|error| AppError::Validation(format!("invalid redirect url: {error}")))?;
        Self::from_url(url)
    }

    /// Classifies an already parsed URL.
    pub fn from_url(url: Url) -> AppResult<Self> {
        let scheme = url.scheme();

        if BLOCKED_SCHEMES.contains(&scheme) {
            return Err(AppError::Validation(format!(
                "redirect scheme '{scheme}' is not allowed"
            )));
        }

        let kind = match scheme {
            "http" | "https" => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(AppError::Validation(
                        "web redirect url must include a host".to_owned(),
                    ));
                }
                DestinationKind::Web
            }
            _ => DestinationKind::NativeApp,
        };

        Ok(Self { url, kind })
    }

    /// Returns the destination kind.
    #[must_use]
    pub fn kind(&self) -> DestinationKind {
        self.kind
    }

    /// Returns the parsed URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Consumes the target, returning its URL.
    #[must_use]
    pub fn into_url(self) -> Url {
        self.url
    }
}
