//! Identity primitives carried across app boundaries.

use std::fmt::{Display, Formatter};

use handoff_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Maximum length of an app tag.
pub const APP_TAG_MAX_LENGTH: usize = 64;

/// Tag naming one independently deployed application (`calculator`,
/// `timekeeper`, ...).
///
/// Tags are lowercase ASCII letters, digits, `-` and `_`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AppTag(String);

impl AppTag {
    /// Creates a validated app tag.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();

        if value.is_empty() || value.len() > APP_TAG_MAX_LENGTH {
            return Err(AppError::Validation(format!(
                "app tag must be between 1 and {APP_TAG_MAX_LENGTH} characters"
            )));
        }

        let is_valid = value
            .chars()
            .all(|character| matches!(character, 'a'..='z' | '0'..='9' | '-' | '_'));
        if !is_valid {
            return Err(AppError::Validation(format!(
                "app tag '{value}' may only contain lowercase letters, digits, '-' and '_'"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for AppTag {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AppTag> for String {
    fn from(value: AppTag) -> Self {
        value.0
    }
}

impl Display for AppTag {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Validated, lowercased email address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Creates a validated email address.
    ///
    /// Performs structural validation only: one `@`, non-empty local part and
    /// a dotted domain.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        let trimmed = value.trim().to_lowercase();

        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "email address must not be empty".to_owned(),
            ));
        }

        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(AppError::Validation(
                "email address must contain exactly one '@'".to_owned(),
            ));
        };

        if local.is_empty() {
            return Err(AppError::Validation(
                "email local part must not be empty".to_owned(),
            ));
        }

        if domain.is_empty() || !domain.contains('.') || domain.contains('@') {
            return Err(AppError::Validation(
                "email domain must contain at least one '.' and no '@'".to_owned(),
            ));
        }

        if trimmed.len() > 254 {
            return Err(AppError::Validation(
                "email address must not exceed 254 characters".to_owned(),
            ));
        }

        Ok(Self(trimmed))
    }

    /// Returns the validated email string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}
