use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use handoff_core::AppError;
use serde::Serialize;
use tracing::{error, warn};

/// API error payload.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    code: &'static str,
    message: String,
}

/// HTTP API error wrapper around core application errors.
#[derive(Debug)]
pub enum ApiError {
    /// Failure raised by a service.
    App(AppError),
    /// Caller did not present a valid service credential.
    Unauthorized(String),
}

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self::App(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized(message) => (StatusCode::UNAUTHORIZED, "unauthorized", message),
            Self::App(error) => {
                let (status, code) = classify(&error);
                let message = match &error {
                    AppError::StorageUnavailable(detail) => {
                        warn!(%detail, "storage unavailable while serving request");
                        "storage is temporarily unavailable".to_owned()
                    }
                    AppError::Internal(detail) => {
                        error!(%detail, "internal error while serving request");
                        "internal error".to_owned()
                    }
                    other => other.to_string(),
                };
                (status, code, message)
            }
        };

        (status, Json(ErrorResponse { code, message })).into_response()
    }
}

fn classify(error: &AppError) -> (StatusCode, &'static str) {
    match error {
        AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
        AppError::InvalidFormat(_) => (StatusCode::BAD_REQUEST, "invalid_format"),
        AppError::UnknownAction(_) => (StatusCode::BAD_REQUEST, "unknown_action"),
        AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, "invalid_signature"),
        AppError::InvalidClaims(_) => (StatusCode::UNAUTHORIZED, "invalid_claims"),
        AppError::Expired => (StatusCode::GONE, "expired"),
        AppError::AlreadyUsed => (StatusCode::CONFLICT, "already_used"),
        AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AppError::UnauthorizedApp(_) => (StatusCode::FORBIDDEN, "unauthorized_app"),
        AppError::ScopeMismatch(_) => (StatusCode::FORBIDDEN, "scope_mismatch"),
        AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        AppError::StorageUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
        AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

/// Standard API result type.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use handoff_core::AppError;

    use super::ApiError;

    fn status_of(error: ApiError) -> StatusCode {
        error.into_response().status()
    }

    #[test]
    fn app_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(AppError::Validation(String::new()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(AppError::Expired.into()), StatusCode::GONE);
        assert_eq!(status_of(AppError::AlreadyUsed.into()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(AppError::ScopeMismatch(String::new()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AppError::RateLimited(String::new()).into()),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(AppError::StorageUnavailable(String::new()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn missing_service_credential_is_unauthorized() {
        assert_eq!(
            status_of(ApiError::Unauthorized("missing bearer".to_owned())),
            StatusCode::UNAUTHORIZED
        );
    }
}
