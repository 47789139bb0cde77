//! Identity error types.
//!
//! Each layer reports its own failure kinds; [`IdentityError`] is the tagged
//! taxonomy the HTTP boundary renders. Variants carry no caller-facing text:
//! status, code and message are derived at the edge.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::gateway::types::{ApiResponse, error_codes};

/// Credential codec failures.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed")]
    HashingFailure,
}

/// Session token codec failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("token signing failed")]
    SigningFailure,

    #[error("invalid or expired token")]
    InvalidToken,
}

/// User store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Login or email already taken.
    #[error("unique constraint violated")]
    ConstraintViolation,

    #[error("user not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Avatar delegate failures.
#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("avatar upload failed: {0}")]
    UploadFailure(String),

    #[error("unsupported avatar format")]
    UnsupportedFormat,

    #[error("avatar reference rejected")]
    Forbidden,

    #[error("avatar not found")]
    NotFound,

    #[error("avatar IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error kinds surfaced by the identity service.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum IdentityError {
    /// Malformed or incomplete input; carries the offending field.
    #[error("validation failed on `{0}`")]
    ValidationFailure(&'static str),

    #[error("login or email already in use")]
    Conflict,

    /// Missing/invalid/expired token or bad credentials. Deliberately opaque.
    #[error("unauthorized")]
    Unauthorized,

    #[error("resource not found")]
    NotFound,

    #[error("avatar upload failed")]
    UploadFailure,

    #[error("unsupported avatar format")]
    UnsupportedFormat,

    #[error("forbidden")]
    Forbidden,

    #[error("internal error")]
    Internal,
}

impl IdentityError {
    /// Numeric error code for API responses
    pub fn code(self) -> i32 {
        match self {
            IdentityError::ValidationFailure(_) => error_codes::INVALID_PARAMETER,
            IdentityError::Conflict => error_codes::ALREADY_EXISTS,
            IdentityError::Unauthorized => error_codes::AUTH_FAILED,
            IdentityError::NotFound => error_codes::NOT_FOUND,
            IdentityError::UploadFailure => error_codes::UPLOAD_FAILED,
            IdentityError::UnsupportedFormat => error_codes::UNSUPPORTED_FORMAT,
            IdentityError::Forbidden => error_codes::FORBIDDEN,
            IdentityError::Internal => error_codes::INTERNAL_ERROR,
        }
    }

    pub fn http_status(self) -> StatusCode {
        match self {
            IdentityError::ValidationFailure(_) | IdentityError::UnsupportedFormat => {
                StatusCode::BAD_REQUEST
            }
            IdentityError::Conflict => StatusCode::CONFLICT,
            IdentityError::Unauthorized => StatusCode::UNAUTHORIZED,
            IdentityError::NotFound => StatusCode::NOT_FOUND,
            IdentityError::Forbidden => StatusCode::FORBIDDEN,
            IdentityError::UploadFailure | IdentityError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Generic caller-facing message.
    pub fn message(self) -> String {
        match self {
            IdentityError::ValidationFailure("body") => "Malformed request body".to_string(),
            IdentityError::ValidationFailure(field) => {
                format!("Field '{}' is missing or invalid", field)
            }
            IdentityError::Conflict => "User with this login or email already exists".to_string(),
            IdentityError::Unauthorized => "Unauthorized".to_string(),
            IdentityError::NotFound => "Not found".to_string(),
            IdentityError::UploadFailure => "Server error".to_string(),
            IdentityError::UnsupportedFormat => "Unsupported image format".to_string(),
            IdentityError::Forbidden => "Access forbidden".to_string(),
            IdentityError::Internal => "Server error".to_string(),
        }
    }
}

impl From<StoreError> for IdentityError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ConstraintViolation => IdentityError::Conflict,
            StoreError::NotFound => IdentityError::NotFound,
            StoreError::Database(_) => IdentityError::Internal,
        }
    }
}

impl From<TokenError> for IdentityError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::InvalidToken => IdentityError::Unauthorized,
            TokenError::SigningFailure => IdentityError::Internal,
        }
    }
}

impl From<PasswordError> for IdentityError {
    fn from(_: PasswordError) -> Self {
        IdentityError::Internal
    }
}

impl From<AvatarError> for IdentityError {
    fn from(e: AvatarError) -> Self {
        match e {
            AvatarError::UploadFailure(_) => IdentityError::UploadFailure,
            AvatarError::UnsupportedFormat => IdentityError::UnsupportedFormat,
            AvatarError::Forbidden => IdentityError::Forbidden,
            AvatarError::NotFound => IdentityError::NotFound,
            AvatarError::Io(_) => IdentityError::Internal,
        }
    }
}

impl IntoResponse for IdentityError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::error(self.code(), self.message());
        (self.http_status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status() {
        assert_eq!(
            IdentityError::ValidationFailure("login").http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(IdentityError::Conflict.http_status(), StatusCode::CONFLICT);
        assert_eq!(
            IdentityError::Unauthorized.http_status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(IdentityError::Forbidden.http_status(), StatusCode::FORBIDDEN);
        assert_eq!(
            IdentityError::UnsupportedFormat.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            IdentityError::UploadFailure.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_mapping() {
        assert_eq!(
            IdentityError::from(StoreError::ConstraintViolation),
            IdentityError::Conflict
        );
        assert_eq!(
            IdentityError::from(StoreError::NotFound),
            IdentityError::NotFound
        );
        assert_eq!(
            IdentityError::from(StoreError::Database(sqlx::Error::PoolTimedOut)),
            IdentityError::Internal
        );
    }

    #[test]
    fn test_token_error_mapping() {
        assert_eq!(
            IdentityError::from(TokenError::InvalidToken),
            IdentityError::Unauthorized
        );
        assert_eq!(
            IdentityError::from(TokenError::SigningFailure),
            IdentityError::Internal
        );
    }

    #[test]
    fn test_messages_are_generic() {
        let internal = IdentityError::from(StoreError::Database(sqlx::Error::PoolTimedOut));
        assert_eq!(internal.message(), "Server error");
        assert_eq!(
            IdentityError::ValidationFailure("body").message(),
            "Malformed request body"
        );
        assert!(
            IdentityError::ValidationFailure("email")
                .message()
                .contains("email")
        );
    }
}
