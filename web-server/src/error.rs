// web-server/src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use common::ErrorBody;
use thiserror::Error;

/// Failure classes of the verification endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed request shape
    Format,
    /// Signature or token check failed
    Verification,
    /// Unexpected fault; detail stays server-side
    Internal,
}

/// Errors returned by the auth handlers.
///
/// The `Display` text is exactly what the client receives in `{error}`.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid request body")]
    MalformedBody,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Invalid SIWF message format")]
    InvalidHostMessage,

    #[error("Missing required fields")]
    MissingFields,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("SIWF verification failed")]
    HostVerificationFailed,

    #[error("Unauthorized")]
    MissingBearer,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Authentication failed")]
    Internal(String),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedBody
            | Self::PayloadTooLarge
            | Self::InvalidHostMessage
            | Self::MissingFields => ErrorKind::Format,
            Self::InvalidSignature
            | Self::HostVerificationFailed
            | Self::MissingBearer
            | Self::InvalidToken => ErrorKind::Verification,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        if let Self::PayloadTooLarge = self {
            return StatusCode::PAYLOAD_TOO_LARGE;
        }
        match self.kind() {
            ErrorKind::Format => StatusCode::BAD_REQUEST,
            ErrorKind::Verification => StatusCode::UNAUTHORIZED,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let Self::Internal(detail) = self {
            tracing::error!("Authentication error: {}", detail);
        }
        HttpResponse::build(self.status_code()).json(ErrorBody::new(self.to_string()))
    }
}
