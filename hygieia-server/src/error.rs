//! Uniform error envelope for HTTP responses.

use axum::Json;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{error, warn};

use hygieia_core::error::{ErrorKind, HygieiaError};

/// Error returned by every handler, rendered as
/// `{"error": {"kind": "...", "message": "..."}}`.
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

#[derive(Serialize)]
struct Envelope<'body> {
    error: EnvelopeBody<'body>,
}

#[derive(Serialize)]
struct EnvelopeBody<'body> {
    kind: ErrorKind,
    message: &'body str,
}

impl ApiError {
    /// A request the service refuses to process.
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::InvalidInput,
            message: message.into(),
        }
    }

    /// An unknown route or resource.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotFound,
            message: message.into(),
        }
    }

    /// Category of the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// HTTP status for the error category.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::MalformedRecord => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::ScorerFailure => StatusCode::BAD_GATEWAY,
            ErrorKind::StoreFailure | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<HygieiaError> for ApiError {
    fn from(err: HygieiaError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        Self::invalid_input(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::invalid_input(err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind.as_str(), message = %self.message, "request failed");
        } else {
            warn!(kind = self.kind.as_str(), message = %self.message, "request rejected");
        }

        let body = Envelope {
            error: EnvelopeBody {
                kind: self.kind,
                message: &self.message,
            },
        };
        (status, Json(body)).into_response()
    }
}
