use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use daap_codec::DaapObject;

/// HTTP-facing error: a resolved status code plus a human-readable
/// message. `daap_core::Error` is the only thing allowed to cross into
/// this type — see `From<daap_core::Error>` below for the exact
/// status-code mapping.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_IMPLEMENTED, message)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl From<daap_core::Error> for AppError {
    fn from(err: daap_core::Error) -> Self {
        use daap_core::Error;

        match err {
            Error::Codec(_) | Error::BadRange(_) | Error::BadQueryArg(_) => {
                Self::bad_request(err.to_string())
            }
            Error::NotFound(_) => Self::new(StatusCode::NOT_FOUND, err.to_string()),
            Error::RevisionGone { .. } | Error::RevisionInFuture { .. } => {
                Self::bad_request(err.to_string())
            }
            Error::Unauthorized => Self::unauthorized(err.to_string()),
            Error::UnknownSession(_) => Self::new(StatusCode::FORBIDDEN, err.to_string()),
            Error::NotSupported(_) => Self::not_implemented(err.to_string()),
            Error::ReadOnlyRevision(_) | Error::DeletedParent(_) => {
                tracing::error!(error = %err, "programmer error: store contract violated");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
            Error::Cancelled => Self::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            Error::Internal(_) => {
                tracing::error!(error = %err, "unexpected internal error");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::warn!(status = %self.status, message = %self.message, "request failed");
        }

        let body = DaapObject::new("dmap.status", self.status.as_u16() as u32)
            .ok()
            .and_then(|object| object.encode().ok());

        match body {
            Some(bytes) => (
                self.status,
                [(axum::http::header::CONTENT_TYPE, "application/x-dmap-tagged")],
                bytes,
            )
                .into_response(),
            None => self.status.into_response(),
        }
    }
}
