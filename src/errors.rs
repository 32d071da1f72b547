//! LFS protocol error types.
//!
//! Every variant maps to a protocol status code and the uniform
//! `{"message": ...}` JSON envelope.  The enum implements
//! [`axum::response::IntoResponse`] so handlers can simply return
//! `Err(LfsError::ObjectNotFound)`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::handlers::lfs::LFS_CONTENT_TYPE;

/// Generate a 16-character hex request ID.
pub fn generate_request_id() -> String {
    let bytes: [u8; 8] = rand::random();
    hex::encode(bytes).to_uppercase()
}

/// LFS gateway errors expressed as a Rust enum.
#[derive(Debug, Error)]
pub enum LfsError {
    /// The request path does not bind a project scope.
    #[error("Request path does not resolve to a project scope")]
    InvalidScope,

    /// The request body was unreadable or ill-typed.
    #[error("{message}")]
    InvalidRequest { message: String },

    /// The auth hook rejected the supplied credentials.
    #[error("Invalid username or password")]
    Unauthorized,

    /// The requested object is absent (or its size did not match on
    /// verification).  Expected outcome, not a fault.
    #[error("Object not found")]
    ObjectNotFound,

    /// A storage backend call failed.  Never downgraded to "not found":
    /// telling a client to re-upload data that may already exist, or that
    /// data verified when the check never ran, is worse than a 5xx.
    #[error("Object storage is unavailable")]
    StorageUnavailable(#[source] anyhow::Error),

    /// Catch-all for unexpected internal errors.
    #[error("We encountered an internal error, please try again.")]
    Internal(#[from] anyhow::Error),
}

impl LfsError {
    /// Return the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            LfsError::InvalidScope => StatusCode::BAD_REQUEST,
            LfsError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            LfsError::Unauthorized => StatusCode::UNAUTHORIZED,
            LfsError::ObjectNotFound => StatusCode::NOT_FOUND,
            LfsError::StorageUnavailable(_) => StatusCode::BAD_GATEWAY,
            LfsError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LfsError {
    fn into_response(self) -> Response {
        let request_id = generate_request_id();
        let status = self.status_code();
        let date = httpdate::fmt_http_date(std::time::SystemTime::now());
        let body = serde_json::json!({ "message": self.to_string() }).to_string();
        let challenge = matches!(self, LfsError::Unauthorized);

        let mut response = (
            status,
            [
                ("content-type", LFS_CONTENT_TYPE.to_string()),
                ("x-request-id", request_id),
                ("date", date),
                ("server", "lfs-gateway".to_string()),
            ],
            body,
        )
            .into_response();

        // 401 carries the Basic challenge so git-lfs clients re-prompt.
        if challenge {
            response.headers_mut().insert(
                "www-authenticate",
                axum::http::HeaderValue::from_static(r#"Basic realm="Restricted Area""#),
            );
        }

        response
    }
}
