// Error handling module
// Maps transport and backend failures to fixed user-facing messages

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors surfaced by the client. The `Display` form is the user-facing
/// message; callers render it directly.
#[derive(Error, Debug)]
pub enum ApiError {
    /// A request attempt exceeded its per-attempt timeout
    #[error("request took too long")]
    Timeout,

    /// HTTP 401
    #[error("authentication invalid")]
    AuthInvalid,

    /// HTTP 403
    #[error("access denied")]
    AccessDenied,

    /// HTTP 404
    #[error("not found")]
    NotFound,

    /// HTTP 412
    #[error("precondition failed")]
    PreconditionFailed,

    /// 422/500 carrying a structured error document
    #[error("{reason}: {detail}")]
    ServerDetail { reason: String, detail: String },

    /// 422/500 without a usable error document
    #[error("{status} {reason}")]
    Server { status: u16, reason: String },

    /// Network-level failure, or a status outside the mapping table
    #[error("{0}")]
    Transport(String),

    /// Refresh-token store failure
    #[error("token store error: {0}")]
    Store(String),

    /// Invariant breakage inside the client itself
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Structured error document Drupal attaches to 422 and 500 responses.
#[derive(Debug, Deserialize)]
pub struct ErrorDocument {
    #[serde(default)]
    pub errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorEntry {
    pub status: Option<String>,
    pub detail: Option<String>,
}

impl ApiError {
    /// Normalize an error response into the fixed message table.
    ///
    /// `body` is consulted only for 422/500, where the backend may supply a
    /// structured `errors` list; anything unparsable falls back to the
    /// status line.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => ApiError::AuthInvalid,
            StatusCode::FORBIDDEN => ApiError::AccessDenied,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::PRECONDITION_FAILED => ApiError::PreconditionFailed,
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::INTERNAL_SERVER_ERROR => {
                let reason = canonical_reason(status);
                match first_error_detail(body) {
                    Some(detail) => ApiError::ServerDetail { reason, detail },
                    None => ApiError::Server {
                        status: status.as_u16(),
                        reason,
                    },
                }
            }
            _ => ApiError::Transport(format!("HTTP {} {}", status.as_u16(), canonical_reason(status))),
        }
    }
}

fn canonical_reason(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Status")
        .to_string()
}

/// Detail of the first entry in the backend's error list, if the body holds
/// one. Every entry is logged; absence of the document is a clean fallback.
fn first_error_detail(body: &str) -> Option<String> {
    let document: ErrorDocument = serde_json::from_str(body).ok()?;
    for entry in &document.errors {
        tracing::warn!(
            status = entry.status.as_deref().unwrap_or("-"),
            detail = entry.detail.as_deref().unwrap_or("-"),
            "backend error entry"
        );
    }
    document.errors.into_iter().next()?.detail
}
