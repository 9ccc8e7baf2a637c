use thiserror::Error;

/// Errors surfaced by the study API client.
///
/// `Display` is the message shown to the user, so variants carry the
/// already-normalized text rather than wrapping it in extra context.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Build the user-facing message for a failed response body.
///
/// Prefers a JSON `detail` field, then the raw text, then `fallback`.
pub fn message_from_body(body: &str, fallback: &str) -> String {
    if body.trim().is_empty() {
        return fallback.to_string();
    }

    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => match value.get("detail") {
            Some(serde_json::Value::String(detail)) if !detail.is_empty() => detail.clone(),
            Some(serde_json::Value::String(_)) | Some(serde_json::Value::Null) | None => body.to_string(),
            Some(other) => other.to_string(),
        },
        Err(_) => body.to_string(),
    }
}

/// Raw body text or `fallback` when empty. Used by the notes endpoints,
/// which never unwrap `detail`.
pub fn text_or(body: &str, fallback: &str) -> String {
    if body.is_empty() {
        fallback.to_string()
    } else {
        body.to_string()
    }
}
