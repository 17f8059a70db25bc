//! Error handling module

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Failure talking to a vendor cloud.
///
/// Callers must be able to tell an expired/rejected credential apart from a
/// network problem: the first can be fixed by re-authenticating, the second
/// can only be retried on the next tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    #[error("Authentication rejected: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unexpected response: {0}")]
    Malformed(String),
}

impl RemoteError {
    pub fn is_auth(&self) -> bool {
        matches!(self, RemoteError::Auth(_))
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return RemoteError::Malformed(e.to_string());
        }
        match e.status() {
            Some(status) if status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN =>
            {
                RemoteError::Auth(e.to_string())
            }
            _ => RemoteError::Transport(e.to_string()),
        }
    }
}

/// Failure refreshing a single entity
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Unexpected value for '{key}': {value}")]
    TypeMismatch { key: &'static str, value: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Entry already configured: {integration}/{unique_id}")]
    Duplicate {
        integration: String,
        unique_id: String,
    },

    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store format error: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Flow not found: {0}")]
    NotFound(String),

    #[error("Flow already finished")]
    Finished,

    #[error("Missing input: {0}")]
    MissingInput(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Failure addressing a loaded entity or device
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Entity {0} is not a switch")]
    NotASwitch(String),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Device {0} does not offer this service")]
    Unsupported(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Hub(#[from] HubError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            AppError::Remote(e) if e.is_auth() => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Remote(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Flow(FlowError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Flow not found: {}", id))
            }
            AppError::Flow(FlowError::Store(e)) => (StatusCode::CONFLICT, e.to_string()),
            AppError::Flow(FlowError::Remote(e)) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Flow(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("Entry not found: {}", id))
            }
            AppError::Store(StoreError::Duplicate { .. }) => (StatusCode::CONFLICT, self.to_string()),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Hub(HubError::UnknownEntity(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::Hub(HubError::Remote(e)) if e.is_auth() => {
                (StatusCode::UNAUTHORIZED, e.to_string())
            }
            AppError::Hub(HubError::Remote(e)) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Hub(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_auth() {
        assert!(RemoteError::Auth("expired".into()).is_auth());
        assert!(!RemoteError::Transport("timeout".into()).is_auth());
        assert!(!RemoteError::Malformed("{".into()).is_auth());
    }

    #[test]
    fn test_app_error_status_codes() {
        let resp = AppError::Remote(RemoteError::Auth("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = AppError::Remote(RemoteError::Transport("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);

        let resp = AppError::Flow(FlowError::NotFound("abc".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::Store(StoreError::Duplicate {
            integration: "vorwerk".into(),
            unique_id: "a@b.com".into(),
        })
        .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = AppError::Hub(HubError::UnknownEntity("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::Hub(HubError::NotASwitch("x".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
