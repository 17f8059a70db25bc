//! Account registration flows
//!
//! - `registration`: e-mail + one-time code (Vorwerk), plus import
//! - `password`: e-mail + password (MyJDownloader)
//! - `manager`: active flow instances keyed by flow id

pub mod manager;
pub mod password;
pub mod registration;

pub use manager::FlowManager;
pub use password::PasswordFlow;
pub use registration::RegistrationFlow;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{FlowError, RemoteError};
use crate::models::{ConfigEntry, DeviceRecord, Integration, Token};

/// Remote side of the one-time-code registration
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn send_code(&self, identifier: &str) -> Result<(), RemoteError>;

    /// Also installs the token on the backend's session
    async fn exchange_code(&self, identifier: &str, code: &str) -> Result<Token, RemoteError>;

    async fn devices(&self) -> Result<Vec<DeviceRecord>, RemoteError>;

    /// Raw persistent map objects keyed by robot serial
    async fn persistent_maps(
        &self,
        devices: &[DeviceRecord],
    ) -> Result<HashMap<String, Vec<Map<String, Value>>>, RemoteError>;

    async fn map_image(&self, url: &str) -> Result<Vec<u8>, RemoteError>;
}

/// Remote side of the password registration
#[async_trait]
pub trait PasswordBackend: Send + Sync {
    async fn login(&self, identifier: &str, password: &str) -> Result<Token, RemoteError>;

    async fn devices(&self) -> Result<Vec<DeviceRecord>, RemoteError>;
}

pub const STEP_USER: &str = "user";
pub const STEP_CODE: &str = "code";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowErrorCode {
    InvalidAuth,
    CannotConnect,
    Unknown,
}

impl From<&RemoteError> for FlowErrorCode {
    fn from(e: &RemoteError) -> Self {
        match e {
            RemoteError::Auth(_) => FlowErrorCode::InvalidAuth,
            RemoteError::Transport(_) => FlowErrorCode::CannotConnect,
            RemoteError::Malformed(_) => FlowErrorCode::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    AlreadyConfigured,
}

/// What a flow step hands back to the caller
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    Form {
        step_id: &'static str,
        #[serde(skip_serializing_if = "HashMap::is_empty")]
        errors: HashMap<&'static str, FlowErrorCode>,
    },
    CreateEntry {
        entry: ConfigEntry,
    },
    Abort {
        reason: AbortReason,
    },
}

impl FlowResult {
    pub fn form(step_id: &'static str) -> Self {
        FlowResult::Form {
            step_id,
            errors: HashMap::new(),
        }
    }

    pub fn form_error(step_id: &'static str, code: FlowErrorCode) -> Self {
        FlowResult::Form {
            step_id,
            errors: HashMap::from([("base", code)]),
        }
    }

    pub fn abort(reason: AbortReason) -> Self {
        FlowResult::Abort { reason }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlowInput {
    #[serde(default, alias = "email")]
    pub identifier: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Trimmed, non-empty form value
pub(crate) fn field(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
pub trait Flow: Send {
    fn integration(&self) -> Integration;

    /// The form shown before any input
    fn start(&self) -> FlowResult;

    async fn handle(&mut self, input: FlowInput) -> Result<FlowResult, FlowError>;
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_remote_error_codes() {
        assert_eq!(
            FlowErrorCode::from(&RemoteError::Auth("x".into())),
            FlowErrorCode::InvalidAuth
        );
        assert_eq!(
            FlowErrorCode::from(&RemoteError::Transport("x".into())),
            FlowErrorCode::CannotConnect
        );
        assert_eq!(
            FlowErrorCode::from(&RemoteError::Malformed("x".into())),
            FlowErrorCode::Unknown
        );
    }

    #[test]
    fn test_flow_result_serialization() {
        let form = serde_json::to_value(FlowResult::form_error(STEP_CODE, FlowErrorCode::InvalidAuth)).unwrap();
        assert_eq!(
            form,
            json!({"type": "form", "step_id": "code", "errors": {"base": "invalid_auth"}})
        );

        let abort = serde_json::to_value(FlowResult::abort(AbortReason::AlreadyConfigured)).unwrap();
        assert_eq!(abort, json!({"type": "abort", "reason": "already_configured"}));
    }

    #[test]
    fn test_input_accepts_email_alias() {
        let input: FlowInput = serde_json::from_value(json!({"email": "a@b.com"})).unwrap();
        assert_eq!(input.identifier.as_deref(), Some("a@b.com"));
        assert_eq!(field(Some("  ".into())), None);
    }
}
