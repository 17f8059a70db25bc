//! Switch capabilities
//!
//! Each capability is a row in a table: which remote operations query,
//! enable and disable it, and how the raw query reply maps onto
//! `SwitchState`. The switch adapter itself is identical for all of them.

use serde::Serialize;
use serde_json::Value;

use super::Operation;
use crate::error::AdapterError;
use crate::jdownloader::{OP_CURRENT_STATE, OP_LIMIT_DISABLE, OP_LIMIT_ENABLE, OP_LIMIT_STATUS, OP_PAUSE};
use crate::models::SwitchState;
use crate::vorwerk::robot::{CMD_DISABLE_SCHEDULE, CMD_ENABLE_SCHEDULE, CMD_GET_ROBOT_STATE};
use crate::vorwerk::state::RobotState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    /// On means downloads are paused
    Pause,
    /// On means the download speed limit is active
    Limit,
    /// On means the robot cleaning schedule is active
    Schedule,
}

pub struct CapabilitySpec {
    pub key: &'static str,
    pub name_template: &'static str,
    pub icon: &'static str,
    pub query: Operation,
    pub enable: Operation,
    pub disable: Operation,
    pub map_state: fn(&Value) -> Result<SwitchState, AdapterError>,
}

static PAUSE: CapabilitySpec = CapabilitySpec {
    key: "pause",
    name_template: "JDownloader {device} Pause",
    icon: "mdi:play-pause",
    query: Operation::new(OP_CURRENT_STATE),
    enable: Operation::with_arg(OP_PAUSE, true),
    disable: Operation::with_arg(OP_PAUSE, false),
    map_state: pause_state,
};

static LIMIT: CapabilitySpec = CapabilitySpec {
    key: "limit",
    name_template: "JDownloader {device} Limit",
    icon: "mdi:download-lock",
    query: Operation::new(OP_LIMIT_STATUS),
    enable: Operation::new(OP_LIMIT_ENABLE),
    disable: Operation::new(OP_LIMIT_DISABLE),
    map_state: limit_state,
};

static SCHEDULE: CapabilitySpec = CapabilitySpec {
    key: "schedule",
    name_template: "{device} Schedule",
    icon: "mdi:calendar-clock",
    query: Operation::new(CMD_GET_ROBOT_STATE),
    enable: Operation::new(CMD_ENABLE_SCHEDULE),
    disable: Operation::new(CMD_DISABLE_SCHEDULE),
    map_state: schedule_state,
};

impl Capability {
    pub fn spec(self) -> &'static CapabilitySpec {
        match self {
            Capability::Pause => &PAUSE,
            Capability::Limit => &LIMIT,
            Capability::Schedule => &SCHEDULE,
        }
    }
}

fn mismatch(key: &'static str, value: &Value) -> AdapterError {
    AdapterError::TypeMismatch {
        key,
        value: value.to_string(),
    }
}

/// Download controller state string; `"PAUSE"` in any case means paused
pub fn pause_state(value: &Value) -> Result<SwitchState, AdapterError> {
    match value {
        Value::Null => Ok(SwitchState::Unknown),
        Value::String(s) if s.is_empty() => Ok(SwitchState::Unknown),
        Value::String(s) => Ok(SwitchState::from(s.eq_ignore_ascii_case("pause"))),
        other => Err(mismatch("pause", other)),
    }
}

/// Speed limit flag, either bare or inside the toolbar status object
pub fn limit_state(value: &Value) -> Result<SwitchState, AdapterError> {
    match value {
        Value::Null => Ok(SwitchState::Unknown),
        Value::Bool(on) => Ok(SwitchState::from(*on)),
        Value::Object(status) => match status.get("limit") {
            Some(Value::Bool(on)) => Ok(SwitchState::from(*on)),
            _ => Err(mismatch("limit", value)),
        },
        other => Err(mismatch("limit", other)),
    }
}

/// `details.isScheduleEnabled` of the robot state
pub fn schedule_state(value: &Value) -> Result<SwitchState, AdapterError> {
    match value {
        Value::Null => Ok(SwitchState::Unknown),
        Value::Object(state) if state.is_empty() => Ok(SwitchState::Unknown),
        other => RobotState::from_value(other)
            .and_then(|state| state.schedule_enabled())
            .map(SwitchState::from)
            .ok_or_else(|| mismatch("schedule", other)),
    }
}
