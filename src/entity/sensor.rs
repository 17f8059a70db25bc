//! Read-only device values

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{DeviceApi, Entity, EntityInfo};
use crate::error::AdapterError;
use crate::jdownloader::{OP_CURRENT_STATE, OP_QUERY_LINKS, OP_QUERY_PACKAGES, OP_SPEED, OP_UPDATE_AVAILABLE};
use crate::models::{EntitySnapshot, Platform};
use crate::vorwerk::robot::CMD_GET_ROBOT_STATE;
use crate::vorwerk::state::RobotState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    DownloadStatus,
    DownloadSpeed,
    Packages,
    Links,
    UpdateAvailable,
    RobotStatus,
    RobotBattery,
}

/// Interpreted query reply
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub state: Value,
    pub attributes: Value,
    pub icon: Option<&'static str>,
}

impl Reading {
    fn plain(state: Value) -> Self {
        Self {
            state,
            attributes: Value::Null,
            icon: None,
        }
    }
}

pub struct SensorSpec {
    pub key: &'static str,
    pub platform: Platform,
    pub name_template: &'static str,
    pub icon: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub enabled_default: bool,
    pub query: &'static str,
    pub params: fn() -> Vec<Value>,
    pub read: fn(&Value) -> Result<Reading, AdapterError>,
}

fn no_params() -> Vec<Value> {
    Vec::new()
}

fn package_query() -> Vec<Value> {
    vec![json!({
        "bytesLoaded": true,
        "bytesTotal": true,
        "enabled": true,
        "eta": true,
        "finished": true,
        "hosts": true,
        "running": true,
        "speed": true,
        "status": true,
        "maxResults": -1,
        "startAt": 0,
    })]
}

fn link_query() -> Vec<Value> {
    vec![json!({
        "bytesLoaded": true,
        "bytesTotal": true,
        "enabled": true,
        "eta": true,
        "finished": true,
        "host": true,
        "running": true,
        "speed": true,
        "status": true,
        "url": true,
        "maxResults": -1,
        "startAt": 0,
    })]
}

static DOWNLOAD_STATUS: SensorSpec = SensorSpec {
    key: "status",
    platform: Platform::Sensor,
    name_template: "JDownloader {device} Status",
    icon: Some("mdi:play-pause"),
    unit: None,
    enabled_default: true,
    query: OP_CURRENT_STATE,
    params: no_params,
    read: read_download_status,
};

static DOWNLOAD_SPEED: SensorSpec = SensorSpec {
    key: "download_speed",
    platform: Platform::Sensor,
    name_template: "JDownloader {device} Download Speed",
    icon: Some("mdi:download"),
    unit: Some("MB/s"),
    enabled_default: true,
    query: OP_SPEED,
    params: no_params,
    read: read_download_speed,
};

static PACKAGES: SensorSpec = SensorSpec {
    key: "packages",
    platform: Platform::Sensor,
    name_template: "JDownloader {device} Packages",
    icon: Some("mdi:download"),
    unit: None,
    enabled_default: false,
    query: OP_QUERY_PACKAGES,
    params: package_query,
    read: read_packages,
};

static LINKS: SensorSpec = SensorSpec {
    key: "links",
    platform: Platform::Sensor,
    name_template: "JDownloader {device} Links",
    icon: Some("mdi:download"),
    unit: None,
    enabled_default: false,
    query: OP_QUERY_LINKS,
    params: link_query,
    read: read_links,
};

static UPDATE_AVAILABLE: SensorSpec = SensorSpec {
    key: "update_available",
    platform: Platform::BinarySensor,
    name_template: "JDownloader {device} Update Available",
    icon: None,
    unit: None,
    enabled_default: true,
    query: OP_UPDATE_AVAILABLE,
    params: no_params,
    read: read_update_available,
};

static ROBOT_STATUS: SensorSpec = SensorSpec {
    key: "status",
    platform: Platform::Sensor,
    name_template: "{device} Status",
    icon: Some("mdi:robot-vacuum"),
    unit: None,
    enabled_default: true,
    query: CMD_GET_ROBOT_STATE,
    params: no_params,
    read: read_robot_status,
};

static ROBOT_BATTERY: SensorSpec = SensorSpec {
    key: "battery",
    platform: Platform::Sensor,
    name_template: "{device} Battery",
    icon: Some("mdi:battery"),
    unit: Some("%"),
    enabled_default: true,
    query: CMD_GET_ROBOT_STATE,
    params: no_params,
    read: read_robot_battery,
};

impl SensorKind {
    pub const JDOWNLOADER: [SensorKind; 5] = [
        SensorKind::DownloadStatus,
        SensorKind::DownloadSpeed,
        SensorKind::Packages,
        SensorKind::Links,
        SensorKind::UpdateAvailable,
    ];

    pub const ROBOT: [SensorKind; 2] = [SensorKind::RobotStatus, SensorKind::RobotBattery];

    pub fn spec(self) -> &'static SensorSpec {
        match self {
            SensorKind::DownloadStatus => &DOWNLOAD_STATUS,
            SensorKind::DownloadSpeed => &DOWNLOAD_SPEED,
            SensorKind::Packages => &PACKAGES,
            SensorKind::Links => &LINKS,
            SensorKind::UpdateAvailable => &UPDATE_AVAILABLE,
            SensorKind::RobotStatus => &ROBOT_STATUS,
            SensorKind::RobotBattery => &ROBOT_BATTERY,
        }
    }
}

fn mismatch(key: &'static str, value: &Value) -> AdapterError {
    AdapterError::TypeMismatch {
        key,
        value: value.to_string(),
    }
}

/// `STOPPED_STATE` becomes `stopped`; an empty state is `unknown`
pub fn read_download_status(value: &Value) -> Result<Reading, AdapterError> {
    let raw = match value {
        Value::Null => "",
        Value::String(s) => s.as_str(),
        other => return Err(mismatch("status", other)),
    };
    let status = raw.to_lowercase().replace("_state", "");
    let status = if status.is_empty() {
        "unknown".to_string()
    } else {
        status
    };
    let icon = match status.as_str() {
        "idle" | "stopped" => Some("mdi:stop"),
        "running" => Some("mdi:play"),
        "pause" => Some("mdi:pause"),
        _ => None,
    };

    Ok(Reading {
        state: json!(status),
        attributes: Value::Null,
        icon,
    })
}

/// Bytes per second to MB/s with two decimals
pub fn read_download_speed(value: &Value) -> Result<Reading, AdapterError> {
    let bps = value
        .as_f64()
        .ok_or_else(|| mismatch("download_speed", value))?;
    let mbps = (bps / 1_000_000.0 * 100.0).round() / 100.0;
    Ok(Reading::plain(json!(mbps)))
}

fn read_list(key: &'static str, value: &Value) -> Result<Reading, AdapterError> {
    let list = match value {
        Value::Null => Vec::new(),
        Value::Array(list) => list.clone(),
        other => return Err(mismatch(key, other)),
    };
    let count = list.len();
    let mut attributes = serde_json::Map::new();
    attributes.insert(key.to_string(), Value::Array(list));
    Ok(Reading {
        state: json!(count),
        attributes: Value::Object(attributes),
        icon: None,
    })
}

pub fn read_packages(value: &Value) -> Result<Reading, AdapterError> {
    read_list("packages", value)
}

pub fn read_links(value: &Value) -> Result<Reading, AdapterError> {
    read_list("links", value)
}

pub fn read_update_available(value: &Value) -> Result<Reading, AdapterError> {
    match value {
        Value::Bool(_) | Value::Null => Ok(Reading::plain(value.clone())),
        other => Err(mismatch("update_available", other)),
    }
}

fn robot_state(key: &'static str, value: &Value) -> Result<RobotState, AdapterError> {
    RobotState::from_value(value).ok_or_else(|| mismatch(key, value))
}

pub fn read_robot_status(value: &Value) -> Result<Reading, AdapterError> {
    let state = robot_state("status", value)?;
    Ok(Reading {
        state: json!(state.status()),
        attributes: json!({
            "state": state.state(),
            "docked": state.docked(),
            "charging": state.charging(),
            "alert": state.alert(),
            "error": state.error(),
        }),
        icon: None,
    })
}

pub fn read_robot_battery(value: &Value) -> Result<Reading, AdapterError> {
    let state = robot_state("battery", value)?;
    let level = state
        .battery_level()
        .ok_or_else(|| mismatch("battery", value))?;
    Ok(Reading {
        state: json!(level),
        attributes: Value::Null,
        icon: Some(battery_icon(level, state.charging())),
    })
}

fn battery_icon(level: u64, charging: bool) -> &'static str {
    if charging {
        "mdi:battery-charging"
    } else if level >= 90 {
        "mdi:battery"
    } else if level >= 50 {
        "mdi:battery-70"
    } else if level >= 20 {
        "mdi:battery-30"
    } else {
        "mdi:battery-alert"
    }
}

pub struct Sensor {
    info: EntityInfo,
    kind: SensorKind,
    api: Arc<dyn DeviceApi>,
    reading: Option<Reading>,
    available: bool,
}

impl Sensor {
    pub fn new(
        domain: &str,
        kind: SensorKind,
        device_name: &str,
        device_serial: &str,
        api: Arc<dyn DeviceApi>,
    ) -> Self {
        let spec = kind.spec();
        let info = EntityInfo::new(
            domain,
            spec.platform,
            spec.key,
            spec.name_template,
            device_name,
            device_serial,
        )
        .icon(spec.icon)
        .enabled_default(spec.enabled_default);

        Self {
            info,
            kind,
            api,
            reading: None,
            available: true,
        }
    }

    pub fn state(&self) -> Value {
        self.reading
            .as_ref()
            .map(|r| r.state.clone())
            .unwrap_or(Value::Null)
    }
}

#[async_trait]
impl Entity for Sensor {
    fn info(&self) -> &EntityInfo {
        &self.info
    }

    fn available(&self) -> bool {
        self.available
    }

    fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    fn snapshot(&self) -> EntitySnapshot {
        let spec = self.kind.spec();
        let reading = self.reading.as_ref();
        EntitySnapshot {
            unique_id: self.info.unique_id.clone(),
            name: self.info.name.clone(),
            platform: self.info.platform,
            device_serial: self.info.device_serial.clone(),
            icon: reading.and_then(|r| r.icon).or(self.info.icon),
            unit: spec.unit,
            enabled_default: self.info.enabled_default,
            available: self.available,
            state: self.state(),
            attributes: reading
                .map(|r| r.attributes.clone())
                .unwrap_or(Value::Null),
        }
    }

    async fn refresh(&mut self) -> Result<(), AdapterError> {
        let spec = self.kind.spec();
        let value = self.api.call(spec.query, &(spec.params)()).await?;
        self.reading = Some((spec.read)(&value)?);
        Ok(())
    }
}
