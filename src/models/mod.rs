//! Data models for the cloud device bridge

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Integrations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integration {
    Vorwerk,
    JDownloader,
}

impl Integration {
    /// Prefix used in entity unique ids
    pub fn domain(&self) -> &'static str {
        match self {
            Integration::Vorwerk => crate::vorwerk::DOMAIN,
            Integration::JDownloader => crate::jdownloader::DOMAIN,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Integration::Vorwerk => "vorwerk",
            Integration::JDownloader => "jdownloader",
        }
    }
}

impl std::fmt::Display for Integration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Account / device records
// ============================================================================

/// Session token returned by a vendor cloud
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Token {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    /// Value sent in the Authorization header
    pub fn bearer(&self) -> &str {
        self.id_token.as_deref().unwrap_or(&self.access_token)
    }
}

/// Keys of a remote map object that only make sense for a short time
pub const MAP_URL_FIELDS: [&str; 3] = ["url", "raw_floor_map_url", "url_valid_for_seconds"];

/// A saved floor plan of a robot, with its image downloaded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistentMap {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

impl PersistentMap {
    /// Drop the expiring download links and attach the image bytes
    pub fn from_remote(mut raw: Map<String, Value>, image: Vec<u8>) -> Self {
        for key in MAP_URL_FIELDS {
            raw.remove(key);
        }
        raw.remove("image");
        Self { fields: raw, image }
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    #[serde(alias = "id")]
    pub serial: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persistent_maps: Option<Vec<PersistentMap>>,
}

impl DeviceRecord {
    pub fn new(name: impl Into<String>, serial: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            serial: serial.into(),
            secret: None,
            traits: Vec::new(),
            endpoint: None,
            device_type: None,
            persistent_maps: None,
        }
    }
}

/// What a finished registration hands over for persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<Token>,
    pub devices: Vec<DeviceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub integration: Integration,
    pub title: String,
    pub unique_id: String,
    pub account: Account,
    pub created_at: DateTime<Utc>,
}

impl ConfigEntry {
    pub fn new(
        integration: Integration,
        title: impl Into<String>,
        unique_id: impl Into<String>,
        account: Account,
    ) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().to_string(),
            integration,
            title: title.into(),
            unique_id: unique_id.into(),
            account,
            created_at: Utc::now(),
        }
    }
}

// ============================================================================
// Entity state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchState {
    On,
    Off,
    Unknown,
}

impl From<bool> for SwitchState {
    fn from(on: bool) -> Self {
        if on {
            SwitchState::On
        } else {
            SwitchState::Off
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Switch,
    Sensor,
    BinarySensor,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Switch => "switch",
            Platform::Sensor => "sensor",
            Platform::BinarySensor => "binary_sensor",
        }
    }
}

/// Read-only view of an entity, as served by the API
#[derive(Debug, Clone, Serialize)]
pub struct EntitySnapshot {
    pub unique_id: String,
    pub name: String,
    pub platform: Platform,
    pub device_serial: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    pub enabled_default: bool,
    pub available: bool,
    pub state: Value,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub attributes: Value,
}

mod base64_bytes {
    use base64::prelude::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64_STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64_STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persistent_map_strips_url_fields() {
        let raw = json!({
            "id": "m1",
            "name": "Kitchen",
            "url": "https://maps.example/m1.png",
            "raw_floor_map_url": "https://maps.example/m1.raw",
            "url_valid_for_seconds": 60
        });
        let map = PersistentMap::from_remote(raw.as_object().unwrap().clone(), vec![1, 2, 3]);

        assert_eq!(map.id(), Some("m1"));
        assert_eq!(map.name(), Some("Kitchen"));
        for key in MAP_URL_FIELDS {
            assert!(!map.fields.contains_key(key));
        }
        assert_eq!(map.image, vec![1, 2, 3]);
    }

    #[test]
    fn test_persistent_map_image_is_base64_in_json() {
        let map = PersistentMap::from_remote(
            json!({"name": "Kitchen"}).as_object().unwrap().clone(),
            b"png".to_vec(),
        );
        let value = serde_json::to_value(&map).unwrap();
        assert_eq!(value, json!({"name": "Kitchen", "image": "cG5n"}));

        let back: PersistentMap = serde_json::from_value(value).unwrap();
        assert_eq!(back, map);
    }

    #[test]
    fn test_device_record_accepts_id_alias() {
        let record: DeviceRecord =
            serde_json::from_value(json!({"id": "abc", "name": "Office", "type": "jd"})).unwrap();
        assert_eq!(record.serial, "abc");
        assert_eq!(record.device_type.as_deref(), Some("jd"));
        assert!(record.traits.is_empty());
    }

    #[test]
    fn test_token_bearer_prefers_id_token() {
        let mut token = Token::new("access");
        assert_eq!(token.bearer(), "access");
        token.id_token = Some("id".into());
        assert_eq!(token.bearer(), "id");
    }

    #[test]
    fn test_switch_state() {
        assert_eq!(SwitchState::from(true), SwitchState::On);
        assert_eq!(SwitchState::from(false), SwitchState::Off);
        assert_eq!(serde_json::to_value(SwitchState::On).unwrap(), json!("on"));
    }
}
