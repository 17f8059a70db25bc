//! Configuration module

use serde::Deserialize;

use crate::models::DeviceRecord;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub vorwerk: VorwerkConfig,
    #[serde(default)]
    pub jdownloader: JDownloaderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: default_scan_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Vorwerk cloud settings. `robots` is the out-of-band robot list that gets
/// imported without interactive login.
#[derive(Debug, Clone, Deserialize)]
pub struct VorwerkConfig {
    #[serde(default = "default_vorwerk_client_id")]
    pub client_id: String,
    #[serde(default = "default_vorwerk_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_vorwerk_beehive_url")]
    pub beehive_url: String,
    #[serde(default)]
    pub robots: Vec<RobotImportConfig>,
}

impl Default for VorwerkConfig {
    fn default() -> Self {
        Self {
            client_id: default_vorwerk_client_id(),
            auth_url: default_vorwerk_auth_url(),
            beehive_url: default_vorwerk_beehive_url(),
            robots: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RobotImportConfig {
    pub name: String,
    pub serial: String,
    pub secret: String,
    #[serde(default = "default_robot_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub traits: Vec<String>,
}

impl From<&RobotImportConfig> for DeviceRecord {
    fn from(robot: &RobotImportConfig) -> Self {
        DeviceRecord {
            name: robot.name.clone(),
            serial: robot.serial.clone(),
            secret: Some(robot.secret.clone()),
            traits: robot.traits.clone(),
            endpoint: Some(robot.endpoint.clone()),
            device_type: None,
            persistent_maps: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JDownloaderConfig {
    #[serde(default = "default_jd_api_url")]
    pub api_url: String,
    #[serde(default = "default_jd_app_key")]
    pub app_key: String,
}

impl Default for JDownloaderConfig {
    fn default() -> Self {
        Self {
            api_url: default_jd_api_url(),
            app_key: default_jd_app_key(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8123
}

fn default_store_path() -> String {
    "data/entries.json".to_string()
}

fn default_scan_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}

fn default_vorwerk_client_id() -> String {
    crate::vorwerk::CLIENT_ID.to_string()
}

fn default_vorwerk_auth_url() -> String {
    "https://mykobold.eu.auth0.com".to_string()
}

fn default_vorwerk_beehive_url() -> String {
    "https://beehive.ksecosys.com".to_string()
}

pub fn default_robot_endpoint() -> String {
    "https://nucleo.ksecosys.com:4443".to_string()
}

fn default_jd_api_url() -> String {
    "https://api.jdownloader.org".to_string()
}

fn default_jd_app_key() -> String {
    crate::jdownloader::APP_KEY.to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("CLOUDBRIDGE").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize().unwrap_or_else(|e| {
            tracing::warn!("Invalid configuration, falling back to defaults: {}", e);
            Config::default()
        });

        Ok(config)
    }
}
