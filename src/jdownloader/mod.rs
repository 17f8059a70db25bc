//! MyJDownloader cloud integration module
//!
//! - `client`: account login, device list and per-device operation calls

pub mod client;

pub use client::{JdAccount, JdDevice, JdReconnect};

use std::str::FromStr;

pub const DOMAIN: &str = "myjdownloader";

pub const APP_KEY: &str = "https://git.io/JO0Dh";

/// Title of entries created by the password flow
pub const ENTRY_TITLE: &str = "MyJDownloader";

pub const OP_CURRENT_STATE: &str = "/downloadcontroller/getCurrentState";
pub const OP_PAUSE: &str = "/downloadcontroller/pause";
pub const OP_SPEED: &str = "/downloadcontroller/getSpeedInBps";
pub const OP_START: &str = "/downloadcontroller/start";
pub const OP_STOP: &str = "/downloadcontroller/stop";
pub const OP_QUERY_PACKAGES: &str = "/downloadsV2/queryPackages";
pub const OP_QUERY_LINKS: &str = "/downloadsV2/queryLinks";
pub const OP_LIMIT_STATUS: &str = "/toolbar/getStatus";
pub const OP_LIMIT_ENABLE: &str = "/toolbar/enableDownloadSpeedLimit";
pub const OP_LIMIT_DISABLE: &str = "/toolbar/disableDownloadSpeedLimit";
pub const OP_UPDATE_AVAILABLE: &str = "/update/isUpdateAvailable";
pub const OP_RESTART_AND_UPDATE: &str = "/update/restartAndUpdate";
pub const OP_RUN_UPDATE_CHECK: &str = "/update/runUpdateCheck";

/// One-shot device actions exposed next to the entities
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceService {
    RestartAndUpdate,
    RunUpdateCheck,
    StartDownloads,
    StopDownloads,
}

impl DeviceService {
    pub fn operation(&self) -> &'static str {
        match self {
            DeviceService::RestartAndUpdate => OP_RESTART_AND_UPDATE,
            DeviceService::RunUpdateCheck => OP_RUN_UPDATE_CHECK,
            DeviceService::StartDownloads => OP_START,
            DeviceService::StopDownloads => OP_STOP,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceService::RestartAndUpdate => "restart_and_update",
            DeviceService::RunUpdateCheck => "run_update_check",
            DeviceService::StartDownloads => "start_downloads",
            DeviceService::StopDownloads => "stop_downloads",
        }
    }
}

impl FromStr for DeviceService {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart_and_update" => Ok(DeviceService::RestartAndUpdate),
            "run_update_check" => Ok(DeviceService::RunUpdateCheck),
            "start_downloads" => Ok(DeviceService::StartDownloads),
            "stop_downloads" => Ok(DeviceService::StopDownloads),
            other => Err(format!("Unknown service: {}", other)),
        }
    }
}
