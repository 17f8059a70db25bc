//! Interpretation of the `getRobotState` reply

use serde::Serialize;
use serde_json::{Map, Value};

pub const ROBOT_STATE_IDLE: u64 = 1;
pub const ROBOT_STATE_BUSY: u64 = 2;
pub const ROBOT_STATE_PAUSE: u64 = 3;
pub const ROBOT_STATE_ERROR: u64 = 4;

pub const ROBOT_ACTION_DOCKING: u64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VacuumState {
    Docked,
    Idle,
    Cleaning,
    Returning,
    Paused,
    Error,
}

fn action_text(action: u64) -> Option<&'static str> {
    match action {
        1 => Some("House Cleaning"),
        2 => Some("Spot Cleaning"),
        3 => Some("Manual Cleaning"),
        4 => Some("Docking"),
        5 => Some("User Menu Active"),
        6 => Some("Suspended Cleaning"),
        7 => Some("Updating"),
        8 => Some("Copying logs"),
        9 => Some("Recovering Location"),
        10 => Some("IEC test"),
        11 => Some("Map cleaning"),
        12 => Some("Exploring map (creating a persistent map)"),
        13 => Some("Acquiring Persistent Map IDs"),
        14 => Some("Creating & Uploading Map"),
        15 => Some("Suspended Exploration"),
        _ => None,
    }
}

fn mode_text(mode: u64) -> Option<&'static str> {
    match mode {
        1 => Some("Eco"),
        2 => Some("Turbo"),
        _ => None,
    }
}

fn alert_text(alert: &str) -> Option<&'static str> {
    match alert {
        "ui_alert_dust_bin_full" => Some("Please empty dust bin"),
        "ui_alert_recovering_location" => Some("Returning to start"),
        "ui_alert_battery_ChargeBaseCommErr" => Some("Battery error"),
        "ui_alert_busy_charging" => Some("Busy charging"),
        "ui_alert_charging_base" => Some("Base charging"),
        "ui_alert_charging_power" => Some("Charging power"),
        "ui_alert_connect_chrg_cable" => Some("Connect charge cable"),
        "ui_alert_info_thank_you" => Some("Thank you"),
        "ui_alert_invalid" => Some("Invalid check"),
        "ui_alert_old_error" => Some("Old error"),
        "ui_alert_swupdate_fail" => Some("Update failed"),
        "dustbin_full" => Some("Please empty dust bin"),
        "maint_brush_change" => Some("Change the brush"),
        "maint_filter_change" => Some("Change the filter"),
        "clean_completed_to_start" => Some("Cleaning completed"),
        "nav_floorplan_not_created" => Some("No floorplan found"),
        "nav_floorplan_load_fail" => Some("Failed to load floorplan"),
        "nav_floorplan_localization_fail" => Some("Failed to localize on floorplan"),
        "clean_incomplete_to_start" => Some("Cleaning incomplete"),
        "log_upload_failed" => Some("Logs failed to upload"),
        _ => None,
    }
}

fn error_text(error: &str) -> Option<&'static str> {
    match error {
        "ui_error_battery_battundervoltlithiumsafety" => Some("Replace battery"),
        "ui_error_battery_critical" => Some("Replace battery"),
        "ui_error_battery_invalidsensor" => Some("Replace battery"),
        "ui_error_battery_lithiumadapterfailure" => Some("Replace battery"),
        "ui_error_battery_mismatch" => Some("Replace battery"),
        "ui_error_battery_nothermistor" => Some("Replace battery"),
        "ui_error_battery_overtemp" => Some("Replace battery"),
        "ui_error_battery_overvolt" => Some("Replace battery"),
        "ui_error_battery_undercurrent" => Some("Replace battery"),
        "ui_error_battery_undertemp" => Some("Replace battery"),
        "ui_error_battery_undervolt" => Some("Replace battery"),
        "ui_error_battery_unplugged" => Some("Replace battery"),
        "ui_error_brush_stuck" => Some("Brush stuck"),
        "ui_error_brush_overloaded" => Some("Brush overloaded"),
        "ui_error_bumper_stuck" => Some("Bumper stuck"),
        "ui_error_check_battery_switch" => Some("Check battery"),
        "ui_error_corrupt_scb" => Some("Call customer service corrupt board"),
        "ui_error_deck_debris" => Some("Deck debris"),
        "ui_error_dflt_app" => Some("Check MyKobold app"),
        "ui_error_disconnect_chrg_cable" => Some("Disconnected charge cable"),
        "ui_error_disconnect_usb_cable" => Some("Disconnected USB cable"),
        "ui_error_dust_bin_missing" => Some("Dust bin missing"),
        "ui_error_dust_bin_full" => Some("Dust bin full"),
        "ui_error_dust_bin_emptied" => Some("Dust bin emptied"),
        "ui_error_hardware_failure" => Some("Hardware failure"),
        "ui_error_ldrop_stuck" => Some("Clear my path"),
        "ui_error_lds_jammed" => Some("Clear my path"),
        "ui_error_lds_bad_packets" => Some("Check MyKobold app"),
        "ui_error_lds_disconnected" => Some("Check MyKobold app"),
        "ui_error_lds_missed_packets" => Some("Check MyKobold app"),
        "ui_error_lwheel_stuck" => Some("Clear my path"),
        "ui_error_navigation_backdrop_frontbump" => Some("Clear my path"),
        "ui_error_navigation_backdrop_leftbump" => Some("Clear my path"),
        "ui_error_navigation_backdrop_wheelextended" => Some("Clear my path"),
        "ui_error_navigation_noprogress" => Some("Clear my path"),
        "ui_error_navigation_origin_unclean" => Some("Clear my path"),
        "ui_error_navigation_pathproblems" => Some("Cannot return to base"),
        "ui_error_navigation_pinkycommsfail" => Some("Clear my path"),
        "ui_error_navigation_falling" => Some("Clear my path"),
        "ui_error_navigation_noexitstogo" => Some("Clear my path"),
        "ui_error_navigation_nomotioncommands" => Some("Clear my path"),
        "ui_error_navigation_rightdrop_leftbump" => Some("Clear my path"),
        "ui_error_navigation_undockingfailed" => Some("Clear my path"),
        "ui_error_picked_up" => Some("Picked up"),
        "ui_error_qa_fail" => Some("Check MyKobold app"),
        "ui_error_rdrop_stuck" => Some("Clear my path"),
        "ui_error_reconnect_failed" => Some("Reconnect failed"),
        "ui_error_rwheel_stuck" => Some("Clear my path"),
        "ui_error_stuck" => Some("Stuck!"),
        "ui_error_unable_to_return_to_base" => Some("Unable to return to base"),
        "ui_error_unable_to_see" => Some("Clean vacuum sensors"),
        "ui_error_vacuum_slip" => Some("Clear my path"),
        "ui_error_vacuum_stuck" => Some("Clear my path"),
        "ui_error_warning" => Some("Error check app"),
        "batt_base_connect_fail" => Some("Battery failed to connect to base"),
        "batt_base_no_power" => Some("Battery base has no power"),
        "batt_low" => Some("Battery low"),
        "batt_on_base" => Some("Battery on base"),
        "clean_tilt_on_start" => Some("Clean the robot tilt on start"),
        "dustbin_full" => Some("Dust bin full"),
        "dustbin_missing" => Some("Dust bin missing"),
        "gen_picked_up" => Some("Picked up"),
        "hw_fail" => Some("Hardware failure"),
        "hw_tof_sensor_sensor" => Some("Hardware sensor disconnected"),
        "lds_bad_packets" => Some("Bad packets"),
        "lds_deck_debris" => Some("Debris on deck"),
        "lds_disconnected" => Some("Disconnected"),
        "lds_jammed" => Some("Jammed"),
        "lds_missed_packets" => Some("Missed packets"),
        "maint_brush_stuck" => Some("Brush stuck"),
        "maint_brush_overload" => Some("Brush overloaded"),
        "maint_bumper_stuck" => Some("Bumper stuck"),
        "maint_customer_support_qa" => Some("Contact customer support"),
        "maint_vacuum_stuck" => Some("Vacuum is stuck"),
        "maint_vacuum_slip" => Some("Vacuum is stuck"),
        "maint_left_drop_stuck" => Some("Vacuum is stuck"),
        "maint_left_wheel_stuck" => Some("Vacuum is stuck"),
        "maint_right_drop_stuck" => Some("Vacuum is stuck"),
        "maint_right_wheel_stuck" => Some("Vacuum is stuck"),
        "not_on_charge_base" => Some("Not on the charge base"),
        "nav_robot_falling" => Some("Clear my path"),
        "nav_no_path" => Some("Clear my path"),
        "nav_path_problem" => Some("Clear my path"),
        "nav_backdrop_frontbump" => Some("Clear my path"),
        "nav_backdrop_leftbump" => Some("Clear my path"),
        "nav_backdrop_wheelextended" => Some("Clear my path"),
        "nav_mag_sensor" => Some("Clear my path"),
        "nav_no_exit" => Some("Clear my path"),
        "nav_no_movement" => Some("Clear my path"),
        "nav_rightdrop_leftbump" => Some("Clear my path"),
        "nav_undocking_failed" => Some("Clear my path"),
        _ => None,
    }
}

/// A non-empty robot state reply
#[derive(Debug, Clone, PartialEq)]
pub struct RobotState {
    raw: Map<String, Value>,
}

impl RobotState {
    /// `None` when the robot returned nothing usable, i.e. it is unavailable
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_object() {
            Some(raw) if !raw.is_empty() => Some(Self { raw: raw.clone() }),
            _ => None,
        }
    }

    fn state_code(&self) -> Option<u64> {
        self.raw.get("state").and_then(Value::as_u64)
    }

    fn details(&self) -> Option<&Map<String, Value>> {
        self.raw.get("details").and_then(Value::as_object)
    }

    fn detail_flag(&self, key: &str) -> bool {
        self.details()
            .and_then(|d| d.get(key))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn non_empty_str(&self, key: &str) -> Option<&str> {
        self.raw
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn docked(&self) -> bool {
        self.state_code() == Some(ROBOT_STATE_IDLE) && self.detail_flag("isDocked")
    }

    pub fn charging(&self) -> bool {
        self.state_code() == Some(ROBOT_STATE_IDLE) && self.detail_flag("isCharging")
    }

    pub fn state(&self) -> Option<VacuumState> {
        if self.charging() || self.docked() {
            return Some(VacuumState::Docked);
        }
        match self.state_code()? {
            ROBOT_STATE_IDLE => Some(VacuumState::Idle),
            ROBOT_STATE_BUSY => {
                let action = self.raw.get("action").and_then(Value::as_u64);
                if action == Some(ROBOT_ACTION_DOCKING) {
                    Some(VacuumState::Returning)
                } else {
                    Some(VacuumState::Cleaning)
                }
            }
            ROBOT_STATE_PAUSE => Some(VacuumState::Paused),
            ROBOT_STATE_ERROR => Some(VacuumState::Error),
            _ => None,
        }
    }

    pub fn alert(&self) -> Option<String> {
        self.non_empty_str("alert")
            .map(|alert| alert_text(alert).unwrap_or(alert).to_string())
    }

    pub fn error(&self) -> Option<String> {
        self.non_empty_str("error")
            .map(|error| error_text(error).unwrap_or(error).to_string())
    }

    /// Human readable status line
    pub fn status(&self) -> Option<String> {
        let state = self.state()?;
        if state == VacuumState::Error {
            return self.error();
        }
        if let Some(alert) = self.alert() {
            return Some(alert);
        }
        match state {
            VacuumState::Docked if self.docked() => Some("Docked".to_string()),
            VacuumState::Docked => Some("Charging".to_string()),
            VacuumState::Idle => Some("Stopped".to_string()),
            VacuumState::Cleaning => Some(self.cleaning_status()),
            VacuumState::Returning => Some("Returning to base".to_string()),
            VacuumState::Paused => Some("Paused".to_string()),
            VacuumState::Error => None,
        }
    }

    fn cleaning_status(&self) -> String {
        let cleaning = self.raw.get("cleaning");
        let mode = cleaning
            .and_then(|c| c.get("mode"))
            .and_then(Value::as_u64)
            .and_then(mode_text);
        let action = self
            .raw
            .get("action")
            .and_then(Value::as_u64)
            .and_then(action_text);
        let boundary = cleaning
            .and_then(|c| c.get("boundary"))
            .and_then(|b| b.get("name"))
            .and_then(Value::as_str);

        [mode, action, boundary]
            .into_iter()
            .flatten()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn battery_level(&self) -> Option<u64> {
        self.details()
            .and_then(|d| d.get("charge"))
            .and_then(Value::as_u64)
    }

    pub fn schedule_enabled(&self) -> Option<bool> {
        self.details()
            .and_then(|d| d.get("isScheduleEnabled"))
            .and_then(Value::as_bool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(value: Value) -> RobotState {
        RobotState::from_value(&value).unwrap()
    }

    #[test]
    fn test_empty_reply_is_unavailable() {
        assert!(RobotState::from_value(&json!({})).is_none());
        assert!(RobotState::from_value(&Value::Null).is_none());
    }

    #[test]
    fn test_docked_and_charging() {
        let s = state(json!({
            "state": 1,
            "details": {"isDocked": true, "isCharging": true, "charge": 80}
        }));
        assert_eq!(s.state(), Some(VacuumState::Docked));
        assert_eq!(s.status().as_deref(), Some("Docked"));
        assert_eq!(s.battery_level(), Some(80));

        let s = state(json!({
            "state": 1,
            "details": {"isDocked": false, "isCharging": true}
        }));
        assert_eq!(s.status().as_deref(), Some("Charging"));
    }

    #[test]
    fn test_idle_is_stopped() {
        let s = state(json!({"state": 1, "details": {"isDocked": false}}));
        assert_eq!(s.state(), Some(VacuumState::Idle));
        assert_eq!(s.status().as_deref(), Some("Stopped"));
    }

    #[test]
    fn test_busy_docking_is_returning() {
        let s = state(json!({"state": 2, "action": 4}));
        assert_eq!(s.state(), Some(VacuumState::Returning));
    }

    #[test]
    fn test_cleaning_status_joins_mode_action_boundary() {
        let s = state(json!({
            "state": 2,
            "action": 1,
            "cleaning": {"mode": 2, "boundary": {"name": "Kitchen"}}
        }));
        assert_eq!(s.state(), Some(VacuumState::Cleaning));
        assert_eq!(s.status().as_deref(), Some("Turbo House Cleaning Kitchen"));
    }

    #[test]
    fn test_error_and_alert_text() {
        let s = state(json!({"state": 4, "error": "ui_error_brush_stuck"}));
        assert_eq!(s.status().as_deref(), Some("Brush stuck"));

        let s = state(json!({"state": 3, "alert": "maint_filter_change"}));
        assert_eq!(s.status().as_deref(), Some("Change the filter"));

        let s = state(json!({"state": 4, "error": "something_new"}));
        assert_eq!(s.status().as_deref(), Some("something_new"));
    }

    #[test]
    fn test_schedule_enabled() {
        let s = state(json!({"state": 1, "details": {"isScheduleEnabled": true}}));
        assert_eq!(s.schedule_enabled(), Some(true));

        let s = state(json!({"state": 1}));
        assert_eq!(s.schedule_enabled(), None);
    }
}
