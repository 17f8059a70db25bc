//! Vorwerk Kobold cloud integration module
//!
//! - `account`: passwordless (e-mail code) login, robot list, persistent maps
//! - `robot`: signed per-robot message endpoint
//! - `state`: robot state interpretation

pub mod account;
pub mod robot;
pub mod state;

pub use account::VorwerkAccount;
pub use robot::RobotClient;

pub const DOMAIN: &str = "vorwerk";

/// OAuth client id shared by every Vorwerk app installation
pub const CLIENT_ID: &str = "KY4YbVAvtgB7lp8vIbWQ7zLk3hssZlhR";

/// Title and unique id of the entry created from the configuration file
pub const IMPORT_UNIQUE_ID: &str = "from configuration";
