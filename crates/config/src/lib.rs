//! Configuration for ncli
//!
//! Every knob of the caching and resilience core is read from `NCLI_*`
//! environment variables. All of them are optional; see [`Settings`] for
//! the defaults.

pub mod config;
pub mod loader;

pub use config::*;
pub use loader::{SettingsLoader, ENV_PREFIX};
