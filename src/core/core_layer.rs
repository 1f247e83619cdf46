// The core module contains all business logic.
// Each feature gets its own submodule.

#[path = "nomi/mod.rs"]
pub mod nomi;

#[path = "config/bridge_config.rs"]
pub mod config;
