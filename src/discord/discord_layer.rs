// Discord layer - commands and the channel sink.

#[path = "commands/command_catalog.rs"]
pub mod commands;

#[path = "nomi/mod.rs"]
pub mod nomi;

// Re-export command types for convenience
pub use commands::nomi::{Data, Error};
