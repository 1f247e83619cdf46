// Discord-side adapters for the Nomi bridge.

#[path = "discord_sink.rs"]
pub mod discord_sink;

pub use discord_sink::DiscordSink;
