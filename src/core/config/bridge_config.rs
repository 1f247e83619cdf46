use std::path::PathBuf;
use std::time::Duration;

use crate::core::nomi::{NomiSession, DEFAULT_POLL_INTERVAL};

pub const DEFAULT_API_BASE_URL: &str = "https://api.nomi.ai";
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ROOMS_FILE: &str = "data/rooms.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing {0} environment variable! Add it to your .env file.")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// A room to start polling as soon as the bot is ready.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutostartEntry {
    pub room: String,
    pub channel_id: u64,
}

/// Everything the bot reads from the environment at startup.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub discord_token: String,
    pub session: NomiSession,
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub rooms_file: PathBuf,
    pub autostart: Vec<AutostartEntry>,
}

impl BridgeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup so tests don't have to touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let poll_interval = match lookup("NOMI_POLL_INTERVAL_SECS") {
            Some(raw) => parse_secs("NOMI_POLL_INTERVAL_SECS", &raw)?,
            None => DEFAULT_POLL_INTERVAL,
        };
        let http_timeout = match lookup("NOMI_HTTP_TIMEOUT_SECS") {
            Some(raw) => parse_secs("NOMI_HTTP_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_HTTP_TIMEOUT,
        };
        let autostart = match lookup("NOMI_AUTOSTART") {
            Some(raw) => parse_autostart(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            discord_token: required("DISCORD_TOKEN")?,
            session: NomiSession::new(required("NOMI_API_KEY")?, required("NOMI_COMPANION_ID")?),
            api_base_url: lookup("NOMI_API_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            poll_interval,
            http_timeout,
            rooms_file: lookup("NOMI_ROOMS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOMS_FILE)),
            autostart,
        })
    }
}

fn parse_secs(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            key,
            reason: "must be greater than zero".to_string(),
        }),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
    }
}

/// `room:channel,room:channel`. The room part may itself contain colons.
fn parse_autostart(raw: &str) -> Result<Vec<AutostartEntry>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (room, channel) = pair.rsplit_once(':').ok_or_else(|| ConfigError::Invalid {
                key: "NOMI_AUTOSTART",
                reason: format!("expected room:channel, got `{pair}`"),
            })?;
            let channel_id = channel.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: "NOMI_AUTOSTART",
                reason: format!("bad channel id in `{pair}`: {e}"),
            })?;
            Ok(AutostartEntry {
                room: room.trim().to_string(),
                channel_id,
            })
        })
        .collect()
}
