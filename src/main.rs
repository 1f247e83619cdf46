// This is the entry point of the Nomi bridge bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic): polling, de-duplication, config
// - `infra/` = Implementations of core traits (Nomi HTTP API, rooms file)
// - `discord/` = Discord-specific adapters (commands, channel sink)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Start autostart rooms and shut pollers down on Ctrl-C

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use std::sync::Arc;

use crate::core::config::BridgeConfig;
use crate::core::nomi::NomiBridgeService;
use crate::discord::commands::presence;
use crate::discord::nomi::DiscordSink;
use crate::discord::{Data, Error};
use crate::infra::nomi::{JsonRoomStore, NomiApiClient};
use anyhow::Context as _;
use poise::serenity_prelude as serenity;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists) before reading RUST_LOG
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = BridgeConfig::from_env()?;

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // This is the "composition root" where we wire everything together.

    let api = NomiApiClient::new(&config.api_base_url, config.http_timeout)
        .context("Failed to create Nomi API client")?;

    // The sink gets its own HTTP handle so the service can exist before the
    // gateway connects.
    let http = Arc::new(serenity::Http::new(&config.discord_token));
    let sink = Arc::new(
        DiscordSink::new(http, config.http_timeout).context("Failed to create Discord sink")?,
    );

    let rooms = JsonRoomStore::new(&config.rooms_file);
    let nomi = Arc::new(NomiBridgeService::new(
        api,
        sink,
        rooms,
        config.session.clone(),
        config.poll_interval,
    ));

    let data = Data {
        nomi: Arc::clone(&nomi),
    };
    let autostart = config.autostart.clone();

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================

    // Slash commands and channel posts only; no privileged intents needed.
    let intents = serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![discord::commands::nomi::nomi()],
            on_error: |error| {
                Box::pin(async move {
                    if let poise::FrameworkError::Command { error, ctx, .. } = &error {
                        tracing::error!(command = %ctx.command().name, "Command failed: {}", error);
                    }
                    if let Err(e) = poise::builtins::on_error(error).await {
                        tracing::error!("Error while handling error: {}", e);
                    }
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                tracing::info!("🤖 Bot is starting up...");

                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                tracing::info!("✅ Commands registered!");

                for entry in &autostart {
                    match data.nomi.start_polling(&entry.room, entry.channel_id).await {
                        Ok((room_id, outcome)) => tracing::info!(
                            room_id = %room_id,
                            channel_id = entry.channel_id,
                            ?outcome,
                            "Autostarted Nomi room"
                        ),
                        Err(e) => tracing::warn!(
                            room = %entry.room,
                            error = %e,
                            "Failed to autostart Nomi room"
                        ),
                    }
                }

                presence::on_ready(ctx, data.nomi.running_count());
                tracing::info!("🚀 Bot is ready!");
                Ok::<Data, Error>(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&config.discord_token, intents)
        .framework(framework)
        .await
        .context("Error creating client")?;

    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => result.context("Error running bot")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down, stopping Nomi pollers");
            nomi.shutdown().await;
            shard_manager.shutdown_all().await;
        }
    }

    Ok(())
}
