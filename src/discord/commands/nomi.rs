// Discord commands for the Nomi bridge.
//
// Same shape as every other command here: pull primitives out of the
// Discord context, call the core service, format the result.

use std::sync::Arc;

use crate::core::nomi::{NomiBridgeService, StartOutcome};
use crate::discord::commands::presence;
use crate::discord::nomi::DiscordSink;
use crate::infra::nomi::{JsonRoomStore, NomiApiClient};
use poise::serenity_prelude as serenity;

pub type NomiBridge = NomiBridgeService<NomiApiClient, DiscordSink, JsonRoomStore>;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

pub struct Data {
    pub nomi: Arc<NomiBridge>,
}

/// Root `/nomi` command. Subcommands do the work.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("start", "stop", "status", "rooms", "reply")
)]
pub async fn nomi(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(
        "Nomi bridge commands:\n\
        `/nomi start <room> [channel]` - Relay new companion messages into a channel\n\
        `/nomi stop <room>` - Stop relaying a room\n\
        `/nomi status` - Show which rooms are being relayed\n\
        `/nomi rooms` - List configured rooms\n\
        `/nomi reply <room>` - Ask the companion for a reply right now",
    )
    .await?;
    Ok(())
}

/// Start relaying a room's newest companion messages.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn start(
    ctx: Context<'_>,
    #[description = "Room name or id"] room: String,
    #[description = "Channel to post in (defaults to this one)"] channel: Option<
        serenity::GuildChannel,
    >,
) -> Result<(), Error> {
    let channel_id = channel
        .map(|c| c.id)
        .unwrap_or_else(|| ctx.channel_id());

    let (room_id, outcome) = ctx
        .data()
        .nomi
        .start_polling(&room, channel_id.get())
        .await?;

    let message = match outcome {
        StartOutcome::Started => {
            format!("🔁 Relaying room `{room_id}` into <#{}>.", channel_id.get())
        }
        StartOutcome::AlreadyActive => {
            format!("Room `{room_id}` is already being relayed. Use `/nomi stop` first to move it.")
        }
    };
    presence::show_relay_count(ctx.serenity_context(), ctx.data().nomi.running_count());
    ctx.say(message).await?;
    Ok(())
}

/// Stop relaying a room.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn stop(
    ctx: Context<'_>,
    #[description = "Room name or id"] room: String,
) -> Result<(), Error> {
    ctx.defer().await?;

    let (room_id, stopped) = ctx.data().nomi.stop_polling(&room).await?;
    presence::show_relay_count(ctx.serenity_context(), ctx.data().nomi.running_count());
    if stopped {
        ctx.say(format!("⏹️ Stopped relaying room `{room_id}`."))
            .await?;
    } else {
        ctx.say(format!("Room `{room_id}` was not being relayed."))
            .await?;
    }
    Ok(())
}

/// Show every room poller and where it left off.
#[poise::command(slash_command, guild_only)]
pub async fn status(ctx: Context<'_>) -> Result<(), Error> {
    let statuses = ctx.data().nomi.status().await;

    if statuses.is_empty() {
        ctx.say("No rooms are being relayed yet. Try `/nomi start`.")
            .await?;
        return Ok(());
    }

    let mut embed = serenity::CreateEmbed::new()
        .title("Nomi relay status")
        .color(0x5865F2)
        .timestamp(serenity::Timestamp::now());

    for status in statuses.iter().take(25) {
        let state = if status.running { "🟢 running" } else { "⚪ stopped" };
        let channel = status
            .channel_id
            .map(|id| format!("<#{id}>"))
            .unwrap_or_else(|| "-".to_string());
        let last_seen = status.last_seen.as_deref().unwrap_or("nothing yet");

        embed = embed.field(
            format!("`{}`", status.room_id),
            format!("{state}\nChannel: {channel}\nLast message: `{last_seen}`"),
            false,
        );
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// List the rooms from the rooms file.
#[poise::command(slash_command, guild_only)]
pub async fn rooms(ctx: Context<'_>) -> Result<(), Error> {
    let rooms = ctx.data().nomi.list_rooms().await?;

    if rooms.is_empty() {
        ctx.say("No rooms configured. Raw room ids still work with `/nomi start`.")
            .await?;
        return Ok(());
    }

    let lines = rooms
        .iter()
        .map(|room| {
            let polling = if ctx.data().nomi.is_polling(&room.uuid) {
                " 🔁"
            } else {
                ""
            };
            format!(
                "**{}** `{}` ({} companions){polling}",
                room.name,
                room.uuid,
                room.nomis.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let embed = serenity::CreateEmbed::new()
        .title("Nomi rooms")
        .description(lines)
        .color(0x5865F2);

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Ask the companion to reply in a room and post the answer here.
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_CHANNELS"
)]
pub async fn reply(
    ctx: Context<'_>,
    #[description = "Room name or id"] room: String,
) -> Result<(), Error> {
    ctx.defer_ephemeral().await?;

    let delivery = ctx
        .data()
        .nomi
        .relay_reply(&room, ctx.channel_id().get())
        .await?;

    let message = match (delivery.text_sent, delivery.image_sent) {
        (true, true) => "📨 Reply posted with an image.",
        (true, false) => "📨 Reply posted.",
        (false, true) => "📨 Image reply posted.",
        (false, false) => "The companion replied but the message could not be posted.",
    };
    ctx.send(
        poise::CreateReply::default()
            .content(message)
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
