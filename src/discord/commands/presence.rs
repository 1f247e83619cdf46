// Bot presence. Discord-layer glue only: takes a serenity Context and shows
// how many rooms the bridge is relaying.

use poise::serenity_prelude as serenity;

/// Show the number of relayed rooms in the bot's status line.
pub fn show_relay_count(ctx: &serenity::Context, rooms: usize) {
    let activity = match rooms {
        0 => serenity::ActivityData::listening("for /nomi start"),
        1 => serenity::ActivityData::watching("1 Nomi room"),
        n => serenity::ActivityData::watching(format!("{n} Nomi rooms")),
    };
    ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
}

/// Called once the bot is ready, after autostart rooms have been started.
pub fn on_ready(ctx: &serenity::Context, rooms: usize) {
    show_relay_count(ctx, rooms);
}
