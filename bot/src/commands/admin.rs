use chrono::{TimeZone, Utc};
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::state::AppState;

/// Build time as a readable UTC string when it is an epoch timestamp
fn human_build_time(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|epoch| Utc.timestamp_opt(epoch, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Handler for the /version command; values are embedded by build.rs
pub async fn handle_version(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), anyhow::Error> {
    let user_id = msg.from.as_ref().map(|f| f.id.0 as i64).unwrap_or_default();
    tracing::info!("Handling /version command for user {}", user_id);

    let version_info = format!(
        "✅ 🤖 <b>Bot Version</b>\n\
        <b>Branch:</b> <code>{}</code>\n\
        <b>Tag:</b> <code>{}</code>\n\
        <b>Commit:</b> <code>{}</code>\n\
        <b>Build Time:</b> <code>{}</code>\n\
        <b>OS:</b> <code>{}</code>\n\
        <b>Bot:</b> {}",
        option_env!("GIT_BRANCH").unwrap_or("unknown"),
        option_env!("GIT_TAG").unwrap_or("unknown"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        human_build_time(option_env!("BUILD_TIME").unwrap_or("unknown")),
        option_env!("CARGO_CFG_TARGET_OS").unwrap_or("unknown"),
        crate::services::messages::escape_html(&state.bot_name),
    );

    bot.send_message(msg.chat.id, version_info)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
