use anyhow::Result;
use signal_engine::prelude::SignalScope;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::services::messages::format_signal_history;
use crate::state::AppState;

const HISTORY_LIMIT: u64 = 10;

/// Latest signals delivered to the calling user
pub async fn handle_signals(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(user_id) = msg.from.as_ref().map(|f| f.id.0 as i64) else {
        return Ok(());
    };
    tracing::info!("Handling /signals for user {}", user_id);

    let signals = state
        .signals
        .recent_for_scope(SignalScope::User(user_id), HISTORY_LIMIT)
        .await?;
    bot.send_message(msg.chat.id, format_signal_history(&signals))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
