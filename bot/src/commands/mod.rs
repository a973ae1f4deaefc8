use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use teloxide::prelude::*;
use teloxide::types::{Message, ParseMode};
use teloxide::utils::command::BotCommands;

use crate::state::AppState;

pub mod admin;
pub mod signals;
pub mod subscriptions;

pub use admin::handle_version;
pub use signals::handle_signals;
pub use subscriptions::{handle_subscribe, handle_subscriptions, handle_unsubscribe};

/// 📈 <b>MACD Signal Bot</b>: available commands
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
pub enum Command {
    /// ✨ Show this help
    Help,
    /// ❓ Start using the bot
    Start,
    /// ➕ Subscribe to a pair: /subscribe BTCUSDT 15m [take profit %]
    Subscribe(String),
    /// ➖ Remove a subscription by id: /unsubscribe 3
    Unsubscribe(String),
    /// 📋 List your subscriptions
    Subscriptions,
    /// 🗂 Your recent signals
    Signals,
    /// What is the current version ?
    Version,
}

pub async fn handle_help(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let start_time = Instant::now();
    let user_id = msg.from.as_ref().map(|f| f.id.0 as i64).unwrap_or_default();
    tracing::info!("Handling /help command for user {}", user_id);

    let help_text = format!(
        "🤖 <b>{}</b>\n\n\
Signals fire when MACD momentum fades on a closed candle, volume confirms \
and the next higher timeframe agrees. Each signal resolves on its take \
profit or when its validity window ends.\n\n{}",
        crate::services::messages::escape_html(&state.bot_name),
        Command::descriptions()
    );

    bot.send_message(msg.chat.id, help_text)
        .parse_mode(ParseMode::Html)
        .await?;
    tracing::info!("Time taken to handle /help command: {:?}", start_time.elapsed());
    Ok(())
}

pub async fn handle_invalid(bot: Bot, msg: Message) -> Result<()> {
    if msg.chat.is_private() {
        bot.send_message(
            msg.chat.id,
            "🤔 Unknown command. Send /help to see what I can do.",
        )
        .await?;
    }
    Ok(())
}
