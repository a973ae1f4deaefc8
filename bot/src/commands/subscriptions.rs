use anyhow::Result;
use regex::Regex;
use signal_engine::prelude::{Interval, ScopeTarget, ServiceCommand, SignalScope};
use std::sync::{Arc, OnceLock};
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use crate::services::messages::{escape_html, format_subscription_list};
use crate::state::AppState;

#[derive(Debug, Clone, PartialEq)]
pub struct SubscribeRequest {
    pub symbol: String,
    pub interval: Interval,
    pub take_profit_percent: Option<f64>,
}

fn symbol_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Z0-9]{1,20}USDT$").expect("symbol pattern is valid"))
}

/// `SYMBOL INTERVAL [TP%]`; errors are ready to show to the user
pub fn parse_subscribe_args(args: &str) -> Result<SubscribeRequest, String> {
    let parts: Vec<&str> = args.split_whitespace().collect();
    let (symbol, interval, take_profit) = match parts.as_slice() {
        [symbol, interval] => (*symbol, *interval, None),
        [symbol, interval, tp] => (*symbol, *interval, Some(*tp)),
        _ => {
            return Err(
                "Usage: <code>/subscribe SYMBOL INTERVAL [TP%]</code>\nExample: <code>/subscribe BTCUSDT 15m 2</code>"
                    .to_string(),
            )
        }
    };

    let symbol = symbol.to_uppercase();
    if !symbol_pattern().is_match(&symbol) {
        return Err(format!(
            "❌ <code>{}</code> is not a USDT pair symbol, e.g. <code>BTCUSDT</code>",
            escape_html(&symbol)
        ));
    }

    let interval: Interval = interval.parse().map_err(|_| {
        format!(
            "❌ Unsupported interval <code>{}</code>. Supported: {}",
            escape_html(interval),
            Interval::supported_list()
        )
    })?;

    let take_profit_percent = match take_profit {
        None => None,
        Some(raw) => {
            let value: f64 = raw.trim_end_matches('%').parse().map_err(|_| {
                format!("❌ Take profit must be a number, got <code>{}</code>", escape_html(raw))
            })?;
            if !(value > 0.0 && value <= 100.0) {
                return Err("❌ Take profit must be between 0 and 100 percent".to_string());
            }
            Some(value)
        }
    };

    Ok(SubscribeRequest {
        symbol,
        interval,
        take_profit_percent,
    })
}

async fn notify_service(state: &AppState) {
    if state.control.send(ServiceCommand::SubscriptionsChanged).await.is_err() {
        tracing::warn!("Signal service is not running; change applies on next start");
    }
}

pub async fn handle_subscribe(
    bot: Bot,
    msg: Message,
    args: String,
    state: Arc<AppState>,
) -> Result<()> {
    let Some(user_id) = msg.from.as_ref().map(|f| f.id.0 as i64) else {
        return Ok(());
    };
    tracing::info!("Handling /subscribe {} for user {}", args, user_id);

    let request = match parse_subscribe_args(&args) {
        Ok(request) => request,
        Err(message) => {
            bot.send_message(msg.chat.id, message)
                .parse_mode(ParseMode::Html)
                .await?;
            return Ok(());
        }
    };

    let subscription = state
        .subscriptions
        .upsert(
            user_id,
            &request.symbol,
            request.interval,
            request.take_profit_percent,
        )
        .await?;
    notify_service(&state).await;

    let take_profit = ScopeTarget::with_take_profit(
        SignalScope::User(user_id),
        subscription.take_profit_override,
    )
    .take_profit_for(subscription.interval);
    bot.send_message(
        msg.chat.id,
        format!(
            "✅ Subscribed to <b>{}</b> {} (id <code>#{}</code>)\n🎯 Take profit: <code>{:.2}%</code>\n\nSignals arrive in your private chat with this bot.",
            escape_html(&subscription.symbol),
            subscription.interval,
            subscription.id,
            take_profit,
        ),
    )
    .parse_mode(ParseMode::Html)
    .await?;
    Ok(())
}

pub async fn handle_unsubscribe(
    bot: Bot,
    msg: Message,
    args: String,
    state: Arc<AppState>,
) -> Result<()> {
    let Some(user_id) = msg.from.as_ref().map(|f| f.id.0 as i64) else {
        return Ok(());
    };
    tracing::info!("Handling /unsubscribe {} for user {}", args, user_id);

    let Ok(id) = args.trim().trim_start_matches('#').parse::<i64>() else {
        bot.send_message(
            msg.chat.id,
            "Usage: <code>/unsubscribe ID</code> (see /subscriptions)",
        )
        .parse_mode(ParseMode::Html)
        .await?;
        return Ok(());
    };

    let reply = if state.subscriptions.deactivate(user_id, id).await? {
        notify_service(&state).await;
        format!("🗑 Subscription <code>#{}</code> removed.", id)
    } else {
        format!("❌ No active subscription <code>#{}</code>.", id)
    };
    bot.send_message(msg.chat.id, reply)
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}

pub async fn handle_subscriptions(bot: Bot, msg: Message, state: Arc<AppState>) -> Result<()> {
    let Some(user_id) = msg.from.as_ref().map(|f| f.id.0 as i64) else {
        return Ok(());
    };
    let subscriptions = state.subscriptions.list_for_user(user_id).await?;
    bot.send_message(msg.chat.id, format_subscription_list(&subscriptions))
        .parse_mode(ParseMode::Html)
        .await?;
    Ok(())
}
