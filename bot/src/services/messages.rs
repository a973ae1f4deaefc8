//! Telegram message bodies (HTML parse mode)

use signal_engine::prelude::{Side, Signal, SignalStatus, SignalUpdate, Subscription};

/// Escape text for Telegram HTML
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Strip tags and unescape entities, for the plain text fallback
pub fn html_to_plain(html: &str) -> String {
    let mut plain = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => plain.push(c),
            _ => {}
        }
    }
    plain
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// More decimals for cheaper coins
pub fn format_price(price: f64) -> String {
    let abs = price.abs();
    if abs >= 1000.0 {
        format!("{:.2}", price)
    } else if abs >= 1.0 {
        format!("{:.4}", price)
    } else {
        format!("{:.8}", price)
    }
}

fn side_badge(side: Side) -> &'static str {
    match side {
        Side::Long => "🟢 <b>LONG</b>",
        Side::Short => "🔴 <b>SHORT</b>",
    }
}

fn format_duration(duration: chrono::Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h {}m", h, m),
    }
}

pub fn format_signal_message(signal: &Signal, bot_name: &str) -> String {
    let target = match signal.side {
        Side::Long => signal.entry_price * (1.0 + signal.take_profit_percent / 100.0),
        Side::Short => signal.entry_price * (1.0 - signal.take_profit_percent / 100.0),
    };
    format!(
        "{} <b>{}</b>\n\n\
💰 <b>Entry:</b> <code>{}</code>\n\
🎯 <b>Take profit:</b> <code>{}</code> ({:.2}%)\n\
📍 <b>Timeframe:</b> <code>{}</code>\n\
⏳ <b>Valid for:</b> <code>{}h</code>\n\
⏰ <b>Time:</b> <code>{}</code>\n\n\
📈 <b>Strategy:</b> MACD momentum fading, confirmed on <code>{}</code>\n\
🤖 <b>Bot:</b> {}\n\n\
⚠️ <i>Signals are not financial advice. Always do your own research!</i>",
        side_badge(signal.side),
        escape_html(&signal.pair.symbol),
        format_price(signal.entry_price),
        format_price(target),
        signal.take_profit_percent,
        signal.pair.interval,
        signal.validity_hours,
        signal.entry_time.format("%Y-%m-%d %H:%M UTC"),
        signal
            .pair
            .interval
            .higher_timeframe()
            .map(|i| i.as_str())
            .unwrap_or("-"),
        escape_html(bot_name),
    )
}

pub fn format_update_message(update: &SignalUpdate) -> String {
    let signal = &update.signal;
    let headline = match update.status {
        SignalStatus::Success => "✅ <b>Take profit reached</b>",
        SignalStatus::Failure => "❌ <b>Signal expired</b>",
        SignalStatus::Active => "📊 <b>Signal update</b>",
    };
    format!(
        "{} {} {}\n\n\
💰 <b>Entry:</b> <code>{}</code>\n\
🏁 <b>Exit:</b> <code>{}</code>\n\
📊 <b>P/L:</b> <code>{:+.2}%</code>\n\
🚀 <b>Best move:</b> <code>{:.2}%</code>\n\
⏱ <b>Held:</b> <code>{}</code>",
        headline,
        escape_html(&signal.pair.symbol),
        signal.side.as_str().to_uppercase(),
        format_price(signal.entry_price),
        format_price(update.exit_price),
        update.pnl_percent,
        signal.max_favorable_excursion,
        format_duration(update.held_for()),
    )
}

/// Body for `/subscriptions`
pub fn format_subscription_list(subscriptions: &[Subscription]) -> String {
    if subscriptions.is_empty() {
        return "📭 You have no subscriptions.\n\nUse <code>/subscribe BTCUSDT 15m</code> to add one."
            .to_string();
    }
    let mut text = String::from("📋 <b>Your subscriptions</b>\n\n");
    for sub in subscriptions {
        let take_profit = match sub.take_profit_override {
            Some(tp) => format!("{:.2}%", tp),
            None => format!("{:.2}% (default)", sub.interval.config().take_profit_percent),
        };
        text.push_str(&format!(
            "<code>#{}</code> <b>{}</b> {} · TP {}\n",
            sub.id,
            escape_html(&sub.symbol),
            sub.interval,
            take_profit
        ));
    }
    text.push_str("\nRemove one with <code>/unsubscribe &lt;id&gt;</code>.");
    text
}

/// Body for `/signals`
pub fn format_signal_history(signals: &[Signal]) -> String {
    if signals.is_empty() {
        return "📭 No signals yet.".to_string();
    }
    let mut text = String::from("🗂 <b>Recent signals</b>\n\n");
    for signal in signals {
        let outcome = match (signal.status, signal.pnl_percent) {
            (SignalStatus::Active, _) => "⏳ active".to_string(),
            (status, Some(pnl)) => format!("{} {:+.2}%", status, pnl),
            (status, None) => status.to_string(),
        };
        text.push_str(&format!(
            "{} <b>{}</b> {} @ <code>{}</code> · {}\n",
            signal.entry_time.format("%m-%d %H:%M"),
            escape_html(&signal.pair.symbol),
            signal.side.as_str().to_uppercase(),
            format_price(signal.entry_price),
            outcome
        ));
    }
    text
}
