use super::messages::{format_signal_message, format_update_message, html_to_plain};
use anyhow::anyhow;
use async_trait::async_trait;
use signal_engine::prelude::{EngineError, MessageRef, Notifier, Signal, SignalScope, SignalUpdate};
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tracing::{info, warn};

/// Delivers signals to the broadcast channel and to subscribers' private chats
pub struct TelegramNotifier {
    bot: Bot,
    bot_name: String,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, bot_name: String) -> Self {
        Self { bot, bot_name }
    }

    /// Send as HTML, falling back once to plain text without threading
    async fn deliver(
        &self,
        scope: SignalScope,
        html: String,
        reply_to: Option<MessageRef>,
    ) -> Result<MessageRef, EngineError> {
        let chat = ChatId(scope.target_id());

        let mut request = self
            .bot
            .send_message(chat, html.clone())
            .parse_mode(ParseMode::Html);
        if let Some(MessageRef(id)) = reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }

        match request.await {
            Ok(message) => Ok(MessageRef(message.id.0)),
            Err(e) => {
                warn!("HTML send to {} failed, retrying as plain text: {}", scope, e);
                self.bot
                    .send_message(chat, html_to_plain(&html))
                    .await
                    .map(|message| MessageRef(message.id.0))
                    .map_err(|e2| {
                        EngineError::Notification(anyhow!(
                            "send to {} failed: {} (plain text fallback: {})",
                            scope,
                            e,
                            e2
                        ))
                    })
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, scope: SignalScope, signal: &Signal) -> Result<MessageRef, EngineError> {
        let message_ref = self
            .deliver(scope, format_signal_message(signal, &self.bot_name), None)
            .await?;
        info!("📤 Sent {} signal for {} to {}", signal.side, signal.pair, scope);
        Ok(message_ref)
    }

    async fn reply(
        &self,
        scope: SignalScope,
        reply_to: Option<MessageRef>,
        update: &SignalUpdate,
    ) -> Result<(), EngineError> {
        self.deliver(scope, format_update_message(update), reply_to)
            .await?;
        info!(
            "📤 Sent {} update for {} to {}",
            update.status, update.signal.pair, scope
        );
        Ok(())
    }
}
