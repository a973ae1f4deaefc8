use anyhow::Result;
use shared::{get_db_connection, Config};
use signal_engine::prelude::{ServiceCommand, SignalService};
use std::sync::Arc;
use std::time::Duration;
use teloxide::{dispatching::UpdateHandler, prelude::*, utils::command::BotCommands};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

mod commands;
mod repositories;
mod services;
mod state;

use crate::{
    commands::{
        handle_help, handle_invalid, handle_signals, handle_subscribe, handle_subscriptions,
        handle_unsubscribe, handle_version, Command,
    },
    repositories::{SignalRepository, SubscriptionRepository},
    services::{BybitMarketData, TelegramNotifier},
    state::AppState,
};

const MARKET_EVENT_BUFFER: usize = 1024;
const CONTROL_BUFFER: usize = 32;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

fn schema() -> UpdateHandler<anyhow::Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<Command, _>()
        .branch(case![Command::Start].endpoint(handle_help))
        .branch(case![Command::Help].endpoint(handle_help))
        .branch(case![Command::Subscribe(args)].endpoint(handle_subscribe))
        .branch(case![Command::Unsubscribe(args)].endpoint(handle_unsubscribe))
        .branch(case![Command::Subscriptions].endpoint(handle_subscriptions))
        .branch(case![Command::Signals].endpoint(handle_signals))
        .branch(case![Command::Version].endpoint(handle_version));

    Update::filter_message()
        .branch(command_handler)
        .branch(dptree::endpoint(handle_invalid))
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Starting MACD signal bot...");

    let config = Config::from_env()?;
    let db = Arc::new(get_db_connection(&config.database_url).await?);
    tracing::info!("Connected to database successfully");

    let bot = Bot::new(&config.bot_token);
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!("Failed to register bot commands: {}", e);
    }

    let (events_tx, events_rx) = mpsc::channel(MARKET_EVENT_BUFFER);
    let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);

    let (market, stream) = BybitMarketData::new(&config, events_tx)?;
    let stream_task = tokio::spawn(stream.run());

    let subscriptions = Arc::new(SubscriptionRepository::new(db.clone()));
    let signals = Arc::new(SignalRepository::new(db.clone()));
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), config.bot_name.clone()));

    let service = SignalService::new(
        config.engine_settings(),
        Arc::new(market),
        subscriptions.clone(),
        signals.clone(),
        notifier,
    );
    let service_task = tokio::spawn(service.run(events_rx, control_rx));
    tracing::info!("Signal service started");

    let app_state = Arc::new(AppState {
        bot_name: config.bot_name.clone(),
        subscriptions,
        signals,
        control: control_tx.clone(),
    });

    let mut dispatcher = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![app_state])
        .enable_ctrlc_handler()
        .build();

    tracing::info!("Bot is running and waiting for updates...");
    dispatcher.dispatch().await;

    tracing::info!("Shutting down signal service...");
    let _ = control_tx.send(ServiceCommand::Shutdown).await;
    if tokio::time::timeout(SHUTDOWN_GRACE, service_task).await.is_err() {
        tracing::warn!("Signal service did not stop in time");
    }
    // The stream task ends once the service drops its market data handle
    if tokio::time::timeout(SHUTDOWN_GRACE, stream_task).await.is_err() {
        tracing::warn!("Market stream did not stop in time");
    }
    Ok(())
}
