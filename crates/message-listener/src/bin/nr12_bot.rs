//! NR12 checklist bot.
//!
//! Reads `TELEGRAM_TOKEN` and the engine options from the environment
//! (or `.env`), long-polls Telegram and serves operators until Ctrl+C.

use std::sync::Arc;

use checklist_engine::{ChecklistEngine, ChecklistService, EngineConfig};
use database::Database;
use message_listener::{MessageProcessor, ProcessorConfig};
use telegram_client::{BotConfig, TelegramClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::from_env()?;
    let db = Database::connect(&config.sqlite_url).await?;
    db.migrate().await?;

    let client = TelegramClient::connect(BotConfig::from_env()?).await?;
    let me = client.get_me().await?;
    info!(
        "Bot @{} ready (message-listener v{})",
        me.username.as_deref().unwrap_or(&me.first_name),
        message_listener::version()
    );

    let engine = Arc::new(ChecklistEngine::new(
        ChecklistService::new(db.clone(), config),
        client.clone(),
    ));
    let processor =
        MessageProcessor::new(engine, ProcessorConfig::default()).with_acknowledger(client.clone());

    // Retries forever with backoff.
    let updates = telegram_client::subscribe(&client);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let result = processor.run_with_shutdown(updates, shutdown).await;
    db.close().await;
    result?;

    info!("Bot stopped");
    Ok(())
}
