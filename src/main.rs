use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::update_listeners::{webhooks, Polling};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use time_cop::bot::{self, FlowController};
use time_cop::config::{AppConfig, LogFormat};
use time_cop::db::{self, PgStore};
use time_cop::extraction::{GeminiClient, GeminiConfig};
use time_cop::health;
use time_cop::localization::init_localization;
use time_cop::rate_limit::RateLimiter;
use time_cop::store::RecordStore;

/// How often idle conversations are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn,reqwest=warn", config.log_level)));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config);

    info!("Starting Time Cop Telegram Bot");

    init_localization().context("Failed to load message catalogues")?;

    info!(
        min = config.db_pool_min_size,
        max = config.db_pool_max_size,
        "Creating database connection pool"
    );
    let pool = PgPoolOptions::new()
        .min_connections(config.db_pool_min_size)
        .max_connections(config.db_pool_max_size)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    db::init_database_schema(&pool).await?;

    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));
    let extractor = GeminiClient::new(
        GeminiConfig::new(config.gemini_api_key.clone())
            .with_model(config.gemini_model.clone())
            .with_api_url(config.gemini_api_url.clone()),
    )?;

    let controller = Arc::new(
        FlowController::new(
            Arc::clone(&store),
            Arc::new(extractor),
            config.timezone,
            config.conversation_timeout,
        )
        .with_session_mirror(config.session_mirror),
    );
    let limiter = Arc::new(RateLimiter::per_minute(config.rate_limit_messages));

    // Periodic timeout sweep
    {
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                controller.expire_idle().await;
            }
        });
    }

    {
        let store = Arc::clone(&store);
        let addr = config.health_addr;
        tokio::spawn(async move {
            if let Err(e) = health::serve(addr, store).await {
                error!(error = %e, "Health server stopped");
            }
        });
    }

    // Initialize the bot
    let bot = Bot::new(config.telegram_bot_token.clone());
    bot::register_commands(&bot).await?;
    let me = bot.get_me().await?;
    let bot_username = Arc::new(me.username().to_string());

    info!(username = %bot_username, "Bot initialized, starting dispatcher");

    let handler = dptree::entry().branch(Update::filter_message().endpoint({
        let controller = Arc::clone(&controller);
        let limiter = Arc::clone(&limiter);
        let bot_username = Arc::clone(&bot_username);
        move |bot: Bot, msg: Message| {
            let controller = Arc::clone(&controller);
            let limiter = Arc::clone(&limiter);
            let bot_username = Arc::clone(&bot_username);
            async move { bot::message_handler(bot, msg, controller, limiter, bot_username).await }
        }
    }));

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .enable_ctrlc_handler()
        .build();

    match config.webhook_endpoint() {
        Some(endpoint) => {
            let url = endpoint.parse().context("Invalid WEBHOOK_URL")?;
            info!(%endpoint, addr = %config.webhook_addr, "Receiving updates via webhook");
            let listener = webhooks::axum(bot, webhooks::Options::new(config.webhook_addr, url))
                .await
                .context("Failed to set up webhook")?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
        None => {
            info!("Receiving updates via long polling");
            bot.delete_webhook().await?;
            let listener = Polling::builder(bot).drop_pending_updates().build();
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await;
        }
    }

    Ok(())
}
