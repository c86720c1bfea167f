use anyhow::{Context, Result};
use std::env;
use std::sync::Arc;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use shopbot::bot::{self, TelegramNotifier};
use shopbot::db::PgStore;
use shopbot::dialogue::Session;
use shopbot::engine::ConversationEngine;
use shopbot::finalizer::OrderFinalizer;
use shopbot::localization::init_localization;
use shopbot::referral::ReferralLedger;
use shopbot::shop_config::{ShopConfig, DEFAULT_CONFIG_PATH};
use shopbot::store::{MemoryStore, OrderStore, ReferralStore, SupplyStore};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = env::var("LOG_FORMAT").is_ok_and(|format| format.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

type Stores = (
    Arc<dyn OrderStore>,
    Arc<dyn SupplyStore>,
    Arc<dyn ReferralStore>,
);

fn stores<S>(store: Arc<S>) -> Stores
where
    S: OrderStore + SupplyStore + ReferralStore + 'static,
{
    (store.clone(), store.clone(), store)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    init_tracing();

    info!("Starting Shop Telegram Bot");

    init_localization()?;

    let bot_token = env::var("TELEGRAM_BOT_TOKEN").context("TELEGRAM_BOT_TOKEN must be set")?;
    let config_path = env::var("SHOP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let config = Arc::new(
        ShopConfig::load(&config_path)
            .with_context(|| format!("Failed to load shop configuration from {config_path}"))?,
    );
    info!(
        path = %config_path,
        locations = config.catalog.locations.len(),
        collections = config.catalog.collections.len(),
        "Shop configuration loaded"
    );

    let (orders, supply, referrals) = match env::var("DATABASE_URL") {
        Ok(database_url) => {
            info!("Connecting to database");
            stores(Arc::new(PgStore::connect(&database_url).await?))
        }
        Err(_) => {
            warn!("DATABASE_URL not set, orders are kept in memory and lost on restart");
            stores(Arc::new(MemoryStore::new()))
        }
    };

    let bot = Bot::new(bot_token);

    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), Arc::clone(&config)));
    let finalizer = OrderFinalizer::new(orders, supply, ReferralLedger::new(referrals), notifier);
    let engine = Arc::new(ConversationEngine::new(Arc::clone(&config), finalizer));

    info!("Bot initialized, starting dispatcher");

    Dispatcher::builder(bot, bot::schema())
        .dependencies(dptree::deps![engine, InMemStorage::<Session>::new()])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
