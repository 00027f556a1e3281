mod config;
mod db;
mod error;
mod extract;
mod fetcher;
mod items;
mod notify;
mod stats;
mod tracker;
mod types;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::db::{MemoryStore, PriceStore, SqliteStore};
use crate::error::Result;
use crate::fetcher::HttpFetcher;
use crate::notify::Notifier;
use crate::tracker::ItemRunner;
use crate::types::RunSummary;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<RunSummary> {
    // --- Item catalogue ---
    let catalog = items::load(&cfg.items_path)?;

    // --- Notification channels ---
    if cfg.telegram_bot_token.is_some() != cfg.telegram_chat_id.is_some() {
        warn!("[NOTIFY] TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must both be set; telegram disabled");
    }
    if cfg.email_incomplete() {
        warn!("[NOTIFY] EMAIL_HOST, EMAIL_USER, EMAIL_PASSWORD and EMAIL_RECIPIENT must all be set; email disabled");
    }
    let notifier = Notifier::from_config(&cfg)?;
    for name in notifier.missing(&catalog.channels) {
        warn!(channel = name, "[NOTIFY] Configured channel has no implementation; alerts to it will fail");
    }

    // --- Price history ---
    let store: Arc<dyn PriceStore> = if cfg.dry_run {
        info!("[DB] DRY_RUN set: price history kept in memory only");
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(SqliteStore::connect(&cfg.db_path).await?)
    };

    // --- Run ---
    let fetcher = Arc::new(HttpFetcher::new(&cfg)?);
    let runner = ItemRunner::new(
        fetcher,
        store,
        Arc::new(notifier),
        catalog.channels.clone(),
        cfg.fetch_timeout(),
    );
    let summary = runner.run_all(&catalog.items).await;

    let latency = runner.latency();
    if let Some(p) = latency.percentiles() {
        info!(
            fetches = latency.count(),
            "[RUN] Fetch latency p50={}ms p95={}ms p99={}ms max={}ms",
            p.p50_ms, p.p95_ms, p.p99_ms, p.max_ms,
        );
    }
    if summary.persist_failed > 0 || summary.notifications_failed > 0 {
        warn!(
            persist_failed = summary.persist_failed,
            notifications_failed = summary.notifications_failed,
            "[RUN] Some side effects failed"
        );
    }
    info!(
        sent = summary.notifications_sent,
        "[RUN] Done: {} alert(s), {} price change(s) recorded",
        summary.alerts,
        summary.persisted,
    );

    Ok(summary)
}
