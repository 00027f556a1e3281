use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::db::PriceStore;
use crate::error::FetchError;
use crate::extract::pipeline;
use crate::fetcher::PageFetcher;
use crate::notify::{alert_message, Notifier};
use crate::stats::LatencyStats;
use crate::tracker::decision::decide;
use crate::types::{ItemConfig, ItemResult, RunSummary, TrackedItem};

/// Drives one item through fetch, extract, decide, persist and notify.
/// Every failure is contained in the returned `ItemResult`.
pub struct ItemRunner {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn PriceStore>,
    notifier: Arc<Notifier>,
    /// Channels every alert is sent to.
    channels: Vec<String>,
    fetch_timeout: Duration,
    latency: Arc<LatencyStats>,
}

impl ItemRunner {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn PriceStore>,
        notifier: Arc<Notifier>,
        channels: Vec<String>,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            notifier,
            channels,
            fetch_timeout,
            latency: Arc::new(LatencyStats::new()),
        }
    }

    pub fn latency(&self) -> Arc<LatencyStats> {
        Arc::clone(&self.latency)
    }

    /// Run every item concurrently. Items share nothing but the collaborators.
    pub async fn run_all(&self, items: &[ItemConfig]) -> RunSummary {
        info!(items = items.len(), channels = ?self.channels, "[RUN] Checking prices");

        let results = join_all(items.iter().map(|item| self.run_item(item))).await;

        let mut summary = RunSummary::default();
        for (item, result) in items.iter().zip(&results) {
            match result.failure() {
                Some(reason) => {
                    debug!(item = %item.name, result = result.label(), reason = %reason, "[RUN] Item finished")
                }
                None => debug!(item = %item.name, result = result.label(), "[RUN] Item finished"),
            }
            summary.record(result);
        }
        info!(
            tracked = summary.tracked,
            fetch_failed = summary.fetch_failed,
            extraction_failed = summary.extraction_failed,
            storage_failed = summary.storage_failed,
            persisted = summary.persisted,
            alerts = summary.alerts,
            "[RUN] Complete: {}/{} items tracked",
            summary.tracked,
            summary.items,
        );
        summary
    }

    pub async fn run_item(&self, item: &ItemConfig) -> ItemResult {
        let body = match self.fetch(&item.url).await {
            Ok(body) => body,
            Err(e) => {
                warn!(item = %item.name, url = %item.url, error = %e, "[FETCH] Failed, skipping item");
                return ItemResult::FetchFailed(e);
            }
        };

        let price = match pipeline::run(&body, &item.selectors) {
            Ok(price) => price,
            Err(e) => {
                warn!(item = %item.name, error = %e, "[EXTRACT] Failed, skipping item");
                return ItemResult::ExtractionFailed(e);
            }
        };
        debug!(item = %item.name, price = %price, "[EXTRACT] Price found");

        let previous = match self.store.get_last_price(&item.name).await {
            Ok(record) => record.map(|r| r.price()),
            Err(e) => {
                warn!(item = %item.name, error = %e, "[DB] History lookup failed, skipping item");
                return ItemResult::StorageFailed(e);
            }
        };

        let outcome = decide(item, &price, previous);
        info!(
            item = %item.name,
            price = %outcome.new_price,
            target = %item.target_price,
            state = %outcome.state(),
            persist = outcome.should_persist,
            notify = outcome.should_notify,
            "[TRACK] {}",
            item.name,
        );

        let mut tracked = TrackedItem {
            outcome,
            persisted: false,
            persist_error: None,
            notified_channels: Vec::new(),
            failed_channels: Vec::new(),
        };

        if tracked.outcome.should_persist {
            match self
                .store
                .append_record(&item.name, &item.url, &tracked.outcome.new_price, Utc::now())
                .await
            {
                Ok(()) => tracked.persisted = true,
                Err(e) => {
                    warn!(item = %item.name, error = %e, "[DB] Failed to record price");
                    tracked.persist_error = Some(e);
                }
            }
        }

        if tracked.outcome.should_notify {
            self.notify(item, &mut tracked).await;
        }

        ItemResult::Tracked(tracked)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.fetch_timeout, self.fetcher.fetch(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout),
        };
        self.latency.record(started.elapsed());
        result
    }

    async fn notify(&self, item: &ItemConfig, tracked: &mut TrackedItem) {
        if self.channels.is_empty() {
            warn!(item = %item.name, "[NOTIFY] Target reached but no notification channels configured");
            return;
        }

        let message = alert_message(item, &tracked.outcome);
        let deliveries = self.channels.iter().map(|channel| {
            let message = &message;
            async move { (channel, self.notifier.send(channel, message).await) }
        });

        for (channel, result) in join_all(deliveries).await {
            match result {
                Ok(()) => {
                    info!(item = %item.name, channel = %channel, "[NOTIFY] Alert sent");
                    tracked.notified_channels.push(channel.clone());
                }
                Err(e) => {
                    warn!(item = %item.name, channel = %channel, error = %e, "[NOTIFY] Alert failed");
                    tracked.failed_channels.push(channel.clone());
                }
            }
        }
    }
}
