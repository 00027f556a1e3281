use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use crate::error::{ExtractionFailure, FetchError, StorageError};
use crate::extract::CompiledSelector;

// ---------------------------------------------------------------------------
// Item configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKind {
    Css,
    XPath,
}

impl std::fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectorKind::Css => write!(f, "css"),
            SelectorKind::XPath => write!(f, "xpath"),
        }
    }
}

/// One extraction rule. Position in `ItemConfig::selectors` is its fallback priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorRule {
    pub kind: SelectorKind,
    pub expression: String,
}

impl SelectorRule {
    /// Classify a raw selector string. Path queries start with `/`, `./`, `../` or `(`;
    /// everything else is treated as CSS.
    pub fn classify(raw: &str) -> Self {
        let expression = raw.trim().to_string();
        let kind = if expression.starts_with('/')
            || expression.starts_with("./")
            || expression.starts_with("../")
            || expression.starts_with('(')
        {
            SelectorKind::XPath
        } else {
            SelectorKind::Css
        };
        Self { kind, expression }
    }
}

impl std::fmt::Display for SelectorRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.expression)
    }
}

#[derive(Debug, Clone)]
pub struct ItemConfig {
    pub name: String,
    pub url: String,
    /// Non-empty, compiled at load time.
    pub selectors: Vec<CompiledSelector>,
    /// Strictly positive.
    pub target_price: Decimal,
}

/// Validated item catalogue: what to track and where to send alerts.
#[derive(Debug, Clone)]
pub struct Catalog {
    pub channels: Vec<String>,
    pub items: Vec<ItemConfig>,
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// Canonical price: non-negative, exactly two fractional digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedPrice {
    pub value: Decimal,
    /// Symbol or code seen next to the number. Informational only.
    pub currency_hint: Option<String>,
}

impl NormalizedPrice {
    pub fn new(value: Decimal) -> Self {
        let mut value = value;
        value.rescale(2);
        Self { value, currency_hint: None }
    }
}

impl std::fmt::Display for NormalizedPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.currency_hint {
            Some(hint) => write!(f, "{} {}", self.value, hint),
            None => write!(f, "{}", self.value),
        }
    }
}

/// One persisted history row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceRecord {
    pub item_name: String,
    pub value: Decimal,
    pub currency_hint: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl PriceRecord {
    pub fn price(&self) -> NormalizedPrice {
        let mut price = NormalizedPrice::new(self.value);
        price.currency_hint = self.currency_hint.clone();
        price
    }
}

// ---------------------------------------------------------------------------
// Tracking decision
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryState {
    /// No previous price recorded for the item.
    NoHistory,
    Unchanged,
    Changed,
}

impl std::fmt::Display for HistoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HistoryState::NoHistory => "no_history",
            HistoryState::Unchanged => "unchanged",
            HistoryState::Changed => "changed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingOutcome {
    pub item_name: String,
    pub new_price: NormalizedPrice,
    pub previous_price: Option<NormalizedPrice>,
    pub should_persist: bool,
    pub should_notify: bool,
}

impl TrackingOutcome {
    pub fn state(&self) -> HistoryState {
        match &self.previous_price {
            None => HistoryState::NoHistory,
            Some(prev) if prev.value == self.new_price.value => HistoryState::Unchanged,
            Some(_) => HistoryState::Changed,
        }
    }
}

// ---------------------------------------------------------------------------
// Item run results
// ---------------------------------------------------------------------------

/// Side effects carried out for an item whose price was extracted.
#[derive(Debug)]
pub struct TrackedItem {
    pub outcome: TrackingOutcome,
    /// True only when `should_persist` was set and the append succeeded.
    pub persisted: bool,
    pub persist_error: Option<StorageError>,
    pub notified_channels: Vec<String>,
    pub failed_channels: Vec<String>,
}

#[derive(Debug)]
pub enum ItemResult {
    FetchFailed(FetchError),
    ExtractionFailed(ExtractionFailure),
    /// History lookup failed, so no decision could be made.
    StorageFailed(StorageError),
    Tracked(TrackedItem),
}

impl ItemResult {
    pub fn label(&self) -> &'static str {
        match self {
            ItemResult::FetchFailed(_) => "fetch_failed",
            ItemResult::ExtractionFailed(_) => "extraction_failed",
            ItemResult::StorageFailed(_) => "storage_failed",
            ItemResult::Tracked(_) => "tracked",
        }
    }

    /// Why the item fell short: the stage error, or the failed side effects of a tracked item.
    pub fn failure(&self) -> Option<String> {
        match self {
            ItemResult::FetchFailed(e) => Some(e.to_string()),
            ItemResult::ExtractionFailed(e) => Some(e.to_string()),
            ItemResult::StorageFailed(e) => Some(e.to_string()),
            ItemResult::Tracked(t) => {
                let mut problems = Vec::new();
                if let Some(e) = &t.persist_error {
                    problems.push(format!("persist: {e}"));
                }
                if !t.failed_channels.is_empty() {
                    problems.push(format!("channels: {}", t.failed_channels.join(", ")));
                }
                (!problems.is_empty()).then(|| problems.join("; "))
            }
        }
    }
}

/// Aggregate counts for one run over the whole catalogue.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub items: usize,
    pub tracked: usize,
    pub fetch_failed: usize,
    pub extraction_failed: usize,
    pub storage_failed: usize,
    pub persisted: usize,
    pub persist_failed: usize,
    pub alerts: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
}

impl RunSummary {
    pub fn record(&mut self, result: &ItemResult) {
        self.items += 1;
        match result {
            ItemResult::FetchFailed(_) => self.fetch_failed += 1,
            ItemResult::ExtractionFailed(_) => self.extraction_failed += 1,
            ItemResult::StorageFailed(_) => self.storage_failed += 1,
            ItemResult::Tracked(t) => {
                self.tracked += 1;
                if t.persisted {
                    self.persisted += 1;
                }
                if t.persist_error.is_some() {
                    self.persist_failed += 1;
                }
                if t.outcome.should_notify {
                    self.alerts += 1;
                }
                self.notifications_sent += t.notified_channels.len();
                self.notifications_failed += t.failed_channels.len();
            }
        }
    }
}
