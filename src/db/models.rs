/// Row type for the `price_history` table.
#[derive(Debug, sqlx::FromRow)]
pub struct PriceRow {
    pub item_name: String,
    /// Canonical decimal string, e.g. "1234.50".
    pub price: String,
    pub currency_hint: Option<String>,
    /// RFC 3339 UTC timestamp.
    pub recorded_at: String,
}
