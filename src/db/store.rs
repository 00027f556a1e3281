use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::db::models::PriceRow;
use crate::error::{Result, StorageError};
use crate::types::{NormalizedPrice, PriceRecord};

/// Price history per item. Only the most recent record is ever read back.
#[async_trait]
pub trait PriceStore: Send + Sync {
    async fn get_last_price(&self, item_name: &str) -> std::result::Result<Option<PriceRecord>, StorageError>;

    async fn append_record(
        &self,
        item_name: &str,
        url: &str,
        price: &NormalizedPrice,
        recorded_at: DateTime<Utc>,
    ) -> std::result::Result<(), StorageError>;
}

/// SQLite-backed history. Prices are stored as decimal strings so reads are exact.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database file and apply migrations.
    /// Open (or create) the database file, creating missing parent directories.
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self::from_pool(pool).await?;
        info!("[DB] Price history ready at {path}");
        Ok(store)
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl PriceStore for SqliteStore {
    async fn get_last_price(&self, item_name: &str) -> std::result::Result<Option<PriceRecord>, StorageError> {
        let row: Option<PriceRow> = sqlx::query_as(
            r#"
            SELECT item_name, price, currency_hint, recorded_at
            FROM price_history
            WHERE item_name = ?
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(item_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(record_from_row).transpose()
    }

    async fn append_record(
        &self,
        item_name: &str,
        url: &str,
        price: &NormalizedPrice,
        recorded_at: DateTime<Utc>,
    ) -> std::result::Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO price_history (item_name, url, price, currency_hint, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_name)
        .bind(url)
        .bind(price.value.to_string())
        .bind(price.currency_hint.as_deref())
        .bind(recorded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!(item = %item_name, price = %price.value, "[DB] Price recorded");
        Ok(())
    }
}

fn record_from_row(row: PriceRow) -> std::result::Result<PriceRecord, StorageError> {
    let value = Decimal::from_str(&row.price).map_err(|_| StorageError::CorruptPrice(row.price.clone()))?;
    let recorded_at = DateTime::parse_from_rfc3339(&row.recorded_at)
        .map_err(|_| StorageError::CorruptTimestamp(row.recorded_at.clone()))?
        .with_timezone(&Utc);
    Ok(PriceRecord {
        item_name: row.item_name,
        value,
        currency_hint: row.currency_hint,
        recorded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteStore::from_pool(pool).await.unwrap()
    }

    fn price(s: &str, hint: Option<&str>) -> NormalizedPrice {
        let mut p = NormalizedPrice::new(Decimal::from_str(s).unwrap());
        p.currency_hint = hint.map(str::to_string);
        p
    }

    #[tokio::test]
    async fn empty_history_has_no_last_price() {
        let store = memory_store().await;
        assert!(store.get_last_price("kettle").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn last_price_is_most_recent_append() {
        let store = memory_store().await;
        let t0 = Utc::now();
        store
            .append_record("kettle", "https://shop.test/k", &price("120.00", Some("€")), t0)
            .await
            .unwrap();
        store
            .append_record("kettle", "https://shop.test/k", &price("99.90", None), t0)
            .await
            .unwrap();
        store
            .append_record("toaster", "https://shop.test/t", &price("10.00", None), t0)
            .await
            .unwrap();

        let last = store.get_last_price("kettle").await.unwrap().unwrap();
        assert_eq!(last.value, Decimal::from_str("99.90").unwrap());
        assert_eq!(last.currency_hint, None);
        assert_eq!(last.price().value.to_string(), "99.90");
        assert_eq!(last.recorded_at.timestamp(), t0.timestamp());
    }

    #[tokio::test]
    async fn prices_round_trip_exactly() {
        let store = memory_store().await;
        store
            .append_record("big", "https://shop.test/b", &price("12345678901234.99", Some("USD")), Utc::now())
            .await
            .unwrap();
        let last = store.get_last_price("big").await.unwrap().unwrap();
        assert_eq!(last.value.to_string(), "12345678901234.99");
        assert_eq!(last.currency_hint.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn corrupt_price_is_reported() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO price_history (item_name, url, price, recorded_at) VALUES ('x', 'u', 'cheap', '2024-01-01T00:00:00Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();
        let err = store.get_last_price("x").await.unwrap_err();
        assert!(matches!(err, StorageError::CorruptPrice(p) if p == "cheap"));
    }

    #[tokio::test]
    async fn connect_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        let store = SqliteStore::connect(path.to_str().unwrap()).await.unwrap();
        store
            .append_record("kettle", "https://shop.test/k", &price("5.00", None), Utc::now())
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn connect_creates_missing_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("nested").join("history.db");
        let store = SqliteStore::connect(path.to_str().unwrap()).await.unwrap();
        store
            .append_record("kettle", "https://shop.test/k", &price("7.50", None), Utc::now())
            .await
            .unwrap();
        assert!(path.exists());
        let last = store.get_last_price("kettle").await.unwrap().unwrap();
        assert_eq!(last.value, Decimal::from_str("7.50").unwrap());
    }
}
