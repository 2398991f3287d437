//! SQLite outlet store
//!
//! Executes already-validated SELECT statements against the local catalogue
//! and returns rows as JSON objects, since generated queries can project any
//! columns.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, ConnectOptions, Row, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use sdk::errors::EngineError;

/// Statement used to load every outlet that can be ranked by distance
pub const LOCATED_OUTLETS_SQL: &str =
    "SELECT * FROM outlets WHERE latitude IS NOT NULL AND longitude IS NOT NULL";

/// Runs validated read-only statements
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Execute a SELECT statement and return its rows
    async fn fetch(&self, statement: &str) -> Result<Vec<Map<String, Value>>, EngineError>;
}

/// One outlet record, as stored in the catalogue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Outlet {
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postcode: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub phone_international: Option<String>,
    #[serde(default)]
    pub operating_hours: Option<String>,
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
    #[serde(default)]
    pub business_status: Option<String>,
}

/// Outlet catalogue backed by SQLite
pub struct SqliteOutletStore {
    pool: SqlitePool,
}

impl SqliteOutletStore {
    /// Open (or create) the catalogue and make sure the schema exists
    pub async fn open(db_path: &Path) -> Result<Self> {
        info!("Opening outlet catalogue at: {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create database directory")?;
        }

        let connection_string = format!("sqlite:{}", db_path.display());
        let options = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to outlet database")?;

        sqlx::raw_sql(include_str!("../../migrations/001_outlets.sql"))
            .execute(&pool)
            .await
            .context("Failed to execute migration 001_outlets.sql")?;

        debug!("Outlet catalogue ready");
        Ok(Self { pool })
    }

    /// Add an outlet and return its id
    pub async fn insert(&self, outlet: &Outlet) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO outlets (name, address, city, state, postcode, latitude, longitude, \
             phone, phone_international, operating_hours, open_time, close_time, business_status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&outlet.name)
        .bind(&outlet.address)
        .bind(&outlet.city)
        .bind(&outlet.state)
        .bind(&outlet.postcode)
        .bind(outlet.latitude)
        .bind(outlet.longitude)
        .bind(&outlet.phone)
        .bind(&outlet.phone_international)
        .bind(&outlet.operating_hours)
        .bind(&outlet.open_time)
        .bind(&outlet.close_time)
        .bind(&outlet.business_status)
        .execute(&self.pool)
        .await
        .context("Failed to insert outlet")?;

        Ok(result.last_insert_rowid())
    }

    /// Number of outlets in the catalogue
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outlets")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count outlets")?;
        Ok(count)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl SqlExecutor for SqliteOutletStore {
    async fn fetch(&self, statement: &str) -> Result<Vec<Map<String, Value>>, EngineError> {
        let rows = sqlx::query(statement)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| EngineError::Database(e.to_string()))?;

        Ok(rows.iter().map(row_to_map).collect())
    }
}

/// Convert a row to a JSON object using each value's storage class
fn row_to_map(row: &SqliteRow) -> Map<String, Value> {
    let mut map = Map::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let storage = match row.try_get_raw(idx) {
            Ok(raw) if !raw.is_null() => Some(raw.type_info().name().to_string()),
            _ => None,
        };

        let value = match storage.as_deref() {
            Some("INTEGER") | Some("BOOLEAN") => row
                .try_get_unchecked::<i64, _>(idx)
                .map(Value::from)
                .unwrap_or(Value::Null),
            Some("REAL") => row
                .try_get_unchecked::<f64, _>(idx)
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Some("TEXT") => row
                .try_get_unchecked::<String, _>(idx)
                .map(Value::String)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        };

        map.insert(column.name().to_string(), value);
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample(name: &str, lat: Option<f64>) -> Outlet {
        Outlet {
            name: name.to_string(),
            city: Some("Petaling Jaya".to_string()),
            state: Some("Selangor".to_string()),
            latitude: lat,
            longitude: lat.map(|_| 101.6),
            open_time: Some("08:00:00".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_open_creates_schema() {
        let dir = tempdir().unwrap();
        let store = SqliteOutletStore::open(&dir.path().join("outlets.db"))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_returns_typed_json() {
        let dir = tempdir().unwrap();
        let store = SqliteOutletStore::open(&dir.path().join("outlets.db"))
            .await
            .unwrap();
        let id = store.insert(&sample("ZUS Coffee SS 2", Some(3.11))).await.unwrap();

        let rows = store
            .fetch("SELECT id, name, latitude, address FROM outlets")
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], Value::from(id));
        assert_eq!(rows[0]["name"], "ZUS Coffee SS 2");
        assert_eq!(rows[0]["latitude"], 3.11);
        assert_eq!(rows[0]["address"], Value::Null);
    }

    #[tokio::test]
    async fn test_located_outlets_skip_missing_coordinates() {
        let dir = tempdir().unwrap();
        let store = SqliteOutletStore::open(&dir.path().join("outlets.db"))
            .await
            .unwrap();
        store.insert(&sample("With GPS", Some(3.1))).await.unwrap();
        store.insert(&sample("Without GPS", None)).await.unwrap();

        let rows = store.fetch(LOCATED_OUTLETS_SQL).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], "With GPS");
    }

    #[tokio::test]
    async fn test_bad_statement_is_database_error() {
        let dir = tempdir().unwrap();
        let store = SqliteOutletStore::open(&dir.path().join("outlets.db"))
            .await
            .unwrap();

        let err = store.fetch("SELECT nope FROM missing").await.unwrap_err();
        assert!(matches!(err, EngineError::Database(_)));
    }
}
