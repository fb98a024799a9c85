pub mod snapshot;

use crate::config::StoreConfig;
use crate::error::StoreError;
use log::{debug, info};
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Sqlite, Row};
use std::collections::HashMap;
use tokio::runtime::{Builder, Runtime};

/// Opaque string key-value storage underneath the snapshot adapter.
pub trait KeyValueStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store. Owns a current-thread runtime to drive sqlx, so it
/// must not be used from inside another tokio runtime's async context.
pub struct SqliteStore {
    // Dropped before the runtime that drives it
    pool: SqlitePool,
    runtime: Runtime,
}

impl SqliteStore {
    pub fn connect(database_url: &str) -> Result<Self, StoreError> {
        let runtime = Builder::new_current_thread().enable_all().build()?;

        let pool = runtime.block_on(async {
            // Create database if it doesn't exist
            if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
                info!("Creating database at {}", database_url);
                Sqlite::create_database(database_url).await?;
            }

            // A single long-lived connection keeps `sqlite::memory:` databases alive
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(database_url)
                .await?;

            Self::init_schema(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        })?;

        debug!("Connected key-value store at {}", database_url);
        Ok(Self { pool, runtime })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::connect(&config.database_url)
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        let row = self.runtime.block_on(
            sqlx::query("SELECT value FROM kv_store WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool),
        )?;

        Ok(row.map(|row| row.get::<String, _>("value")))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.runtime.block_on(
            sqlx::query(
                r#"
                INSERT INTO kv_store (key, value)
                VALUES (?, ?)
                ON CONFLICT(key)
                DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(value)
            .execute(&self.pool),
        )?;

        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.runtime.block_on(
            sqlx::query("DELETE FROM kv_store WHERE key = ?")
                .bind(key)
                .execute(&self.pool),
        )?;

        Ok(())
    }
}
