use crate::db::snapshot::DEFAULT_STORAGE_KEY;
use std::env;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:poll_registry.db";

pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
pub const STORAGE_KEY_VAR: &str = "POLL_REGISTRY_KEY";

/// Where a SQLite-backed registry keeps its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub storage_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl StoreConfig {
    /// Reads `DATABASE_URL` and `POLL_REGISTRY_KEY`, loading a `.env` file first
    /// if one is present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable source. Unset or blank
    /// variables fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str, default: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Self {
            database_url: read(DATABASE_URL_VAR, DEFAULT_DATABASE_URL),
            storage_key: read(STORAGE_KEY_VAR, DEFAULT_STORAGE_KEY),
        }
    }
}
