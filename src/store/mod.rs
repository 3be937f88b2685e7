//! Shared counter store.
//!
//! One record per competitor, two counters each. The store only knows how to list every
//! record and how to overwrite a single counter; computing the new value is the caller's job.

mod http;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::competitor::{Competitor, CounterName};
use crate::config::Config;

pub use http::HttpCounterStore;
pub use sqlite::{insert_competitors, load_competitors_csv, setup_database, SqliteCounterStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("competitor {0} not found")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("vote server responded with {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("store connection lock poisoned")]
    LockPoisoned,

    #[error("update task did not complete: {0}")]
    Join(String),
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Full snapshot of every competitor. No ordering guarantee.
    async fn list_all(&self) -> Result<Vec<Competitor>, StoreError>;

    /// Set `counter` on `competitor_id` to `new_value`.
    ///
    /// This is an absolute write, not a server-side increment. Fails with
    /// [`StoreError::NotFound`] when the record does not exist.
    async fn increment(
        &self,
        competitor_id: &str,
        counter: CounterName,
        new_value: u32,
    ) -> Result<(), StoreError>;
}

/// The vote server when `remote_url` is set, otherwise the shared SQLite file
pub fn open_counter_store(config: &Config) -> anyhow::Result<Arc<dyn CounterStore>> {
    match &config.remote_url {
        Some(url) => {
            info!(url = %url, "Using remote vote server");
            Ok(Arc::new(HttpCounterStore::new(url.as_str())))
        }
        None => {
            info!(path = ?config.store_path, "Using shared store database");
            Ok(Arc::new(SqliteCounterStore::open(&config.store_path)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_counter_store_follows_remote_url() {
        let store_path = std::env::temp_dir().join(format!("cookie-vote-{}.db", uuid::Uuid::new_v4()));
        let local = Config::from_lookup(|key| match key {
            "COOKIE_VOTE_DB" => Some(store_path.display().to_string()),
            _ => None,
        })
        .unwrap();
        let seeded = SqliteCounterStore::open(&store_path).unwrap();
        seeded
            .seed(&[Competitor::new("a", "Chocolate Chip", "https://img/a.png")])
            .unwrap();

        let store = open_counter_store(&local).unwrap();
        assert_eq!(store.list_all().await.unwrap().len(), 1);

        // Nothing listens on port 9; a remote store must not fall back to the local file
        let remote = Config::from_lookup(|key| match key {
            "COOKIE_VOTE_DB" => Some(store_path.display().to_string()),
            "COOKIE_VOTE_REMOTE" => Some("http://127.0.0.1:9".to_string()),
            _ => None,
        })
        .unwrap();
        let store = open_counter_store(&remote).unwrap();
        assert!(matches!(store.list_all().await, Err(StoreError::Http(_))));

        let _ = std::fs::remove_file(&store_path);
    }
}
