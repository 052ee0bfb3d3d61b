//! JSON file persistence for the order ledger.
//!
//! Three files live under the data directory: `orders.json` (active
//! orders), `served.json` (history) and `counters.json` (the next token to
//! assign). Malformed JSON in any of them is logged and the file is reset
//! to its empty default; corruption is never fatal.

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::{error::AppError, order::Order};

const ORDERS_FILE: &str = "orders.json";
const SERVED_FILE: &str = "served.json";
const COUNTERS_FILE: &str = "counters.json";

/// Tokens start at 1, matching the original kiosk counter.
pub const FIRST_TOKEN: u64 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Counters {
    next_token: u64,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            next_token: FIRST_TOKEN,
        }
    }
}

pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub async fn open(data_dir: &Path) -> Result<Self, AppError> {
        fs::create_dir_all(data_dir).await?;
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub async fn load_orders(&self) -> Result<Vec<Order>, AppError> {
        self.load_or_reset(ORDERS_FILE, Vec::new).await
    }

    pub async fn save_orders(&self, orders: &[Order]) -> Result<(), AppError> {
        self.save(ORDERS_FILE, &orders).await
    }

    pub async fn load_served(&self) -> Result<Vec<Order>, AppError> {
        self.load_or_reset(SERVED_FILE, Vec::new).await
    }

    pub async fn save_served(&self, orders: &[Order]) -> Result<(), AppError> {
        self.save(SERVED_FILE, &orders).await
    }

    pub async fn load_next_token(&self) -> Result<u64, AppError> {
        let counters: Counters = self.load_or_reset(COUNTERS_FILE, Counters::default).await?;
        Ok(counters.next_token)
    }

    pub async fn save_next_token(&self, next_token: u64) -> Result<(), AppError> {
        self.save(COUNTERS_FILE, &Counters { next_token }).await
    }

    /// Reads one file, writing (or rewriting) the default when the file is
    /// missing or holds malformed JSON.
    async fn load_or_reset<T>(&self, file: &str, default: impl FnOnce() -> T) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
    {
        let path = self.data_dir.join(file);

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let value = default();
                self.save(file, &value).await?;
                return Ok(value);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!("Malformed {file}, resetting to default: {e}");
                let value = default();
                self.save(file, &value).await?;
                Ok(value)
            }
        }
    }

    async fn save<T: Serialize>(&self, file: &str, value: &T) -> Result<(), AppError> {
        let raw = serde_json::to_string_pretty(value)?;
        fs::write(self.data_dir.join(file), raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        assert!(store.load_orders().await.unwrap().is_empty());
        assert_eq!(store.load_next_token().await.unwrap(), FIRST_TOKEN);
        assert!(dir.path().join("orders.json").exists());
        assert!(dir.path().join("counters.json").exists());
    }

    #[tokio::test]
    async fn corrupt_files_reset_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        std::fs::write(dir.path().join("orders.json"), "not json {").unwrap();
        std::fs::write(dir.path().join("counters.json"), "[oops").unwrap();

        assert!(store.load_orders().await.unwrap().is_empty());
        assert_eq!(store.load_next_token().await.unwrap(), FIRST_TOKEN);
    }

    #[tokio::test]
    async fn counter_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store.save_next_token(42).await.unwrap();
        assert_eq!(store.load_next_token().await.unwrap(), 42);
    }
}
