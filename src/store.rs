//! Persistence of the accumulated record set.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use crate::error::StoreError;
use crate::models::ListingRecord;

/// Durable sink for a session's records. Every save overwrites the whole
/// set; nothing is ever appended.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, records: &[ListingRecord]) -> Result<(), StoreError>;

    /// Where records go, for log lines.
    fn location(&self) -> String;
}

/// Pretty-printed UTF-8 JSON array on disk. Non-ASCII text is written
/// verbatim, not escaped.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display(&self) -> String {
        self.path.display().to_string()
    }
}

#[async_trait]
impl RecordStore for JsonFileStore {
    async fn save(&self, records: &[ListingRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records).map_err(|source| StoreError::Json {
            path: self.display(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StoreError::Write {
                    path: self.display(),
                    source,
                })?;
        }

        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StoreError::Write {
                path: self.display(),
                source,
            })?;
        info!("💾 Saved {} records to {}", records.len(), self.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.display()
    }
}

/// Keeps the latest saved set in memory. Used by the request adapter, whose
/// results go into a response rather than a file.
#[derive(Debug, Default)]
pub struct MemoryStore {
    latest: Mutex<Vec<ListingRecord>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Vec<ListingRecord> {
        self.latest.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn save(&self, records: &[ListingRecord]) -> Result<(), StoreError> {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = records.to_vec();
        }
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureValue;

    fn records() -> Vec<ListingRecord> {
        let mut first = ListingRecord {
            title: "Stüga in Kraaifontein".into(),
            price: "R 7 000".into(),
            url: "/to-rent/RR1".into(),
            ..ListingRecord::default()
        };
        first.features.insert("pool".into(), FeatureValue::Flag(true));
        first.features.insert("bedrooms".into(), FeatureValue::Text("2".into()));
        vec![first, ListingRecord::default()]
    }

    #[tokio::test]
    async fn saving_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("properties.json"));

        store.save(&records()).await.unwrap();
        let first = std::fs::read(store.path()).unwrap();
        store.save(&records()).await.unwrap();
        let second = std::fs::read(store.path()).unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn save_overwrites_and_keeps_unicode_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested/out.json"));

        store.save(&records()).await.unwrap();
        store.save(&records()[..1]).await.unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("Stüga"));
        let saved: Vec<ListingRecord> = serde_json::from_str(&raw).unwrap();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn unwritable_path_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let store = JsonFileStore::new(dir.path());
        let err = store.save(&records()).await.unwrap_err();
        assert!(matches!(err, StoreError::Write { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn memory_store_counts_saves() {
        let store = MemoryStore::default();
        store.save(&records()).await.unwrap();
        store.save(&records()).await.unwrap();
        assert_eq!(store.save_count(), 2);
        assert_eq!(store.snapshot().len(), 2);
    }
}
