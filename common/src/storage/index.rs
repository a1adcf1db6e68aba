use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::AppError;
use crate::storage::store::DocumentStore;
use crate::storage::types::province::ProvinceFolder;

/// Normalizes a province name or query for comparison: trim, NFC, lowercase.
///
/// NFC matters for Thai folder names, which may arrive with combining marks
/// in either composed or decomposed form depending on the data owner's OS.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().nfc().collect::<String>().to_lowercase()
}

/// Mapping from normalized province name to its folder.
///
/// Built from one corpus-root scan; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ProvinceIndex {
    entries: HashMap<String, ProvinceFolder>,
}

impl ProvinceIndex {
    pub fn from_folders(folders: Vec<ProvinceFolder>) -> Self {
        let entries = folders
            .into_iter()
            .map(|folder| (normalize_name(&folder.name), folder))
            .collect();
        Self { entries }
    }

    pub fn get(&self, normalized_name: &str) -> Option<&ProvinceFolder> {
        self.entries.get(normalized_name)
    }

    /// Iterate over `(normalized name, folder)` pairs.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &ProvinceFolder)> {
        self.entries.iter()
    }

    pub fn folders(&self) -> impl Iterator<Item = &ProvinceFolder> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Seam for the corpus-root scan, so the cache can be exercised against a
/// mock that counts listing calls.
#[async_trait]
pub trait ProvinceLister: Send + Sync {
    async fn list_provinces(&self) -> Result<Vec<ProvinceFolder>, AppError>;
}

#[async_trait]
impl ProvinceLister for DocumentStore {
    async fn list_provinces(&self) -> Result<Vec<ProvinceFolder>, AppError> {
        DocumentStore::list_provinces(self).await
    }
}

struct CacheSlot {
    built_at: Instant,
    index: Arc<ProvinceIndex>,
}

/// Process-wide, TTL-bound cache of the province index.
///
/// The corpus structure changes rarely relative to query volume, so the
/// index is rebuilt at most once per TTL window. Concurrent readers share
/// the same `Arc`; refreshes are last-write-wins.
pub struct ProvinceIndexCache {
    ttl: Duration,
    inner: RwLock<Option<CacheSlot>>,
}

impl ProvinceIndexCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// Return the cached index, rebuilding it through `lister` when the slot
    /// is empty or past its TTL.
    pub async fn get_or_build(
        &self,
        lister: &dyn ProvinceLister,
    ) -> Result<Arc<ProvinceIndex>, AppError> {
        {
            let guard = self.inner.read().await;
            if let Some(slot) = guard.as_ref() {
                if slot.built_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&slot.index));
                }
            }
        }

        let folders = lister.list_provinces().await?;
        let index = Arc::new(ProvinceIndex::from_folders(folders));
        debug!(provinces = index.len(), "rebuilt province index");

        let mut guard = self.inner.write().await;
        *guard = Some(CacheSlot {
            built_at: Instant::now(),
            index: Arc::clone(&index),
        });

        Ok(index)
    }

    /// Drop the cached slot; the next lookup rebuilds.
    pub async fn invalidate(&self) {
        let mut guard = self.inner.write().await;
        *guard = None;
    }
}
