use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use common::storage::types::prepared_document::DocumentBody;

/// Cache key: content identity. A changed modification time produces a new
/// key, so stale entries are never returned; they simply age out.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub location: String,
    pub last_modified: DateTime<Utc>,
}

struct CacheEntry {
    body: DocumentBody,
    inserted_at: Instant,
}

/// Process-wide cache of prepared document bodies.
///
/// Download caches carry a TTL; upload caches may be unbounded (`None`)
/// because content identity implies the uploaded handle stays valid.
/// Writers are last-write-wins; concurrent readers are safe.
pub struct PreparedCache {
    ttl: Option<Duration>,
    inner: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl PreparedCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, key: &CacheKey) -> Option<DocumentBody> {
        let guard = self.inner.read().await;
        let entry = guard.get(key)?;
        if let Some(ttl) = self.ttl {
            if entry.inserted_at.elapsed() >= ttl {
                return None;
            }
        }
        Some(entry.body.clone())
    }

    pub async fn insert(&self, key: CacheKey, body: DocumentBody) {
        let mut guard = self.inner.write().await;
        guard.insert(
            key,
            CacheEntry {
                body,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}
