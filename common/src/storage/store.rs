use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::{path::Path as ObjPath, ObjectMeta, ObjectStore};

use crate::error::AppError;
use crate::storage::types::{document::DocumentMeta, province::ProvinceFolder};
use crate::utils::config::{AppConfig, StorageKind};

pub type DynStore = Arc<dyn ObjectStore>;

/// Uniform adapter over the document corpus.
///
/// The corpus is a two-level tree: root, province folders, document files.
/// Callers above this layer never branch on whether the backing store is a
/// local directory or a remote bucket; both are reached through the same
/// `object_store` interface.
#[derive(Clone)]
pub struct DocumentStore {
    store: DynStore,
    backend_kind: StorageKind,
    local_base: Option<PathBuf>,
}

impl DocumentStore {
    /// Create a new DocumentStore for the configured backend.
    ///
    /// Backend creation failures are connection errors: fatal, never retried.
    pub async fn new(cfg: &AppConfig) -> Result<Self, AppError> {
        let backend_kind = cfg.storage.clone();
        let (store, local_base) = create_storage_backend(cfg)
            .await
            .map_err(|e| AppError::StoreConnection(e.to_string()))?;

        Ok(Self {
            store,
            backend_kind,
            local_base,
        })
    }

    /// Create a DocumentStore with an injected backend, for tests.
    pub fn with_backend(store: DynStore, backend_kind: StorageKind) -> Self {
        Self {
            store,
            backend_kind,
            local_base: None,
        }
    }

    pub fn backend_kind(&self) -> &StorageKind {
        &self.backend_kind
    }

    /// Resolved base directory when using the local backend.
    pub fn local_base_path(&self) -> Option<&Path> {
        self.local_base.as_deref()
    }

    /// List the province folders directly below the corpus root.
    ///
    /// One delimiter listing; document contents are never touched.
    pub async fn list_provinces(&self) -> Result<Vec<ProvinceFolder>, AppError> {
        let listing = self.store.list_with_delimiter(None).await?;

        Ok(listing
            .common_prefixes
            .into_iter()
            .filter_map(|prefix| {
                let name = prefix.parts().last()?.as_ref().to_string();
                Some(ProvinceFolder {
                    name,
                    prefix: prefix.to_string(),
                })
            })
            .collect())
    }

    /// List the eligible documents inside one province folder.
    ///
    /// Eligibility mirrors the original corpus contract: text-like files
    /// only, judged by extension via mime_guess.
    pub async fn list_documents(
        &self,
        folder: &ProvinceFolder,
    ) -> Result<Vec<DocumentMeta>, AppError> {
        let prefix = ObjPath::from(folder.prefix.as_str());
        let objects: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;

        Ok(objects
            .into_iter()
            .filter(|meta| is_text_like(meta.location.as_ref()))
            .map(to_document_meta)
            .collect())
    }

    /// Unconstrained name-contains search over the whole corpus.
    ///
    /// Last-resort fallback when no folder matched the query; equivalent to
    /// the remote store's `name contains` filter. Matching is
    /// case-insensitive on the bare file name.
    pub async fn search_documents(&self, needle: &str) -> Result<Vec<DocumentMeta>, AppError> {
        let needle = needle.to_lowercase();
        let objects: Vec<ObjectMeta> = self.store.list(None).try_collect().await?;

        Ok(objects
            .into_iter()
            .filter(|meta| {
                is_text_like(meta.location.as_ref())
                    && file_name_of(&meta.location).to_lowercase().contains(&needle)
            })
            .map(to_document_meta)
            .collect())
    }

    /// Retrieve the raw bytes of one document.
    pub async fn get(&self, location: &str) -> Result<Bytes, AppError> {
        let path = ObjPath::from(location);
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?)
    }

    /// Store bytes at the specified location. The corpus is read-only from
    /// the application's point of view; this exists for fixtures and the
    /// out-of-band data owner tooling.
    pub async fn put(&self, location: &str, data: Bytes) -> Result<(), AppError> {
        let path = ObjPath::from(location);
        let payload = object_store::PutPayload::from_bytes(data);
        self.store.put(&path, payload).await?;
        Ok(())
    }
}

fn to_document_meta(meta: ObjectMeta) -> DocumentMeta {
    DocumentMeta {
        name: file_name_of(&meta.location),
        location: meta.location.to_string(),
        last_modified: meta.last_modified,
    }
}

fn file_name_of(location: &ObjPath) -> String {
    location
        .parts()
        .last()
        .map(|part| part.as_ref().to_string())
        .unwrap_or_default()
}

fn is_text_like(location: &str) -> bool {
    mime_guess::from_path(location)
        .first_or(mime::APPLICATION_OCTET_STREAM)
        .type_()
        == mime::TEXT
}

/// Create a storage backend based on configuration.
async fn create_storage_backend(
    cfg: &AppConfig,
) -> object_store::Result<(DynStore, Option<PathBuf>)> {
    match cfg.storage {
        StorageKind::Local => {
            let base = resolve_base_dir(cfg);
            if !base.exists() {
                tokio::fs::create_dir_all(&base).await.map_err(|e| {
                    object_store::Error::Generic {
                        store: "LocalFileSystem",
                        source: e.into(),
                    }
                })?;
            }
            let store = LocalFileSystem::new_with_prefix(base.clone())?;
            Ok((Arc::new(store), Some(base)))
        }
        StorageKind::Memory => {
            let store = InMemory::new();
            Ok((Arc::new(store), None))
        }
    }
}

/// Resolve the absolute base directory used for local storage from config.
///
/// If `data_dir` is relative, it is resolved against the current working directory.
pub fn resolve_base_dir(cfg: &AppConfig) -> PathBuf {
    if cfg.data_dir.starts_with('/') {
        PathBuf::from(&cfg.data_dir)
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(&cfg.data_dir)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;

    /// Create a test configuration with memory storage.
    pub fn test_config_memory() -> AppConfig {
        AppConfig {
            openai_api_key: "test".into(),
            openai_base_url: "..".into(),
            primary_model: "primary-model".into(),
            backup_model: "backup-model".into(),
            data_dir: "/tmp/unused".into(), // Ignored for memory storage
            storage: StorageKind::Memory,
            http_port: 0,
            api_key: None,
            max_concurrent_fetches: 4,
            index_ttl_secs: 3600,
            fetch_cache_ttl_secs: 3600,
            scratch_dir: None,
        }
    }

    /// An in-memory store pre-seeded with one file per province folder.
    pub async fn seeded_store(folders: &[(&str, &[&str])]) -> DocumentStore {
        let store = DocumentStore::with_backend(Arc::new(InMemory::new()), StorageKind::Memory);
        for (province, files) in folders {
            for file in *files {
                store
                    .put(
                        &format!("{province}/{file}"),
                        Bytes::from(format!("data for {province}/{file}")),
                    )
                    .await
                    .expect("seed corpus");
            }
        }
        store
    }
}
