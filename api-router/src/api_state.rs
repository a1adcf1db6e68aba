use std::sync::Arc;
use std::time::Duration;

use answer_pipeline::{AnswerPipeline, ChatService, ModelChoice, OpenAiGenerator};
use common::{
    error::AppError,
    storage::{index::ProvinceIndexCache, store::DocumentStore},
    utils::config::AppConfig,
};
use fetch_pipeline::{FetchPipeline, PreparedCache};

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ChatService>,
    pub store: DocumentStore,
    pub config: AppConfig,
}

impl ApiState {
    /// Wires the full resolve/fetch/generate stack from configuration.
    pub async fn new(config: &AppConfig) -> Result<Self, AppError> {
        let store = DocumentStore::new(config).await?;

        let index_cache = Arc::new(ProvinceIndexCache::new(Duration::from_secs(
            config.index_ttl_secs,
        )));
        let prepared_cache = Arc::new(PreparedCache::new(Some(Duration::from_secs(
            config.fetch_cache_ttl_secs,
        ))));

        let mut fetch = FetchPipeline::downloader(
            store.clone(),
            prepared_cache,
            config.max_concurrent_fetches,
        );
        if let Some(dir) = &config.scratch_dir {
            fetch = fetch.with_scratch_dir(dir);
        }

        let generator = Arc::new(OpenAiGenerator::from_config(config));
        let answers = AnswerPipeline::new(generator, ModelChoice::from_config(config));

        let service = Arc::new(ChatService::new(
            store.clone(),
            index_cache,
            fetch,
            answers,
        ));

        Ok(Self {
            service,
            store,
            config: config.clone(),
        })
    }

    /// State with an injected service and store, for tests.
    pub fn with_service(service: Arc<ChatService>, store: DocumentStore, config: AppConfig) -> Self {
        Self {
            service,
            store,
            config,
        }
    }
}
