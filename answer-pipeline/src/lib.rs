//! Answer generation on top of the retrieval and fetch pipelines.

pub mod facade;
pub mod model;
pub mod openai;
pub mod prompts;

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use common::{
    error::AppError,
    storage::{index::ProvinceIndexCache, store::DocumentStore, types::candidate_file::CandidateFile},
};
use fetch_pipeline::{FetchPipeline, FetchReport, ProgressSender};
use retrieval_pipeline::resolve_candidates;

pub use facade::AnswerPipeline;
pub use model::{AnswerStream, ChatGenerator, ModelChoice};
pub use openai::OpenAiGenerator;
pub use prompts::NO_DOCUMENTS_MESSAGE;

/// The two shapes an answer can take. Grounded answers stream and carry
/// their sources; generic answers are whole text.
pub enum ChatAnswer {
    Grounded {
        stream: AnswerStream,
        sources: Vec<CandidateFile>,
        report: FetchReport,
    },
    Generic {
        text: String,
    },
}

/// Top-level orchestrator: resolve, fetch, generate, strictly in that
/// order.
pub struct ChatService {
    store: DocumentStore,
    index_cache: Arc<ProvinceIndexCache>,
    fetch: FetchPipeline,
    answers: AnswerPipeline,
}

impl ChatService {
    pub fn new(
        store: DocumentStore,
        index_cache: Arc<ProvinceIndexCache>,
        fetch: FetchPipeline,
        answers: AnswerPipeline,
    ) -> Self {
        Self {
            store,
            index_cache,
            fetch,
            answers,
        }
    }

    /// Answer one query end to end.
    ///
    /// No candidates means the generic path; otherwise every candidate is
    /// fetched before generation starts, and the grounded answer streams.
    #[instrument(skip_all, fields(query_chars = query.chars().count()))]
    pub async fn resolve_and_answer(
        &self,
        query: &str,
        progress: Option<ProgressSender>,
    ) -> Result<ChatAnswer, AppError> {
        let candidates = resolve_candidates(&self.store, &self.index_cache, query).await?;

        if candidates.is_empty() {
            info!("no relevant documents, answering generically");
            let text = self.answers.generate_generic(query).await?;
            return Ok(ChatAnswer::Generic { text });
        }

        debug!(candidates = candidates.len(), "preparing documents");
        let (prepared, report) = match self.fetch.prepare_all(&candidates, progress).await {
            Ok(batch) => batch,
            // Every fetch failed: the user gets the fixed no-documents
            // reply as an answer, not an error.
            Err(AppError::NoUsableDocuments(reason)) => {
                warn!(%reason, "no candidate survived preparation");
                let stream = self.answers.generate_grounded(query, &[]).await?;
                return Ok(ChatAnswer::Grounded {
                    stream,
                    sources: Vec::new(),
                    report: FetchReport {
                        attempted: candidates.len(),
                        prepared: 0,
                    },
                });
            }
            Err(err) => return Err(err),
        };

        let mut sources: Vec<CandidateFile> =
            prepared.iter().map(|doc| doc.candidate.clone()).collect();
        sources.sort_by(|a, b| a.location.cmp(&b.location));

        let stream = self.answers.generate_grounded(query, &prepared).await?;
        Ok(ChatAnswer::Grounded {
            stream,
            sources,
            report,
        })
    }
}
