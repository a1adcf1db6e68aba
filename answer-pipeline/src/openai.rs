//! The real model client: chat completions over async-openai plus the
//! files sub-API used by the upload-mode fetch pipeline.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateFileRequestArgs,
        FileInput, FilePurpose,
    },
    Client,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::future::Future;
use tokio_retry::strategy::FixedInterval;
use tracing::debug;

use common::{error::AppError, utils::config::AppConfig};
use fetch_pipeline::FileUploader;

use crate::model::{AnswerStream, ChatGenerator};

// Generation parameters tuned for factual statistics answers.
const TEMPERATURE: f32 = 0.3;
const TOP_P: f32 = 0.8;
const MAX_TOKENS: u32 = 8192;

const UPLOAD_POLL_INTERVAL_MS: u64 = 1000;
const UPLOAD_MAX_POLLS: usize = 60;

pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
}

impl OpenAiGenerator {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(cfg.openai_api_key.clone());
        if !cfg.openai_base_url.is_empty() {
            config = config.with_api_base(cfg.openai_base_url.clone());
        }
        Self {
            client: Client::with_config(config),
        }
    }

    fn build_request(
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<CreateChatCompletionRequest, AppError> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .temperature(TEMPERATURE)
            .top_p(TOP_P)
            .max_tokens(MAX_TOKENS)
            .messages([
                ChatCompletionRequestSystemMessage::from(system_prompt.to_string()).into(),
                ChatCompletionRequestUserMessage::from(user_prompt.to_string()).into(),
            ])
            .build()?;
        Ok(request)
    }

    // The status field is deprecated upstream but remains the only
    // processing signal the files API exposes.
    #[allow(deprecated)]
    async fn poll_processing(&self, file_id: &str) -> Result<(), PollError> {
        let file = self
            .client
            .files()
            .retrieve(file_id)
            .await
            .map_err(|err| PollError::Terminal(AppError::OpenAI(err)))?;

        match file.status.as_deref() {
            // Older deployments omit the status field entirely.
            Some("processed") | None => Ok(()),
            Some("error") => Err(PollError::Terminal(AppError::Upload(format!(
                "remote processing failed for {file_id}"
            )))),
            Some(_) => Err(PollError::Pending),
        }
    }
}

enum PollError {
    Pending,
    Terminal(AppError),
}

/// Polls until the remote processing state is terminal: at most
/// `UPLOAD_MAX_POLLS` polls at the fixed interval, giving up with an
/// `Upload` error when the bound runs out.
async fn await_processed<F, Fut>(file_id: &str, mut poll: F) -> Result<(), AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), PollError>>,
{
    let mut delays = FixedInterval::from_millis(UPLOAD_POLL_INTERVAL_MS)
        .take(UPLOAD_MAX_POLLS.saturating_sub(1));

    loop {
        match poll().await {
            Ok(()) => return Ok(()),
            Err(PollError::Terminal(err)) => return Err(err),
            Err(PollError::Pending) => {
                let Some(delay) = delays.next() else {
                    return Err(AppError::Upload(format!(
                        "file {file_id} still processing after {UPLOAD_MAX_POLLS} polls"
                    )));
                };
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[async_trait]
impl ChatGenerator for OpenAiGenerator {
    async fn stream_chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<AnswerStream, AppError> {
        let request = Self::build_request(model, system_prompt, user_prompt)?;
        let stream = self.client.chat().create_stream(request).await?;

        let chunks = stream.filter_map(|item| async move {
            match item {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|choice| choice.delta.content.clone())
                        .unwrap_or_default();
                    if content.is_empty() {
                        None
                    } else {
                        Some(Ok(content))
                    }
                }
                Err(err) => Some(Err(AppError::OpenAI(err))),
            }
        });

        Ok(Box::pin(chunks))
    }

    async fn complete_chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AppError> {
        let request = Self::build_request(model, system_prompt, user_prompt)?;
        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .ok_or_else(|| AppError::Generation("no content in model response".to_string()))
    }
}

#[async_trait]
impl FileUploader for OpenAiGenerator {
    /// Upload bytes, then poll the processing state at a fixed 1 s interval,
    /// bounded at 60 polls. `error` state and poll exhaustion both fail.
    async fn upload(&self, data: Bytes, display_name: &str) -> Result<String, AppError> {
        let request = CreateFileRequestArgs::default()
            .file(FileInput::from_vec_u8(
                display_name.to_string(),
                data.to_vec(),
            ))
            .purpose(FilePurpose::Assistants)
            .build()?;
        let file = self.client.files().create(request).await?;
        let file_id = file.id;
        debug!(file = %display_name, id = %file_id, "uploaded, awaiting processing");

        await_processed(&file_id, || self.poll_processing(&file_id)).await?;
        Ok(file_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_gives_up_after_the_bound() {
        let polls = counter();

        let result = await_processed("file-1", || {
            let polls = Arc::clone(&polls);
            async move {
                polls.fetch_add(1, Ordering::SeqCst);
                Err(PollError::Pending)
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::Upload(_))));
        assert_eq!(polls.load(Ordering::SeqCst), UPLOAD_MAX_POLLS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_immediately_on_terminal_failure() {
        let polls = counter();

        let result = await_processed("file-1", || {
            let polls = Arc::clone(&polls);
            async move {
                polls.fetch_add(1, Ordering::SeqCst);
                Err(PollError::Terminal(AppError::Upload(
                    "remote processing failed for file-1".to_string(),
                )))
            }
        })
        .await;

        assert!(matches!(result, Err(AppError::Upload(_))));
        assert_eq!(polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_succeeds_once_processed() {
        let polls = counter();

        let result = await_processed("file-1", || {
            let polls = Arc::clone(&polls);
            async move {
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(PollError::Pending)
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }
}
