//! The generation seam: a trait over chat models plus the transient-error
//! classification the fallback machine keys on.

use std::pin::Pin;

use async_openai::error::OpenAIError;
use async_trait::async_trait;
use futures::Stream;

use common::{error::AppError, utils::config::AppConfig};

/// Answer text as it arrives from the model. Errors surface mid-stream as
/// items; dropping the stream cancels the underlying request.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;

/// Primary/backup model pair for one generation call. Resolved from config
/// per call; the fallback decision is never persisted across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelChoice {
    pub primary: String,
    pub backup: String,
}

impl ModelChoice {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            primary: cfg.primary_model.clone(),
            backup: cfg.backup_model.clone(),
        }
    }
}

/// Chat-completion access, streaming and whole-text.
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    async fn stream_chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<AnswerStream, AppError>;

    async fn complete_chat(
        &self,
        model: &str,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, AppError>;
}

/// Error classes worth one attempt against the backup model: rate limits,
/// exhausted quota, an unavailable model, upstream 5xx and transport or
/// stream failures. Everything else is terminal immediately.
pub fn is_transient(err: &AppError) -> bool {
    let AppError::OpenAI(err) = err else {
        return false;
    };
    match err {
        OpenAIError::Reqwest(_) | OpenAIError::StreamError(_) => true,
        OpenAIError::ApiError(api) => {
            let code = api.code.as_deref().unwrap_or("");
            let kind = api.r#type.as_deref().unwrap_or("");
            matches!(
                code,
                "rate_limit_exceeded" | "insufficient_quota" | "model_not_found"
            ) || kind == "server_error"
        }
        _ => false,
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use async_openai::error::ApiError;
    use std::sync::Mutex;

    /// Builds the rate-limit error the real API returns under load.
    pub fn transient_error() -> AppError {
        AppError::OpenAI(OpenAIError::ApiError(ApiError {
            message: "Rate limit reached".to_string(),
            r#type: Some("requests".to_string()),
            param: None,
            code: Some("rate_limit_exceeded".to_string()),
        }))
    }

    /// Builds a malformed-request error that must never trigger fallback.
    pub fn terminal_error() -> AppError {
        AppError::OpenAI(OpenAIError::ApiError(ApiError {
            message: "Invalid request".to_string(),
            r#type: Some("invalid_request_error".to_string()),
            param: None,
            code: Some("invalid_request_error".to_string()),
        }))
    }

    /// A generator that answers with a fixed reply, optionally failing a
    /// named model, and records which models were asked in which order.
    pub struct ScriptedGenerator {
        reply: String,
        failing_model: Option<String>,
        failure_is_transient: bool,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedGenerator {
        pub fn answering(reply: impl Into<String>) -> Self {
            Self {
                reply: reply.into(),
                failing_model: None,
                failure_is_transient: true,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(
            model: impl Into<String>,
            transient: bool,
            reply: impl Into<String>,
        ) -> Self {
            Self {
                reply: reply.into(),
                failing_model: Some(model.into()),
                failure_is_transient: transient,
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn models_called(&self) -> Vec<String> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        fn record(&self, model: &str) -> Result<(), AppError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(model.to_string());
            }
            if self.failing_model.as_deref() == Some(model) {
                if self.failure_is_transient {
                    return Err(transient_error());
                }
                return Err(terminal_error());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ChatGenerator for ScriptedGenerator {
        async fn stream_chat(
            &self,
            model: &str,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<AnswerStream, AppError> {
            self.record(model)?;
            let half = self.reply.len() / 2;
            let (head, tail) = self.reply.split_at(half);
            let chunks = vec![Ok(head.to_string()), Ok(tail.to_string())];
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn complete_chat(
            &self,
            model: &str,
            _system_prompt: &str,
            _user_prompt: &str,
        ) -> Result<String, AppError> {
            self.record(model)?;
            Ok(self.reply.clone())
        }
    }
}
