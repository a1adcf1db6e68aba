use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store connection error: {0}")]
    StoreConnection(String),
    #[error("Store query error: {0}")]
    StoreQuery(#[from] object_store::Error),
    #[error("Fetch error for {location}: {reason}")]
    Fetch { location: String, reason: String },
    #[error("No usable documents: {0}")]
    NoUsableDocuments(String),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Generation failure: {0}")]
    Generation(String),
    #[error("Upload processing error: {0}")]
    Upload(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
