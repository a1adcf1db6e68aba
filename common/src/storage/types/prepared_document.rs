use serde::{Deserialize, Serialize};

use super::candidate_file::CandidateFile;

/// Fetched content of a prepared document.
///
/// `Text` carries decoded UTF-8 for prompt embedding; `Handle` carries the
/// identifier of a file uploaded through the LLM's native file API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentBody {
    Text(String),
    Handle { file_id: String },
}

/// A candidate whose fetch or upload completed. Never constructed for a
/// failed fetch; failures are dropped from the prepared set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreparedDocument {
    pub candidate: CandidateFile,
    pub body: DocumentBody,
}

impl PreparedDocument {
    /// Renders this document as one block of the grounding prompt.
    pub fn prompt_block(&self) -> String {
        match &self.body {
            DocumentBody::Text(text) => {
                format!("--- File: {} ---\n{}\n", self.candidate.name, text)
            }
            DocumentBody::Handle { file_id } => {
                format!(
                    "--- File: {} (uploaded file reference: {}) ---\n",
                    self.candidate.name, file_id
                )
            }
        }
    }
}
