use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::document::DocumentMeta;

/// A document selected by the relevance resolver, before its content has
/// been fetched. Lives for a single query turn.
///
/// `last_modified` is carried from the listing so the fetch cache can key on
/// content identity (location + modification time) without a second
/// metadata round trip.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateFile {
    pub location: String,
    pub name: String,
    pub province: String,
    pub last_modified: DateTime<Utc>,
}

impl CandidateFile {
    pub fn from_meta(meta: DocumentMeta, province: impl Into<String>) -> Self {
        Self {
            location: meta.location,
            name: meta.name,
            province: province.into(),
            last_modified: meta.last_modified,
        }
    }
}
