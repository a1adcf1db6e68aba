use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Listing entry for one eligible document inside a province folder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentMeta {
    /// Full object-store location, e.g. `Tak/summary.txt`.
    pub location: String,
    /// Bare file name, e.g. `summary.txt`.
    pub name: String,
    pub last_modified: DateTime<Utc>,
}
