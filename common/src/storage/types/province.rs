use serde::{Deserialize, Serialize};

/// One province folder directly below the corpus root.
///
/// `name` is the raw folder name as it appears in the store; `prefix` is the
/// object-store prefix under which the folder's documents live.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvinceFolder {
    pub name: String,
    pub prefix: String,
}

impl ProvinceFolder {
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
        }
    }
}
