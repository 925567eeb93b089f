use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    #[default]
    Unspecified,
    Head,
    Tail,
}

/// Limits on how much of a source to ingest.
///
/// `rows_*` bound the sample taken from inside a single file; `files_*` bound
/// how many objects are taken when a source expands to several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractPolicy {
    #[serde(default)]
    pub rows_strategy: Strategy,
    #[serde(default)]
    pub rows_limit_bytes: u64,
    #[serde(default)]
    pub files_strategy: Strategy,
    #[serde(default)]
    pub files_limit: u64,
}

impl ExtractPolicy {
    pub fn rows(strategy: Strategy, limit_bytes: u64) -> Self {
        Self { rows_strategy: strategy, rows_limit_bytes: limit_bytes, ..Default::default() }
    }

    pub fn files(strategy: Strategy, limit: u64) -> Self {
        Self { files_strategy: strategy, files_limit: limit, ..Default::default() }
    }

    /// True when rows inside a file must be sampled rather than fully read.
    pub fn limits_rows(&self) -> bool {
        self.rows_strategy != Strategy::Unspecified
    }

    pub fn limits_files(&self) -> bool {
        self.files_strategy != Strategy::Unspecified && self.files_limit > 0
    }
}
