use std::fmt;
use std::io;

use thiserror::Error;

use crate::storage::page_store::PageId;

pub type Result<T> = std::result::Result<T, BitmapError>;

#[derive(Debug, Error)]
pub enum BitmapError {
    /// The target storage already holds pages; a build only runs once.
    #[error("index already contains data ({page_count} pages)")]
    AlreadyPopulated { page_count: u32 },

    /// One more distinct value than `max_distinct_values` was seen.
    #[error("distinct value limit exceeded: limit {limit}, attempted {attempted}")]
    CapacityExceeded { limit: u32, attempted: u64 },

    /// Page bytes are not valid for the expected format.
    #[error("corrupt page {page_id}: {reason}")]
    Corruption { page_id: PageId, reason: String },

    #[error("storage I/O error during {context}: {source}")]
    StorageIO {
        context: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid option {name}: {message}")]
    InvalidOptions { name: &'static str, message: String },

    #[error("key of {len} bytes does not fit on a page (max {max})")]
    KeyTooLarge { len: usize, max: usize },
}

impl BitmapError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        BitmapError::StorageIO {
            context: context.into(),
            source,
        }
    }

    pub fn corruption(page_id: PageId, reason: impl Into<String>) -> Self {
        BitmapError::Corruption {
            page_id,
            reason: reason.into(),
        }
    }

    pub fn invalid_option(name: &'static str, message: impl Into<String>) -> Self {
        BitmapError::InvalidOptions {
            name,
            message: message.into(),
        }
    }
}

/// Stages of a single bulk build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BuildState {
    Empty,
    Scanning,
    Flushing,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Empty => "EMPTY",
            BuildState::Scanning => "SCANNING",
            BuildState::Flushing => "FLUSHING",
            BuildState::Done => "DONE",
            BuildState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// A failed build: the stage it failed in, the progress made so far and the
/// underlying cause.
#[derive(Debug, Error)]
#[error(
    "bitmap index build failed during {stage} after {rows_scanned} rows \
     ({distinct_values} distinct values): {source}"
)]
pub struct BuildError {
    pub stage: BuildState,
    pub rows_scanned: u64,
    pub distinct_values: u32,
    pub source: BitmapError,
}

impl BuildError {
    pub fn kind(&self) -> &BitmapError {
        &self.source
    }

    pub fn into_kind(self) -> BitmapError {
        self.source
    }
}
