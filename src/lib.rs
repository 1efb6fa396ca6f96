//! Build-time core of a paged bitmap index.
//!
//! A [`BitmapIndexBuilder`] pulls rows from a [`TableScan`], groups row ids by
//! distinct column value and writes the postings to a [`PageStore`]: a
//! metapage at page 0 followed by chained DATA pages. [`IndexReader`] reads a
//! completed index back and verifies it.

pub mod engine;
pub mod error;
pub mod general;
pub mod helpers;
pub mod metadata;
pub mod pager;
pub mod posting;
pub mod storage;

pub use engine::builder::{BitmapIndexBuilder, BuildResult};
pub use engine::reader::IndexReader;
pub use engine::scan::{ScanRow, TableScan, VecScan};
pub use error::{BitmapError, BuildError, BuildState, Result};
pub use general::options::{BitmapOptions, PostingFormat};
pub use metadata::index_key::IndexKey;
pub use metadata::row_id::RowId;
pub use pager::pager::Pager;
pub use storage::page_store::{MemoryPageStore, PageId, PageStore};
