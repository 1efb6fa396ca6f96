use std::collections::HashMap;

use crate::error::{BitmapError, Result};
use crate::general::options::{BitmapOptions, PostingFormat};
use crate::metadata::index_key::IndexKey;
use crate::metadata::row_id::RowId;
use crate::posting::{PostingBitmap, PostingSet};

/// Build-local map from each distinct value to the rows holding it.
///
/// Owns every posting bitmap created during a build. Dropping it releases all
/// of them at once.
#[derive(Debug)]
pub struct Accumulator {
    entries: HashMap<IndexKey, PostingBitmap>,
    max_distinct_values: u32,
    posting_format: PostingFormat,
    rows_hint: u64,
    rows_seen: u64,
}

impl Accumulator {
    /// `rows_hint` is the expected number of row positions, used to size dense
    /// bitmaps.
    pub fn new(options: &BitmapOptions, rows_hint: u64) -> Self {
        Self {
            entries: HashMap::new(),
            max_distinct_values: options.max_distinct_values,
            posting_format: options.posting_format,
            rows_hint,
            rows_seen: 0,
        }
    }

    /// Records `row` under `key`.
    ///
    /// A new key past the distinct value limit fails with `CapacityExceeded`
    /// and leaves the accumulator unchanged.
    pub fn insert(&mut self, key: IndexKey, row: RowId) -> Result<()> {
        if let Some(bitmap) = self.entries.get_mut(&key) {
            bitmap.add(row);
            self.rows_seen += 1;
            return Ok(());
        }

        let attempted = self.entries.len() as u64 + 1;
        if attempted > self.max_distinct_values as u64 {
            return Err(BitmapError::CapacityExceeded {
                limit: self.max_distinct_values,
                attempted,
            });
        }

        let mut bitmap = PostingBitmap::new(self.posting_format, self.rows_hint);
        bitmap.add(row);
        self.entries.insert(key, bitmap);
        self.rows_seen += 1;
        Ok(())
    }

    pub fn rows_seen(&self) -> u64 {
        self.rows_seen
    }

    pub fn distinct_values(&self) -> u32 {
        self.entries.len() as u32
    }

    /// Approximate heap bytes held by the posting bitmaps and keys.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .iter()
            .map(|(key, bitmap)| key.encoded_len() + bitmap.heap_size())
            .sum()
    }

    /// Consumes the accumulator, yielding entries in ascending key order.
    pub fn into_sorted_entries(self) -> Vec<(IndexKey, PostingBitmap)> {
        let mut entries: Vec<_> = self.entries.into_iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}
