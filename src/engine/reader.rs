use crc32fast::Hasher;

use crate::error::{BitmapError, Result};
use crate::general::options::BitmapOptions;
use crate::helpers::page_flags::PageFlags;
use crate::metadata::index_key::IndexKey;
use crate::metadata::metapage::Metapage;
use crate::metadata::posting_fragment::PostingFragment;
use crate::metadata::row_id::RowId;
use crate::posting::codec::decode_positions;
use crate::storage::page::Page;
use crate::storage::page_store::{METAPAGE_ID, PageId, PageStore};

/// First page of the data chain; the serializer allocates it right after the
/// metapage.
const FIRST_DATA_PAGE: PageId = 1;

/// Read-only view of a completed index.
///
/// Rebuilds the value to rows mapping from the pages and checks every
/// structural invariant on the way. Any mismatch is `Corruption`.
pub struct IndexReader<'s, S: PageStore + ?Sized> {
    store: &'s S,
    meta: Metapage,
}

/// A record being reassembled from its fragments.
struct PendingRecord {
    key: Vec<u8>,
    cardinality: u64,
    postings: Vec<u8>,
}

impl<'s, S: PageStore + ?Sized> IndexReader<'s, S> {
    pub fn open(store: &'s S) -> Result<Self> {
        let page_count = store.page_count()?;
        if page_count == 0 {
            return Err(BitmapError::corruption(METAPAGE_ID, "store has no metapage"));
        }

        let page = Page::from_buffer(store.read_page(METAPAGE_ID)?, METAPAGE_ID)?;
        let meta = Metapage::decode(&page)?;

        if !meta.is_complete() {
            return Err(BitmapError::corruption(
                METAPAGE_ID,
                "index build did not complete",
            ));
        }
        if page_count as u64 != 1 + meta.n_data_pages as u64 {
            return Err(BitmapError::corruption(
                METAPAGE_ID,
                format!(
                    "metapage records {} data pages, store has {} pages",
                    meta.n_data_pages, page_count
                ),
            ));
        }

        Ok(Self { store, meta })
    }

    pub fn metapage(&self) -> &Metapage {
        &self.meta
    }

    pub fn options(&self) -> &BitmapOptions {
        &self.meta.opts
    }

    /// Every indexed value with its rows, keys ascending, rows ascending.
    ///
    /// # Behavior
    /// - Walks the DATA chain from page 1, following `next_page_id`
    /// - Reassembles each record from its fragments and decodes the postings
    /// - Recomputes the chain checksum and compares it with the metapage
    ///
    /// # Errors
    /// `Corruption` when a page fails its own checks, the chain is broken, a
    /// record is interrupted or left unfinished, keys are out of order, a
    /// posting list disagrees with its cardinality, or the totals disagree with
    /// the metapage. `StorageIO` if a page cannot be read.
    pub fn postings(&self) -> Result<Vec<(IndexKey, Vec<RowId>)>> {
        let mut entries: Vec<(IndexKey, Vec<RowId>)> = Vec::new();
        let mut pending: Option<PendingRecord> = None;
        let mut hasher = Hasher::new();
        let mut total_rows = 0u64;

        let mut page_id = FIRST_DATA_PAGE;
        for n in 0..self.meta.n_data_pages {
            let page = Page::from_buffer(self.store.read_page(page_id)?, page_id)?;
            let corrupt = move |reason: String| BitmapError::corruption(page_id, reason);

            if page.flags() != PageFlags::DATA {
                return Err(corrupt(format!("expected a data page, flags {:?}", page.flags())));
            }
            hasher.update(&page.buf);

            for slot in 0..page.slot_count() {
                let record = page
                    .read_record(slot)
                    .ok_or_else(|| corrupt(format!("slot {slot} points outside the page")))?;
                let fragment = PostingFragment::decode(record)
                    .map_err(|e| corrupt(format!("slot {slot}: {e}")))?;

                let mut current = match (pending.take(), fragment.cardinality) {
                    (None, Some(cardinality)) => PendingRecord {
                        key: fragment.key.to_vec(),
                        cardinality,
                        postings: Vec::new(),
                    },
                    (Some(current), None) if current.key == fragment.key => current,
                    (Some(_), _) => {
                        return Err(corrupt(format!("slot {slot} interrupts an unfinished record")));
                    }
                    (None, None) => {
                        return Err(corrupt(format!("slot {slot} continues a missing record")));
                    }
                };
                current.postings.extend_from_slice(fragment.chunk);

                if !fragment.is_last() {
                    pending = Some(current);
                    continue;
                }

                let key = IndexKey::decode(&current.key).map_err(corrupt)?;
                if entries.last().is_some_and(|(prev, _)| *prev >= key) {
                    return Err(corrupt(format!("key {key} is out of order")));
                }
                let rows = decode_positions(&current.postings, current.cardinality)
                    .map_err(|e| corrupt(format!("postings of {key}: {e}")))?;
                total_rows += rows.len() as u64;
                entries.push((key, rows));
            }

            let next = page.header.next_page_id;
            let is_last = n + 1 == self.meta.n_data_pages;
            match (is_last, next) {
                (true, 0) => {}
                (false, next) if next == page_id + 1 => page_id = next,
                _ => return Err(corrupt(format!("broken page chain (next {next})"))),
            }
        }

        let corrupt = |reason: String| BitmapError::corruption(METAPAGE_ID, reason);
        if pending.is_some() {
            return Err(corrupt("last record is unfinished".to_string()));
        }
        if hasher.finalize() != self.meta.data_checksum {
            return Err(corrupt("data checksum mismatch".to_string()));
        }
        if entries.len() as u64 != self.meta.counts.n_distinct_values as u64 {
            return Err(corrupt(format!(
                "found {} values, metapage records {}",
                entries.len(),
                self.meta.counts.n_distinct_values
            )));
        }
        if total_rows > self.meta.counts.n_tuples {
            return Err(corrupt(format!(
                "found {} rows, metapage records {}",
                total_rows, self.meta.counts.n_tuples
            )));
        }

        Ok(entries)
    }
}
