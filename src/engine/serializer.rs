use crc32fast::Hasher;
use log::debug;

use crate::engine::accumulator::Accumulator;
use crate::error::{BitmapError, Result};
use crate::general::options::BitmapOptions;
use crate::helpers::page_flags::{FragmentFlags, MetaFlags, PageFlags};
use crate::metadata::metapage::{Metapage, MetapageCounts};
use crate::metadata::posting_fragment::PostingFragment;
use crate::posting::codec::encode_positions;
use crate::posting::PostingSet;
use crate::storage::page::Page;
use crate::storage::page_store::{METAPAGE_ID, PageId, PageStore, validate_page_size};

/// What a flush put on disk.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FlushSummary {
    pub counts: MetapageCounts,
    pub data_pages: u32,
    pub data_checksum: u32,
}

impl FlushSummary {
    pub fn pages_written(&self) -> u32 {
        self.data_pages + 1
    }
}

/// Largest encoded key that still leaves room for one posting byte on an
/// empty data page.
pub fn max_key_len(page_size: usize) -> usize {
    Page::max_record_len(page_size).saturating_sub(PostingFragment::MAX_HEADER_SIZE + 1)
}

/// Writes the accumulated entries to an empty store.
///
/// # Behavior
/// - Checks the page size and that every key fits on one page, before any
///   page is allocated
/// - Allocates page 0 and writes the metapage without `BUILD_COMPLETE`
/// - Writes the entries in ascending key order into DATA pages linked through
///   `next_page_id`; a posting list that does not fit is split into
///   FIRST / middle / LAST fragments that each repeat the key
/// - Rewrites the metapage with `BUILD_COMPLETE`, the data page count and the
///   chain checksum as the final write, then syncs the store
///
/// # Disk layout
/// ```text
/// page 0     : metapage
/// page 1..=n : DATA pages, page i links to i + 1, page n links to 0
/// ```
///
/// # Errors
/// - `InvalidOptions` for a page size outside the supported range
/// - `KeyTooLarge` if an encoded key leaves no room for postings
/// - `StorageIO` from any allocation or page write
///
/// Nothing is cleaned up on error; the caller owns rollback.
pub fn flush<S: PageStore + ?Sized>(
    accumulator: Accumulator,
    options: &BitmapOptions,
    store: &mut S,
) -> Result<FlushSummary> {
    let page_size = store.page_size();
    validate_page_size(page_size)?;

    let counts = MetapageCounts {
        n_distinct_values: accumulator.distinct_values(),
        n_tuples: accumulator.rows_seen(),
    };

    let max_key = max_key_len(page_size);
    let mut records = Vec::with_capacity(counts.n_distinct_values as usize);
    for (key, bitmap) in accumulator.into_sorted_entries() {
        let key_bytes = key.encode();
        if key_bytes.len() > max_key {
            return Err(BitmapError::KeyTooLarge {
                len: key_bytes.len(),
                max: max_key,
            });
        }
        let postings = encode_positions(&bitmap);
        records.push((key_bytes, bitmap.cardinality(), postings));
    }

    let meta_id = store.allocate_page()?;
    if meta_id != METAPAGE_ID {
        return Err(BitmapError::corruption(
            meta_id,
            "metapage must be the first page of the store",
        ));
    }
    let mut meta = Metapage::new(*options, counts);
    store.write_page_atomic(METAPAGE_ID, &meta.encode(page_size).buf)?;

    let mut chain = DataChain::new(store);
    for (key, cardinality, postings) in &records {
        chain.append(key, *cardinality, postings)?;
    }
    let (data_pages, data_checksum) = chain.finish()?;

    meta.flags = MetaFlags::BUILD_COMPLETE;
    meta.n_data_pages = data_pages;
    meta.data_checksum = data_checksum;
    store.write_page_atomic(METAPAGE_ID, &meta.encode(page_size).buf)?;
    store.sync()?;

    Ok(FlushSummary {
        counts,
        data_pages,
        data_checksum,
    })
}

/// Fills DATA pages one at a time, linking each to the next.
struct DataChain<'s, S: PageStore + ?Sized> {
    store: &'s mut S,
    current: Option<Page>,
    pages_written: u32,
    hasher: Hasher,
}

impl<'s, S: PageStore + ?Sized> DataChain<'s, S> {
    fn new(store: &'s mut S) -> Self {
        Self {
            store,
            current: None,
            pages_written: 0,
            hasher: Hasher::new(),
        }
    }

    fn new_page(&mut self) -> Result<Page> {
        let page_id = self.store.allocate_page()?;
        Ok(Page::new(self.store.page_size(), PageFlags::DATA, page_id))
    }

    fn write(&mut self, mut page: Page, next_page_id: PageId) -> Result<()> {
        page.set_next_page_id(next_page_id);
        page.seal();
        self.store.write_page_atomic(page.page_id(), &page.buf)?;
        self.hasher.update(&page.buf);
        self.pages_written += 1;

        debug!(
            "wrote data page {} ({} fragments, next {})",
            page.page_id(),
            page.slot_count(),
            next_page_id
        );
        Ok(())
    }

    /// Writes the current page and starts the one after it.
    fn advance(&mut self) -> Result<Page> {
        let next = self.new_page()?;
        if let Some(full) = self.current.take() {
            self.write(full, next.page_id())?;
        }
        Ok(next)
    }

    /// Adds one record, splitting its postings over as many pages as needed.
    fn append(&mut self, key: &[u8], cardinality: u64, postings: &[u8]) -> Result<()> {
        let mut offset = 0;
        let mut first = true;

        while first || offset < postings.len() {
            let mut page = match self.current.take() {
                Some(page) => page,
                None => self.advance()?,
            };

            let overhead = PostingFragment::header_size(first) + key.len();
            if page.record_capacity() <= overhead {
                self.current = Some(page);
                page = self.advance()?;
            }

            let room = page.record_capacity() - overhead;
            let end = postings.len().min(offset + room);

            let mut flags = FragmentFlags::empty();
            if first {
                flags |= FragmentFlags::FIRST;
            }
            if end == postings.len() {
                flags |= FragmentFlags::LAST;
            }

            let fragment = PostingFragment {
                flags,
                key,
                cardinality: first.then_some(cardinality),
                chunk: &postings[offset..end],
            };
            let slot = page.insert_record(&fragment.encode());
            if slot.is_none() {
                return Err(BitmapError::corruption(
                    page.page_id(),
                    format!("fragment of {} bytes did not fit", fragment.encoded_len()),
                ));
            }

            self.current = Some(page);
            offset = end;
            first = false;
        }
        Ok(())
    }

    /// Writes the last page and returns the page count and the chain checksum.
    fn finish(mut self) -> Result<(u32, u32)> {
        if let Some(last) = self.current.take() {
            self.write(last, 0)?;
        }
        Ok((self.pages_written, self.hasher.finalize()))
    }
}
