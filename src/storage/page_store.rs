use std::io::{Error, ErrorKind};

use crate::error::{BitmapError, Result};
use crate::storage::page::{MAX_PAGE_SIZE, MIN_PAGE_SIZE};

pub type PageId = u32;

/// Page 0 of every index holds the metapage.
pub const METAPAGE_ID: PageId = 0;

/// Fixed-size page storage the index is written to.
///
/// Implementations must make `write_page_atomic` all-or-nothing: after a
/// crash a reader sees either the previous image of the page or the new one.
pub trait PageStore {
    fn page_size(&self) -> usize;

    fn page_count(&self) -> Result<u32>;

    /// Extends the store by one zeroed page and returns its id.
    fn allocate_page(&mut self) -> Result<PageId>;

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>>;

    fn write_page_atomic(&mut self, page_id: PageId, image: &[u8]) -> Result<()>;

    /// Drops every page at or after `page_count`.
    fn truncate(&mut self, page_count: u32) -> Result<()>;

    /// Makes all previous writes durable.
    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn validate_page_size(page_size: usize) -> Result<()> {
    if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(BitmapError::invalid_option(
            "page_size",
            format!("{page_size} is outside {MIN_PAGE_SIZE}..={MAX_PAGE_SIZE}"),
        ));
    }
    Ok(())
}

/// Page store kept entirely in memory. Every write replaces a whole page.
#[derive(Debug, Clone)]
pub struct MemoryPageStore {
    page_size: usize,
    pages: Vec<Vec<u8>>,
}

impl MemoryPageStore {
    pub fn new(page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;
        Ok(Self {
            page_size,
            pages: Vec::new(),
        })
    }

    fn check_page_id(&self, page_id: PageId, context: &str) -> Result<usize> {
        let index = page_id as usize;
        if index >= self.pages.len() {
            return Err(BitmapError::io(
                format!("{context} page {page_id}"),
                Error::new(
                    ErrorKind::NotFound,
                    format!("store has {} pages", self.pages.len()),
                ),
            ));
        }
        Ok(index)
    }
}

impl PageStore for MemoryPageStore {
    fn page_size(&self) -> usize {
        self.page_size
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.pages.len() as u32)
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = self.pages.len() as PageId;
        self.pages.push(vec![0u8; self.page_size]);
        Ok(page_id)
    }

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        let index = self.check_page_id(page_id, "read")?;
        Ok(self.pages[index].clone())
    }

    fn write_page_atomic(&mut self, page_id: PageId, image: &[u8]) -> Result<()> {
        let index = self.check_page_id(page_id, "write")?;
        if image.len() != self.page_size {
            return Err(BitmapError::io(
                format!("write page {page_id}"),
                Error::new(
                    ErrorKind::InvalidInput,
                    format!("image is {} bytes, page size is {}", image.len(), self.page_size),
                ),
            ));
        }
        self.pages[index].copy_from_slice(image);
        Ok(())
    }

    fn truncate(&mut self, page_count: u32) -> Result<()> {
        self.pages.truncate(page_count as usize);
        Ok(())
    }
}
