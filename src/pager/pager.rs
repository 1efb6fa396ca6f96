use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{BitmapError, Result};
use crate::general::header::{HEADER_PAGE_ID, StoreHeader};
use crate::helpers::header_flags::HeaderFlags;
use crate::pager::redo_log::RedoLog;
use crate::storage::page_store::{PageId, PageStore, validate_page_size};

/// File-backed page store.
///
/// File layout: a 128-byte `StoreHeader` followed by `page_count` pages of
/// `page_size` bytes. Page writes go through a full-page-image redo journal
/// kept next to the file, so a crash mid-write is repaired on the next open.
pub struct Pager {
    pub header: StoreHeader,
    path: PathBuf,
    file: RefCell<File>,
    redo: RedoLog,
}

impl Pager {
    /// Creates (or truncates) a page file with no pages.
    pub fn create(path: &Path, page_size: usize) -> Result<Self> {
        validate_page_size(page_size)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| BitmapError::io(format!("create {}", path.display()), e))?;

        let flags = HeaderFlags::CHECKSUM_ENABLED | HeaderFlags::REDO_JOURNAL;
        let header = StoreHeader::new(page_size, flags);

        let mut redo = RedoLog::open(&RedoLog::path_for(path))?;
        redo.clear()?;

        let pager = Self {
            header,
            path: path.to_path_buf(),
            file: RefCell::new(file),
            redo,
        };
        pager.flush_header()?;
        pager.sync_file("create")?;

        Ok(pager)
    }

    /// Opens an existing page file, replaying a pending journal record first.
    ///
    /// Fails with `Corruption` if the file is shorter than the page count in
    /// its header says.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| BitmapError::io(format!("open {}", path.display()), e))?;

        let header = StoreHeader::read_from(&mut file)?;
        validate_page_size(header.page_size())?;

        let file_len = file
            .metadata()
            .map_err(|e| BitmapError::io(format!("stat {}", path.display()), e))?
            .len();

        let redo = RedoLog::open(&RedoLog::path_for(path))?;

        let mut pager = Self {
            header,
            path: path.to_path_buf(),
            file: RefCell::new(file),
            redo,
        };
        let expected_len = pager.page_offset(pager.header.page_count as PageId);
        if file_len < expected_len {
            return Err(BitmapError::corruption(
                HEADER_PAGE_ID,
                format!(
                    "header records {} pages but file holds {} bytes, expected {}",
                    pager.header.page_count, file_len, expected_len
                ),
            ));
        }
        pager.recover()?;

        Ok(pager)
    }

    /// Opens `path` if it exists, otherwise creates an empty store with
    /// `page_size`. An existing file keeps its own page size.
    pub fn open_or_create(path: &Path, page_size: usize) -> Result<Self> {
        if path.exists() {
            Self::open(path)
        } else {
            Self::create(path, page_size)
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_offset(&self, page_id: PageId) -> u64 {
        StoreHeader::SIZE as u64 + page_id as u64 * self.header.page_size() as u64
    }

    fn recover(&mut self) -> Result<()> {
        let Some((page_id, image)) = self.redo.pending()? else {
            return Ok(());
        };

        if (page_id as u64) < self.header.page_count && image.len() == self.header.page_size() {
            info!("replaying journaled image of page {} in {}", page_id, self.path.display());
            self.write_in_place(page_id, &image)?;
            self.sync_file("recover")?;
        } else {
            info!("discarding journal record for page {} outside the store", page_id);
        }

        self.redo.clear()
    }

    fn check_page_id(&self, page_id: PageId, context: &str) -> Result<()> {
        if page_id as u64 >= self.header.page_count {
            return Err(BitmapError::io(
                format!("{context} page {page_id}"),
                Error::new(
                    ErrorKind::NotFound,
                    format!("store has {} pages", self.header.page_count),
                ),
            ));
        }
        Ok(())
    }

    fn write_in_place(&self, page_id: PageId, image: &[u8]) -> Result<()> {
        let offset = self.page_offset(page_id);
        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(image))
            .and_then(|_| file.flush())
            .map_err(|e| BitmapError::io(format!("write page {page_id}"), e))
    }

    fn sync_file(&self, context: &str) -> Result<()> {
        self.file
            .borrow()
            .sync_all()
            .map_err(|e| BitmapError::io(format!("sync {} ({context})", self.path.display()), e))
    }

    pub fn flush_header(&self) -> Result<()> {
        let mut file = self.file.borrow_mut();
        self.header
            .write_to(&mut *file)
            .and_then(|_| file.flush())
            .map_err(|e| BitmapError::io("write store header", e))
    }
}

impl PageStore for Pager {
    fn page_size(&self) -> usize {
        self.header.page_size()
    }

    fn page_count(&self) -> Result<u32> {
        Ok(self.header.page_count as u32)
    }

    fn allocate_page(&mut self) -> Result<PageId> {
        let page_id = self.header.page_count as PageId;
        let page = vec![0u8; self.header.page_size()];

        self.write_in_place(page_id, &page)?;

        self.header.page_count += 1;
        self.flush_header()?;
        self.sync_file("allocate")?;

        debug!("allocated page {} in {}", page_id, self.path.display());
        Ok(page_id)
    }

    fn read_page(&self, page_id: PageId) -> Result<Vec<u8>> {
        self.check_page_id(page_id, "read")?;

        let offset = self.page_offset(page_id);
        let mut buf = vec![0u8; self.header.page_size()];

        let mut file = self.file.borrow_mut();
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut buf))
            .map_err(|e| BitmapError::io(format!("read page {page_id}"), e))?;

        Ok(buf)
    }

    /// Replaces the contents of an allocated page with `image`.
    ///
    /// # Behavior
    /// - Appends the full image to the redo journal and syncs it
    /// - Writes the image in place at `header + page_id * page_size` and syncs
    /// - Clears the journal
    ///
    /// A crash before the journal sync leaves the old page; a crash after it
    /// is repaired by `Pager::open`, which replays the logged image. Readers
    /// never see a torn page.
    ///
    /// # Errors
    /// - `StorageIO` with `NotFound` if `page_id` was never allocated
    /// - `StorageIO` with `InvalidInput` if `image` is not exactly one page
    /// - `StorageIO` if any journal or file write fails
    fn write_page_atomic(&mut self, page_id: PageId, image: &[u8]) -> Result<()> {
        self.check_page_id(page_id, "write")?;
        if image.len() != self.header.page_size() {
            return Err(BitmapError::io(
                format!("write page {page_id}"),
                Error::new(
                    ErrorKind::InvalidInput,
                    format!(
                        "image is {} bytes, page size is {}",
                        image.len(),
                        self.header.page_size()
                    ),
                ),
            ));
        }

        self.redo.log_page(page_id, image)?;
        self.write_in_place(page_id, image)?;
        self.sync_file("write")?;
        self.redo.clear()
    }

    /// Shrinks the store to `page_count` pages.
    ///
    /// # Behavior
    /// - Rewrites and syncs the header with the new page count first
    /// - Only then cuts the file to `header + page_count * page_size` bytes
    /// - Clears the redo journal
    ///
    /// A crash between the two steps leaves a header that is already correct
    /// over a longer file; the stale tail is overwritten by later allocations.
    ///
    /// # Errors
    /// Returns `StorageIO` if writing the header or resizing the file fails.
    fn truncate(&mut self, page_count: u32) -> Result<()> {
        self.header.page_count = page_count as u64;
        self.flush_header()?;
        self.sync_file("truncate header")?;

        let len = self.page_offset(page_count);
        self.file
            .borrow()
            .set_len(len)
            .map_err(|e| BitmapError::io(format!("truncate to {page_count} pages"), e))?;
        self.sync_file("truncate")?;

        self.redo.clear()
    }

    fn sync(&mut self) -> Result<()> {
        self.sync_file("sync")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::builder::BitmapIndexBuilder;
    use crate::engine::reader::IndexReader;
    use crate::engine::scan::{ScanRow, VecScan};
    use crate::general::options::BitmapOptions;
    use crate::metadata::row_id::RowId;

    #[test]
    fn pages_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        {
            let mut pager = Pager::create(&path, 512).unwrap();
            assert_eq!(pager.allocate_page().unwrap(), 0);
            assert_eq!(pager.allocate_page().unwrap(), 1);
            pager.write_page_atomic(1, &[3u8; 512]).unwrap();
        }

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_size(), 512);
        assert_eq!(pager.page_count().unwrap(), 2);
        assert_eq!(pager.read_page(0).unwrap(), vec![0u8; 512]);
        assert_eq!(pager.read_page(1).unwrap(), vec![3u8; 512]);
        assert!(pager.read_page(2).is_err());
    }

    #[test]
    fn truncate_drops_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        let mut pager = Pager::create(&path, 256).unwrap();
        for _ in 0..3 {
            pager.allocate_page().unwrap();
        }
        pager.truncate(0).unwrap();
        drop(pager);

        let pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_count().unwrap(), 0);
        assert_eq!(
            std::fs::metadata(&path).unwrap().len(),
            StoreHeader::SIZE as u64
        );
    }

    #[test]
    fn journaled_image_is_replayed_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        {
            let mut pager = Pager::create(&path, 256).unwrap();
            pager.allocate_page().unwrap();
            pager.write_page_atomic(0, &[1u8; 256]).unwrap();
        }

        // Crash after the journal write, before the in-place write.
        RedoLog::open(&RedoLog::path_for(&path))
            .unwrap()
            .log_page(0, &[2u8; 256])
            .unwrap();

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.read_page(0).unwrap(), vec![2u8; 256]);
        assert!(pager.redo.pending().unwrap().is_none());
    }

    #[test]
    fn crash_after_header_rewrite_reopens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        {
            let mut pager = Pager::create(&path, 256).unwrap();
            for _ in 0..3 {
                pager.allocate_page().unwrap();
            }
            pager.write_page_atomic(0, &[9u8; 256]).unwrap();

            // First step of truncate only: the file keeps its stale tail.
            pager.header.page_count = 0;
            pager.flush_header().unwrap();
            pager.sync_file("test").unwrap();
        }

        let mut pager = Pager::open(&path).unwrap();
        assert_eq!(pager.page_count().unwrap(), 0);
        assert!(std::fs::metadata(&path).unwrap().len() > StoreHeader::SIZE as u64);

        let result = BitmapIndexBuilder::new(&mut pager, BitmapOptions::default())
            .build(&mut VecScan::new(vec![ScanRow::live(RowId::new(0), 1i32)]))
            .unwrap();
        assert_eq!(result.values_indexed, 1);
        assert!(IndexReader::open(&pager).is_ok());
    }

    #[test]
    fn file_shorter_than_header_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        {
            let mut pager = Pager::create(&path, 256).unwrap();
            for _ in 0..3 {
                pager.allocate_page().unwrap();
            }
        }
        OpenOptions::new()
            .write(true)
            .open(&path)
            .unwrap()
            .set_len(StoreHeader::SIZE as u64)
            .unwrap();

        let err = Pager::open(&path).err().unwrap();
        assert!(matches!(
            err,
            BitmapError::Corruption {
                page_id: HEADER_PAGE_ID,
                ..
            }
        ));
    }

    #[test]
    fn open_or_create_keeps_an_existing_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.fbmp");

        let mut pager = Pager::open_or_create(&path, 512).unwrap();
        BitmapIndexBuilder::new(&mut pager, BitmapOptions::default())
            .build(&mut VecScan::new(vec![ScanRow::live(RowId::new(0), "x")]))
            .unwrap();
        drop(pager);

        let mut pager = Pager::open_or_create(&path, 1024).unwrap();
        assert_eq!(pager.page_size(), 512);
        let err = BitmapIndexBuilder::new(&mut pager, BitmapOptions::default())
            .build(&mut VecScan::new(vec![ScanRow::live(RowId::new(0), "y")]))
            .unwrap_err();
        assert!(matches!(err.kind(), BitmapError::AlreadyPopulated { page_count: 2 }));
        assert!(IndexReader::open(&pager).is_ok());
    }

    #[test]
    fn wrong_image_size_leaves_page_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut pager = Pager::create(&dir.path().join("index.fbmp"), 256).unwrap();
        pager.allocate_page().unwrap();

        assert!(pager.write_page_atomic(0, &[1u8; 100]).is_err());
        assert_eq!(pager.read_page(0).unwrap(), vec![0u8; 256]);
    }
}
