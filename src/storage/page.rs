use crc32fast::Hasher;

use crate::error::{BitmapError, Result};
use crate::helpers::page_flags::PageFlags;
use crate::storage::data_page_header::DataPageHeader;
use crate::storage::page_header::PageHeader;
use crate::storage::page_opaque::{BITMAP_PAGE_TAG, PageOpaque};
use crate::storage::page_store::PageId;
use crate::storage::slot::Slot;

pub const DEFAULT_PAGE_SIZE: usize = 8192;
pub const MIN_PAGE_SIZE: usize = 256;
/// Largest page whose offsets still fit the `u16` slot fields.
pub const MAX_PAGE_SIZE: usize = 32768;

/// One fixed-size index page: common header, role-specific body, opaque trailer.
#[derive(Debug, Clone)]
pub struct Page {
    pub header: PageHeader,
    pub buf: Vec<u8>,
}

impl Page {
    pub fn new(page_size: usize, flags: PageFlags, page_id: PageId) -> Self {
        let header = PageHeader::new(page_id);

        let mut buf = vec![0u8; page_size];
        header.write_to(&mut buf[..PageHeader::SIZE]);
        PageOpaque::new(flags).write_to(&mut buf);

        if flags.contains(PageFlags::DATA) {
            DataPageHeader::new(page_size).write_to(&mut buf);
        }

        Self { header, buf }
    }

    /// Parses and validates a page read from storage.
    ///
    /// Rejects pages without the bitmap page tag, with a checksum mismatch or
    /// stored under a different id than `page_id`. An all-zero page (allocated
    /// but never written) fails the tag check.
    pub fn from_buffer(buf: Vec<u8>, page_id: PageId) -> Result<Self> {
        if buf.len() < MIN_PAGE_SIZE {
            return Err(BitmapError::corruption(
                page_id,
                format!("page is only {} bytes", buf.len()),
            ));
        }

        let opaque = PageOpaque::read_from(&buf);
        if opaque.page_tag != BITMAP_PAGE_TAG {
            return Err(BitmapError::corruption(
                page_id,
                format!("missing bitmap page tag (found {:#06x})", opaque.page_tag),
            ));
        }

        let header = PageHeader::read_from(&buf[..PageHeader::SIZE]);
        let page = Self { header, buf };

        let computed = page.compute_checksum();
        if computed != header.checksum {
            return Err(BitmapError::corruption(
                page_id,
                format!(
                    "checksum mismatch (stored {:#010x}, computed {:#010x})",
                    header.checksum, computed
                ),
            ));
        }

        if header.page_id != page_id {
            return Err(BitmapError::corruption(
                page_id,
                format!("page claims id {}", header.page_id),
            ));
        }

        if page.flags().contains(PageFlags::DATA) {
            page.validate_layout()?;
        }

        Ok(page)
    }

    pub fn page_id(&self) -> PageId {
        self.header.page_id
    }

    pub fn flags(&self) -> PageFlags {
        PageOpaque::read_from(&self.buf).flags
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.header.next_page_id = next_page_id;
        self.header.write_to(&mut self.buf[..PageHeader::SIZE]);
    }

    /// Bytes between the common header and the trailer.
    pub fn contents(&self) -> &[u8] {
        let end = self.buf.len() - PageOpaque::SIZE;
        &self.buf[PageHeader::SIZE..end]
    }

    pub fn contents_mut(&mut self) -> &mut [u8] {
        let end = self.buf.len() - PageOpaque::SIZE;
        &mut self.buf[PageHeader::SIZE..end]
    }

    /// Stamps the checksum; must be the last mutation before a write.
    pub fn seal(&mut self) {
        self.header.checksum = self.compute_checksum();
        self.header.write_to(&mut self.buf[..PageHeader::SIZE]);
    }

    fn compute_checksum(&self) -> u32 {
        let range = PageHeader::CHECKSUM_RANGE;
        let mut hasher = Hasher::new();
        hasher.update(&self.buf[..range.start]);
        hasher.update(&[0u8; 4]);
        hasher.update(&self.buf[range.end..]);
        hasher.finalize()
    }

    fn validate_layout(&self) -> Result<()> {
        let layout = DataPageHeader::read_from(&self.buf);
        let body_start = PageHeader::SIZE + DataPageHeader::SIZE;
        let body_end = self.buf.len() - PageOpaque::SIZE;
        let free_start = layout.free_start as usize;
        let free_end = layout.free_end as usize;

        let consistent = free_start >= body_start
            && free_start <= free_end
            && free_end <= body_end
            && (body_end - free_end) == layout.slot_count as usize * Slot::SIZE;

        if !consistent {
            return Err(BitmapError::corruption(
                self.page_id(),
                format!(
                    "inconsistent slot layout (slots {}, free {}..{})",
                    layout.slot_count, layout.free_start, layout.free_end
                ),
            ));
        }
        Ok(())
    }

    pub fn slot_count(&self) -> u16 {
        DataPageHeader::read_from(&self.buf).slot_count
    }

    /// Largest record that still fits, accounting for its slot.
    pub fn record_capacity(&self) -> usize {
        DataPageHeader::read_from(&self.buf)
            .free_space()
            .saturating_sub(Slot::SIZE)
    }

    /// Largest record an empty DATA page of `page_size` can hold.
    pub fn max_record_len(page_size: usize) -> usize {
        DataPageHeader::new(page_size)
            .free_space()
            .saturating_sub(Slot::SIZE)
    }

    /// Appends a record to a DATA page. Returns `None` when it does not fit.
    pub fn insert_record(&mut self, record: &[u8]) -> Option<u16> {
        if record.len() > self.record_capacity() {
            return None;
        }
        let mut layout = DataPageHeader::read_from(&self.buf);

        let record_offset = layout.free_start as usize;
        self.buf[record_offset..record_offset + record.len()].copy_from_slice(record);

        let slot_offset = layout.free_end as usize - Slot::SIZE;
        Slot::new(layout.free_start, record.len() as u16)
            .write_to(&mut self.buf[slot_offset..slot_offset + Slot::SIZE]);

        layout.free_start += record.len() as u16;
        layout.free_end -= Slot::SIZE as u16;
        layout.slot_count += 1;
        layout.write_to(&mut self.buf);

        Some(layout.slot_count - 1)
    }

    pub fn read_slot(&self, slot_id: u16) -> Option<Slot> {
        if slot_id >= self.slot_count() {
            return None;
        }

        let slot_end = self.buf.len() - PageOpaque::SIZE - slot_id as usize * Slot::SIZE;
        let slot_start = slot_end - Slot::SIZE;
        Some(Slot::read_from(&self.buf[slot_start..slot_end]))
    }

    /// Returns `None` for a missing slot or one pointing outside the record area.
    pub fn read_record(&self, slot_id: u16) -> Option<&[u8]> {
        let slot = self.read_slot(slot_id)?;
        let layout = DataPageHeader::read_from(&self.buf);

        let start = slot.offset as usize;
        let end = start + slot.length as usize;
        if start < PageHeader::SIZE + DataPageHeader::SIZE || end > layout.free_start as usize {
            return None;
        }
        Some(&self.buf[start..end])
    }
}
