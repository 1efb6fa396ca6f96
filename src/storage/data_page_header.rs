use crate::storage::page_header::PageHeader;
use crate::storage::page_opaque::PageOpaque;

/// Slotted layout header of a DATA page, stored right after the `PageHeader`.
/// Records grow up from `free_start`, slots grow down from the trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPageHeader {
    pub slot_count: u16,
    pub free_start: u16,
    pub free_end: u16,
}

impl DataPageHeader {
    pub const SIZE: usize = 2 + 2 + 2;
    pub const OFFSET: usize = PageHeader::SIZE;

    pub fn new(page_size: usize) -> Self {
        Self {
            slot_count: 0,
            free_start: (PageHeader::SIZE + Self::SIZE) as u16,
            free_end: (page_size - PageOpaque::SIZE) as u16,
        }
    }

    /// `buf` is the whole page.
    pub fn write_to(&self, buf: &mut [u8]) {
        let at = Self::OFFSET;
        buf[at..at + 2].copy_from_slice(&self.slot_count.to_le_bytes());
        buf[at + 2..at + 4].copy_from_slice(&self.free_start.to_le_bytes());
        buf[at + 4..at + 6].copy_from_slice(&self.free_end.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> Self {
        let at = Self::OFFSET;
        Self {
            slot_count: u16::from_le_bytes([buf[at], buf[at + 1]]),
            free_start: u16::from_le_bytes([buf[at + 2], buf[at + 3]]),
            free_end: u16::from_le_bytes([buf[at + 4], buf[at + 5]]),
        }
    }

    pub fn free_space(&self) -> usize {
        self.free_end.saturating_sub(self.free_start) as usize
    }
}
