use crate::helpers::page_flags::PageFlags;

/// Identifies pages of this index type to page dump tools.
/// Always the last two bytes of the page.
pub const BITMAP_PAGE_TAG: u16 = 0xFF84;

/// Trailer at the very end of every index page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOpaque {
    pub flags: PageFlags,
    pub page_tag: u16,
}

impl PageOpaque {
    pub const SIZE: usize = 2 + 2;

    pub fn new(flags: PageFlags) -> Self {
        Self {
            flags,
            page_tag: BITMAP_PAGE_TAG,
        }
    }

    /// `buf` is the whole page; the trailer occupies its last `SIZE` bytes.
    pub fn write_to(&self, buf: &mut [u8]) {
        let start = buf.len() - Self::SIZE;
        buf[start..start + 2].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[start + 2..start + 4].copy_from_slice(&self.page_tag.to_le_bytes());
    }

    pub fn read_from(buf: &[u8]) -> Self {
        let start = buf.len() - Self::SIZE;
        let flags = u16::from_le_bytes([buf[start], buf[start + 1]]);
        Self {
            flags: PageFlags::from_bits_retain(flags),
            page_tag: u16::from_le_bytes([buf[start + 2], buf[start + 3]]),
        }
    }
}
