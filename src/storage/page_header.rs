use crate::storage::page_store::PageId;

/// Common header at the start of every index page.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub page_id: PageId,
    /// Next page in a data chain; 0 ends the chain (page 0 is the metapage).
    pub next_page_id: PageId,
    pub checksum: u32,
    pub reserved: [u8; 12],
}

impl PageHeader {
    pub const SIZE: usize = 4 + 4 + 4 + 12;
    pub const CHECKSUM_RANGE: std::ops::Range<usize> = 8..12;

    pub fn new(page_id: PageId) -> Self {
        Self {
            page_id,
            next_page_id: 0,
            checksum: 0,
            reserved: [0u8; 12],
        }
    }

    pub fn write_to(&self, buf: &mut [u8]) {
        assert!(buf.len() >= Self::SIZE);

        buf[0..4].copy_from_slice(&self.page_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.next_page_id.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf[12..24].copy_from_slice(&self.reserved);
    }

    pub fn read_from(buf: &[u8]) -> Self {
        assert!(buf.len() >= Self::SIZE);

        let mut reserved = [0u8; 12];
        reserved.copy_from_slice(&buf[12..24]);

        Self {
            page_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            next_page_id: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            checksum: u32::from_le_bytes([buf[8], buf[9], buf[10], buf[11]]),
            reserved,
        }
    }
}
