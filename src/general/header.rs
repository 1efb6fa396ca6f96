use std::io::{Read, Seek, SeekFrom, Write};

use crc32fast::Hasher;

use crate::error::{BitmapError, Result};
use crate::helpers::header_flags::HeaderFlags;
use crate::helpers::helper::current_unix_time;

pub const STORE_MAGIC: [u8; 16] = *b"FLUXBMP_PAGES\0\0\0";
pub const STORE_HEADER_SIZE: u16 = 128;
pub const STORE_VERSION: u32 = 1;

/// Header at byte 0 of a page file; pages start right after it.
///
/// Reported as page `u32::MAX` in corruption errors since it is not a page.
#[derive(Debug, Clone)]
pub struct StoreHeader {
    pub magic: [u8; 16],   // 16 BYTES FOR HEADER MAGIC
    pub header_size: u16,  // 2 BYTES FOR HEADER SIZE
    pub page_size: u16,    // 2 BYTES FOR PAGE SIZE
    pub version: u32,      // 4 BYTES FOR FORMAT VERSION
    pub flags: HeaderFlags, // 2 BYTES FOR FLAGS
    pub created_at: u64,   // 8 BYTES FOR CREATED AT
    pub page_count: u64,   // 8 BYTES FOR PAGE COUNT
    pub checksum: u32,     // 4 BYTES FOR CHECKSUM
    pub reserved: [u8; 82], // 82 BYTES RESERVED
}

/// Page id used for the store header in corruption errors.
pub const HEADER_PAGE_ID: u32 = u32::MAX;

impl StoreHeader {
    pub const SIZE: usize = 128;

    pub fn new(page_size: usize, flags: HeaderFlags) -> Self {
        Self {
            magic: STORE_MAGIC,
            header_size: STORE_HEADER_SIZE,
            page_size: page_size as u16,
            version: STORE_VERSION,
            flags,
            created_at: current_unix_time(),
            page_count: 0,
            checksum: 0,
            reserved: [0; 82],
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size as usize
    }

    /// Serializes the header in its fixed little-endian layout:
    /// ```text
    /// [ magic (16) | header_size (u16) | page_size (u16) | version (u32) ]
    /// [ flags (u16) | created_at (u64) | page_count (u64) | checksum (u32) ]
    /// [ reserved (82) ]
    /// ```
    fn encode(&self, checksum: u32) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..16].copy_from_slice(&self.magic);
        buf[16..18].copy_from_slice(&self.header_size.to_le_bytes());
        buf[18..20].copy_from_slice(&self.page_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.version.to_le_bytes());
        buf[24..26].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[26..34].copy_from_slice(&self.created_at.to_le_bytes());
        buf[34..42].copy_from_slice(&self.page_count.to_le_bytes());
        buf[42..46].copy_from_slice(&checksum.to_le_bytes());
        buf[46..128].copy_from_slice(&self.reserved);
        buf
    }

    fn compute_checksum(&self) -> u32 {
        let mut hasher = Hasher::new();
        hasher.update(&self.encode(0));
        hasher.finalize()
    }

    /// Writes the header at offset 0. Does not flush or sync.
    pub fn write_to<W: Write + Seek>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&self.encode(self.compute_checksum()))
    }

    /// Reads and validates the header at offset 0.
    ///
    /// # Behavior
    /// - Seeks to byte offset `0` and reads exactly `SIZE` bytes
    /// - Checks the magic, the header size and the format version
    /// - Verifies the CRC-32 when `CHECKSUM_ENABLED` is set
    ///
    /// # Disk layout
    /// ```text
    /// [ magic (16 bytes)       ]
    /// [ header_size (u16)      ]
    /// [ page_size (u16)        ]
    /// [ version (u32)          ]
    /// [ flags (u16)            ]
    /// [ created_at (u64)       ]
    /// [ page_count (u64)       ]
    /// [ checksum (u32)         ]
    /// [ reserved (82 bytes)    ]
    /// ```
    ///
    /// # Errors
    /// - `StorageIO` if seeking or reading fails
    /// - `Corruption` (page `HEADER_PAGE_ID`) on a bad magic, an unknown
    ///   version or header size, or a checksum mismatch
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; Self::SIZE];
        reader
            .seek(SeekFrom::Start(0))
            .and_then(|_| reader.read_exact(&mut buf))
            .map_err(|e| BitmapError::io("read store header", e))?;

        let corrupt = |reason: &str| BitmapError::corruption(HEADER_PAGE_ID, reason);

        let mut magic = [0u8; 16];
        magic.copy_from_slice(&buf[0..16]);
        if magic != STORE_MAGIC {
            return Err(corrupt("invalid store magic"));
        }

        let u16_at = |at: usize| u16::from_le_bytes([buf[at], buf[at + 1]]);
        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let u64_at = |at: usize| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&buf[at..at + 8]);
            u64::from_le_bytes(bytes)
        };

        let header_size = u16_at(16);
        if header_size != STORE_HEADER_SIZE {
            return Err(corrupt("unsupported store header size"));
        }

        let version = u32_at(20);
        if version != STORE_VERSION {
            return Err(BitmapError::corruption(
                HEADER_PAGE_ID,
                format!("unsupported store version {version}"),
            ));
        }

        let mut reserved = [0u8; 82];
        reserved.copy_from_slice(&buf[46..128]);

        let header = Self {
            magic,
            header_size,
            page_size: u16_at(18),
            version,
            flags: HeaderFlags::from_bits_truncate(u16_at(24)),
            created_at: u64_at(26),
            page_count: u64_at(34),
            checksum: u32_at(42),
            reserved,
        };

        if header.flags.contains(HeaderFlags::CHECKSUM_ENABLED)
            && header.compute_checksum() != header.checksum
        {
            return Err(corrupt("store header checksum mismatch"));
        }

        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trip() {
        let mut header = StoreHeader::new(4096, HeaderFlags::CHECKSUM_ENABLED);
        header.page_count = 12;

        let mut cursor = Cursor::new(Vec::new());
        header.write_to(&mut cursor).unwrap();
        assert_eq!(cursor.get_ref().len(), StoreHeader::SIZE);

        let read = StoreHeader::read_from(&mut cursor).unwrap();
        assert_eq!(read.page_size(), 4096);
        assert_eq!(read.page_count, 12);
        assert_eq!(read.created_at, header.created_at);
    }

    #[test]
    fn checksum_mismatch_is_corruption() {
        let header = StoreHeader::new(4096, HeaderFlags::CHECKSUM_ENABLED);
        let mut cursor = Cursor::new(Vec::new());
        header.write_to(&mut cursor).unwrap();
        cursor.get_mut()[36] ^= 0xFF;

        let err = StoreHeader::read_from(&mut cursor).unwrap_err();
        assert!(matches!(err, BitmapError::Corruption { .. }));
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut cursor = Cursor::new(vec![0u8; StoreHeader::SIZE]);
        assert!(matches!(
            StoreHeader::read_from(&mut cursor).unwrap_err(),
            BitmapError::Corruption { .. }
        ));
    }
}
