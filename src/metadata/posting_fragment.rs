use crate::helpers::helper::{read_u16, read_u64};
use crate::helpers::page_flags::FragmentFlags;

/// One slice of a `(key, postings)` record, stored as one slot of a DATA page.
///
/// Layout:
/// ```text
/// [ flags (u8) | key_len (u16) | chunk_len (u16) | cardinality (u64, FIRST only) ]
/// [ key bytes | chunk bytes ]
/// ```
/// A record whose postings do not fit one page is split into a FIRST fragment,
/// zero or more middle fragments and a LAST fragment; an unsplit record is
/// both FIRST and LAST. Every fragment repeats the key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingFragment<'a> {
    pub flags: FragmentFlags,
    pub key: &'a [u8],
    /// Number of rows in the whole record; only carried by the FIRST fragment.
    pub cardinality: Option<u64>,
    pub chunk: &'a [u8],
}

impl<'a> PostingFragment<'a> {
    pub const BASE_HEADER_SIZE: usize = 1 + 2 + 2;
    pub const MAX_HEADER_SIZE: usize = Self::BASE_HEADER_SIZE + 8;

    pub fn header_size(first: bool) -> usize {
        if first {
            Self::MAX_HEADER_SIZE
        } else {
            Self::BASE_HEADER_SIZE
        }
    }

    pub fn is_first(&self) -> bool {
        self.flags.contains(FragmentFlags::FIRST)
    }

    pub fn is_last(&self) -> bool {
        self.flags.contains(FragmentFlags::LAST)
    }

    pub fn encoded_len(&self) -> usize {
        Self::header_size(self.is_first()) + self.key.len() + self.chunk.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(self.flags.bits());
        buf.extend_from_slice(&(self.key.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(self.chunk.len() as u16).to_le_bytes());
        if self.is_first() {
            buf.extend_from_slice(&self.cardinality.unwrap_or(0).to_le_bytes());
        }
        buf.extend_from_slice(self.key);
        buf.extend_from_slice(self.chunk);
        buf
    }

    pub fn decode(buf: &'a [u8]) -> Result<Self, String> {
        let truncated = || "truncated posting fragment".to_string();

        let flag_bits = *buf.first().ok_or_else(truncated)?;
        let flags = FragmentFlags::from_bits(flag_bits)
            .ok_or_else(|| format!("unknown fragment flags {flag_bits:#04x}"))?;
        let key_len = read_u16(buf, 1).ok_or_else(truncated)? as usize;
        let chunk_len = read_u16(buf, 3).ok_or_else(truncated)? as usize;

        let first = flags.contains(FragmentFlags::FIRST);
        let cardinality = if first {
            Some(read_u64(buf, Self::BASE_HEADER_SIZE).ok_or_else(truncated)?)
        } else {
            None
        };

        let key_start = Self::header_size(first);
        let chunk_start = key_start + key_len;
        if buf.len() != chunk_start + chunk_len {
            return Err(format!(
                "fragment is {} bytes, header declares {}",
                buf.len(),
                chunk_start + chunk_len
            ));
        }
        if chunk_len == 0 {
            return Err("empty posting fragment".to_string());
        }

        Ok(Self {
            flags,
            key: &buf[key_start..chunk_start],
            cardinality,
            chunk: &buf[chunk_start..],
        })
    }
}
