use crate::error::{BitmapError, Result};
use crate::general::options::{BitmapOptions, PostingFormat};
use crate::helpers::helper::{read_u32, read_u64};
use crate::helpers::page_flags::{MetaFlags, PageFlags};
use crate::storage::page::Page;
use crate::storage::page_store::METAPAGE_ID;

pub const BITMAP_MAGIC_NUMBER: u32 = 0xB17B_A9ED;
pub const BITMAP_VERSION: u32 = 1;

/// Totals recorded by a build.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MetapageCounts {
    pub n_distinct_values: u32,
    pub n_tuples: u64,
}

/// Index-wide metadata kept in page 0.
///
/// Contents layout (after the common page header):
/// ```text
/// [ magic (u32) | version (u32) | n_distinct_values (u32) | n_tuples (u64) ]
/// [ max_distinct_values (u32) | posting_format (u8) | meta_flags (u8) | reserved (u16) ]
/// [ n_data_pages (u32) | data_checksum (u32) ]
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metapage {
    pub magic_number: u32,
    pub version: u32,
    pub counts: MetapageCounts,
    /// Frozen copy of the options the index was built with.
    pub opts: BitmapOptions,
    pub flags: MetaFlags,
    pub n_data_pages: u32,
    /// CRC-32 over every data page image, in chain order.
    pub data_checksum: u32,
}

impl Metapage {
    pub const SIZE: usize = 4 + 4 + 4 + 8 + 4 + 1 + 1 + 2 + 4 + 4;

    pub fn new(opts: BitmapOptions, counts: MetapageCounts) -> Self {
        Self {
            magic_number: BITMAP_MAGIC_NUMBER,
            version: BITMAP_VERSION,
            counts,
            opts,
            flags: MetaFlags::empty(),
            n_data_pages: 0,
            data_checksum: 0,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.flags.contains(MetaFlags::BUILD_COMPLETE)
    }

    /// Builds the sealed image of page 0.
    pub fn encode(&self, page_size: usize) -> Page {
        let mut page = Page::new(page_size, PageFlags::META, METAPAGE_ID);

        let buf = page.contents_mut();
        buf[0..4].copy_from_slice(&self.magic_number.to_le_bytes());
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.counts.n_distinct_values.to_le_bytes());
        buf[12..20].copy_from_slice(&self.counts.n_tuples.to_le_bytes());
        buf[20..24].copy_from_slice(&self.opts.max_distinct_values.to_le_bytes());
        buf[24] = self.opts.posting_format as u8;
        buf[25] = self.flags.bits();
        buf[26..28].copy_from_slice(&[0u8; 2]);
        buf[28..32].copy_from_slice(&self.n_data_pages.to_le_bytes());
        buf[32..36].copy_from_slice(&self.data_checksum.to_le_bytes());

        page.seal();
        page
    }

    /// Decodes a page already checked by `Page::from_buffer`.
    ///
    /// Fails with `Corruption` when the page is not the metapage, lacks the
    /// magic number or was written by an unknown format version.
    pub fn decode(page: &Page) -> Result<Self> {
        let corrupt = |reason: String| BitmapError::corruption(page.page_id(), reason);

        let flags = page.flags();
        if !flags.contains(PageFlags::META) || flags.contains(PageFlags::DATA) {
            return Err(corrupt(format!("not a metapage (flags {:?})", flags)));
        }

        let buf = page.contents();
        let truncated = || corrupt("truncated metapage".to_string());
        let u32_at = |at: usize| read_u32(buf, at).ok_or_else(truncated);

        let magic_number = u32_at(0)?;
        if magic_number != BITMAP_MAGIC_NUMBER {
            return Err(corrupt(format!("bad magic number {magic_number:#010x}")));
        }

        let version = u32_at(4)?;
        if version != BITMAP_VERSION {
            return Err(corrupt(format!("unsupported metapage version {version}")));
        }

        let counts = MetapageCounts {
            n_distinct_values: u32_at(8)?,
            n_tuples: read_u64(buf, 12).ok_or_else(truncated)?,
        };

        let format_tag = *buf.get(24).ok_or_else(truncated)?;
        let posting_format = PostingFormat::from_u8(format_tag)
            .ok_or_else(|| corrupt(format!("unknown posting format {format_tag}")))?;

        let opts = BitmapOptions {
            max_distinct_values: u32_at(20)?,
            posting_format,
        };
        opts.validate()
            .map_err(|e| corrupt(format!("frozen options are invalid: {e}")))?;

        if counts.n_distinct_values > opts.max_distinct_values {
            return Err(corrupt(format!(
                "{} distinct values exceed the frozen limit {}",
                counts.n_distinct_values, opts.max_distinct_values
            )));
        }

        let meta_flags = *buf.get(25).ok_or_else(truncated)?;

        Ok(Self {
            magic_number,
            version,
            counts,
            opts,
            flags: MetaFlags::from_bits_truncate(meta_flags),
            n_data_pages: u32_at(28)?,
            data_checksum: u32_at(32)?,
        })
    }
}

/// Encodes `options` and `counts` into a fresh, not yet completed metapage.
pub fn encode(options: &BitmapOptions, counts: MetapageCounts, page_size: usize) -> Page {
    Metapage::new(*options, counts).encode(page_size)
}

pub fn decode(page: &Page) -> Result<(BitmapOptions, MetapageCounts)> {
    let meta = Metapage::decode(page)?;
    Ok((meta.opts, meta.counts))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::page::MIN_PAGE_SIZE;

    fn reparse(page: Page) -> Result<Page> {
        Page::from_buffer(page.buf, METAPAGE_ID)
    }

    fn sample() -> Metapage {
        let opts = BitmapOptions::default()
            .with_max_distinct_values(64)
            .with_posting_format(PostingFormat::Dense);
        let counts = MetapageCounts {
            n_distinct_values: 12,
            n_tuples: 5_000_000_000,
        };
        Metapage::new(opts, counts)
    }

    #[test]
    fn encode_then_decode() {
        let mut meta = sample();
        meta.flags = MetaFlags::BUILD_COMPLETE;
        meta.n_data_pages = 9;
        meta.data_checksum = 0xABCD_0123;

        let page = reparse(meta.encode(MIN_PAGE_SIZE)).unwrap();
        assert_eq!(page.flags(), PageFlags::META);
        assert_eq!(Metapage::decode(&page).unwrap(), meta);
    }

    #[test]
    fn contract_functions_round_trip_options_and_counts() {
        let meta = sample();
        let page = reparse(encode(&meta.opts, meta.counts, 1024)).unwrap();
        assert_eq!(decode(&page).unwrap(), (meta.opts, meta.counts));
        assert!(!Metapage::decode(&page).unwrap().is_complete());
    }

    #[test]
    fn future_version_is_corruption() {
        let mut meta = sample();
        meta.version = BITMAP_VERSION + 1;

        let page = reparse(meta.encode(MIN_PAGE_SIZE)).unwrap();
        let err = Metapage::decode(&page).unwrap_err();
        assert!(matches!(err, BitmapError::Corruption { page_id: 0, .. }));
    }

    #[test]
    fn missing_magic_is_corruption() {
        let mut meta = sample();
        meta.magic_number = 0;

        let page = reparse(meta.encode(MIN_PAGE_SIZE)).unwrap();
        assert!(matches!(
            Metapage::decode(&page).unwrap_err(),
            BitmapError::Corruption { .. }
        ));
    }

    #[test]
    fn data_page_is_not_a_metapage() {
        let mut page = Page::new(MIN_PAGE_SIZE, PageFlags::DATA, METAPAGE_ID);
        page.seal();
        assert!(Metapage::decode(&page).is_err());
    }
}
