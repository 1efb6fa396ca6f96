use crate::error::{BitmapError, Result};

/// In-memory representation used for posting bitmaps during a build.
/// The on-disk format does not depend on it.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PostingFormat {
    /// Fixed-width bit array sized from the scan's row estimate, grown on demand.
    Dense = 1,
    /// Roaring bitmap, needs no row estimate.
    #[default]
    Compressed = 2,
}

impl PostingFormat {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(PostingFormat::Dense),
            2 => Some(PostingFormat::Compressed),
            _ => None,
        }
    }
}

/// Options frozen into the metapage when the index is built.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BitmapOptions {
    /// The build fails once more distinct values than this are seen.
    pub max_distinct_values: u32,
    pub posting_format: PostingFormat,
}

impl Default for BitmapOptions {
    fn default() -> Self {
        Self {
            max_distinct_values: 10,
            posting_format: PostingFormat::default(),
        }
    }
}

impl BitmapOptions {
    pub fn with_max_distinct_values(mut self, max_distinct_values: u32) -> Self {
        self.max_distinct_values = max_distinct_values;
        self
    }

    pub fn with_posting_format(mut self, posting_format: PostingFormat) -> Self {
        self.posting_format = posting_format;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_distinct_values == 0 {
            return Err(BitmapError::invalid_option(
                "max_distinct_values",
                "must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let opts = BitmapOptions::default();
        assert_eq!(opts.max_distinct_values, 10);
        assert_eq!(opts.posting_format, PostingFormat::Compressed);
        opts.validate().unwrap();
    }

    #[test]
    fn zero_distinct_values_is_rejected() {
        let err = BitmapOptions::default()
            .with_max_distinct_values(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            BitmapError::InvalidOptions {
                name: "max_distinct_values",
                ..
            }
        ));
    }

    #[test]
    fn posting_format_tags() {
        assert_eq!(PostingFormat::from_u8(1), Some(PostingFormat::Dense));
        assert_eq!(PostingFormat::from_u8(PostingFormat::Compressed as u8), Some(PostingFormat::Compressed));
        assert_eq!(PostingFormat::from_u8(9), None);
    }
}
