use crate::general::options::PostingFormat;
use crate::metadata::row_id::RowId;

pub mod codec;
pub mod compressed;
pub mod dense;

use compressed::CompressedBitmap;
use dense::DenseBitmap;

/// The set of rows carrying one distinct value.
pub trait PostingSet {
    /// Adds a row; adding a row already present is a no-op.
    fn add(&mut self, row: RowId);

    fn cardinality(&self) -> u64;

    /// Rows in ascending order. Every call starts over from the smallest row.
    fn iter(&self) -> Box<dyn Iterator<Item = RowId> + '_>;

    /// Approximate heap bytes held by the set.
    fn heap_size(&self) -> usize;
}

/// Posting bitmap in the representation picked by `PostingFormat`.
#[derive(Debug, Clone)]
pub enum PostingBitmap {
    Dense(DenseBitmap),
    Compressed(CompressedBitmap),
}

impl PostingBitmap {
    /// `rows_hint` sizes the dense variant; the compressed one ignores it.
    pub fn new(format: PostingFormat, rows_hint: u64) -> Self {
        match format {
            PostingFormat::Dense => PostingBitmap::Dense(DenseBitmap::with_capacity(rows_hint)),
            PostingFormat::Compressed => PostingBitmap::Compressed(CompressedBitmap::new()),
        }
    }

    fn inner(&self) -> &dyn PostingSet {
        match self {
            PostingBitmap::Dense(b) => b as &dyn PostingSet,
            PostingBitmap::Compressed(b) => b as &dyn PostingSet,
        }
    }
}

impl PostingSet for PostingBitmap {
    fn add(&mut self, row: RowId) {
        match self {
            PostingBitmap::Dense(b) => b.add(row),
            PostingBitmap::Compressed(b) => b.add(row),
        }
    }

    fn cardinality(&self) -> u64 {
        self.inner().cardinality()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RowId> + '_> {
        self.inner().iter()
    }

    fn heap_size(&self) -> usize {
        self.inner().heap_size()
    }
}
