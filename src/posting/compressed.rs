use roaring::RoaringTreemap;

use crate::metadata::row_id::RowId;
use crate::posting::PostingSet;

/// Roaring bitmap over 64-bit row positions. Needs no row estimate and stays
/// small for sparse or clustered postings.
#[derive(Debug, Clone, Default)]
pub struct CompressedBitmap {
    rows: RoaringTreemap,
    cardinality: u64,
}

impl CompressedBitmap {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn contains(&self, row: RowId) -> bool {
        self.rows.contains(row.position())
    }
}

impl PostingSet for CompressedBitmap {
    fn add(&mut self, row: RowId) {
        if self.rows.insert(row.position()) {
            self.cardinality += 1;
        }
    }

    fn cardinality(&self) -> u64 {
        self.cardinality
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RowId> + '_> {
        Box::new(self.rows.iter().map(RowId::new))
    }

    fn heap_size(&self) -> usize {
        self.rows.serialized_size()
    }
}
