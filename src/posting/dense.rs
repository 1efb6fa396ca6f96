use crate::metadata::row_id::RowId;
use crate::posting::PostingSet;

/// Plain bit array indexed by row position.
///
/// Sized up front from the expected row count; a position past the end grows
/// the array (at least doubling it) instead of being dropped.
#[derive(Debug, Clone, Default)]
pub struct DenseBitmap {
    words: Vec<u64>,
    cardinality: u64,
}

impl DenseBitmap {
    pub fn with_capacity(rows: u64) -> Self {
        Self {
            words: vec![0; rows.div_ceil(64) as usize],
            cardinality: 0,
        }
    }

    /// Number of row positions addressable without growing.
    #[cfg(test)]
    pub fn capacity(&self) -> u64 {
        self.words.len() as u64 * 64
    }

    #[cfg(test)]
    pub fn contains(&self, row: RowId) -> bool {
        let pos = row.position();
        self.words
            .get((pos / 64) as usize)
            .is_some_and(|w| w & (1 << (pos % 64)) != 0)
    }

    fn grow_to(&mut self, word: usize) {
        let len = (word + 1).max(self.words.len() * 2);
        self.words.resize(len, 0);
    }
}

impl PostingSet for DenseBitmap {
    fn add(&mut self, row: RowId) {
        let pos = row.position();
        let word = (pos / 64) as usize;
        if word >= self.words.len() {
            self.grow_to(word);
        }

        let mask = 1u64 << (pos % 64);
        if self.words[word] & mask == 0 {
            self.words[word] |= mask;
            self.cardinality += 1;
        }
    }

    fn cardinality(&self) -> u64 {
        self.cardinality
    }

    fn iter(&self) -> Box<dyn Iterator<Item = RowId> + '_> {
        Box::new(
            self.words
                .iter()
                .enumerate()
                .filter(|(_, w)| **w != 0)
                .flat_map(|(i, &w)| SetBits {
                    word: w,
                    base: i as u64 * 64,
                }),
        )
    }

    fn heap_size(&self) -> usize {
        self.words.capacity() * std::mem::size_of::<u64>()
    }
}

/// Positions of the set bits of one word, lowest first.
struct SetBits {
    word: u64,
    base: u64,
}

impl Iterator for SetBits {
    type Item = RowId;

    fn next(&mut self) -> Option<RowId> {
        if self.word == 0 {
            return None;
        }
        let bit = self.word.trailing_zeros() as u64;
        self.word &= self.word - 1;
        Some(RowId::new(self.base + bit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_past_the_estimate() {
        let mut bitmap = DenseBitmap::with_capacity(100);
        assert_eq!(bitmap.capacity(), 128);

        bitmap.add(RowId::new(10));
        bitmap.add(RowId::new(10_000));
        assert!(bitmap.capacity() > 10_000);
        assert!(bitmap.contains(RowId::new(10_000)));
        assert!(!bitmap.contains(RowId::new(9_999)));

        let rows: Vec<u64> = bitmap.iter().map(RowId::position).collect();
        assert_eq!(rows, vec![10, 10_000]);
    }

    #[test]
    fn duplicate_add_is_a_no_op() {
        let mut bitmap = DenseBitmap::with_capacity(0);
        bitmap.add(RowId::new(63));
        bitmap.add(RowId::new(63));
        bitmap.add(RowId::new(64));
        assert_eq!(bitmap.cardinality(), 2);
        assert_eq!(bitmap.iter().count(), 2);
    }

    #[test]
    fn high_bit_positions_iterate() {
        let mut bitmap = DenseBitmap::with_capacity(64);
        bitmap.add(RowId::new(63));
        bitmap.add(RowId::new(0));
        let rows: Vec<u64> = bitmap.iter().map(RowId::position).collect();
        assert_eq!(rows, vec![0, 63]);
    }
}
