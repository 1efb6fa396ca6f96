use std::fmt;

/// Row slots per heap block assumed by the linear row numbering
/// (the tuple limit of an 8 KiB heap page).
pub const MAX_ROWS_PER_BLOCK: u16 = 291;

/// A row's physical location encoded as one linear position,
/// `block * MAX_ROWS_PER_BLOCK + offset`.
///
/// Ordering by position is ordering by block, then offset within the block.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(u64);

impl RowId {
    pub const fn new(position: u64) -> Self {
        Self(position)
    }

    /// Returns `None` when `offset` is not a valid slot of a block.
    pub fn from_parts(block: u32, offset: u16) -> Option<Self> {
        if offset >= MAX_ROWS_PER_BLOCK {
            return None;
        }
        Some(Self(block as u64 * MAX_ROWS_PER_BLOCK as u64 + offset as u64))
    }

    pub fn position(self) -> u64 {
        self.0
    }

    pub fn block(self) -> u64 {
        self.0 / MAX_ROWS_PER_BLOCK as u64
    }

    pub fn offset(self) -> u16 {
        (self.0 % MAX_ROWS_PER_BLOCK as u64) as u16
    }
}

impl From<u64> for RowId {
    fn from(position: u64) -> Self {
        Self(position)
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.block(), self.offset())
    }
}
