use std::collections::VecDeque;

use crate::error::Result;
use crate::metadata::index_key::IndexKey;
use crate::metadata::row_id::RowId;

/// One row delivered by a table scan. `value` is `None` for SQL NULL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRow {
    pub row_id: RowId,
    pub value: Option<IndexKey>,
    pub is_live: bool,
}

impl ScanRow {
    pub fn live(row_id: RowId, value: impl Into<IndexKey>) -> Self {
        Self {
            row_id,
            value: Some(value.into()),
            is_live: true,
        }
    }

    pub fn null(row_id: RowId) -> Self {
        Self {
            row_id,
            value: None,
            is_live: true,
        }
    }

    pub fn dead(row_id: RowId, value: Option<IndexKey>) -> Self {
        Self {
            row_id,
            value,
            is_live: false,
        }
    }

    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Pull-based source of rows for a build.
///
/// The builder calls `next_row` until it returns `Ok(None)`. Null and dead rows
/// may be delivered; the builder skips them.
pub trait TableScan {
    fn next_row(&mut self) -> Result<Option<ScanRow>>;

    /// Upper bound on row positions, used to size dense bitmaps.
    fn estimated_rows(&self) -> Option<u64> {
        None
    }
}

/// Scan over rows held in memory.
#[derive(Debug, Clone, Default)]
pub struct VecScan {
    rows: VecDeque<ScanRow>,
    estimate: u64,
}

impl VecScan {
    pub fn new(rows: Vec<ScanRow>) -> Self {
        let estimate = rows
            .iter()
            .map(|r| r.row_id.position() + 1)
            .max()
            .unwrap_or(0);
        Self {
            rows: rows.into(),
            estimate,
        }
    }
}

impl TableScan for VecScan {
    fn next_row(&mut self) -> Result<Option<ScanRow>> {
        Ok(self.rows.pop_front())
    }

    fn estimated_rows(&self) -> Option<u64> {
        Some(self.estimate)
    }
}

impl FromIterator<ScanRow> for VecScan {
    fn from_iter<I: IntoIterator<Item = ScanRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
