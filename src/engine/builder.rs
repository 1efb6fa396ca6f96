use log::{debug, info, warn};

use crate::engine::accumulator::Accumulator;
use crate::engine::scan::TableScan;
use crate::engine::serializer;
use crate::error::{BitmapError, BuildError, BuildState, Result};
use crate::general::options::BitmapOptions;
use crate::storage::page_store::PageStore;

/// Outcome of a successful build.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Rows pulled from the scan, including null and dead ones.
    pub rows_scanned: u64,
    /// Live, non-null rows added to a posting set.
    pub rows_indexed: u64,
    /// Distinct values indexed.
    pub values_indexed: u32,
    pub pages_written: u32,
}

#[derive(Debug, Default)]
struct Progress {
    rows_scanned: u64,
    distinct_values: u32,
}

/// Drives one build of a bitmap index into an empty page store.
///
/// ```text
/// EMPTY -> SCANNING -> FLUSHING -> DONE
///   \________\___________\______> FAILED
/// ```
pub struct BitmapIndexBuilder<'s, S: PageStore + ?Sized> {
    store: &'s mut S,
    options: BitmapOptions,
    state: BuildState,
}

impl<'s, S: PageStore + ?Sized> BitmapIndexBuilder<'s, S> {
    pub fn new(store: &'s mut S, options: BitmapOptions) -> Self {
        Self {
            store,
            options,
            state: BuildState::Empty,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn options(&self) -> &BitmapOptions {
        &self.options
    }

    /// Scans every row of `scan` and writes the index.
    ///
    /// On failure the store is truncated back to zero pages. A failed builder
    /// may be run again; that starts over from `EMPTY`.
    pub fn build<T: TableScan + ?Sized>(
        &mut self,
        scan: &mut T,
    ) -> std::result::Result<BuildResult, BuildError> {
        self.state = BuildState::Empty;
        let mut progress = Progress::default();

        match self.run(scan, &mut progress) {
            Ok(result) => {
                self.state = BuildState::Done;
                info!(
                    "bitmap index built: {} distinct values, {} rows",
                    result.values_indexed, result.rows_indexed
                );
                Ok(result)
            }
            Err(source) => {
                let stage = self.state;
                self.state = BuildState::Failed;
                if stage == BuildState::Flushing {
                    self.rollback();
                }
                Err(BuildError {
                    stage,
                    rows_scanned: progress.rows_scanned,
                    distinct_values: progress.distinct_values,
                    source,
                })
            }
        }
    }

    fn run<T: TableScan + ?Sized>(
        &mut self,
        scan: &mut T,
        progress: &mut Progress,
    ) -> Result<BuildResult> {
        self.options.validate()?;

        let page_count = self.store.page_count()?;
        if page_count != 0 {
            return Err(BitmapError::AlreadyPopulated { page_count });
        }

        self.state = BuildState::Scanning;
        let rows_hint = scan.estimated_rows().unwrap_or(0);
        let mut accumulator = Accumulator::new(&self.options, rows_hint);

        while let Some(row) = scan.next_row()? {
            progress.rows_scanned += 1;
            if !row.is_live || row.is_null() {
                continue;
            }
            if let Some(value) = row.value {
                accumulator.insert(value, row.row_id)?;
                progress.distinct_values = accumulator.distinct_values();
            }
        }

        let rows_indexed = accumulator.rows_seen();
        debug!(
            "scan finished: {} rows, {} indexed, {} distinct values, ~{} bytes of postings",
            progress.rows_scanned,
            rows_indexed,
            progress.distinct_values,
            accumulator.memory_usage()
        );

        self.state = BuildState::Flushing;
        let summary = serializer::flush(accumulator, &self.options, &mut *self.store)?;

        Ok(BuildResult {
            rows_scanned: progress.rows_scanned,
            rows_indexed,
            values_indexed: summary.counts.n_distinct_values,
            pages_written: summary.pages_written(),
        })
    }

    fn rollback(&mut self) {
        match self.store.truncate(0) {
            Ok(()) => debug!("rolled back partial index"),
            Err(e) => warn!("failed to roll back partial index, it stays marked incomplete: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::scan::{ScanRow, VecScan};
    use crate::metadata::row_id::RowId;
    use crate::storage::page_store::MemoryPageStore;

    #[test]
    fn walks_the_state_machine() {
        let mut store = MemoryPageStore::new(512).unwrap();
        let mut builder = BitmapIndexBuilder::new(&mut store, BitmapOptions::default());
        assert_eq!(builder.state(), BuildState::Empty);

        let mut scan = VecScan::new(vec![ScanRow::live(RowId::new(0), 1i32)]);
        let result = builder.build(&mut scan).unwrap();
        assert_eq!(builder.state(), BuildState::Done);
        assert_eq!(result.pages_written, 2);
    }

    #[test]
    fn invalid_options_fail_before_scanning() {
        let mut store = MemoryPageStore::new(512).unwrap();
        let options = BitmapOptions::default().with_max_distinct_values(0);
        let mut builder = BitmapIndexBuilder::new(&mut store, options);

        let err = builder.build(&mut VecScan::default()).unwrap_err();
        assert_eq!(err.stage, BuildState::Empty);
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(matches!(err.kind(), BitmapError::InvalidOptions { .. }));
    }

    #[test]
    fn capacity_error_reports_scan_progress() {
        let mut store = MemoryPageStore::new(512).unwrap();
        let options = BitmapOptions::default().with_max_distinct_values(2);
        let mut builder = BitmapIndexBuilder::new(&mut store, options);

        let mut scan: VecScan = (0..5u64)
            .map(|i| ScanRow::live(RowId::new(i), i as i64))
            .collect();
        let err = builder.build(&mut scan).unwrap_err();
        assert_eq!(err.stage, BuildState::Scanning);
        assert_eq!(err.rows_scanned, 3);
        assert_eq!(err.distinct_values, 2);
        assert!(matches!(err.into_kind(), BitmapError::CapacityExceeded { .. }));
        assert_eq!(store.page_count().unwrap(), 0);
    }
}
