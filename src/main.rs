use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use flux_bitmap::storage::page::DEFAULT_PAGE_SIZE;
use flux_bitmap::{
    BitmapIndexBuilder, BitmapOptions, IndexKey, IndexReader, Pager, RowId, ScanRow, VecScan,
};
use log::error;

const STATUSES: [&str; 4] = ["pending", "shipped", "delivered", "returned"];

/// Synthetic orders table: a status column with a few nulls and deleted rows.
fn orders(blocks: u32) -> VecScan {
    let mut seed = 0x2545_F491u64;
    let mut rows = Vec::new();

    for block in 0..blocks {
        for offset in (0..291u16).step_by(3) {
            let Some(row_id) = RowId::from_parts(block, offset) else {
                continue;
            };
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let pick = (seed >> 33) % 20;

            let row = match pick {
                0 => ScanRow::null(row_id),
                1 => ScanRow::dead(row_id, Some(IndexKey::from("pending"))),
                _ => ScanRow::live(row_id, STATUSES[(pick % 4) as usize]),
            };
            rows.push(row);
        }
    }
    VecScan::new(rows)
}

fn run(path: PathBuf) -> Result<(), Box<dyn Error>> {
    // An existing index is kept; the builder refuses to build over it.
    let mut pager = Pager::open_or_create(&path, DEFAULT_PAGE_SIZE)?;
    let options = BitmapOptions::default();

    let mut scan = orders(64);
    let result = BitmapIndexBuilder::new(&mut pager, options).build(&mut scan)?;

    println!("index: {}", pager.path().display());
    println!("  rows scanned:   {}", result.rows_scanned);
    println!("  rows indexed:   {}", result.rows_indexed);
    println!("  values indexed: {}", result.values_indexed);
    println!("  pages written:  {}", result.pages_written);

    drop(pager);
    let pager = Pager::open(&path)?;
    let reader = IndexReader::open(&pager)?;
    for (key, rows) in reader.postings()? {
        let first = rows.first().map(ToString::to_string).unwrap_or_default();
        let label = key.to_string();
        println!("  {label:<12} {:>6} rows, first at {first}", rows.len());
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("orders_status.fbmp"));

    match run(path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
