use crate::helpers::helper::{read_varint, write_varint};
use crate::metadata::row_id::RowId;
use crate::posting::PostingSet;

/// Encodes a posting set as LEB128 varints: the first row position, then the
/// gap to each following row. Both bitmap variants produce the same bytes.
pub fn encode_positions(postings: &dyn PostingSet) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut previous = None;
    for row in postings.iter() {
        let pos = row.position();
        let value = match previous {
            None => pos,
            Some(prev) => pos - prev,
        };
        write_varint(&mut buf, value);
        previous = Some(pos);
    }
    buf
}

/// Inverse of `encode_positions`. Rows must come out strictly ascending and
/// number exactly `expected`.
pub fn decode_positions(buf: &[u8], expected: u64) -> Result<Vec<RowId>, String> {
    let mut rows = Vec::with_capacity(expected.min(1 << 20) as usize);
    let mut pos = 0;
    let mut previous: Option<u64> = None;

    while pos < buf.len() {
        let value =
            read_varint(buf, &mut pos).ok_or_else(|| format!("bad varint at byte {pos}"))?;
        let row = match previous {
            None => value,
            Some(_) if value == 0 => return Err(format!("duplicate row after {}", rows.len())),
            Some(prev) => prev
                .checked_add(value)
                .ok_or_else(|| "row position overflows".to_string())?,
        };
        rows.push(RowId::new(row));
        previous = Some(row);
    }

    if rows.len() as u64 != expected {
        return Err(format!(
            "decoded {} rows, cardinality says {expected}",
            rows.len()
        ));
    }
    Ok(rows)
}
