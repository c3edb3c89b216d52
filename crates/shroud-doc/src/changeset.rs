//! Change-set packing: `[u32 count]` then `[u32 len, bytes]` per record,
//! all big-endian.

use shroud_types::codec::{put_frame, put_u32, ByteReader};

use crate::change::ChangeRecord;
use crate::error::DocResult;

pub fn pack_changes(records: &[ChangeRecord]) -> DocResult<Vec<u8>> {
    let total: usize = records.iter().map(|r| 4 + r.len()).sum();
    let mut buf = Vec::with_capacity(4 + total);
    put_u32(&mut buf, records.len() as u32);
    for record in records {
        put_frame(&mut buf, record)?;
    }
    Ok(buf)
}

pub fn unpack_changes(data: &[u8]) -> DocResult<Vec<ChangeRecord>> {
    let mut r = ByteReader::new(data);
    let count = r.u32()? as usize;
    // Each record needs at least its 4-byte prefix.
    let mut records = Vec::with_capacity(count.min(r.remaining() / 4));
    for _ in 0..count {
        records.push(r.frame()?.to_vec());
    }
    r.finish()?;
    Ok(records)
}
