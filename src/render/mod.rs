//! Human-readable views of a store: the one-line listing, the Markdown
//! export, and the raw payload dump.

pub mod markdown;
pub mod normal;

use std::io::Write;

use time::OffsetDateTime;

use crate::error::Result;
use crate::oats::lifecycle::Oats;

/// Millisecond timestamp to a UTC datetime; `None` outside the calendar
/// range the `time` crate can represent.
pub(crate) fn datetime_utc(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
}

/// Stream every item's payload bytes, undecorated, to `writer` in log order.
pub fn write_raw<W: Write>(store: &mut Oats, writer: &mut W) -> Result<()> {
    let metas = store.scan_metadata()?;
    let result = (|| {
        for meta in &metas {
            let payload = store.read_payload(meta)?;
            writer.write_all(&payload)?;
        }
        Ok(())
    })();
    writer.flush()?;
    result
}
