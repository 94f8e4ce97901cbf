//! The normal one-line listing.
//!
//! Each line is a comma-separated attribute prefix padded to a fixed column,
//! then a separator and the body. The pad width is the worst-case prefix
//! length, computed at build time from type widths and label sizes, so the
//! separator column is constant across a run and a maximum id or timestamp
//! never shifts it.

use std::io::{BufWriter, Write};

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::error::Result;
use crate::oats::lifecycle::Oats;
use crate::render::datetime_utc;
use crate::types::item::{Features, ItemKind};

const ISO8601_MS: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

// Worst-case widths per prefix attribute: label plus the widest value the
// field type can render.
const ID_WIDTH: usize = "id: ".len() + 20;
const DATE_WIDTH: usize = ", date: ".len() + 24;
const SESS_WIDTH: usize = ", sess_id: ".len() + 20;
const KIND_WIDTH: usize = ", kind: ".len() + "image".len();
const VIDEO_KIND_WIDTH: usize = ", video_kind: ".len() + "webm".len();
const MOBILE_WIDTH: usize = ", on: mobile".len();

/// The constant separator column.
pub const PAD_WIDTH: usize =
    ID_WIDTH + DATE_WIDTH + SESS_WIDTH + KIND_WIDTH + VIDEO_KIND_WIDTH + MOBILE_WIDTH;

/// Millisecond timestamp as `1970-01-01T00:00:01.000Z`; raw milliseconds for
/// values past the representable calendar.
fn format_date(ms: i64) -> String {
    datetime_utc(ms)
        .and_then(|dt| dt.format(ISO8601_MS).ok())
        .unwrap_or_else(|| ms.to_string())
}

/// Render one item as its listing line. `payload` is consulted only for text
/// items; blobs render as placeholders.
#[must_use]
pub fn format_line(id: u64, features: &Features, payload: Option<&[u8]>) -> String {
    let mut prefix = format!("id: {id}");
    if let Some(ts) = features.timestamp {
        prefix.push_str(&format!(", date: {}", format_date(ts)));
    }
    if let Some(sess) = features.session_id {
        prefix.push_str(&format!(", sess_id: {sess}"));
    }
    match features.kind() {
        ItemKind::Image => prefix.push_str(", kind: image"),
        ItemKind::Video => prefix.push_str(", kind: video"),
        ItemKind::File => prefix.push_str(", kind: file"),
        ItemKind::Text => {}
    }
    if let Some(kind) = features.video_kind {
        prefix.push_str(&format!(", video_kind: {}", kind.as_str()));
    }
    if features.is_mobile {
        prefix.push_str(", on: mobile");
    }

    let body = format_body(features, payload);
    format!("{prefix:<width$}{body}", width = PAD_WIDTH)
}

fn format_body(features: &Features, payload: Option<&[u8]>) -> String {
    let name = |bytes: &Option<Vec<u8>>| {
        String::from_utf8_lossy(bytes.as_deref().unwrap_or_default()).into_owned()
    };

    if features.is_void {
        return if features.image_filename.is_some() {
            format!("... {}: <trimmed image data>", name(&features.image_filename))
        } else {
            " ? <trimmed oats item>".to_string()
        };
    }
    match features.kind() {
        ItemKind::Image => format!("# {}: <binary image data>", name(&features.image_filename)),
        ItemKind::Video => match &features.filename {
            Some(_) => format!("# {}: <binary video data>", name(&features.filename)),
            None => "# <binary video data>".to_string(),
        },
        ItemKind::File => format!("# {}: <binary data>", name(&features.filename)),
        ItemKind::Text => format!(
            "| {}",
            String::from_utf8_lossy(payload.unwrap_or_default())
        ),
    }
}

/// Stream the listing of the whole store, one line per item in log order.
/// Only text payloads are read from disk; blobs render as placeholders.
/// Buffered output is flushed before any error propagates.
pub fn write_listing<W: Write>(store: &mut Oats, writer: &mut W) -> Result<()> {
    let mut out = BufWriter::new(writer);
    let result = (|| {
        let metas = store.scan_metadata()?;
        for meta in &metas {
            let payload = if !meta.features.is_void && meta.features.kind() == ItemKind::Text {
                Some(store.read_payload(meta)?)
            } else {
                None
            };
            writeln!(out, "{}", format_line(meta.id, &meta.features, payload.as_deref()))?;
        }
        Ok(())
    })();
    out.flush()?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::item::VideoKind;

    #[test]
    fn text_line_matches_reference_shape() {
        let features = Features {
            timestamp: Some(1000),
            ..Features::default()
        };
        let line = format_line(1000, &features, Some(b"hello"));
        assert!(line.starts_with("id: 1000, date: 1970-01-01T00:00:01.000Z"));
        assert_eq!(&line[PAD_WIDTH..], "| hello");
    }

    #[test]
    fn separator_column_is_constant() {
        let text = Features {
            timestamp: Some(1000),
            ..Features::default()
        };
        let image = Features {
            timestamp: Some(2000),
            session_id: Some(-1),
            image_filename: Some(b"p.png".to_vec()),
            is_mobile: true,
            ..Features::default()
        };
        let a = format_line(1, &text, Some(b"x"));
        let b = format_line(2, &image, None);
        assert_eq!(&a[PAD_WIDTH..PAD_WIDTH + 1], "|");
        assert_eq!(&b[PAD_WIDTH..PAD_WIDTH + 1], "#");
    }

    #[test]
    fn maximum_values_fit_the_pad() {
        let features = Features {
            timestamp: Some(i64::MAX),
            session_id: Some(i64::MIN),
            image_filename: Some(b"p.png".to_vec()),
            is_mobile: true,
            video_kind: Some(VideoKind::Webm),
            ..Features::default()
        };
        let line = format_line(u64::MAX, &features, None);
        assert_eq!(&line[PAD_WIDTH..PAD_WIDTH + 1], "#");
    }

    #[test]
    fn void_bodies() {
        let void = Features {
            is_void: true,
            ..Features::default()
        };
        assert_eq!(&format_line(1, &void, None)[PAD_WIDTH..], " ? <trimmed oats item>");

        let void_image = Features {
            is_void: true,
            image_filename: Some(b"old.jpg".to_vec()),
            ..Features::default()
        };
        assert_eq!(
            &format_line(1, &void_image, None)[PAD_WIDTH..],
            "... old.jpg: <trimmed image data>"
        );
    }

    #[test]
    fn video_with_and_without_filename() {
        let with = Features {
            filename: Some(b"c.mp4".to_vec()),
            video_kind: Some(VideoKind::Mp4),
            ..Features::default()
        };
        assert_eq!(&format_line(1, &with, None)[PAD_WIDTH..], "# c.mp4: <binary video data>");

        let without = Features {
            video_kind: Some(VideoKind::Ogg),
            ..Features::default()
        };
        assert_eq!(&format_line(1, &without, None)[PAD_WIDTH..], "# <binary video data>");
    }

    #[test]
    fn empty_filename_renders_as_empty_string() {
        let features = Features {
            filename: Some(Vec::new()),
            ..Features::default()
        };
        assert_eq!(&format_line(1, &features, None)[PAD_WIDTH..], "# : <binary data>");
    }

    #[test]
    fn listing_streams_one_line_per_item() {
        use crate::types::item::Item;
        let dir = tempfile::TempDir::new().expect("dir");
        let mut store = Oats::create(dir.path().join("n.oats")).expect("create");
        store
            .push(&Item {
                id: 1,
                features: Features {
                    timestamp: Some(1000),
                    ..Features::default()
                },
                payload: b"first".to_vec(),
            })
            .expect("push");
        store
            .push(&Item {
                id: 2,
                features: Features {
                    image_filename: Some(b"p.png".to_vec()),
                    ..Features::default()
                },
                payload: vec![0xFF; 8],
            })
            .expect("push");

        let mut buf = Vec::new();
        write_listing(&mut store, &mut buf).expect("listing");
        let text = String::from_utf8(buf).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(&lines[0][PAD_WIDTH..], "| first");
        assert_eq!(&lines[1][PAD_WIDTH..], "# p.png: <binary image data>");
    }
}
