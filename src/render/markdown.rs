//! Markdown export: session grouping, calendar headers, and media extraction.
//!
//! Items are grouped by session id; runs of session-less items form synthetic
//! groups keyed by the first such item's id. Groups render in ascending key
//! order, items inside a group in log order. Adjacent items of the same kind
//! (voids, images, videos) coalesce into one block; coalescing never crosses
//! a group boundary.

use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::error::Result;
use crate::oats::lifecycle::Oats;
use crate::render::datetime_utc;
use crate::types::item::{ItemKind, ItemMetadata};

const CLOCK_12H: &[BorrowedFormatItem<'_>] =
    format_description!("[hour repr:12]:[minute] [period]");

/// Minutes of silence after which a fresh time header is emitted.
const HEADER_GAP_MINUTES: i64 = 8;

#[derive(Debug, Clone, Default)]
pub struct MarkdownOptions {
    /// Minutes added to every timestamp before calendar rendering.
    pub tz_offset_minutes: i64,
    /// Where media payloads are extracted. Without it, media bodies are
    /// silently skipped.
    pub media_root: Option<PathBuf>,
}

/// Render the whole store as Markdown into `writer`. Buffered output is
/// flushed before any error propagates.
pub fn write_markdown<W: Write>(
    store: &mut Oats,
    opts: &MarkdownOptions,
    writer: &mut W,
) -> Result<()> {
    let mut out = BufWriter::new(writer);
    let result = render(store, opts, &mut out);
    out.flush()?;
    result
}

fn render<W: Write>(store: &mut Oats, opts: &MarkdownOptions, out: &mut W) -> Result<()> {
    let metas = store.scan_metadata()?;

    // Group by session id; session-less runs share a synthetic group keyed
    // by the first item's id.
    let mut groups: BTreeMap<i64, Vec<ItemMetadata>> = BTreeMap::new();
    let mut open_synthetic: Option<i64> = None;
    for meta in metas {
        let key = match meta.features.session_id {
            Some(sess) => {
                open_synthetic = None;
                sess
            }
            None => *open_synthetic.get_or_insert(meta.id as i64),
        };
        groups.entry(key).or_default().push(meta);
    }

    let mut state = RenderState {
        prev: None,
        wrote_anything: false,
    };
    for items in groups.values() {
        render_group(store, opts, out, items, &mut state)?;
    }
    Ok(())
}

struct RenderState {
    /// Shifted datetime of the previously rendered item; `None` when that
    /// item carried no timestamp.
    prev: Option<OffsetDateTime>,
    wrote_anything: bool,
}

fn render_group<W: Write>(
    store: &mut Oats,
    opts: &MarkdownOptions,
    out: &mut W,
    items: &[ItemMetadata],
    state: &mut RenderState,
) -> Result<()> {
    let mut i = 0;
    while i < items.len() {
        let run_kind = body_kind(&items[i]);
        let run_len = items[i..]
            .iter()
            .take_while(|meta| body_kind(meta) == run_kind)
            .count();
        let run = &items[i..i + run_len];

        // Coalesced runs get one header, judged from the run's first item.
        emit_header(opts, out, &run[0], i == 0, state)?;

        match run_kind {
            BodyKind::Void => {
                let noun = if run_len == 1 { "Item" } else { "Items" };
                writeln!(out, "*{run_len} Trimmed {noun}*")?;
                state.wrote_anything = true;
                advance_prev(opts, state, run);
                i += run_len;
            }
            BodyKind::Image | BodyKind::Video => {
                emit_media_run(store, opts, out, run, run_kind, state)?;
                advance_prev(opts, state, run);
                i += run_len;
            }
            BodyKind::File | BodyKind::Text => {
                // Files and text never coalesce; consume one item.
                let meta = &run[0];
                match run_kind {
                    BodyKind::Text => {
                        let payload = store.read_payload(meta)?;
                        writeln!(out, "- {}", String::from_utf8_lossy(&payload))?;
                        state.wrote_anything = true;
                    }
                    _ => emit_file(store, opts, out, meta, state)?,
                }
                advance_prev(opts, state, &run[..1]);
                i += 1;
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Void,
    Image,
    Video,
    File,
    Text,
}

fn body_kind(meta: &ItemMetadata) -> BodyKind {
    if meta.features.is_void {
        return BodyKind::Void;
    }
    match meta.features.kind() {
        ItemKind::Image => BodyKind::Image,
        ItemKind::Video => BodyKind::Video,
        ItemKind::File => BodyKind::File,
        ItemKind::Text => BodyKind::Text,
    }
}

fn advance_prev(opts: &MarkdownOptions, state: &mut RenderState, run: &[ItemMetadata]) {
    for meta in run {
        state.prev = meta
            .features
            .timestamp
            .and_then(|ts| shifted_datetime(ts, opts.tz_offset_minutes));
    }
}

/// Shift a timestamp into the caller's zone. Months from April on get one
/// hour less, an approximation kept for output compatibility; it is wrong
/// outside northern temperate zones.
fn shifted_datetime(ts_ms: i64, tz_offset_minutes: i64) -> Option<OffsetDateTime> {
    let shift = |minutes: i64| {
        ts_ms
            .checked_add(minutes.checked_mul(60_000)?)
            .and_then(datetime_utc)
    };
    let plain = shift(tz_offset_minutes)?;
    if u8::from(plain.month()) >= 4 {
        shift(tz_offset_minutes - 60)
    } else {
        Some(plain)
    }
}

fn emit_header<W: Write>(
    opts: &MarkdownOptions,
    out: &mut W,
    meta: &ItemMetadata,
    first_of_group: bool,
    state: &mut RenderState,
) -> Result<()> {
    let Some(ts) = meta.features.timestamp else {
        state.prev = None;
        return Ok(());
    };
    let Some(dt) = shifted_datetime(ts, opts.tz_offset_minutes) else {
        state.prev = None;
        return Ok(());
    };

    let clock = dt.format(CLOCK_12H).unwrap_or_default();
    let header = match state.prev {
        Some(prev) if prev.date() == dt.date() => {
            // Sub-minute precision: an 8m30s gap is "more than 8 minutes".
            if dt - prev > Duration::minutes(HEADER_GAP_MINUTES) || first_of_group {
                let level = if first_of_group { "##" } else { "###" };
                Some(format!("{level} `{clock}`"))
            } else {
                None
            }
        }
        _ => {
            let day = dt.day();
            Some(format!(
                "## {}, {}{} of {} {} `{clock}`",
                dt.weekday(),
                day,
                ordinal_suffix(day),
                dt.month(),
                dt.year(),
            ))
        }
    };

    if let Some(mut header) = header {
        if meta.features.is_mobile {
            header.push_str(" *(on mobile)*");
        }
        if state.wrote_anything {
            writeln!(out)?;
        }
        writeln!(out, "{header}")?;
        writeln!(out)?;
        state.wrote_anything = true;
    }
    Ok(())
}

fn ordinal_suffix(day: u8) -> &'static str {
    match day {
        11..=13 => "th",
        d if d % 10 == 1 => "st",
        d if d % 10 == 2 => "nd",
        d if d % 10 == 3 => "rd",
        _ => "th",
    }
}

/// Directory for one item's extracted media: session id, else timestamp,
/// else 0.
fn media_dir_name(meta: &ItemMetadata) -> String {
    meta.features
        .session_id
        .or(meta.features.timestamp)
        .unwrap_or(0)
        .to_string()
}

/// Write one payload under the media root, returning the path for linking.
/// `None` (and no write) when there is no media root or no usable filename.
fn extract_media(
    store: &mut Oats,
    opts: &MarkdownOptions,
    meta: &ItemMetadata,
    filename: &[u8],
) -> Result<Option<PathBuf>> {
    let Some(root) = &opts.media_root else {
        return Ok(None);
    };
    let dir = root.join(media_dir_name(meta));
    fs::create_dir_all(&dir)?;
    let name = String::from_utf8_lossy(filename).into_owned();
    if name.is_empty() {
        tracing::warn!(item.id = meta.id, "media item has an empty filename; skipped");
        return Ok(None);
    }
    let path = dir.join(name);
    let payload = store.read_payload(meta)?;
    fs::write(&path, payload)?;
    Ok(Some(path))
}

fn emit_file<W: Write>(
    store: &mut Oats,
    opts: &MarkdownOptions,
    out: &mut W,
    meta: &ItemMetadata,
    state: &mut RenderState,
) -> Result<()> {
    let filename = meta.features.filename.clone().unwrap_or_default();
    if let Some(path) = extract_media(store, opts, meta, &filename)? {
        writeln!(
            out,
            "- [{}]({})",
            String::from_utf8_lossy(&filename),
            path.display()
        )?;
        state.wrote_anything = true;
    }
    Ok(())
}

fn emit_media_run<W: Write>(
    store: &mut Oats,
    opts: &MarkdownOptions,
    out: &mut W,
    run: &[ItemMetadata],
    kind: BodyKind,
    state: &mut RenderState,
) -> Result<()> {
    if opts.media_root.is_none() {
        return Ok(());
    }
    state.wrote_anything = true;

    let noun = match (kind, run.len()) {
        (BodyKind::Image, 1) => "Image",
        (BodyKind::Image, _) => "Images",
        (_, 1) => "Video",
        (_, _) => "Videos",
    };
    writeln!(out, "<details>")?;
    writeln!(out, "<summary>{} {noun}</summary>", run.len())?;

    for meta in run {
        let filename = match kind {
            BodyKind::Image => meta.features.image_filename.clone(),
            _ => meta.features.filename.clone(),
        }
        .unwrap_or_default();
        let Some(path) = extract_media(store, opts, meta, &filename)? else {
            continue;
        };
        match kind {
            BodyKind::Image => writeln!(out, "<img src=\"{}\" />", path.display())?,
            _ => {
                let container = meta
                    .features
                    .video_kind
                    .map_or("mp4", crate::types::item::VideoKind::as_str);
                writeln!(
                    out,
                    "<video controls type=\"video/{container}\" src=\"{}\"></video>",
                    path.display()
                )?;
            }
        }
    }

    writeln!(out, "</details>")?;
    Ok(())
}
