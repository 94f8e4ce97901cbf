#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![allow(clippy::module_name_repetitions)]
//
// Strategic lint exceptions, allowed project-wide:
//
// Documentation lints: internal helpers are largely self-documenting; public
// APIs still carry proper docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Cast safety: casts here are bounded by format constraints (frame lengths
// are u32, filename prefixes u16, ids are millisecond clocks); try_into
// everywhere would add noise without catching anything real.
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]
//
// Decoders build feature sets field by field as bits are consumed; the
// default-then-assign shape mirrors the wire order.
#![allow(clippy::field_reassign_with_default)]
//
// Result-for-consistency: some functions return Result so future error
// conditions can be added without breaking the API.
#![allow(clippy::unnecessary_wraps)]

//! Append-only personal notes log.
//!
//! A store is a single seekable file: a 13-byte header (magic, major
//! version, big-endian stack pointer) followed by length-padded frames, each
//! wrapping one item record. Items carry an id, an extensible feature
//! bitfield, and a payload. The crate provides the push/pop/scan primitives,
//! the composite maintenance operations (sort, import with dedup, trim,
//! filter), and the renderers (one-line listing, Markdown export with media
//! extraction).
//!
//! The stack pointer is the last write of every append, so a reader sees
//! either the pre-append or the post-append state; bytes beyond the pointer
//! are ignored and reclaimed by the next push.

/// The oats-core crate version (matches `Cargo.toml`).
pub const OATS_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod constants;
pub mod error;
pub mod home;
pub mod io;
pub mod oats;
pub mod render;
pub mod types;

pub use error::{OatsError, Result};
pub use home::StorePaths;
pub use oats::maintenance::RewriteStats;
pub use oats::{binary_search_by_id, MetadataScanner, Oats, VerifyReport};
pub use render::markdown::{write_markdown, MarkdownOptions};
pub use render::normal::{format_line, write_listing, PAD_WIDTH};
pub use render::write_raw;
pub use types::{
    attr_mask, attrs_mask, Features, Item, ItemKind, ItemMetadata, VideoKind, EVERYTHING,
};
