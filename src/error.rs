//! Error types for the `oats-core` crate.
//!
//! Kinds follow the cause of failure, not the layer that noticed it: a frame
//! whose lengths disagree and an item whose declared feature bytes overrun
//! the record both surface as [`OatsError::Corruption`] with the offending
//! file offset attached.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, OatsError>;

#[derive(Debug, Error)]
pub enum OatsError {
    /// The store file does not exist. Callers usually surface this with a
    /// hint to run `wipe` first.
    #[error("no oats store at {path:?}; run wipe to create one")]
    NotFound { path: PathBuf },

    /// The first four bytes are not the `oats` magic.
    #[error("not an oats store: bad magic {found:02x?}")]
    MagicMismatch { found: [u8; 4] },

    /// The store was written by an incompatible major version. There is no
    /// auto-migration.
    #[error("incompatible store version {found} (this build reads version {expected})")]
    VersionMismatch { found: u8, expected: u8 },

    /// Pop or tail on a store with no items remaining.
    #[error("the stack is empty")]
    EmptyStack,

    /// A frame or item record that cannot be read as declared: a length that
    /// runs past the stack pointer, mismatched frame lengths, or feature
    /// bytes exceeding the record.
    #[error("corrupt store at offset {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    /// An attribute name passed to trim/filter/count that is not a
    /// recognized feature bit.
    #[error("unknown attribute {name:?}")]
    UnknownAttribute { name: String },

    /// A pushed video whose leading bytes match no recognized container.
    #[error("unrecognized video container")]
    UnknownVideoKind,

    /// An item record too large for the u32 frame length field.
    #[error("item record of {len} bytes exceeds the 4 GiB frame limit")]
    PayloadTooLarge { len: u64 },

    /// A filename too long for its u16 length prefix.
    #[error("filename of {len} bytes exceeds the 64 KiB field limit")]
    FilenameTooLong { len: usize },

    /// No item with the requested id exists in the store.
    #[error("no item with id {id}")]
    ItemNotFound { id: u64 },

    /// A debug edit addressed a feature field the item does not carry.
    #[error("item {id} has no {name} field")]
    FeatureAbsent { id: u64, name: &'static str },

    /// Any underlying read/write/seek/rename failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
