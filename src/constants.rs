//! On-disk format constants for the `oats` stack file.
//!
//! The layout is a format contract: magic, major version, then the 8-byte
//! big-endian stack pointer, followed by length-padded frames. Offsets here
//! are absolute file positions.

/// Four-byte ASCII magic at offset 0.
pub const MAGIC: [u8; 4] = *b"oats";

/// Major format version. Bumped only on layout changes an old reader cannot
/// skip over; minor additions ride on new feature bits instead.
pub const MAJOR_VERSION: u8 = 2;

/// Offset of the major version byte.
pub const VERSION_OFFSET: u64 = 4;

/// Offset of the 8-byte big-endian stack pointer.
pub const STACK_PTR_OFFSET: u64 = 5;

/// Total header size; also the offset of the first frame.
pub const HEADER_SIZE: u64 = 13;

/// The stack body begins immediately after the header. An empty store has
/// its stack pointer equal to this offset.
pub const STACK_START: u64 = HEADER_SIZE;

/// Width of one frame length field (u32 big-endian). Every frame carries two,
/// one on each side of the item record.
pub const FRAME_LEN_SIZE: u64 = 4;

/// Per-frame overhead: leading plus trailing length field.
pub const FRAME_OVERHEAD: u64 = FRAME_LEN_SIZE * 2;
