//! Frame codec: length-padded entries on a seekable byte stream.
//!
//! Every entry is `len (u32 BE) || item bytes || len (u32 BE)`. The trailing
//! copy of the length makes the file traversable backwards in O(1) per step,
//! which is what pop and tail ride on; the leading copy serves forward scans.
//! The codec knows nothing about item contents.

use std::io::{Read, Seek, SeekFrom, Write};

use crate::constants::{FRAME_LEN_SIZE, FRAME_OVERHEAD, STACK_START};
use crate::error::{OatsError, Result};

/// Append one frame at `stack_ptr`. Returns the advanced stack pointer.
///
/// The whole frame is assembled into one contiguous buffer and written with a
/// single `write_all`, so a crash mid-call leaves at most a partial frame
/// beyond the still-unmoved stack pointer.
pub fn push_frame<S: Write + Seek>(stream: &mut S, stack_ptr: u64, bytes: &[u8]) -> Result<u64> {
    let len = u32::try_from(bytes.len()).map_err(|_| OatsError::PayloadTooLarge {
        len: bytes.len() as u64,
    })?;

    let mut framed = Vec::with_capacity(bytes.len() + FRAME_OVERHEAD as usize);
    framed.extend_from_slice(&len.to_be_bytes());
    framed.extend_from_slice(bytes);
    framed.extend_from_slice(&len.to_be_bytes());

    stream.seek(SeekFrom::Start(stack_ptr))?;
    stream.write_all(&framed)?;

    tracing::debug!(
        frame.stack_ptr = stack_ptr,
        frame.len = len,
        "frame pushed"
    );
    Ok(stack_ptr + u64::from(len) + FRAME_OVERHEAD)
}

/// Read the frame ending at `stack_ptr` without moving any persisted state.
/// Returns the item bytes and the stack pointer rewound past the frame.
pub fn pop_frame<S: Read + Seek>(stream: &mut S, stack_ptr: u64) -> Result<(Vec<u8>, u64)> {
    if stack_ptr <= STACK_START {
        return Err(OatsError::EmptyStack);
    }

    stream.seek(SeekFrom::Start(stack_ptr - FRAME_LEN_SIZE))?;
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u64::from(u32::from_be_bytes(len_buf));

    let item_start = stack_ptr
        .checked_sub(FRAME_LEN_SIZE + len)
        .filter(|start| *start >= STACK_START + FRAME_LEN_SIZE)
        .ok_or_else(|| OatsError::Corruption {
            offset: stack_ptr - FRAME_LEN_SIZE,
            reason: format!("trailing length {len} reaches before the stack start"),
        })?;

    // Safe: len comes from a u32, which fits usize on supported platforms.
    #[allow(clippy::cast_possible_truncation)]
    let mut bytes = vec![0u8; len as usize];
    stream.seek(SeekFrom::Start(item_start))?;
    stream.read_exact(&mut bytes)?;

    Ok((bytes, item_start - FRAME_LEN_SIZE))
}

/// Read the frame beginning at `read_ptr` and advance past it. The caller is
/// responsible for stopping at the stack pointer; `end` is the bound the
/// declared length is checked against.
pub fn scan_next<S: Read + Seek>(stream: &mut S, read_ptr: u64, end: u64) -> Result<(Vec<u8>, u64)> {
    stream.seek(SeekFrom::Start(read_ptr))?;
    let mut len_buf = [0u8; 4];
    stream.read_exact(&mut len_buf)?;
    let len = u64::from(u32::from_be_bytes(len_buf));

    if read_ptr + FRAME_OVERHEAD + len > end {
        return Err(OatsError::Corruption {
            offset: read_ptr,
            reason: format!("frame length {len} reads past the stack pointer"),
        });
    }

    #[allow(clippy::cast_possible_truncation)]
    let mut bytes = vec![0u8; len as usize];
    stream.read_exact(&mut bytes)?;

    let mut trailing = [0u8; 4];
    stream.read_exact(&mut trailing)?;
    if trailing != len_buf {
        return Err(OatsError::Corruption {
            offset: read_ptr,
            reason: format!(
                "frame lengths disagree: leading {len}, trailing {}",
                u32::from_be_bytes(trailing)
            ),
        });
    }

    Ok((bytes, read_ptr + len + FRAME_OVERHEAD))
}
