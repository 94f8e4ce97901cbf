//! Lifecycle management for creating and opening `oats` stores.
//!
//! Responsibilities:
//! - Bootstrap the 13-byte header (magic, major version, stack pointer) on
//!   create, and validate it on open.
//! - Keep the cached stack pointer in step with the on-disk one; the pointer
//!   write is the last write of any append, so a reader sees either the
//!   pre-append or post-append state, never a torn one.
//! - Expose the push/pop primitives the upper layers wrap.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::constants::{HEADER_SIZE, MAGIC, MAJOR_VERSION, STACK_PTR_OFFSET, STACK_START};
use crate::error::{OatsError, Result};
use crate::io::frame;

/// Primary handle for one `oats` store file.
///
/// Holds the file descriptor, its path, and the cached stack pointer. Handles
/// are scoped to a single operation sequence; the core assumes an exclusive
/// external lock for anything that writes.
#[derive(Debug)]
pub struct Oats {
    pub(crate) file: File,
    pub(crate) path: PathBuf,
    pub(crate) stack_ptr: u64,
    pub(crate) read_only: bool,
}

impl Oats {
    /// Create (or wipe) a store: truncate, write magic, major version, and
    /// the initial stack pointer.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let mut header = [0u8; HEADER_SIZE as usize];
        header[..4].copy_from_slice(&MAGIC);
        header[4] = MAJOR_VERSION;
        header[5..].copy_from_slice(&STACK_START.to_be_bytes());
        file.write_all(&header)?;

        tracing::debug!(store.path = %path.display(), "store created");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            stack_ptr: STACK_START,
            read_only: false,
        })
    }

    /// Open an existing store read-write.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), false)
    }

    /// Open an existing store for reading only. Mutating calls fail without
    /// touching the file.
    pub fn open_read_only<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path.as_ref(), true)
    }

    fn open_with(path: &Path, read_only: bool) -> Result<Self> {
        let mut opts = OpenOptions::new();
        opts.read(true);
        if !read_only {
            opts.write(true);
        }
        let mut file = opts.open(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                OatsError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                err.into()
            }
        })?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(OatsError::MagicMismatch { found: magic });
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != MAJOR_VERSION {
            return Err(OatsError::VersionMismatch {
                found: version[0],
                expected: MAJOR_VERSION,
            });
        }

        let mut ptr_buf = [0u8; 8];
        file.read_exact(&mut ptr_buf)?;
        let stack_ptr = u64::from_be_bytes(ptr_buf);

        let file_len = file.metadata()?.len();
        if stack_ptr < STACK_START || stack_ptr > file_len {
            return Err(OatsError::Corruption {
                offset: STACK_PTR_OFFSET,
                reason: format!(
                    "stack pointer {stack_ptr} outside the valid range {STACK_START}..={file_len}"
                ),
            });
        }

        tracing::debug!(
            store.path = %path.display(),
            store.stack_ptr = stack_ptr,
            store.read_only = read_only,
            "store opened"
        );
        Ok(Self {
            file,
            path: path.to_path_buf(),
            stack_ptr,
            read_only,
        })
    }

    /// The authoritative end-of-log offset as cached at open or after the
    /// last mutation through this handle.
    #[must_use]
    pub fn stack_ptr(&self) -> u64 {
        self.stack_ptr
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the store holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack_ptr == STACK_START
    }

    pub(crate) fn assert_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(std::io::Error::new(
                ErrorKind::PermissionDenied,
                "store opened read-only",
            )
            .into());
        }
        Ok(())
    }

    /// Re-read the stack pointer from disk, refreshing the cached copy.
    pub fn read_stack_ptr(&mut self) -> Result<u64> {
        self.file.seek(SeekFrom::Start(STACK_PTR_OFFSET))?;
        let mut buf = [0u8; 8];
        self.file.read_exact(&mut buf)?;
        self.stack_ptr = u64::from_be_bytes(buf);
        Ok(self.stack_ptr)
    }

    /// Persist `ptr` at the fixed header offset and cache it. This is the
    /// only in-place header mutation the format allows.
    pub(crate) fn write_stack_ptr(&mut self, ptr: u64) -> Result<()> {
        self.assert_writable()?;
        self.file.seek(SeekFrom::Start(STACK_PTR_OFFSET))?;
        self.file.write_all(&ptr.to_be_bytes())?;
        self.stack_ptr = ptr;
        Ok(())
    }

    /// Append one encoded item record. The frame lands first, the stack
    /// pointer last.
    pub fn push_item(&mut self, item_bytes: &[u8]) -> Result<()> {
        self.assert_writable()?;
        let next = frame::push_frame(&mut self.file, self.stack_ptr, item_bytes)?;
        self.write_stack_ptr(next)
    }

    /// Remove and return the top item record, persisting the rewound stack
    /// pointer.
    pub fn pop_item(&mut self) -> Result<Vec<u8>> {
        self.assert_writable()?;
        let (bytes, rewound) = frame::pop_frame(&mut self.file, self.stack_ptr)?;
        self.write_stack_ptr(rewound)?;
        Ok(bytes)
    }

    /// Read the top item record without persisting anything. Used by tail.
    pub(crate) fn peek_item(&mut self, from_ptr: u64) -> Result<(Vec<u8>, u64)> {
        frame::pop_frame(&mut self.file, from_ptr)
    }

    /// Swap this handle for a freshly opened one at the same path. Used after
    /// maintenance renames a rewritten file over the original.
    pub(crate) fn reopen(&mut self) -> Result<()> {
        let path = self.path.clone();
        *self = Self::open(&path)?;
        Ok(())
    }
}
