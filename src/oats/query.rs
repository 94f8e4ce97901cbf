//! Metadata-only scans and lookups over a store.
//!
//! The scanner decodes feature fields only; payload bytes stay on disk until
//! a caller asks for them. This keeps full-store passes memory-light even
//! when the log is blob-heavy.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use crate::constants::{FRAME_LEN_SIZE, STACK_START};
use crate::error::{OatsError, Result};
use crate::io::frame;
use crate::oats::lifecycle::Oats;
use crate::types::attr;
use crate::types::item::{Item, ItemMetadata};

/// Pull-style iterator over item metadata, stack start to the stack pointer
/// observed at construction. Owns only the current frame's bytes.
pub struct MetadataScanner<'a> {
    file: &'a mut File,
    read_ptr: u64,
    end: u64,
}

impl<'a> MetadataScanner<'a> {
    pub(crate) fn new(file: &'a mut File, end: u64) -> Self {
        Self {
            file,
            read_ptr: STACK_START,
            end,
        }
    }
}

impl Iterator for MetadataScanner<'_> {
    type Item = Result<ItemMetadata>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.read_ptr >= self.end {
            return None;
        }
        let start_offset = self.read_ptr + FRAME_LEN_SIZE;
        let result = frame::scan_next(self.file, self.read_ptr, self.end).and_then(
            |(bytes, next)| {
                self.read_ptr = next;
                ItemMetadata::decode(&bytes, start_offset)
            },
        );
        if result.is_err() {
            // Stop after the first corrupt frame; there is no resynchronizing
            // a framed stream past a bad length.
            self.read_ptr = self.end;
        }
        Some(result)
    }
}

/// Binary search over a slice sorted ascending by id. `Ok` carries the index
/// of the match, `Err` the insertion index.
pub fn binary_search_by_id(sorted: &[ItemMetadata], target_id: u64) -> std::result::Result<usize, usize> {
    sorted.binary_search_by(|meta| meta.id.cmp(&target_id))
}

impl Oats {
    /// Iterate metadata from the stack start to the current stack pointer.
    pub fn scanner(&mut self) -> MetadataScanner<'_> {
        MetadataScanner::new(&mut self.file, self.stack_ptr)
    }

    /// Collect every item's metadata in log order.
    pub fn scan_metadata(&mut self) -> Result<Vec<ItemMetadata>> {
        self.scanner().collect()
    }

    /// Read one item's payload from disk.
    pub fn read_payload(&mut self, meta: &ItemMetadata) -> Result<Vec<u8>> {
        self.file
            .seek(SeekFrom::Start(meta.start_offset + meta.contents_offset))?;
        #[allow(clippy::cast_possible_truncation)]
        let mut payload = vec![0u8; meta.payload_len() as usize];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Read one item's full record bytes (features and payload), as framed
    /// copies need them.
    pub(crate) fn read_item_bytes(&mut self, meta: &ItemMetadata) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(meta.start_offset))?;
        #[allow(clippy::cast_possible_truncation)]
        let mut bytes = vec![0u8; meta.size as usize];
        self.file.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// The last `n` items in log order, without moving the stack pointer.
    /// Returns fewer than `n` when the stack runs out; [`OatsError::EmptyStack`]
    /// only when there are no items at all.
    pub fn tail(&mut self, n: usize) -> Result<Vec<Item>> {
        if self.is_empty() {
            return Err(OatsError::EmptyStack);
        }
        let mut items = Vec::new();
        let mut ptr = self.stack_ptr;
        while items.len() < n && ptr > STACK_START {
            let (bytes, rewound) = self.peek_item(ptr)?;
            items.push(Item::decode(&bytes)?);
            ptr = rewound;
        }
        items.reverse();
        Ok(items)
    }

    /// The first `n` items in log order.
    pub fn head(&mut self, n: usize) -> Result<Vec<Item>> {
        let metas: Vec<ItemMetadata> = self.scanner().take(n).collect::<Result<_>>()?;
        metas
            .into_iter()
            .map(|meta| {
                let payload = self.read_payload(&meta)?;
                Ok(Item {
                    id: meta.id,
                    features: meta.features,
                    payload,
                })
            })
            .collect()
    }

    /// Count items whose bitfield satisfies every named attribute
    /// (conjunctive); `negate` counts the complement. No names counts
    /// everything.
    pub fn count<S: AsRef<str>>(&mut self, attrs: &[S], negate: bool) -> Result<u64> {
        let mask = attr::attrs_mask(attrs, false)?;
        let mut total = 0u64;
        for meta in self.scanner() {
            let meta = meta?;
            if attr::matches(meta.features.bits(), mask) != negate {
                total += 1;
            }
        }
        Ok(total)
    }

    /// Metadata of every item carrying the given session id, in log order.
    pub fn session_items(&mut self, session_id: i64) -> Result<Vec<ItemMetadata>> {
        let mut items = Vec::new();
        for meta in self.scanner() {
            let meta = meta?;
            if meta.features.session_id == Some(session_id) {
                items.push(meta);
            }
        }
        Ok(items)
    }

    /// Linear scan for the first item with `id`.
    pub fn find_by_id(&mut self, id: u64) -> Result<ItemMetadata> {
        for meta in self.scanner() {
            let meta = meta?;
            if meta.id == id {
                return Ok(meta);
            }
        }
        Err(OatsError::ItemNotFound { id })
    }
}
