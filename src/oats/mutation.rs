//! Push, pop, import, and debug-edit routines for a store.
//!
//! Appends are crash-safe by ordering: the frame bytes land first and the
//! stack pointer is the last write, so a reader never observes a torn append.
//! Import batches its frames and persists the pointer once after the scan.

use std::path::Path;

use crate::error::{OatsError, Result};
use crate::io::frame;
use crate::oats::lifecycle::Oats;
use crate::types::item::{Features, Item, VideoKind};

impl Oats {
    /// Encode and append one item.
    pub fn push(&mut self, item: &Item) -> Result<()> {
        let bytes = item.encode()?;
        self.push_item(&bytes)
    }

    /// Append a text thought. The id doubles as the creation timestamp in
    /// milliseconds, which is what the timestamp feature records.
    pub fn push_text(
        &mut self,
        id: u64,
        session_id: Option<i64>,
        mobile: bool,
        text: &str,
    ) -> Result<()> {
        self.push(&Item {
            id,
            features: base_features(id, session_id, mobile),
            payload: text.as_bytes().to_vec(),
        })
    }

    /// Append an image blob under its filename.
    pub fn push_image(
        &mut self,
        id: u64,
        session_id: Option<i64>,
        mobile: bool,
        filename: &[u8],
        payload: Vec<u8>,
    ) -> Result<()> {
        let mut features = base_features(id, session_id, mobile);
        features.image_filename = Some(filename.to_vec());
        self.push(&Item {
            id,
            features,
            payload,
        })
    }

    /// Append an arbitrary file blob under its filename.
    pub fn push_file(
        &mut self,
        id: u64,
        session_id: Option<i64>,
        mobile: bool,
        filename: &[u8],
        payload: Vec<u8>,
    ) -> Result<()> {
        let mut features = base_features(id, session_id, mobile);
        features.filename = Some(filename.to_vec());
        self.push(&Item {
            id,
            features,
            payload,
        })
    }

    /// Append a video blob. When `kind` is `None` the container is sniffed
    /// from the payload's leading bytes; an unrecognized container fails with
    /// [`OatsError::UnknownVideoKind`] before anything is written.
    pub fn push_video(
        &mut self,
        id: u64,
        session_id: Option<i64>,
        mobile: bool,
        filename: Option<&[u8]>,
        payload: Vec<u8>,
        kind: Option<VideoKind>,
    ) -> Result<()> {
        let kind = match kind {
            Some(kind) => kind,
            None => VideoKind::sniff(&payload)?,
        };
        let mut features = base_features(id, session_id, mobile);
        features.filename = filename.map(<[u8]>::to_vec);
        features.video_kind = Some(kind);
        self.push(&Item {
            id,
            features,
            payload,
        })
    }

    /// Pop up to `n` items, persisting the rewound stack pointer once.
    /// Returns the popped items in log order. Fails with
    /// [`OatsError::EmptyStack`] only when the store has no items at all.
    pub fn pop(&mut self, n: usize) -> Result<Vec<Item>> {
        self.assert_writable()?;
        if self.is_empty() {
            return Err(OatsError::EmptyStack);
        }
        let mut items = Vec::new();
        let mut ptr = self.stack_ptr();
        while items.len() < n && ptr > crate::constants::STACK_START {
            let (bytes, rewound) = self.peek_item(ptr)?;
            items.push(Item::decode(&bytes)?);
            ptr = rewound;
        }
        self.write_stack_ptr(ptr)?;
        items.reverse();
        tracing::debug!(pop.count = items.len(), pop.stack_ptr = ptr, "items popped");
        Ok(items)
    }

    /// Merge another store into this one, skipping ids already present.
    ///
    /// Incoming frames are copied byte-for-byte, so append order here is the
    /// other store's order; run sort afterwards to restore a monotonic view.
    /// When an id collides, the current store's copy wins in both directions;
    /// a void stub colliding with an incoming live item is logged.
    /// Returns the number of items imported.
    pub fn import<P: AsRef<Path>>(&mut self, other_path: P) -> Result<u64> {
        self.assert_writable()?;

        let mut current: Vec<(u64, bool)> = self
            .scanner()
            .map(|meta| meta.map(|m| (m.id, m.features.is_void)))
            .collect::<Result<_>>()?;
        current.sort_unstable_by_key(|(id, _)| *id);

        let mut external = Oats::open_read_only(other_path.as_ref())?;
        let incoming = external.scan_metadata()?;

        let mut ptr = self.stack_ptr();
        let mut imported = 0u64;
        for meta in incoming {
            match current.binary_search_by(|(id, _)| id.cmp(&meta.id)) {
                Ok(pos) => {
                    if current[pos].1 && !meta.features.is_void {
                        tracing::warn!(
                            import.id = meta.id,
                            "incoming live item collides with a void stub; keeping the stub"
                        );
                    }
                }
                Err(pos) => {
                    let bytes = external.read_item_bytes(&meta)?;
                    ptr = frame::push_frame(&mut self.file, ptr, &bytes)?;
                    current.insert(pos, (meta.id, meta.features.is_void));
                    imported += 1;
                }
            }
        }

        self.write_stack_ptr(ptr)?;
        tracing::debug!(
            import.path = %other_path.as_ref().display(),
            import.count = imported,
            "import finished"
        );
        Ok(imported)
    }

    /// Overwrite the id of the first item matching `old_id`, in place.
    /// Debug tool; can manufacture duplicate ids, on which sort order is
    /// unspecified.
    pub fn set_item_id(&mut self, old_id: u64, new_id: u64) -> Result<()> {
        self.assert_writable()?;
        let meta = self.find_by_id(old_id)?;
        self.write_at(meta.start_offset, &new_id.to_be_bytes())
    }

    /// Overwrite the timestamp field of the item with `id`, in place. Fails
    /// when the item carries no timestamp.
    pub fn set_item_timestamp(&mut self, id: u64, ms: i64) -> Result<()> {
        self.assert_writable()?;
        let meta = self.find_by_id(id)?;
        if meta.features.timestamp.is_none() {
            return Err(OatsError::FeatureAbsent {
                id,
                name: "timestamp",
            });
        }
        // The timestamp is the first feature field: id (8) + bitfield (1).
        self.write_at(meta.start_offset + 9, &ms.to_be_bytes())
    }

    fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(bytes)?;
        Ok(())
    }
}

fn base_features(id: u64, session_id: Option<i64>, mobile: bool) -> Features {
    Features {
        timestamp: Some(id as i64),
        session_id,
        is_mobile: mobile,
        ..Features::default()
    }
}
