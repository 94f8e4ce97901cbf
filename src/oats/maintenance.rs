//! Whole-store rewrites: sort, trim, and filter.
//!
//! Each is a single-pass, read-old / write-new rewrite. The original file is
//! untouched until the new one is complete; sort then swaps the files with a
//! remove + rename, so a crash leaves either the old store intact or the new
//! one complete. Temporaries are unlinked before any error propagates.

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::io::frame;
use crate::oats::lifecycle::Oats;
use crate::oats::query::binary_search_by_id;
use crate::types::attr;
use crate::types::item::{Item, ItemMetadata};

/// What a trim/filter rewrite did: items copied live versus stubbed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteStats {
    pub copied: u64,
    pub stubbed: u64,
}

impl Oats {
    /// Rewrite the store with items in ascending id order.
    ///
    /// Void stubs whose id duplicates a live item (or an earlier stub) are
    /// dropped; everything else is copied byte-for-byte. The rewrite goes to
    /// `tmp_path`, which then replaces this store's file; the handle reopens
    /// onto the result.
    pub fn sort(&mut self, tmp_path: &Path) -> Result<()> {
        self.assert_writable()?;

        let metas = self.scan_metadata()?;
        let (mut merged, voids): (Vec<ItemMetadata>, Vec<ItemMetadata>) =
            metas.into_iter().partition(|meta| !meta.features.is_void);
        merged.sort_unstable_by_key(|meta| meta.id);

        for void in voids {
            if let Err(pos) = binary_search_by_id(&merged, void.id) {
                merged.insert(pos, void);
            }
        }

        let result = self.stream_rewrite(tmp_path, &merged, |_| Disposition::Copy);
        if result.is_err() {
            let _ = fs::remove_file(tmp_path);
            return result.map(|_| ());
        }

        fs::remove_file(&self.path)?;
        fs::rename(tmp_path, &self.path)?;
        tracing::debug!(sort.path = %self.path.display(), "store sorted");
        self.reopen()
    }

    /// Write a copy of this store to `out_path` in which every item matching
    /// the attribute list is reduced to a void stub. The token `everything`
    /// stubs all items.
    pub fn trim<S: AsRef<str>>(&mut self, attrs: &[S], out_path: &Path) -> Result<RewriteStats> {
        let mask = attr::attrs_mask(attrs, true)?;
        self.stub_rewrite(out_path, move |bits| attr::matches(bits, mask))
    }

    /// The complement of [`Oats::trim`]: items *not* matching the attribute
    /// list are stubbed, matching items are copied.
    pub fn filter<S: AsRef<str>>(&mut self, attrs: &[S], out_path: &Path) -> Result<RewriteStats> {
        let mask = attr::attrs_mask(attrs, false)?;
        self.stub_rewrite(out_path, move |bits| !attr::matches(bits, mask))
    }

    fn stub_rewrite<F>(&mut self, out_path: &Path, stub_if: F) -> Result<RewriteStats>
    where
        F: Fn(u8) -> bool,
    {
        let metas = self.scan_metadata()?;
        let result = self.stream_rewrite(out_path, &metas, |meta| {
            if stub_if(meta.features.bits()) {
                Disposition::Stub
            } else {
                Disposition::Copy
            }
        });
        if result.is_err() {
            let _ = fs::remove_file(out_path);
        }
        result
    }

    /// Stream `metas` into a fresh store at `dst_path`, copying or stubbing
    /// each item, and write the final stack pointer once.
    fn stream_rewrite<F>(
        &mut self,
        dst_path: &Path,
        metas: &[ItemMetadata],
        disposition: F,
    ) -> Result<RewriteStats>
    where
        F: Fn(&ItemMetadata) -> Disposition,
    {
        let mut dst = Oats::create(dst_path)?;
        let mut ptr = dst.stack_ptr();
        let mut stats = RewriteStats {
            copied: 0,
            stubbed: 0,
        };

        for meta in metas {
            let bytes = match disposition(meta) {
                Disposition::Copy => {
                    stats.copied += 1;
                    self.read_item_bytes(meta)?
                }
                Disposition::Stub => {
                    stats.stubbed += 1;
                    Item {
                        id: meta.id,
                        features: meta.features.stubbed(),
                        payload: Vec::new(),
                    }
                    .encode()?
                }
            };
            ptr = frame::push_frame(&mut dst.file, ptr, &bytes)?;
        }

        dst.write_stack_ptr(ptr)?;
        tracing::debug!(
            rewrite.path = %dst_path.display(),
            rewrite.copied = stats.copied,
            rewrite.stubbed = stats.stubbed,
            "store rewritten"
        );
        Ok(stats)
    }
}

enum Disposition {
    Copy,
    Stub,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::item::Features;
    use std::fs;
    use tempfile::TempDir;

    fn text_item(id: u64) -> Item {
        Item {
            id,
            features: Features {
                timestamp: Some(id as i64),
                ..Features::default()
            },
            payload: format!("payload-{id}").into_bytes(),
        }
    }

    fn file_item(id: u64) -> Item {
        Item {
            id,
            features: Features {
                timestamp: Some(id as i64),
                filename: Some(b"doc.bin".to_vec()),
                ..Features::default()
            },
            payload: vec![0xEE; 16],
        }
    }

    fn void_item(id: u64) -> Item {
        Item {
            id,
            features: Features {
                timestamp: Some(id as i64),
                is_void: true,
                ..Features::default()
            },
            payload: Vec::new(),
        }
    }

    fn store_at(dir: &TempDir, name: &str, items: &[Item]) -> Oats {
        let mut store = Oats::create(dir.path().join(name)).expect("create");
        for item in items {
            store.push(item).expect("push");
        }
        store
    }

    #[test]
    fn sort_orders_ids_and_drops_duplicate_stubs() {
        let dir = TempDir::new().expect("dir");
        let mut store = store_at(
            &dir,
            "a.oats",
            &[
                text_item(30),
                void_item(10),
                text_item(20),
                void_item(20), // duplicates a live id; must vanish
                text_item(5),
            ],
        );

        store.sort(&dir.path().join("a.oats.tmp")).expect("sort");

        let metas = store.scan_metadata().expect("scan");
        assert_eq!(metas.iter().map(|m| m.id).collect::<Vec<_>>(), [5, 10, 20, 30]);
        assert!(metas[1].features.is_void);
        assert!(!metas[2].features.is_void);
        // The temporary is gone.
        assert!(!dir.path().join("a.oats.tmp").exists());

        // Payload bytes survived the copy.
        let payload = store.read_payload(&metas[3]).expect("payload");
        assert_eq!(payload, b"payload-30");
    }

    #[test]
    fn sort_is_idempotent() {
        let dir = TempDir::new().expect("dir");
        let mut store = store_at(
            &dir,
            "b.oats",
            &[text_item(3), text_item(1), void_item(2)],
        );
        let tmp = dir.path().join("b.oats.tmp");

        store.sort(&tmp).expect("first sort");
        let once = fs::read(dir.path().join("b.oats")).expect("read");
        store.sort(&tmp).expect("second sort");
        let twice = fs::read(dir.path().join("b.oats")).expect("read");
        assert_eq!(once, twice);
    }

    #[test]
    fn trim_stubs_matching_items() {
        let dir = TempDir::new().expect("dir");
        let mut store = store_at(&dir, "c.oats", &[text_item(1), file_item(2)]);
        let out = dir.path().join("out.oats");

        let stats = store.trim(&["is_file"], &out).expect("trim");
        assert_eq!(stats, RewriteStats { copied: 1, stubbed: 1 });

        let mut trimmed = Oats::open(&out).expect("open out");
        let metas = trimmed.scan_metadata().expect("scan");
        assert_eq!(metas.len(), 2);
        assert!(!metas[0].features.is_void);
        assert!(metas[1].features.is_void);
        assert_eq!(metas[1].id, 2);
        // Stub carries no filename and no payload.
        assert!(metas[1].features.filename.is_none());
        assert_eq!(metas[1].payload_len(), 0);
        // But keeps its timestamp.
        assert_eq!(metas[1].features.timestamp, Some(2));
    }

    #[test]
    fn trim_everything_stubs_all() {
        let dir = TempDir::new().expect("dir");
        let mut store = store_at(&dir, "d.oats", &[text_item(1), file_item(2)]);
        let out = dir.path().join("out.oats");

        let stats = store.trim(&["everything"], &out).expect("trim");
        assert_eq!(stats, RewriteStats { copied: 0, stubbed: 2 });
    }

    #[test]
    fn filter_is_the_dual_of_trim() {
        let dir = TempDir::new().expect("dir");
        let items = [text_item(1), file_item(2), text_item(3), file_item(4)];
        let mut store = store_at(&dir, "e.oats", &items);

        let trimmed_path = dir.path().join("trimmed.oats");
        let filtered_path = dir.path().join("filtered.oats");
        store.trim(&["is_file"], &trimmed_path).expect("trim");
        store.filter(&["is_file"], &filtered_path).expect("filter");

        let mut trimmed = Oats::open(&trimmed_path).expect("open");
        let mut filtered = Oats::open(&filtered_path).expect("open");
        let t = trimmed.scan_metadata().expect("scan");
        let f = filtered.scan_metadata().expect("scan");

        // Together they cover every id.
        assert_eq!(t.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
        assert_eq!(f.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2, 3, 4]);
        // Trim's stub set is filter's live set, by id.
        let t_stubs: Vec<u64> = t.iter().filter(|m| m.features.is_void).map(|m| m.id).collect();
        let f_live: Vec<u64> = f.iter().filter(|m| !m.features.is_void).map(|m| m.id).collect();
        assert_eq!(t_stubs, f_live);
        assert_eq!(t_stubs, [2, 4]);
    }

    #[test]
    fn filter_rejects_everything_token() {
        let dir = TempDir::new().expect("dir");
        let mut store = store_at(&dir, "f.oats", &[text_item(1)]);
        let out = dir.path().join("out.oats");
        assert!(store.filter(&["everything"], &out).is_err());
        // The failed rewrite left no output behind.
        assert!(!out.exists());
    }
}
