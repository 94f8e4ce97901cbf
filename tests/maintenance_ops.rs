//! Integration tests for the whole-store rewrites: sort, import with dedup,
//! and the trim/filter pair.

use tempfile::TempDir;

use oats_core::{Features, Item, Oats, StorePaths};

fn text_item(id: u64, text: &str) -> Item {
    Item {
        id,
        features: Features {
            timestamp: Some(id as i64),
            ..Features::default()
        },
        payload: text.as_bytes().to_vec(),
    }
}

fn file_item(id: u64, name: &[u8]) -> Item {
    Item {
        id,
        features: Features {
            timestamp: Some(id as i64),
            filename: Some(name.to_vec()),
            ..Features::default()
        },
        payload: vec![0xC4; 32],
    }
}

fn store_with(dir: &TempDir, name: &str, items: &[Item]) -> Oats {
    let mut store = Oats::create(dir.path().join(name)).unwrap();
    for item in items {
        store.push(item).unwrap();
    }
    store
}

/// Import retains the current store's copies on overlap; sort then yields
/// strictly ascending ids.
#[test]
fn import_dedup_then_sort() {
    let dir = TempDir::new().unwrap();
    let mut a = store_with(
        &dir,
        "a.oats",
        &[text_item(1, "a1"), text_item(2, "a2"), text_item(3, "a3")],
    );
    {
        store_with(
            &dir,
            "b.oats",
            &[text_item(2, "b2"), text_item(3, "b3"), text_item(4, "b4")],
        );
    }

    let imported = a.import(dir.path().join("b.oats")).unwrap();
    assert_eq!(imported, 1);

    let paths = StorePaths::new(dir.path().join("a.oats"));
    a.sort(paths.temporary()).unwrap();

    let metas = a.scan_metadata().unwrap();
    let ids: Vec<u64> = metas.iter().map(|m| m.id).collect();
    assert_eq!(ids, [1, 2, 3, 4]);
    assert!(ids.windows(2).all(|w| w[0] < w[1]));

    // A's copies of the overlapping ids survived.
    assert_eq!(a.read_payload(&metas[1]).unwrap(), b"a2");
    assert_eq!(a.read_payload(&metas[2]).unwrap(), b"a3");
    assert_eq!(a.read_payload(&metas[3]).unwrap(), b"b4");
}

/// With disjoint id sets, import commutes with sort: both directions end as
/// byte-identical stores.
#[test]
fn import_commutes_with_sort_on_disjoint_stores() {
    let dir = TempDir::new().unwrap();
    let a_items = [text_item(1, "one"), text_item(3, "three")];
    let b_items = [text_item(2, "two"), text_item(4, "four")];

    let mut ab = store_with(&dir, "ab.oats", &a_items);
    {
        store_with(&dir, "b.oats", &b_items);
    }
    ab.import(dir.path().join("b.oats")).unwrap();
    ab.sort(&dir.path().join("ab.oats.tmp")).unwrap();

    let mut ba = store_with(&dir, "ba.oats", &b_items);
    {
        store_with(&dir, "a.oats", &a_items);
    }
    ba.import(dir.path().join("a.oats")).unwrap();
    ba.sort(&dir.path().join("ba.oats.tmp")).unwrap();

    let ab_bytes = std::fs::read(dir.path().join("ab.oats")).unwrap();
    let ba_bytes = std::fs::read(dir.path().join("ba.oats")).unwrap();
    assert_eq!(ab_bytes, ba_bytes);
}

/// Sorting twice changes nothing.
#[test]
fn sort_is_idempotent_end_to_end() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with(
        &dir,
        "s.oats",
        &[text_item(9, "i"), text_item(4, "d"), text_item(7, "g")],
    );
    let tmp = dir.path().join("s.oats.tmp");

    store.sort(&tmp).unwrap();
    let once = std::fs::read(dir.path().join("s.oats")).unwrap();
    store.sort(&tmp).unwrap();
    let twice = std::fs::read(dir.path().join("s.oats")).unwrap();
    assert_eq!(once, twice);
}

/// Trim stubs the matching file item; filter on the same predicate produces
/// the complement.
#[test]
fn trim_and_filter_are_duals() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with(
        &dir,
        "src.oats",
        &[text_item(100, "keep me"), file_item(200, b"blob.bin")],
    );

    let out = dir.path().join("out.oats");
    store.trim(&["is_file"], &out).unwrap();

    let mut trimmed = Oats::open(&out).unwrap();
    let metas = trimmed.scan_metadata().unwrap();
    assert_eq!(metas.len(), 2);
    assert!(!metas[0].features.is_void);
    assert_eq!(metas[0].id, 100);
    assert!(metas[1].features.is_void);
    assert_eq!(metas[1].id, 200);
    assert_eq!(metas[1].payload_len(), 0);
    assert!(metas[1].features.filename.is_none());
    // The live item kept its payload.
    assert_eq!(trimmed.read_payload(&metas[0]).unwrap(), b"keep me");

    let out2 = dir.path().join("out2.oats");
    store.filter(&["is_file"], &out2).unwrap();

    let mut filtered = Oats::open(&out2).unwrap();
    let metas2 = filtered.scan_metadata().unwrap();
    let trim_stub_ids: Vec<u64> = metas
        .iter()
        .filter(|m| m.features.is_void)
        .map(|m| m.id)
        .collect();
    let filter_live_ids: Vec<u64> = metas2
        .iter()
        .filter(|m| !m.features.is_void)
        .map(|m| m.id)
        .collect();
    assert_eq!(trim_stub_ids, filter_live_ids);
    assert_eq!(trim_stub_ids, [200]);
}

/// The source store is untouched by trim and filter.
#[test]
fn trim_leaves_the_source_alone() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with(&dir, "src.oats", &[text_item(1, "x"), file_item(2, b"f")]);
    let before = std::fs::read(dir.path().join("src.oats")).unwrap();

    store.trim(&["everything"], &dir.path().join("out.oats")).unwrap();

    let after = std::fs::read(dir.path().join("src.oats")).unwrap();
    assert_eq!(before, after);
}

/// A void stub in the current store wins over an incoming live item with
/// the same id, and a live item wins over an incoming stub.
#[test]
fn import_keeps_current_copy_on_void_collisions() {
    let dir = TempDir::new().unwrap();

    let mut stub = text_item(7, "");
    stub.features.is_void = true;
    stub.payload.clear();
    let mut current = store_with(&dir, "cur.oats", &[stub.clone(), text_item(8, "live8")]);

    {
        let mut incoming_stub = text_item(8, "");
        incoming_stub.features.is_void = true;
        incoming_stub.payload.clear();
        store_with(&dir, "inc.oats", &[text_item(7, "live7"), incoming_stub]);
    }

    let imported = current.import(dir.path().join("inc.oats")).unwrap();
    assert_eq!(imported, 0);

    let metas = current.scan_metadata().unwrap();
    assert_eq!(metas.len(), 2);
    assert!(metas[0].features.is_void, "stub for id 7 survived");
    assert!(!metas[1].features.is_void, "live id 8 survived");
    assert_eq!(current.read_payload(&metas[1]).unwrap(), b"live8");
}

/// A sort that cannot write its temporary leaves the original store intact
/// and no stray file behind.
#[test]
fn failed_sort_rolls_back() {
    let dir = TempDir::new().unwrap();
    let mut store = store_with(&dir, "r.oats", &[text_item(2, "b"), text_item(1, "a")]);
    let before = std::fs::read(dir.path().join("r.oats")).unwrap();

    let bad_tmp = dir.path().join("missing").join("r.oats.tmp");
    assert!(store.sort(&bad_tmp).is_err());

    let after = std::fs::read(dir.path().join("r.oats")).unwrap();
    assert_eq!(before, after);
    assert!(!bad_tmp.exists());

    // The handle still works and a well-placed sort succeeds.
    store.sort(&dir.path().join("r.oats.tmp")).unwrap();
    let ids: Vec<u64> = store.scan_metadata().unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, [1, 2]);
}

/// Sorting a store that mixes stubs and their live twins drops the stubs.
#[test]
fn sort_suppresses_shadowed_stubs() {
    let dir = TempDir::new().unwrap();
    let mut stub = text_item(2, "");
    stub.features.is_void = true;
    stub.payload.clear();

    let mut store = store_with(
        &dir,
        "m.oats",
        &[text_item(2, "live"), stub, text_item(1, "early")],
    );
    store.sort(&dir.path().join("m.oats.tmp")).unwrap();

    let metas = store.scan_metadata().unwrap();
    assert_eq!(metas.iter().map(|m| m.id).collect::<Vec<_>>(), [1, 2]);
    assert!(metas.iter().all(|m| !m.features.is_void));
}
