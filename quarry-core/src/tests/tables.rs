//! Randomised table round-trips across all three index layouts.

use std::collections::BTreeMap;

use rand::prelude::*;

use crate::table::{TableCursor, TableIndexKind, TableWriter};

const KINDS: [TableIndexKind; 3] = [
    TableIndexKind::DenseFirstByte,
    TableIndexKind::BinaryChop,
    TableIndexKind::Skiplist,
];

fn random_entries(rng: &mut StdRng, count: usize) -> BTreeMap<Vec<u8>, Vec<u8>> {
    let mut entries = BTreeMap::new();
    while entries.len() < count {
        let len = rng.gen_range(1..12);
        let key: Vec<u8> = (0..len).map(|_| rng.gen_range(b'a'..=b'z')).collect();
        let val_len = rng.gen_range(0..200);
        let value: Vec<u8> = (0..val_len).map(|_| rng.gen::<u8>()).collect();
        entries.insert(key, value);
    }
    entries
}

fn build(kind: TableIndexKind, entries: &BTreeMap<Vec<u8>, Vec<u8>>) -> TableCursor {
    let mut writer = TableWriter::new(kind);
    for (k, v) in entries {
        writer.insert(k, v).unwrap();
    }
    TableCursor::open(writer.finish().unwrap()).unwrap()
}

#[test]
fn test_roundtrip_random_keys() {
    let mut rng = StdRng::seed_from_u64(1);
    let entries = random_entries(&mut rng, 300);
    for kind in KINDS {
        let mut cursor = build(kind, &entries);
        cursor.rewind();
        let mut seen = Vec::new();
        while cursor.next().unwrap() {
            cursor.read_tag(false).unwrap();
            seen.push((cursor.current_key().to_vec(), cursor.current_tag().to_vec()));
        }
        let expected: Vec<(Vec<u8>, Vec<u8>)> =
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        assert_eq!(seen, expected, "{:?}", kind);
    }
}

#[test]
fn test_find_every_inserted_key() {
    let mut rng = StdRng::seed_from_u64(2);
    let entries = random_entries(&mut rng, 200);
    for kind in KINDS {
        let mut cursor = build(kind, &entries);
        for (k, v) in &entries {
            assert!(cursor.find(k, false).unwrap(), "{:?}: key {:?}", kind, k);
            cursor.read_tag(false).unwrap();
            assert_eq!(cursor.current_tag(), v.as_slice());
        }
    }
}

#[test]
fn test_find_absent_lands_on_successor() {
    let mut rng = StdRng::seed_from_u64(3);
    let entries = random_entries(&mut rng, 150);
    let keys: Vec<&Vec<u8>> = entries.keys().collect();
    for kind in KINDS {
        let mut cursor = build(kind, &entries);
        for pair in keys.windows(2) {
            // A probe strictly between two adjacent keys.
            let mut probe = pair[0].to_vec();
            probe.push(1);
            if entries.contains_key(&probe) {
                continue;
            }
            let successor: &[u8] = if probe.as_slice() < pair[1].as_slice() {
                pair[1]
            } else {
                continue;
            };
            cursor.rewind();
            assert!(!cursor.find(&probe, false).unwrap());
            assert_eq!(
                cursor.current_key(),
                successor,
                "{:?}: probe {:?}",
                kind,
                probe
            );
        }
    }
}

#[test]
fn test_all_index_kinds_agree() {
    let mut rng = StdRng::seed_from_u64(4);
    let entries = random_entries(&mut rng, 250);
    let mut cursors: Vec<(TableIndexKind, TableCursor)> =
        KINDS.iter().map(|&k| (k, build(k, &entries))).collect();

    let mut probes: Vec<Vec<u8>> = entries.keys().cloned().collect();
    for key in entries.keys().take(60) {
        let mut absent = key.clone();
        absent.push(b'!');
        probes.push(absent);
    }

    for probe in &probes {
        let mut outcomes = Vec::new();
        for (kind, cursor) in cursors.iter_mut() {
            cursor.rewind();
            let found = cursor.find(probe, false).unwrap();
            let at = if cursor.at_end() {
                None
            } else {
                Some(cursor.current_key().to_vec())
            };
            outcomes.push((*kind, found, at));
        }
        let (_, f0, a0) = &outcomes[0];
        for (kind, found, at) in &outcomes[1..] {
            assert_eq!((found, at), (f0, a0), "{:?} disagrees on {:?}", kind, probe);
        }
    }
}

#[test]
fn test_prev_equivalent_to_naive_walk() {
    let mut rng = StdRng::seed_from_u64(5);
    let entries = random_entries(&mut rng, 120);
    let keys: Vec<Vec<u8>> = entries.keys().cloned().collect();
    for kind in KINDS {
        let mut cursor = build(kind, &entries);
        for _ in 0..40 {
            let i = rng.gen_range(0..keys.len());
            cursor.rewind();
            assert!(cursor.find(&keys[i], false).unwrap());
            assert!(cursor.prev().unwrap());
            if i == 0 {
                // Stepping back from the first key leaves the cursor before
                // the table; the next step re-reads the first key.
                assert!(cursor.current_key().is_empty());
                assert!(cursor.next().unwrap());
                assert_eq!(cursor.current_key(), keys[0].as_slice());
            } else {
                assert_eq!(cursor.current_key(), keys[i - 1].as_slice(), "{:?}", kind);
            }
        }
    }
}
