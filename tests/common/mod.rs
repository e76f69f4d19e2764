//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;

use spillsort::{DataType, Field, KeyComparator, Record, Scalar, Schema, SortKey, SortError, SortedStream};
use spillsort::{Comparator, RecordCodec};
use tempfile::TempDir;

/// Fresh scratch directory, removed when the guard drops.
pub fn create_scratch_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("spillsort-test-")
        .tempdir()
        .expect("create scratch dir")
}

/// `key` drives the order; `seq` records the input position.
pub fn keyed_schema() -> Schema {
    Schema::new(vec![
        Field::new("key", DataType::Int64, false),
        Field::new("seq", DataType::Int64, false),
    ])
    .unwrap()
}

/// Encoded size of one `keyed_schema` record under `BinaryCodec`.
pub const KEYED_RECORD_BYTES: u64 = 18;

pub fn keyed(key: i64, seq: i64) -> Record {
    Record::new(vec![Scalar::I64(key), Scalar::I64(seq)])
}

pub fn by_key() -> KeyComparator {
    KeyComparator::new(&keyed_schema(), &[SortKey::asc("key")]).unwrap()
}

/// Deterministic pseudo-random keys in `0..modulus` (LCG, no extra crates).
pub fn generate_keys(n: usize, modulus: i64, seed: u64) -> Vec<i64> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            ((state >> 33) as i64).rem_euclid(modulus)
        })
        .collect()
}

/// Records whose `seq` is their input position.
pub fn generate_records(keys: &[i64]) -> Vec<Record> {
    keys.iter()
        .enumerate()
        .map(|(i, &k)| keyed(k, i as i64))
        .collect()
}

pub fn key_of(record: &Record) -> i64 {
    match record.values[0] {
        Scalar::I64(v) => v,
        ref other => panic!("unexpected key {other:?}"),
    }
}

pub fn seq_of(record: &Record) -> i64 {
    match record.values[1] {
        Scalar::I64(v) => v,
        ref other => panic!("unexpected seq {other:?}"),
    }
}

pub fn drain<C, K>(stream: &mut SortedStream<C, K>) -> Vec<C::Record>
where
    C: RecordCodec,
    K: Comparator<C::Record>,
{
    let mut out = Vec::new();
    while stream.has_next() {
        out.push(stream.next_record().expect("merge step"));
    }
    assert!(matches!(stream.next_record(), Err(SortError::NoMoreElements)));
    out
}

pub fn verify_sorted<K: Comparator<Record>>(records: &[Record], cmp: &K) -> bool {
    records
        .windows(2)
        .all(|w| cmp.compare(&w[0], &w[1]) != std::cmp::Ordering::Greater)
}

/// Files left in a scratch directory (run files are the only thing we write).
pub fn files_in(dir: &Path) -> usize {
    match fs::read_dir(dir) {
        Ok(entries) => entries.count(),
        Err(_) => 0,
    }
}
