//! External sort end-to-end tests

mod common;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use common::*;
use spillsort::{
    sort, BinaryCodec, DataType, ExternalSorter, Field, KeyComparator, MergeStrategy, Record,
    RecordCodec, RunError, Scalar, Schema, SequentialIds, SortConfig, SortError, SortId, SortKey,
};

fn sorter(dir: &std::path::Path, batch: usize) -> ExternalSorter<BinaryCodec, KeyComparator> {
    ExternalSorter::new(BinaryCodec::new(keyed_schema()), by_key())
        .batch_size(batch)
        .scratch_dir(dir)
}

#[test]
fn seven_records_in_batches_of_three() {
    let dir = create_scratch_dir();
    let input = generate_records(&[5, 3, 8, 1, 9, 2, 7]);

    let mut stream = sorter(dir.path(), 3).sort(input).unwrap();
    assert_eq!(stream.stats().runs, 3);
    assert_eq!(stream.stats().records, 7);

    let keys: Vec<i64> = drain(&mut stream).iter().map(key_of).collect();
    assert_eq!(keys, vec![1, 2, 3, 5, 7, 8, 9]);
}

#[test]
fn ordered_and_complete_for_every_batch_size() {
    let n = 500;
    let keys = generate_keys(n, 100, 7);
    let mut expected_keys = keys.clone();
    expected_keys.sort_unstable();

    for batch in [1, 2, 7, 64, 499, 500, 501, 10_000] {
        let dir = create_scratch_dir();
        let mut stream = sorter(dir.path(), batch)
            .sort(generate_records(&keys))
            .unwrap();
        assert_eq!(stream.stats().runs, n.div_ceil(batch), "batch {batch}");

        let out = drain(&mut stream);
        assert!(verify_sorted(&out, &by_key()), "batch {batch}");
        assert_eq!(out.iter().map(key_of).collect::<Vec<_>>(), expected_keys);

        let mut seqs: Vec<i64> = out.iter().map(seq_of).collect();
        seqs.sort_unstable();
        assert_eq!(seqs, (0..n as i64).collect::<Vec<_>>(), "batch {batch}");
    }
}

#[test]
fn single_run_equals_stable_in_memory_sort() {
    let dir = create_scratch_dir();
    let mut input = generate_records(&generate_keys(200, 10, 3));

    let mut stream = sorter(dir.path(), 200).sort(input.clone()).unwrap();
    assert_eq!(stream.stats().runs, 1);
    let out = drain(&mut stream);

    let cmp = by_key();
    input.sort_by(|a, b| spillsort::Comparator::compare(&cmp, a, b));
    assert_eq!(out, input);
}

#[test]
fn equal_keys_keep_input_order_across_runs() {
    let keys = generate_keys(300, 3, 11);
    for strategy in [MergeStrategy::Linear, MergeStrategy::Heap] {
        let dir = create_scratch_dir();
        let mut stream = sorter(dir.path(), 17)
            .merge_strategy(strategy)
            .sort(generate_records(&keys))
            .unwrap();
        let out = drain(&mut stream);
        for pair in out.windows(2) {
            if key_of(&pair[0]) == key_of(&pair[1]) {
                assert!(
                    seq_of(&pair[0]) < seq_of(&pair[1]),
                    "{strategy:?}: {:?} before {:?}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }
}

#[test]
fn linear_and_heap_merges_agree() {
    let keys = generate_keys(1_000, 37, 99);
    let run = |strategy| {
        let dir = create_scratch_dir();
        let mut stream = sorter(dir.path(), 13)
            .merge_strategy(strategy)
            .sort(generate_records(&keys))
            .unwrap();
        drain(&mut stream)
    };
    assert_eq!(run(MergeStrategy::Linear), run(MergeStrategy::Heap));
}

#[test]
fn empty_input_yields_nothing() {
    let dir = create_scratch_dir();
    let mut stream = sorter(dir.path(), 4).sort(Vec::new()).unwrap();

    assert_eq!(stream.stats().runs, 0);
    assert!(!stream.has_next());
    assert!(matches!(stream.next_record(), Err(SortError::NoMoreElements)));
    assert!(stream.next().is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn scratch_dir_empty_after_full_consumption() {
    let dir = create_scratch_dir();
    let stream = sorter(dir.path(), 8)
        .sort(generate_records(&generate_keys(100, 50, 5)))
        .unwrap();
    assert_eq!(files_in(dir.path()), 13);

    let out: Vec<Record> = stream.collect::<Result<_, _>>().unwrap();
    assert_eq!(out.len(), 100);
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn dropping_stream_early_deletes_remaining_runs() {
    let dir = create_scratch_dir();
    let mut stream = sorter(dir.path(), 10)
        .sort(generate_records(&generate_keys(100, 1_000, 8)))
        .unwrap();
    for _ in 0..25 {
        stream.next_record().unwrap();
    }
    assert!(files_in(dir.path()) > 0);
    drop(stream);
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn close_ends_the_stream() {
    let dir = create_scratch_dir();
    let mut stream = sorter(dir.path(), 10)
        .sort(generate_records(&generate_keys(40, 1_000, 2)))
        .unwrap();
    stream.next_record().unwrap();
    stream.close().unwrap();

    assert!(!stream.has_next());
    assert!(matches!(stream.next_record(), Err(SortError::NoMoreElements)));
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn input_error_aborts_and_cleans_up() {
    let dir = create_scratch_dir();
    let input = generate_records(&generate_keys(50, 10, 4))
        .into_iter()
        .map(Ok)
        .chain(std::iter::once(Err(io::Error::new(
            io::ErrorKind::Other,
            "upstream went away",
        ))));

    let err = sorter(dir.path(), 10).try_sort(input).unwrap_err();
    assert!(matches!(err, SortError::Input(_)), "{err}");
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn zero_batch_size_is_config_error() {
    let dir = create_scratch_dir();
    let err = sorter(dir.path(), 0).sort(Vec::new()).unwrap_err();
    assert!(matches!(err, SortError::Core(_)), "{err}");
}

#[test]
fn free_sort_function() {
    let dir = create_scratch_dir();
    let input = generate_records(&[4, 2, 3, 1]);
    let stream = sort(input, keyed_schema(), by_key(), 2, dir.path()).unwrap();
    assert_eq!(stream.schema(), &keyed_schema());
    let keys: Vec<i64> = stream.map(|r| key_of(&r.unwrap())).collect();
    assert_eq!(keys, vec![1, 2, 3, 4]);
}

#[test]
fn descending_with_nulls_last() {
    let dir = create_scratch_dir();
    let schema = Schema::new(vec![Field::new("v", DataType::Float64, true)]).unwrap();
    let cmp = KeyComparator::new(&schema, &[SortKey::desc("v").nulls_last()]).unwrap();
    let input: Vec<Record> = [Some(1.5), None, Some(-2.0), Some(9.0), None]
        .into_iter()
        .map(|v| Record::new(vec![v.map_or(Scalar::Null, Scalar::F64)]))
        .collect();

    let stream = ExternalSorter::new(BinaryCodec::new(schema), cmp)
        .batch_size(2)
        .scratch_dir(dir.path())
        .sort(input)
        .unwrap();
    let out: Vec<Scalar> = stream.map(|r| r.unwrap().values[0].clone()).collect();
    assert_eq!(
        out,
        vec![
            Scalar::F64(9.0),
            Scalar::F64(1.5),
            Scalar::F64(-2.0),
            Scalar::Null,
            Scalar::Null
        ]
    );
}

#[test]
fn sequential_ids_name_the_run_files() {
    let dir = create_scratch_dir();
    let stream = sorter(dir.path(), 5)
        .id_source(Arc::new(SequentialIds::starting_at(42)))
        .sort(generate_records(&generate_keys(12, 10, 1)))
        .unwrap();
    assert_eq!(stream.sort_id(), SortId::new(42));

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names.len(), 3);
    for (i, name) in names.iter().enumerate() {
        assert!(name.starts_with(&format!("sort42-run{i}-")), "{name}");
        assert!(name.ends_with(".run"), "{name}");
    }
}

#[test]
fn config_from_json_drives_the_sorter() {
    let dir = create_scratch_dir();
    let mut cfg: SortConfig =
        serde_json::from_str(r#"{"batch_size": 6, "merge_strategy": "heap"}"#).unwrap();
    cfg.scratch_dir = dir.path().to_path_buf();

    let mut stream = ExternalSorter::new(BinaryCodec::new(keyed_schema()), by_key())
        .with_config(cfg)
        .sort(generate_records(&generate_keys(30, 5, 6)))
        .unwrap();
    assert_eq!(stream.stats().runs, 5);
    assert!(verify_sorted(&drain(&mut stream), &by_key()));
}

/// Bare `u64`s, eight little-endian bytes each.
struct U64Codec {
    schema: Schema,
}

impl U64Codec {
    fn new() -> Self {
        Self {
            schema: Schema::new(vec![Field::new("n", DataType::Int64, false)]).unwrap(),
        }
    }
}

impl RecordCodec for U64Codec {
    type Record = u64;

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn encode(&self, record: &u64, out: &mut dyn Write) -> Result<(), RunError> {
        out.write_all(&record.to_le_bytes())
            .map_err(|source| RunError::Io { op: "encode", source })
    }

    fn decode(&self, input: &mut dyn BufRead) -> Result<Option<u64>, RunError> {
        let at_end = input
            .fill_buf()
            .map_err(|source| RunError::Io { op: "decode", source })?
            .is_empty();
        if at_end {
            return Ok(None);
        }
        let mut buf = [0u8; 8];
        input
            .read_exact(&mut buf)
            .map_err(|e| RunError::Decode(e.to_string()))?;
        Ok(Some(u64::from_le_bytes(buf)))
    }
}

#[test]
fn custom_codec_with_closure_comparator() {
    let dir = create_scratch_dir();
    let input: Vec<u64> = generate_keys(100, 1_000, 21)
        .into_iter()
        .map(|k| k as u64)
        .collect();

    let descending = |a: &u64, b: &u64| b.cmp(a);
    let out: Vec<u64> = ExternalSorter::new(U64Codec::new(), descending)
        .batch_size(8)
        .scratch_dir(dir.path())
        .sort(input.clone())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let mut expected = input;
    expected.sort_unstable_by(|a, b| b.cmp(a));
    assert_eq!(out, expected);
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn malformed_record_aborts_sort_and_removes_runs() {
    let dir = create_scratch_dir();
    let mut input = generate_records(&[4, 3, 2, 1]);
    input.push(keyed(3, 4));
    input.push(Record::new(vec![]));
    input.push(keyed(1, 6));

    let err = sorter(dir.path(), 4)
        .sort(input)
        .err()
        .expect("short record must fail the sort");
    assert!(matches!(err, SortError::Run(RunError::Encode(_))), "{err}");
    assert_eq!(files_in(dir.path()), 0);
}
