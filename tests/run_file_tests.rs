//! Run writer / reader lifecycle, integrity checks and compression

mod common;

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use common::*;
use spillsort::{
    BinaryCodec, Compression, ExternalSorter, MergeStrategy, Record, RunId, Scalar, SortConfig, SortError,
    SortId,
};
use spillsort_run::{open_run, write_run, RunError, RunReader, RunWriter, ScratchDir, WriteOptions};

fn scratch(dir: &Path) -> ScratchDir {
    ScratchDir::new(dir, SortId::new(1)).unwrap()
}

fn codec() -> Arc<BinaryCodec> {
    Arc::new(BinaryCodec::new(keyed_schema()))
}

fn truncate_by(path: &Path, bytes: u64) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    let len = file.metadata().unwrap().len();
    file.set_len(len - bytes).unwrap();
}

#[test]
fn written_run_reads_back_sorted_then_disappears() {
    let dir = create_scratch_dir();
    let codec = codec();
    let batch = generate_records(&[4, 1, 3, 1, 2]);

    let run = write_run(
        batch,
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();
    assert_eq!(run.meta().records, 5);
    assert_eq!(run.meta().bytes, 5 * KEYED_RECORD_BYTES);
    let path = run.path().to_path_buf();
    assert!(path.exists());

    let mut reader = RunReader::open(run, codec, 4096).unwrap();
    let mut out = Vec::new();
    while let Some(record) = reader.take_and_advance().unwrap() {
        out.push(record);
    }
    let pairs: Vec<(i64, i64)> = out.iter().map(|r| (key_of(r), seq_of(r))).collect();
    assert_eq!(pairs, vec![(1, 1), (1, 3), (2, 4), (3, 2), (4, 0)]);
    assert!(reader.is_exhausted());
    assert_eq!(reader.records_read(), 5);
    assert!(!path.exists());
}

#[test]
fn current_and_advance_walk_the_run() {
    let dir = create_scratch_dir();
    let codec = codec();
    let run = write_run(
        generate_records(&[2, 1]),
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();

    let mut reader = open_run(run, codec, 64).unwrap();
    assert_eq!(reader.current().map(key_of), Some(1));
    assert_eq!(reader.advance().unwrap().map(key_of), Some(2));
    assert!(reader.advance().unwrap().is_none());
    assert!(reader.advance().unwrap().is_none());
    assert!(reader.is_exhausted());
}

#[test]
fn empty_run_opens_exhausted() {
    let dir = create_scratch_dir();
    let codec = codec();
    let run = write_run(
        Vec::new(),
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();
    let reader = RunReader::open(run, codec, 64).unwrap();
    assert!(reader.is_exhausted());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn truncation_on_record_boundary_is_detected() {
    let dir = create_scratch_dir();
    let codec = codec();
    let run = write_run(
        generate_records(&[1, 2, 3, 4, 5]),
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();
    truncate_by(run.path(), KEYED_RECORD_BYTES);

    let mut reader = RunReader::open(run, codec, 4096).unwrap();
    let err = loop {
        match reader.take_and_advance() {
            Ok(Some(_)) => continue,
            Ok(None) => panic!("truncation went unnoticed"),
            Err(e) => break e,
        }
    };
    assert!(matches!(err, RunError::Truncated { expected: 5, read: 4 }), "{err}");
    assert!(reader.is_exhausted());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn truncation_mid_record_is_decode_error() {
    let dir = create_scratch_dir();
    let codec = codec();
    let run = write_run(
        generate_records(&[1, 2]),
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();
    truncate_by(run.path(), 5);

    let mut reader = RunReader::open(run, codec, 4096).unwrap();
    let err = reader.take_and_advance().unwrap_err();
    assert!(matches!(err, RunError::Decode(_)), "{err}");
    assert!(err.is_corruption());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn failed_encode_leaves_no_file() {
    let dir = create_scratch_dir();
    let codec = codec();
    for bad in [
        Record::new(vec![Scalar::Str("not a key".into())]),
        Record::new(vec![]),
    ] {
        let mut batch = generate_records(&[3, 2]);
        batch.insert(1, bad);

        let err = write_run(
            batch,
            codec.as_ref(),
            &by_key(),
            &scratch(dir.path()),
            RunId::new(0),
            WriteOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RunError::Encode(_)), "{err}");
        assert_eq!(files_in(dir.path()), 0);
    }
}

#[test]
fn writer_refuses_to_continue_after_failure() {
    let dir = create_scratch_dir();
    let codec = codec();
    let scratch = scratch(dir.path());
    let mut writer =
        RunWriter::create(&scratch, RunId::new(3), codec.as_ref(), WriteOptions::default()).unwrap();
    writer.write(&keyed(1, 0)).unwrap();
    assert!(writer.write(&Record::new(vec![])).is_err());
    assert!(writer.write(&keyed(2, 1)).is_err());
    assert_eq!(writer.records(), 1);
    assert!(writer.finish().is_err());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn close_is_idempotent() {
    let dir = create_scratch_dir();
    let codec = codec();
    let run = write_run(
        generate_records(&[1, 2, 3]),
        codec.as_ref(),
        &by_key(),
        &scratch(dir.path()),
        RunId::new(0),
        WriteOptions::default(),
    )
    .unwrap();
    let mut reader = RunReader::open(run, codec, 64).unwrap();
    reader.close().unwrap();
    reader.close().unwrap();
    assert!(reader.current().is_none());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn merge_surfaces_corruption_then_aborts() {
    for strategy in [MergeStrategy::Linear, MergeStrategy::Heap] {
        for cut in [KEYED_RECORD_BYTES, 5] {
            let dir = create_scratch_dir();
            let cfg = SortConfig {
                batch_size: 4,
                scratch_dir: dir.path().to_path_buf(),
                read_buffer_bytes: KEYED_RECORD_BYTES as usize,
                merge_strategy: strategy,
                ..SortConfig::default()
            };
            let mut stream = ExternalSorter::new(BinaryCodec::new(keyed_schema()), by_key())
                .with_config(cfg)
                .sort(generate_records(&(0..12).collect::<Vec<i64>>()))
                .unwrap();

            let victim = fs::read_dir(dir.path())
                .unwrap()
                .map(|e| e.unwrap().path())
                .find(|p| p.file_name().unwrap().to_string_lossy().contains("-run1-"))
                .unwrap();
            truncate_by(&victim, cut);

            let mut emitted = 0;
            let err = loop {
                match stream.next_record() {
                    Ok(_) => emitted += 1,
                    Err(e) => break e,
                }
            };
            assert!(err.is_corruption(), "{strategy:?} cut {cut}: {err}");
            if cut == KEYED_RECORD_BYTES {
                assert!(matches!(err, SortError::Run(RunError::Truncated { expected: 4, read: 3 })));
            } else {
                assert!(matches!(err, SortError::Run(RunError::Decode(_))));
            }
            assert!(emitted < 12);
            assert!(!stream.has_next());
            assert!(matches!(stream.next_record(), Err(SortError::Aborted)));
            assert!(stream.next().is_none());
            assert_eq!(files_in(dir.path()), 0);
        }
    }
}

fn sort_with(compression: Compression, dir: &Path) -> Result<Vec<Record>, SortError> {
    ExternalSorter::new(BinaryCodec::new(keyed_schema()), by_key())
        .batch_size(64)
        .scratch_dir(dir)
        .compression(compression)
        .sort(generate_records(&generate_keys(1_000, 20, 12)))?
        .collect()
}

#[cfg(feature = "zstd")]
#[test]
fn zstd_runs_round_trip() {
    let dir = create_scratch_dir();
    let out = sort_with(Compression::Zstd, dir.path()).unwrap();
    assert_eq!(out.len(), 1_000);
    assert!(verify_sorted(&out, &by_key()));
    assert_eq!(files_in(dir.path()), 0);
}

#[cfg(feature = "lz4")]
#[test]
fn lz4_runs_round_trip() {
    let dir = create_scratch_dir();
    let out = sort_with(Compression::Lz4, dir.path()).unwrap();
    assert_eq!(out.len(), 1_000);
    assert!(verify_sorted(&out, &by_key()));
    assert_eq!(files_in(dir.path()), 0);
}

#[cfg(not(feature = "zstd"))]
#[test]
fn zstd_without_feature_is_rejected() {
    let dir = create_scratch_dir();
    let err = sort_with(Compression::Zstd, dir.path()).unwrap_err();
    assert!(matches!(
        err,
        SortError::Run(RunError::UnsupportedCompression("zstd"))
    ));
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn uncompressed_runs_round_trip() {
    let dir = create_scratch_dir();
    let out = sort_with(Compression::None, dir.path()).unwrap();
    assert_eq!(out.len(), 1_000);
    assert!(verify_sorted(&out, &by_key()));
}
