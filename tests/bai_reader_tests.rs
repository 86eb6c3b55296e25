//! Integration tests for the BAI reader over synthetic index files.

mod common;

use common::{bai_bytes, empty_ref, uniform_ref, vfo, write_bai, RefIndex};
use indextools::{BaiIndex, IndexToolsError};

#[test]
fn test_load_synthetic_index() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bai(
        dir.path(),
        "sample.bam.bai",
        &[uniform_ref(6, 10), empty_ref()],
    );

    let index = BaiIndex::from_path(&path).expect("failed to load BAI index");

    assert_eq!(index.references.len(), 2);
    assert_eq!(index.references[0].bins.len(), 1);
    assert_eq!(index.references[0].intervals.len(), 6);
    assert!(index.references[1].is_empty());
    assert_eq!(index.unplaced, None);
}

#[test]
fn test_trailer_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bai_bytes(&[uniform_ref(2, 5)]);
    bytes.extend_from_slice(&1234u64.to_le_bytes());
    let path = dir.path().join("trailer.bai");
    std::fs::write(&path, bytes).unwrap();

    let index = BaiIndex::from_path(&path).unwrap();
    assert_eq!(index.unplaced, Some(1234));
}

#[test]
fn test_metadata_bin_kept_out_of_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let mut reference = uniform_ref(4, 10);
    reference.metadata = Some(((vfo(1, 0), vfo(41, 0)), (5000, 12)));
    let path = write_bai(dir.path(), "meta.bai", &[reference]);

    let index = BaiIndex::from_path(&path).unwrap();
    let parsed = &index.references[0];

    assert_eq!(parsed.bins.len(), 1);
    let metadata = parsed.metadata.expect("metadata bin parsed");
    assert_eq!(metadata.mapped, 5000);
    assert_eq!(metadata.unmapped, 12);
    assert_eq!(metadata.start.as_raw(), vfo(1, 0));
}

#[test]
fn test_zero_linear_entry_patched_forward() {
    // Known writer bug: an interior linear-index entry of zero must be
    // forward-filled from its predecessor.
    let dir = tempfile::tempdir().unwrap();
    let mut reference = uniform_ref(8, 10);
    reference.intervals[5] = 0;
    let path = write_bai(dir.path(), "patched.bai", &[reference]);

    let index = BaiIndex::from_path(&path).unwrap();
    let intervals = &index.references[0].intervals;

    assert_eq!(intervals[5], intervals[4]);
    // the non-zero run is strictly usable: sorted, no zeros
    let raws: Vec<u64> = intervals.iter().map(|v| v.as_raw()).collect();
    for pair in raws.windows(2) {
        assert!(pair[0] <= pair[1]);
    }
    assert!(raws.iter().all(|&v| v != 0));
}

#[test]
fn test_bad_magic_fails_at_offset_zero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.bai");
    std::fs::write(&path, b"BAI\x00\x01\x00\x00\x00").unwrap();

    let err = BaiIndex::from_path(&path).unwrap_err();
    match err {
        IndexToolsError::MalformedIndex { offset, ref msg } => {
            assert_eq!(offset, 0);
            assert!(msg.contains("magic"));
        }
        other => panic!("expected MalformedIndex, got {:?}", other),
    }
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_truncated_index() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = bai_bytes(&[uniform_ref(4, 10)]);
    bytes.truncate(bytes.len() - 5);
    let path = dir.path().join("short.bai");
    std::fs::write(&path, bytes).unwrap();

    let err = BaiIndex::from_path(&path).unwrap_err();
    assert!(matches!(err, IndexToolsError::MalformedIndex { .. }));
}

#[test]
fn test_inverted_chunk_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let reference = RefIndex {
        bins: vec![(4681, vec![(vfo(5, 0), vfo(2, 0))])],
        intervals: vec![vfo(2, 0)],
        metadata: None,
    };
    let path = write_bai(dir.path(), "inverted.bai", &[reference]);

    let err = BaiIndex::from_path(&path).unwrap_err();
    match err {
        IndexToolsError::MalformedIndex { msg, .. } => assert!(msg.contains("chunk")),
        other => panic!("expected MalformedIndex, got {:?}", other),
    }
}

#[test]
fn test_empty_index_no_references() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_bai(dir.path(), "none.bai", &[]);

    let index = BaiIndex::from_path(&path).unwrap();
    assert!(index.references.is_empty());
}
