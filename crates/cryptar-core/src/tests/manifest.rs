use std::io::Cursor;

use crate::error::CryptarError;
use crate::manifest::{
    DirEntry, Entry, FileEntry, ManifestReader, ManifestWriter, SymlinkEntry, Timespec,
};

fn sample_entries() -> Vec<Entry> {
    vec![
        Entry::Dir(DirEntry {
            path: "tree".into(),
            mode: 0o40755,
            owner: 1000,
            group: 1000,
            mtime: Timespec::new(1_700_000_000, 123_456_789),
        }),
        Entry::File(FileEntry {
            path: "tree/a.txt".into(),
            mode: 0o100644,
            owner: 1000,
            group: 1000,
            size: 6,
            mtime: Timespec::new(1_700_000_001, 0),
            mime: "text/plain".into(),
            digest: [0x5A; 32],
        }),
        Entry::Symlink(SymlinkEntry {
            path: "tree/b".into(),
            target: "a.txt".into(),
        }),
        Entry::File(FileEntry {
            path: "tree/empty".into(),
            mode: 0o100600,
            owner: 0,
            group: 0,
            size: 0,
            mtime: Timespec::new(0, 0),
            mime: String::new(),
            digest: [0u8; 32],
        }),
    ]
}

fn encode(entries: &[Entry], compress: bool) -> Vec<u8> {
    let mut writer = ManifestWriter::new(Vec::new(), compress).unwrap();
    for e in entries {
        writer.entry(e).unwrap();
    }
    writer.finish().unwrap()
}

fn decode_all(bytes: &[u8]) -> Vec<Entry> {
    let mut reader = ManifestReader::new(Cursor::new(bytes)).unwrap();
    let mut out = Vec::new();
    while let Some(e) = reader.next().unwrap() {
        out.push(e);
    }
    out
}

#[test]
fn roundtrip_raw() {
    let entries = sample_entries();
    assert_eq!(decode_all(&encode(&entries, false)), entries);
}

#[test]
fn roundtrip_gzip() {
    let entries = sample_entries();
    let encoded = encode(&entries, true);
    assert_eq!(decode_all(&encoded), entries);
}

#[test]
fn empty_manifest_roundtrips() {
    for compress in [false, true] {
        let encoded = encode(&[], compress);
        assert!(decode_all(&encoded).is_empty());
    }
}

#[test]
fn header_is_uncompressed_even_with_gzip_body() {
    let encoded = encode(&sample_entries(), true);
    // version (4 bytes) then the literal compression tag.
    assert_eq!(&encoded[0..4], &[0, 0, 0, 1]);
    assert_eq!(&encoded[4..8], b"gzip");
}

#[test]
fn gzip_body_is_smaller_for_repetitive_entries() {
    let mut entries = Vec::new();
    for i in 0..200 {
        entries.push(Entry::Dir(DirEntry {
            path: format!("dir/sub{i:04}"),
            mode: 0o40755,
            owner: 1000,
            group: 1000,
            mtime: Timespec::new(1_700_000_000, 0),
        }));
    }
    let raw = encode(&entries, false);
    let gz = encode(&entries, true);
    assert!(gz.len() < raw.len());
}

#[test]
fn unknown_tag_is_fatal() {
    let mut encoded = encode(&[], false);
    encoded.extend_from_slice(b"blob");
    encoded.extend_from_slice(&[0u8; 32]);

    let mut reader = ManifestReader::new(Cursor::new(encoded)).unwrap();
    match reader.next().unwrap_err() {
        CryptarError::UnknownEntryType(tag) => assert_eq!(&tag, b"blob"),
        other => panic!("expected UnknownEntryType, got: {other}"),
    }
}

#[test]
fn bad_version_rejected() {
    let mut encoded = encode(&[], false);
    encoded[3] = 9;
    let err = ManifestReader::new(Cursor::new(encoded)).unwrap_err();
    assert!(matches!(err, CryptarError::BadManifest(_)));
}

#[test]
fn bad_compression_tag_rejected() {
    let mut encoded = encode(&[], false);
    encoded[4..8].copy_from_slice(b"zstd");
    let err = ManifestReader::new(Cursor::new(encoded)).unwrap_err();
    match err {
        CryptarError::BadCompression(tag) => assert_eq!(&tag, b"zstd"),
        other => panic!("expected BadCompression, got: {other}"),
    }
}

#[test]
fn truncated_final_record_reports_bad_manifest() {
    let entries = sample_entries();
    let mut encoded = encode(&entries, false);
    encoded.truncate(encoded.len() - 2);

    let mut reader = ManifestReader::new(Cursor::new(encoded)).unwrap();
    let mut decoded = Vec::new();
    let err = loop {
        match reader.next() {
            Ok(Some(e)) => decoded.push(e),
            Ok(None) => panic!("truncated manifest must not end cleanly"),
            Err(e) => break e,
        }
    };
    // Everything before the cut was readable.
    assert_eq!(decoded, entries[..entries.len() - 1]);
    assert!(matches!(err, CryptarError::BadManifest(_)));
}

#[test]
fn truncated_tag_reports_bad_manifest() {
    let entries = sample_entries();
    let full = encode(&entries[..1], false);
    // Chop into the middle of a following entry tag.
    let mut encoded = full.clone();
    encoded.extend_from_slice(&b"fil"[..]);

    let mut reader = ManifestReader::new(Cursor::new(encoded)).unwrap();
    assert!(reader.next().unwrap().is_some());
    assert!(matches!(
        reader.next().unwrap_err(),
        CryptarError::BadManifest(_)
    ));
}

#[test]
fn file_entry_payload_flag() {
    let entries = sample_entries();
    let Entry::File(with_payload) = &entries[1] else {
        panic!()
    };
    let Entry::File(empty) = &entries[3] else {
        panic!()
    };
    assert!(with_payload.has_payload());
    assert!(!empty.has_payload());
}
