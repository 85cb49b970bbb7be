use crate::compress::{gunzip, gzip, PARALLEL_THRESHOLD};

#[test]
fn small_payload_roundtrips() {
    let data = b"hello gzip world";
    let compressed = gzip(data).unwrap();
    assert_eq!(gunzip(&compressed, data.len()).unwrap(), data);
}

#[test]
fn empty_payload_roundtrips() {
    let compressed = gzip(b"").unwrap();
    assert!(gunzip(&compressed, 0).unwrap().is_empty());
}

#[test]
fn parallel_payload_roundtrips() {
    let size = PARALLEL_THRESHOLD as usize + 1;
    let data: Vec<u8> = (0..size).map(|i| (i / 7 % 256) as u8).collect();
    let compressed = gzip(&data).unwrap();
    assert_eq!(gunzip(&compressed, size).unwrap(), data);
}

#[test]
fn output_is_standard_gzip_either_way() {
    let small = gzip(&vec![0u8; 128]).unwrap();
    let large = gzip(&vec![0u8; PARALLEL_THRESHOLD as usize + 1]).unwrap();
    // gzip magic + deflate method byte.
    assert_eq!(&small[..3], &[0x1f, 0x8b, 0x08]);
    assert_eq!(&large[..3], &[0x1f, 0x8b, 0x08]);
}

#[test]
fn garbage_input_is_corrupt_payload() {
    let err = gunzip(&[0xde, 0xad, 0xbe, 0xef], 16).unwrap_err();
    assert!(matches!(
        err,
        crate::error::CryptarError::CorruptPayload(_)
    ));
}

#[test]
fn size_hint_is_only_a_hint() {
    let data = vec![0x42u8; 4096];
    let compressed = gzip(&data).unwrap();
    assert_eq!(gunzip(&compressed, 0).unwrap(), data);
    assert_eq!(gunzip(&compressed, usize::MAX).unwrap(), data);
}
