#![cfg(feature = "compression")]

mod common;

use std::fs;
use std::io::Write;

use castepbin::source;

use common::Checkpoint;

fn roundtrip(name: &str, packed: Vec<u8>) {
    let file = Checkpoint::default().build();
    let plain = castepbin::decode(std::io::Cursor::new(file), None).unwrap();

    let path = std::env::temp_dir().join(format!("castepbin-{name}-{}", std::process::id()));
    fs::write(&path, packed).unwrap();
    let src = source::open(&path);
    let d = castepbin::decode_path(&path, Some(&["FORCES"]));
    fs::remove_file(&path).unwrap();

    assert!(src.unwrap().is_memory());
    let d = d.unwrap();
    assert_eq!(d.real_array("forces"), plain.real_array("forces"));
}

#[test]
fn zstd_files_are_decompressed() {
    let packed = zstd::stream::encode_all(&Checkpoint::default().build()[..], 3).unwrap();
    roundtrip("zst", packed);
}

#[test]
fn lz4_files_are_decompressed() {
    let mut enc = lz4_flex::frame::FrameEncoder::new(Vec::new());
    enc.write_all(&Checkpoint::default().build()).unwrap();
    roundtrip("lz4", enc.finish().unwrap());
}
