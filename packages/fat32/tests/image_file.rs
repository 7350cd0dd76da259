use std::{
    fs::{File, OpenOptions},
    path::Path,
};

use fat32::{format_volume, AccessMode, ErrorKind, FatError, FormatOptions, Session, Volume};
use tempfile::tempdir;

fn fresh_image(path: &Path, total_sectors: u32) {
    let mut file = File::create(path).expect("create image file");
    format_volume(&mut file, &FormatOptions::with_total_sectors(total_sectors))
        .expect("format image");
}

fn open_image(path: &Path) -> File {
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("reopen image file")
}

#[test]
fn formatted_file_has_full_length_and_mounts() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("disk.img");
    fresh_image(&path, 4096);

    let len = std::fs::metadata(&path).expect("image metadata").len();
    assert_eq!(len, 4096 * 512);

    let volume = Volume::mount(open_image(&path)).expect("mount image");
    assert_eq!(volume.layout().root_cluster, 2);
}

#[test]
fn changes_survive_remount() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("disk.img");
    fresh_image(&path, 4096);

    let mut session = Session::mount(open_image(&path), "disk.img").expect("mount");
    session.create_directory("DOCS").expect("mkdir");
    session.change_directory("DOCS").expect("cd");
    session.create_file("NOTE.TXT").expect("creat");
    session.open("NOTE.TXT", AccessMode::Write).expect("open");
    let body = "line\n".repeat(300);
    session.write("NOTE.TXT", body.as_bytes()).expect("write");
    drop(session.unmount().expect("unmount"));

    let mut session = Session::mount(open_image(&path), "disk.img").expect("remount");
    session.change_directory("DOCS").expect("cd after remount");
    assert_eq!(session.size("NOTE.TXT").expect("size"), body.len() as u32);
    session.open("NOTE.TXT", AccessMode::Read).expect("open for read");
    let outcome = session.read("NOTE.TXT", 10_000).expect("read");
    assert!(outcome.clamped);
    assert_eq!(outcome.data, body.as_bytes());
}

#[test]
fn non_fat_file_is_a_format_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("junk.img");
    std::fs::write(&path, vec![0xA5u8; 8192]).expect("write junk");

    let err = Volume::mount(open_image(&path)).err().expect("mount must fail");
    assert!(matches!(err, FatError::InvalidSignature(_)));
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn truncated_image_is_an_io_error() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("short.img");
    std::fs::write(&path, [0u8; 100]).expect("write stub");

    let err = Volume::mount(open_image(&path)).err().expect("mount must fail");
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn directory_fills_up_without_growing() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("disk.img");
    fresh_image(&path, 2048);

    let mut session = Session::mount(open_image(&path), "disk.img").expect("mount");
    // One 512-byte cluster holds sixteen entries.
    for n in 0..16 {
        session.create_file(&format!("F{n}")).expect("creat within capacity");
    }
    let err = session.create_file("F16").unwrap_err();
    assert!(matches!(err, FatError::DirFull));
    assert_eq!(err.kind(), ErrorKind::CapacityExhausted);

    session.remove_file("F7").expect("rm");
    session.create_file("F16").expect("reuse tombstone");
}
