//! Load/save through the filesystem.

use std::fs;

use luma_io::{DEFAULT_QUALITY, IoError, RgbaImage, load, save};
use tempfile::tempdir;

fn gradient(width: u32, height: u32) -> RgbaImage {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            data.extend_from_slice(&[r, g, 128, (x + y) as u8]);
        }
    }
    RgbaImage::new(width, height, data).unwrap()
}

#[test]
fn test_png_roundtrip_is_lossless() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("gradient.png");

    let image = gradient(37, 21);
    save(&path, &image, DEFAULT_QUALITY).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!(loaded, image);
}

#[test]
fn test_jpeg_roundtrip_drops_alpha() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("solid.jpg");

    let image = RgbaImage::filled(32, 24, [255, 255, 255, 10]);
    save(&path, &image, DEFAULT_QUALITY).unwrap();
    let loaded = load(&path).unwrap();

    assert_eq!((loaded.width, loaded.height), (32, 24));
    for px in loaded.data.chunks_exact(4) {
        assert!(px[0] >= 250 && px[1] >= 250 && px[2] >= 250, "{:?}", px);
        assert_eq!(px[3], 255);
    }
}

#[test]
fn test_header_overrides_extension() {
    let dir = tempdir().unwrap();
    let png_path = dir.path().join("real.png");
    let misnamed = dir.path().join("actually_png.jpg");

    let image = gradient(5, 3);
    save(&png_path, &image, DEFAULT_QUALITY).unwrap();
    fs::copy(&png_path, &misnamed).unwrap();

    assert_eq!(load(&misnamed).unwrap(), image);
}

#[test]
fn test_missing_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing.jpg");
    match load(&path) {
        Err(IoError::ImageLoadFailed { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected ImageLoadFailed, got {:?}", other),
    }
}

#[test]
fn test_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.png");
    fs::write(&path, [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0]).unwrap();
    assert!(matches!(load(&path), Err(IoError::ImageLoadFailed { .. })));
}

#[test]
fn test_unknown_format_is_a_load_failure() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    fs::write(&path, b"plain text").unwrap();
    match load(&path) {
        Err(IoError::ImageLoadFailed { path: p, reason }) => {
            assert_eq!(p, path);
            assert_eq!(reason, "unsupported format");
        }
        other => panic!("expected ImageLoadFailed, got {:?}", other),
    }
}

#[test]
fn test_save_unknown_extension_is_unsupported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.bmp");
    let image = RgbaImage::filled(1, 1, [0, 0, 0, 255]);
    assert!(matches!(
        save(&path, &image, DEFAULT_QUALITY),
        Err(IoError::UnsupportedFormat(_))
    ));
    assert!(!path.exists());
}

#[test]
fn test_save_into_missing_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("no_such_dir").join("out.png");
    let image = RgbaImage::filled(2, 2, [0, 0, 0, 255]);
    assert!(matches!(
        save(&path, &image, DEFAULT_QUALITY),
        Err(IoError::ImageSaveFailed { .. })
    ));
}
