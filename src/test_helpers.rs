//! Shared test utilities: synthetic JPEGs with EXIF orientation, marker images.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let jpeg = with_exif(&encoded_jpeg(80, 60), &exif_app1(6, Endian::Little));
//! assert_eq!(read_orientation(&jpeg), OrientationCode::Rotate90);
//! ```

use image::{ImageEncoder, Rgb, RgbImage};

pub const TYPE_SHORT: u16 = 3;
pub const TYPE_LONG: u16 = 4;

#[derive(Debug, Clone, Copy)]
pub enum Endian {
    Little,
    Big,
}

// =========================================================================
// EXIF segment builders
// =========================================================================

fn put_u16(out: &mut Vec<u8>, v: u16, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
    }
}

/// TIFF block (header + IFD0) with an ImageWidth entry followed by an
/// Orientation entry of the given type.
pub fn tiff_block(orientation: u16, endian: Endian, value_type: u16) -> Vec<u8> {
    let mut tiff = Vec::new();
    tiff.extend_from_slice(match endian {
        Endian::Little => b"II",
        Endian::Big => b"MM",
    });
    put_u16(&mut tiff, 42, endian);
    put_u32(&mut tiff, 8, endian);

    // IFD0: 2 entries
    put_u16(&mut tiff, 2, endian);
    // ImageWidth (0x0100), LONG, 1, 640
    put_u16(&mut tiff, 0x0100, endian);
    put_u16(&mut tiff, TYPE_LONG, endian);
    put_u32(&mut tiff, 1, endian);
    put_u32(&mut tiff, 640, endian);
    // Orientation (0x0112), value in the first 2 bytes of the value field
    put_u16(&mut tiff, 0x0112, endian);
    put_u16(&mut tiff, value_type, endian);
    put_u32(&mut tiff, 1, endian);
    put_u16(&mut tiff, orientation, endian);
    put_u16(&mut tiff, 0, endian);
    // Next IFD: none
    put_u32(&mut tiff, 0, endian);
    tiff
}

/// Wrap a payload in a JPEG marker segment (`FF xx len payload`).
pub fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
    let len = (payload.len() + 2) as u16;
    let mut out = vec![0xFF, marker];
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Complete APP1 segment carrying an Exif orientation tag.
pub fn exif_app1(orientation: u16, endian: Endian) -> Vec<u8> {
    exif_app1_typed(orientation, endian, TYPE_SHORT)
}

pub fn exif_app1_typed(orientation: u16, endian: Endian, value_type: u16) -> Vec<u8> {
    let mut payload = b"Exif\0\0".to_vec();
    payload.extend(tiff_block(orientation, endian, value_type));
    segment(0xE1, &payload)
}

/// Insert marker segments directly after the SOI of an encoded JPEG.
pub fn with_exif(jpeg: &[u8], app1: &[u8]) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");
    let mut out = jpeg[..2].to_vec();
    out.extend_from_slice(app1);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Marker-only JPEG skeleton: SOI, JFIF APP0, the given segments, SOS stub, EOI.
pub fn jpeg_skeleton(segments: &[Vec<u8>]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    out.extend(segment(0xE0, b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0"));
    for s in segments {
        out.extend_from_slice(s);
    }
    out.extend(segment(0xDA, &[0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]));
    out.extend_from_slice(&[0x12, 0x34, 0xFF, 0xD9]);
    out
}

// =========================================================================
// Encoded images
// =========================================================================

/// Gradient RGB image.
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// Black image with a single red pixel at the top-left corner.
pub fn marker_image(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::new(width, height);
    img.put_pixel(0, 0, Rgb([255, 0, 0]));
    img
}

pub fn encoded_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, 90)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

pub fn encoded_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

/// Deterministic per-pixel noise: compresses badly at any quality.
pub fn noise(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.max(1);
    RgbImage::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state & 0xFF) as u8
        };
        Rgb([next(), next(), next()])
    })
}
