//! Minimal EXIF orientation reader for JPEG byte buffers.
//!
//! Extracts one value: the Orientation tag (0x0112) from IFD0 of the APP1
//! `Exif` segment. No other EXIF fields are decoded.
//!
//! Structure walked:
//!
//! ```text
//! FFD8                         SOI
//! FFEx len payload ...         marker segments (len is big-endian, includes itself)
//! FFE1 len "Exif\0\0" TIFF     APP1
//!     "II"|"MM" 002A off0      TIFF header, byte order for everything below
//!     count {tag type n value}  IFD0, 12-byte entries
//! ```
//!
//! Every anomaly (non-JPEG input, truncation, missing segment, wrong type,
//! out-of-range value) folds into [`OrientationCode::Normal`]. Reads are
//! bounds-checked slices of the input; nothing is copied or allocated.

use super::orientation::OrientationCode;

const SOI: &[u8] = &[0xFF, 0xD8];
const APP1: u8 = 0xE1;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;
const TEM: u8 = 0x01;
const EXIF_SIGNATURE: &[u8] = b"Exif\0\0";
const TIFF_MAGIC: u16 = 42;
const ORIENTATION_TAG: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;
const IFD_ENTRY_LEN: usize = 12;

/// Read the EXIF orientation of a JPEG. Returns `Normal` when absent or unreadable.
pub fn read_orientation(bytes: &[u8]) -> OrientationCode {
    find_exif_tiff(bytes)
        .and_then(orientation_from_tiff)
        .and_then(OrientationCode::from_exif)
        .unwrap_or_default()
}

/// Locate the TIFF block inside the first APP1 segment carrying the Exif signature.
fn find_exif_tiff(data: &[u8]) -> Option<&[u8]> {
    if !data.starts_with(SOI) {
        return None;
    }

    let mut pos = SOI.len();
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];

        // Fill bytes before a marker
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        // Entropy-coded data follows SOS; metadata never comes after it
        if marker == SOS || marker == EOI {
            return None;
        }
        // Markers without a length field
        if marker == TEM || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }

        let len = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        if len < 2 {
            return None;
        }
        let end = pos + 2 + len;
        let segment = data.get(pos + 4..end)?;

        if marker == APP1 {
            // APP1 is also used for XMP; only the Exif one counts
            if let Some(tiff) = segment.strip_prefix(EXIF_SIGNATURE) {
                return Some(tiff);
            }
        }
        pos = end;
    }
    None
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

/// Byte-order-aware reads relative to the TIFF header start.
struct TiffReader<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let order = match data.get(0..2)? {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => return None,
        };
        Some(Self { data, order })
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let b = self.data.get(offset..offset.checked_add(2)?)?;
        Some(match self.order {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let b = self.data.get(offset..offset.checked_add(4)?)?;
        Some(match self.order {
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }
}

/// Walk IFD0 for the Orientation entry and return its raw SHORT value.
fn orientation_from_tiff(tiff: &[u8]) -> Option<u16> {
    let reader = TiffReader::new(tiff)?;
    if reader.u16_at(2)? != TIFF_MAGIC {
        return None;
    }

    let ifd0 = usize::try_from(reader.u32_at(4)?).ok()?;
    let entry_count = usize::from(reader.u16_at(ifd0)?);
    let entries_start = ifd0.checked_add(2)?;

    for i in 0..entry_count {
        let entry = entries_start.checked_add(i * IFD_ENTRY_LEN)?;
        if reader.u16_at(entry)? != ORIENTATION_TAG {
            continue;
        }
        if reader.u16_at(entry + 2)? != TYPE_SHORT {
            return None;
        }
        // SHORT values are left-justified in the 4-byte value field
        return reader.u16_at(entry + 8);
    }
    None
}
