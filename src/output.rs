//! CLI output formatting for every `snapfit` command.
//!
//! Every file is reported as a header line (positional index + file name)
//! followed by indented context lines:
//!
//! ## Orientation
//!
//! ```text
//! 001 IMG_2041.jpg
//!     Orientation: 6 (rotate 90° clockwise)
//!     Upright: 3024x4032
//! ```
//!
//! ## Validate
//!
//! ```text
//! 001 IMG_2041.jpg: invalid landscape 800x600 (ratio 1.33)
//!     error: image is landscape; portrait orientation is required
//!     hint: Rotate or retake the photo in portrait orientation (taller than wide).
//! ```
//!
//! ## Normalize
//!
//! ```text
//! 001 IMG_2041.jpg
//!     Source: photos/IMG_2041.jpg (4.2 MB)
//!     Orientation: 6 (rotate 90° clockwise) → redrawn 3024x4032
//!     Encode: quality 0.85 after 2 attempts
//!     Output: out/IMG_2041.jpg (986.4 KB)
//!
//! Normalized 3 files, 1 failed
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::imaging::{
    Dimensions, EncodeStage, Normalized, OrientationCode, OrientationValidation,
};
use serde::Serialize;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn file_header(index: usize, name: &str) -> String {
    format!("{} {}", format_index(index), name)
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `4.2 MB`.
pub fn format_bytes(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

fn orientation_label(code: OrientationCode) -> String {
    format!("{} ({})", code.to_exif(), code.describe())
}

// ============================================================================
// orientation
// ============================================================================

pub fn format_orientation(
    index: usize,
    name: &str,
    code: OrientationCode,
    upright: Option<Dimensions>,
) -> Vec<String> {
    let mut lines = vec![
        file_header(index, name),
        format!("    Orientation: {}", orientation_label(code)),
    ];
    match upright {
        Some(dims) => lines.push(format!("    Upright: {}", dims)),
        None => lines.push("    Upright: (unreadable)".to_string()),
    }
    lines
}

pub fn print_orientation(
    index: usize,
    name: &str,
    code: OrientationCode,
    upright: Option<Dimensions>,
) {
    for line in format_orientation(index, name, code, upright) {
        println!("{}", line);
    }
}

// ============================================================================
// validate
// ============================================================================

pub fn format_validation(
    index: usize,
    name: &str,
    dims: Dimensions,
    validation: &OrientationValidation,
) -> Vec<String> {
    let status = if validation.is_valid { "valid" } else { "invalid" };
    let mut lines = vec![format!(
        "{}: {} {} {} (ratio {:.2})",
        file_header(index, name),
        status,
        validation.orientation,
        dims,
        validation.aspect_ratio
    )];
    lines.extend(validation.errors.iter().map(|e| format!("    error: {}", e)));
    lines.extend(validation.warnings.iter().map(|w| format!("    warning: {}", w)));
    if !validation.is_valid {
        lines.extend(validation.feedback.iter().map(|f| format!("    hint: {}", f)));
    }
    lines
}

pub fn print_validation(
    index: usize,
    name: &str,
    dims: Dimensions,
    validation: &OrientationValidation,
) {
    for line in format_validation(index, name, dims, validation) {
        println!("{}", line);
    }
}

/// One `validate --json` entry.
#[derive(Debug, Serialize)]
pub struct ValidationRecord<'a> {
    pub path: &'a str,
    pub dimensions: Dimensions,
    #[serde(flatten)]
    pub validation: &'a OrientationValidation,
}

pub fn format_validation_json(records: &[ValidationRecord<'_>]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

// ============================================================================
// normalize
// ============================================================================

/// Format one normalized file.
///
/// ```text
/// 001 IMG_2041.jpg
///     Source: photos/IMG_2041.jpg (4.2 MB)
///     Orientation: 6 (rotate 90° clockwise) → redrawn 3024x4032
///     Encode: quality 0.85 after 2 attempts
///     Output: out/IMG_2041.jpg (986.4 KB)
/// ```
pub fn format_normalized(
    index: usize,
    source: &str,
    input_len: usize,
    destination: &str,
    result: &Normalized,
) -> Vec<String> {
    let name = file_name(source);
    let mut lines = vec![
        file_header(index, name),
        format!("    Source: {} ({})", source, format_bytes(input_len)),
    ];

    let orientation = orientation_label(result.orientation);
    match (result.reoriented, result.dimensions) {
        (true, Some(dims)) => {
            lines.push(format!("    Orientation: {} → redrawn {}", orientation, dims))
        }
        _ => lines.push(format!("    Orientation: {}", orientation)),
    }

    if let Some(summary) = &result.compression {
        let line = match summary.stage {
            EncodeStage::Original => "    Encode: within budget, unchanged".to_string(),
            EncodeStage::QualityReduced => format!(
                "    Encode: quality {:.2} after {} attempts",
                summary.quality, summary.attempts
            ),
            EncodeStage::Downscaled => format!(
                "    Encode: downscaled to {} at quality {:.2} after {} attempts",
                result
                    .dimensions
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                summary.quality,
                summary.attempts
            ),
        };
        lines.push(line);
    }

    lines.push(format!(
        "    Output: {} ({})",
        destination,
        format_bytes(result.bytes.len())
    ));
    lines
}

pub fn print_normalized(
    index: usize,
    source: &str,
    input_len: usize,
    destination: &str,
    result: &Normalized,
) {
    for line in format_normalized(index, source, input_len, destination, result) {
        println!("{}", line);
    }
}

pub fn format_failure(index: usize, source: &str, error: &str) -> Vec<String> {
    vec![
        file_header(index, file_name(source)),
        format!("    Source: {}", source),
        format!("    Failed: {}", error),
    ]
}

pub fn print_failure(index: usize, source: &str, error: &str) {
    for line in format_failure(index, source, error) {
        println!("{}", line);
    }
}

pub fn format_summary(verb: &str, total: usize, failed: usize) -> String {
    let noun = if total == 1 { "file" } else { "files" };
    if failed == 0 {
        format!("{} {} {}", verb, total, noun)
    } else {
        format!("{} {} {}, {} failed", verb, total, noun, failed)
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}
