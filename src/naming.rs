//! Output file names for a `normalize` batch.
//!
//! Every output lands in one flat directory, named after its input's file
//! stem. The extension follows the encoded format, so two inputs that share
//! a stem would otherwise race for the same file:
//!
//! - `a/photo.jpg` and `b/photo.jpg` → `photo`, `photo-2`
//! - `photo.jpg` and `photo.png` (both re-encoded to JPEG) → `photo`, `photo-2`
//!
//! Suffixes are assigned in input order, and stems are compared
//! case-insensitively so names stay distinct on case-insensitive filesystems.

use log::debug;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Stem used when a path has none (e.g. `..`).
const FALLBACK_STEM: &str = "image";

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_STEM.to_string())
}

/// One distinct output stem per input, in input order.
pub fn output_stems(inputs: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();
    inputs
        .iter()
        .map(|path| {
            let base = file_stem(path);
            let mut stem = base.clone();
            let mut n = 1;
            while !taken.insert(stem.to_lowercase()) {
                n += 1;
                stem = format!("{base}-{n}");
            }
            if n > 1 {
                debug!("{} shares its name, writing as {stem}", path.display());
            }
            stem
        })
        .collect()
}
