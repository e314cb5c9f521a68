//! Portrait-frame validation for upload gating.
//!
//! Classifies final display dimensions against a portrait target:
//!
//! ```text
//!            target − tol      target      target + tol
//!   too tall ──────┤ ─ ─ ─ ─ ─ ─ ┼ ─ ─ ─ ─ ─ ─ ├────── too wide
//!                  └─ edge ─┘         └─ edge ─┘
//! ```
//!
//! Every rule runs, so an 800×600 image reports both the ratio and the
//! orientation. Warnings never affect `is_valid`.

use super::backend::Dimensions;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Slack for float rounding on the tolerance band edges.
const RATIO_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortraitRequirements {
    pub min_width: u32,
    pub min_height: u32,
    /// Width / height of the ideal frame (0.75 is 3:4).
    pub preferred_aspect_ratio: f64,
    /// Absolute allowed deviation from the preferred ratio.
    pub tolerance: f64,
    /// Fraction of `tolerance` past which a "near the edge" warning is given.
    pub edge_warning: f64,
    pub recommended_width: u32,
    pub recommended_height: u32,
}

impl Default for PortraitRequirements {
    fn default() -> Self {
        Self {
            min_width: 400,
            min_height: 800,
            preferred_aspect_ratio: 0.75,
            tolerance: 0.05,
            edge_warning: 0.6,
            recommended_width: 600,
            recommended_height: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameOrientation {
    Portrait,
    Landscape,
    Square,
}

impl fmt::Display for FrameOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Portrait => "portrait",
            Self::Landscape => "landscape",
            Self::Square => "square",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrientationValidation {
    pub is_valid: bool,
    pub aspect_ratio: f64,
    pub orientation: FrameOrientation,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub feedback: Vec<String>,
}

pub fn classify(dims: Dimensions) -> FrameOrientation {
    use std::cmp::Ordering;
    match dims.width.cmp(&dims.height) {
        Ordering::Greater => FrameOrientation::Landscape,
        Ordering::Equal => FrameOrientation::Square,
        Ordering::Less => FrameOrientation::Portrait,
    }
}

/// Width / height, or 0 for an empty image.
pub fn aspect_ratio(dims: Dimensions) -> f64 {
    if dims.height == 0 {
        return 0.0;
    }
    f64::from(dims.width) / f64::from(dims.height)
}

/// Human form of a ratio, `0.75` → `"3:4"` when it is a small fraction.
fn ratio_label(ratio: f64) -> String {
    for den in 1..=16u32 {
        let num = ratio * f64::from(den);
        if (num - num.round()).abs() < 1e-6 && num.round() >= 1.0 {
            return format!("{}:{den}", num.round() as u32);
        }
    }
    format!("{ratio:.2}")
}

pub fn validate(dims: Dimensions, req: &PortraitRequirements) -> OrientationValidation {
    let orientation = classify(dims);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();
    let mut feedback = Vec::new();

    if dims.width == 0 || dims.height == 0 {
        errors.push(format!("image has no pixels ({dims})"));
        feedback.push("Choose a different photo; this file has no visible content.".to_string());
        return OrientationValidation {
            is_valid: false,
            aspect_ratio: aspect_ratio(dims),
            orientation,
            errors,
            warnings,
            feedback,
        };
    }

    let ratio = aspect_ratio(dims);
    let target = req.preferred_aspect_ratio;
    let frame = ratio_label(target);

    // Resolution floor
    if dims.width < req.min_width || dims.height < req.min_height {
        errors.push(format!(
            "resolution {dims} is below the minimum of {}x{} pixels",
            req.min_width, req.min_height
        ));
        feedback.push(format!(
            "Use a higher-resolution photo, at least {}x{} pixels.",
            req.min_width, req.min_height
        ));
    } else if dims.width < req.recommended_width || dims.height < req.recommended_height {
        warnings.push(format!(
            "resolution {dims} is below the recommended {}x{} pixels",
            req.recommended_width, req.recommended_height
        ));
    }

    // Aspect ratio band
    let deviation = ratio - target;
    if deviation > req.tolerance + RATIO_EPSILON {
        errors.push(format!(
            "image is too wide: aspect ratio {ratio:.2} is above the allowed maximum of {:.2}",
            target + req.tolerance
        ));
        feedback.push(format!(
            "Crop the sides of the photo to reach a {frame} portrait frame."
        ));
    } else if deviation < -req.tolerance - RATIO_EPSILON {
        errors.push(format!(
            "image is too tall/narrow: aspect ratio {ratio:.2} is below the allowed minimum of {:.2}",
            target - req.tolerance
        ));
        feedback.push(format!(
            "Crop the top or bottom of the photo to reach a {frame} portrait frame."
        ));
    } else if deviation.abs() > req.edge_warning * req.tolerance + RATIO_EPSILON {
        warnings.push(format!(
            "aspect ratio {ratio:.2} is near the edge of the acceptable range ({:.2} to {:.2})",
            target - req.tolerance,
            target + req.tolerance
        ));
    }

    // Orientation gate, independent of the ratio band
    if orientation != FrameOrientation::Portrait {
        errors.push(format!(
            "image is {orientation}; portrait orientation is required"
        ));
        feedback.push(
            "Rotate or retake the photo in portrait orientation (taller than wide).".to_string(),
        );
    }

    if errors.is_empty() {
        feedback.push(format!(
            "Great fit: {dims} portrait photo close to the {frame} frame."
        ));
    }

    OrientationValidation {
        is_valid: errors.is_empty(),
        aspect_ratio: ratio,
        orientation,
        errors,
        warnings,
        feedback,
    }
}
