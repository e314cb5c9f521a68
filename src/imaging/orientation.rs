//! EXIF orientation codes and the canvas transforms that undo them.
//!
//! ```text
//!     1: Normal      2: MirrorH     3: Rotate180   4: MirrorV
//!     ┌───┐          ┌───┐          ┌───┐          ┌───┐
//!     │ F │          │ Ꟊ │          │   │          │   │
//!     │   │          │   │          │ Ꟊ │          │ F │
//!     └───┘          └───┘          └───┘          └───┘
//!
//!     5: Transpose   6: Rotate90    7: Transverse  8: Rotate270
//!     ┌────┐         ┌────┐         ┌────┐         ┌────┐
//!     │ F  │         │  F │         │  Ꟊ │         │ Ꟊ  │
//!     └────┘         └────┘         └────┘         └────┘
//! ```
//!
//! [`compute`] maps a code and the stored (raw) dimensions to the transform
//! that draws the raw pixels upright, plus the upright canvas size.

use super::backend::Dimensions;
use serde::Serialize;

/// EXIF orientation tag value (1–8).
///
/// Names describe the correction applied to the stored pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u8)]
pub enum OrientationCode {
    #[default]
    Normal = 1,
    MirrorHorizontal = 2,
    Rotate180 = 3,
    MirrorVertical = 4,
    MirrorHorizontalRotate270 = 5,
    Rotate90 = 6,
    MirrorHorizontalRotate90 = 7,
    Rotate270 = 8,
}

impl OrientationCode {
    /// All 8 codes, indexed by EXIF value - 1.
    pub const ALL: [Self; 8] = [
        Self::Normal,
        Self::MirrorHorizontal,
        Self::Rotate180,
        Self::MirrorVertical,
        Self::MirrorHorizontalRotate270,
        Self::Rotate90,
        Self::MirrorHorizontalRotate90,
        Self::Rotate270,
    ];

    /// Create from an EXIF tag value. Returns `None` outside 1–8.
    pub fn from_exif(value: u16) -> Option<Self> {
        match value {
            1..=8 => Some(Self::ALL[usize::from(value) - 1]),
            _ => None,
        }
    }

    pub fn to_exif(self) -> u8 {
        self as u8
    }

    pub fn is_identity(self) -> bool {
        self == Self::Normal
    }

    /// Whether the upright image has width and height exchanged.
    pub fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::MirrorHorizontalRotate270
                | Self::Rotate90
                | Self::MirrorHorizontalRotate90
                | Self::Rotate270
        )
    }

    /// Upright dimensions for an image stored as `raw`.
    pub fn apply_to(self, raw: Dimensions) -> Dimensions {
        if self.swaps_axes() { raw.swapped() } else { raw }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::MirrorHorizontal => "mirror horizontal",
            Self::Rotate180 => "rotate 180°",
            Self::MirrorVertical => "mirror vertical",
            Self::MirrorHorizontalRotate270 => "mirror horizontal, rotate 270° clockwise",
            Self::Rotate90 => "rotate 90° clockwise",
            Self::MirrorHorizontalRotate90 => "mirror horizontal, rotate 90° clockwise",
            Self::Rotate270 => "rotate 270° clockwise",
        }
    }
}

/// 2D affine matrix in canvas convention:
///
/// ```text
/// x' = a·x + c·y + e
/// y' = b·x + d·y + f
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Matrix {
    pub const IDENTITY: Self = Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0);

    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }

    /// Inverse matrix, or `None` when singular.
    pub fn invert(&self) -> Option<Self> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Self {
            a,
            b,
            c,
            d,
            e: -(a * self.e + c * self.f),
            f: -(b * self.e + d * self.f),
        })
    }
}

/// Matrix plus the canvas it draws onto.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub matrix: Matrix,
    pub canvas: Dimensions,
}

impl AffineTransform {
    pub fn identity(canvas: Dimensions) -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            canvas,
        }
    }

    /// Stretch `from` onto a canvas of exactly `to`.
    pub fn scale(from: Dimensions, to: Dimensions) -> Self {
        Self {
            matrix: Matrix::new(
                f64::from(to.width) / f64::from(from.width.max(1)),
                0.0,
                0.0,
                f64::from(to.height) / f64::from(from.height.max(1)),
                0.0,
                0.0,
            ),
            canvas: to,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Matrix::IDENTITY
    }
}

/// Transform that draws pixels stored under `code` upright.
///
/// Total and pure: every code has an entry, and the returned dimensions
/// equal `transform.canvas`.
pub fn compute(code: OrientationCode, src: Dimensions) -> (AffineTransform, Dimensions) {
    let w = f64::from(src.width);
    let h = f64::from(src.height);

    let matrix = match code {
        OrientationCode::Normal => Matrix::IDENTITY,
        OrientationCode::MirrorHorizontal => Matrix::new(-1.0, 0.0, 0.0, 1.0, w, 0.0),
        OrientationCode::Rotate180 => Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h),
        OrientationCode::MirrorVertical => Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, h),
        // Transpose: reflect over the main diagonal
        OrientationCode::MirrorHorizontalRotate270 => Matrix::new(0.0, 1.0, 1.0, 0.0, 0.0, 0.0),
        OrientationCode::Rotate90 => Matrix::new(0.0, 1.0, -1.0, 0.0, h, 0.0),
        // Transverse: reflect over the anti-diagonal
        OrientationCode::MirrorHorizontalRotate90 => Matrix::new(0.0, -1.0, -1.0, 0.0, h, w),
        OrientationCode::Rotate270 => Matrix::new(0.0, -1.0, 1.0, 0.0, 0.0, w),
    };

    let canvas = code.apply_to(src);
    (AffineTransform { matrix, canvas }, canvas)
}
