//! Rasterizer capability and the shared types that cross it.
//!
//! The normalization core never touches pixels itself. Decoding, drawing
//! under a transform, resampling, and encoding are delegated to a
//! [`Rasterizer`], so the same orientation and compression logic runs
//! against a canvas adapter, a GPU path, or the CPU implementation in
//! [`RustRasterizer`](super::rust_backend::RustRasterizer).
//!
//! The core reaches the rasterizer only through [`Bounded`], which tags
//! each failure with the [`Stage`] it happened in and enforces the
//! caller-supplied per-call timeout. The timeout reaches the adapter as a
//! [`Deadline`] so it can stop its own work; the `*_within` trait methods
//! are where an adapter checks it.

use super::orientation::AffineTransform;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("draw failed: {0}")]
    Draw(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// Instant a rasterizer call has to finish by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Never expires.
    pub const NONE: Self = Self(None);

    /// `limit` from now, or no deadline at all.
    pub fn after(limit: Option<Duration>) -> Self {
        Self(limit.map(|l| Instant::now() + l))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn is_expired(self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    pub fn remaining(self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// `Err(DeadlineExceeded)` once the deadline has passed.
    pub fn check(self) -> Result<(), RasterError> {
        if self.is_expired() {
            Err(RasterError::DeadlineExceeded)
        } else {
            Ok(())
        }
    }
}

/// Pixel dimensions of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    pub fn pixel_count(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Scale both edges by `factor`, rounding, never collapsing below 1px.
    pub fn scaled(self, factor: f64) -> Self {
        let scale = |edge: u32| ((f64::from(edge) * factor).round() as u32).max(1);
        Self {
            width: scale(self.width),
            height: scale(self.height),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Container format the rasterizer encodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

impl OutputFormat {
    /// PNG for PNG containers, JPEG for everything else.
    pub fn sniff(bytes: &[u8]) -> Self {
        if bytes.starts_with(PNG_SIGNATURE) {
            Self::Png
        } else {
            Self::Jpeg
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!("unknown output format '{other}' (expected jpeg or png)")),
        }
    }
}

/// Pixel operations the normalization core depends on.
///
/// `Pixels` is whatever the platform uses for a decoded raster: a
/// `DynamicImage`, a canvas handle, a GPU texture. The core only moves
/// values of this type between calls and asks for their dimensions.
pub trait Rasterizer: Sync {
    type Pixels;

    /// Decode an encoded container into pixels.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Pixels, RasterError>;

    fn dimensions(&self, pixels: &Self::Pixels) -> Dimensions;

    /// Draw `pixels` onto a fresh canvas of `transform.canvas` size, mapping
    /// source coordinates through `transform.matrix`.
    fn draw(
        &self,
        pixels: &Self::Pixels,
        transform: &AffineTransform,
    ) -> Result<Self::Pixels, RasterError>;

    /// Encode pixels. `quality` is in `(0, 1]`; lossless formats may map it
    /// to compression effort or ignore it.
    fn encode(
        &self,
        pixels: &Self::Pixels,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, RasterError>;

    /// Encoder setting `quality` maps to for `format`. Qualities with the
    /// same level must encode identically. Defaults to whole percent.
    fn quality_level(&self, _format: OutputFormat, quality: f32) -> u32 {
        (quality * 100.0).round() as u32
    }

    /// Read dimensions without keeping the pixels around.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, RasterError> {
        let pixels = self.decode(bytes)?;
        Ok(self.dimensions(&pixels))
    }

    /// Resample to exactly `to`. Defaults to drawing under a scale transform.
    fn resize(&self, pixels: &Self::Pixels, to: Dimensions) -> Result<Self::Pixels, RasterError> {
        let from = self.dimensions(pixels);
        self.draw(pixels, &AffineTransform::scale(from, to))
    }

    /// [`decode`](Self::decode) that gives up with
    /// [`RasterError::DeadlineExceeded`] once `deadline` passes.
    ///
    /// The `*_within` defaults only check the deadline before starting.
    /// Adapters that can stop part way through override them.
    fn decode_within(&self, bytes: &[u8], deadline: Deadline) -> Result<Self::Pixels, RasterError> {
        deadline.check()?;
        self.decode(bytes)
    }

    fn draw_within(
        &self,
        pixels: &Self::Pixels,
        transform: &AffineTransform,
        deadline: Deadline,
    ) -> Result<Self::Pixels, RasterError> {
        deadline.check()?;
        self.draw(pixels, transform)
    }

    fn resize_within(
        &self,
        pixels: &Self::Pixels,
        to: Dimensions,
        deadline: Deadline,
    ) -> Result<Self::Pixels, RasterError> {
        deadline.check()?;
        self.resize(pixels, to)
    }

    fn encode_within(
        &self,
        pixels: &Self::Pixels,
        format: OutputFormat,
        quality: f32,
        deadline: Deadline,
    ) -> Result<Vec<u8>, RasterError> {
        deadline.check()?;
        self.encode(pixels, format, quality)
    }
}

/// Pipeline stage a rasterizer call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Decode,
    Orient,
    Encode,
    Downscale,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Decode => "decode",
            Self::Orient => "orient",
            Self::Encode => "encode",
            Self::Downscale => "downscale",
        })
    }
}

#[derive(Error, Debug)]
pub enum StageError {
    #[error("rasterizer failed during {stage}: {source}")]
    Raster {
        stage: Stage,
        #[source]
        source: RasterError,
    },
    #[error("rasterizer timed out during {stage} after {elapsed:?} (limit {limit:?})")]
    TimedOut {
        stage: Stage,
        elapsed: Duration,
        limit: Duration,
    },
}

impl StageError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Raster { stage, .. } | Self::TimedOut { stage, .. } => *stage,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }
}

/// A rasterizer paired with the caller's per-call timeout.
///
/// Each call gets a fresh [`Deadline`] through the `*_within` methods. A call
/// that gives up on it, or that returns after the limit anyway, is reported
/// as [`StageError::TimedOut`] and its result is dropped.
pub struct Bounded<'a, R: ?Sized> {
    rasterizer: &'a R,
    timeout: Option<Duration>,
}

impl<'a, R: Rasterizer + ?Sized> Bounded<'a, R> {
    pub fn new(rasterizer: &'a R, timeout: Option<Duration>) -> Self {
        Self {
            rasterizer,
            timeout,
        }
    }

    fn call<T>(
        &self,
        stage: Stage,
        op: impl FnOnce(&R, Deadline) -> Result<T, RasterError>,
    ) -> Result<T, StageError> {
        let started = Instant::now();
        let result = op(self.rasterizer, Deadline::after(self.timeout));
        let elapsed = started.elapsed();
        if let Some(limit) = self.timeout {
            let gave_up = matches!(result, Err(RasterError::DeadlineExceeded));
            if gave_up || elapsed > limit {
                return Err(StageError::TimedOut {
                    stage,
                    elapsed,
                    limit,
                });
            }
        }
        result.map_err(|source| StageError::Raster { stage, source })
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<R::Pixels, StageError> {
        self.call(Stage::Decode, |r, d| r.decode_within(bytes, d))
    }

    pub fn dimensions(&self, pixels: &R::Pixels) -> Dimensions {
        self.rasterizer.dimensions(pixels)
    }

    pub fn quality_level(&self, format: OutputFormat, quality: f32) -> u32 {
        self.rasterizer.quality_level(format, quality)
    }

    pub fn draw(
        &self,
        pixels: &R::Pixels,
        transform: &AffineTransform,
    ) -> Result<R::Pixels, StageError> {
        self.call(Stage::Orient, |r, d| r.draw_within(pixels, transform, d))
    }

    pub fn resize(&self, pixels: &R::Pixels, to: Dimensions) -> Result<R::Pixels, StageError> {
        self.call(Stage::Downscale, |r, d| r.resize_within(pixels, to, d))
    }

    pub fn encode(
        &self,
        stage: Stage,
        pixels: &R::Pixels,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, StageError> {
        self.call(stage, |r, d| r.encode_within(pixels, format, quality, d))
    }
}
