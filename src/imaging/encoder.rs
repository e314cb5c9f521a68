//! Size-bounded re-encoding.
//!
//! Brings an encoded image under a byte budget in up to three stages:
//!
//! ```text
//! 1. Original     source bytes already fit          → returned untouched
//! 2. Quality      re-encode at 0.90, 0.85, 0.80 ...  → first attempt that fits
//! 3. Downscale    shrink by sqrt(budget / size) × margin, re-encode once
//! ```
//!
//! Stage 3 refuses scale factors below the configured floor, and a resized
//! image that still exceeds the budget is an error. The encoder never
//! returns bytes over budget.
//!
//! Qualities the rasterizer maps to the same encoder setting (see
//! [`Rasterizer::quality_level`]) are tried once, so a lossless target with
//! three effort levels costs three encodes, not fifteen.
//!
//! Sizes are always raw encoded byte counts, never a base64/data-URL length.

use super::backend::{Bounded, Dimensions, OutputFormat, Rasterizer, Stage, StageError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Byte budget and output format for one encode call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionTarget {
    pub max_bytes: usize,
    pub format: OutputFormat,
    /// First quality tried, in `(0, 1]`.
    pub initial_quality: f32,
}

impl CompressionTarget {
    pub fn new(max_bytes: usize, format: OutputFormat) -> Self {
        Self {
            max_bytes,
            format,
            initial_quality: 0.9,
        }
    }

    pub fn with_initial_quality(mut self, quality: f32) -> Self {
        self.initial_quality = quality.clamp(0.01, 1.0);
        self
    }
}

/// Tuning for the quality schedule and the downscale fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderSettings {
    pub quality_step: f32,
    pub min_quality: f32,
    pub max_attempts: usize,
    pub downscale: bool,
    pub safety_margin: f64,
    pub scale_floor: f64,
    pub downscale_quality: f32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            quality_step: 0.05,
            min_quality: 0.1,
            max_attempts: 15,
            downscale: true,
            safety_margin: 0.9,
            scale_floor: 0.3,
            downscale_quality: 0.7,
        }
    }
}

/// Descending quality steps starting at `initial`.
///
/// Computed in integer hundredths so repeated subtraction cannot drift.
/// The initial quality is always tried, even if below `min_quality`.
pub fn quality_schedule(initial: f32, settings: &EncoderSettings) -> Vec<f32> {
    let start = (initial.clamp(0.01, 1.0) * 100.0).round() as i32;
    let step = ((settings.quality_step * 100.0).round() as i32).max(1);
    let floor = ((settings.min_quality * 100.0).round() as i32).max(1);

    (0..settings.max_attempts.max(1) as i32)
        .map(|i| start - i * step)
        .enumerate()
        .take_while(|&(i, q)| i == 0 || q >= floor)
        .map(|(_, q)| q as f32 / 100.0)
        .collect()
}

/// Linear factor expected to bring `reference_bytes` down to `max_bytes`.
///
/// Encoded size scales roughly with pixel count, i.e. with the square of
/// the linear factor.
pub fn downscale_factor(max_bytes: usize, reference_bytes: usize, safety_margin: f64) -> f64 {
    if reference_bytes == 0 {
        return 1.0;
    }
    ((max_bytes as f64 / reference_bytes as f64).sqrt() * safety_margin).min(1.0)
}

/// Already-decoded pixels together with their current encoding.
pub struct RasterHandle<P> {
    pub pixels: P,
    pub encoded: Vec<u8>,
    pub dimensions: Dimensions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodeStage {
    Original,
    QualityReduced,
    Downscaled,
}

/// Bytes that fit the budget and how they were produced.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeAttemptResult {
    pub bytes: Vec<u8>,
    /// Quality of the final encode; `1.0` for untouched source bytes.
    pub quality: f32,
    pub dimensions: Dimensions,
    pub stage: EncodeStage,
    /// Number of re-encodes performed.
    pub attempts: usize,
}

#[derive(Error, Debug)]
pub enum SizeBoundError {
    #[error(
        "no quality step reached {max_bytes} bytes after {attempts} attempts (smallest was {smallest} bytes)"
    )]
    QualityExhausted {
        attempts: usize,
        smallest: usize,
        max_bytes: usize,
    },
    #[error("fitting {max_bytes} bytes needs a {scale:.3}x downscale, below the {floor:.2}x floor")]
    ScaleFloorExceeded {
        scale: f64,
        floor: f64,
        max_bytes: usize,
    },
    #[error("downscaled to {dimensions} but still {size} bytes, over the {max_bytes} byte budget")]
    DownscaleOverBudget {
        dimensions: Dimensions,
        size: usize,
        max_bytes: usize,
    },
    #[error("encoder unavailable: {0}")]
    EncoderUnavailable(#[from] StageError),
    #[error("compression cancelled")]
    Cancelled,
}

impl SizeBoundError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::EncoderUnavailable(e) if e.is_timeout())
    }

    /// Stage the failure is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            Self::QualityExhausted { .. } | Self::Cancelled => Stage::Encode,
            Self::ScaleFloorExceeded { .. } | Self::DownscaleOverBudget { .. } => Stage::Downscale,
            Self::EncoderUnavailable(e) => e.stage(),
        }
    }
}

/// Cooperative cancellation flag, checked between encode attempts.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Drives a [`Rasterizer`] until the encoded image fits the target.
pub struct SizeBoundedEncoder<'a, R: ?Sized> {
    raster: Bounded<'a, R>,
    settings: EncoderSettings,
    cancel: Option<CancelToken>,
}

impl<'a, R: Rasterizer + ?Sized> SizeBoundedEncoder<'a, R> {
    pub fn new(rasterizer: &'a R, settings: EncoderSettings, timeout: Option<Duration>) -> Self {
        Self {
            raster: Bounded::new(rasterizer, timeout),
            settings,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn check_cancelled(&self) -> Result<(), SizeBoundError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(SizeBoundError::Cancelled),
            _ => Ok(()),
        }
    }

    pub fn encode(
        &self,
        source: RasterHandle<R::Pixels>,
        target: &CompressionTarget,
    ) -> Result<EncodeAttemptResult, SizeBoundError> {
        let max_bytes = target.max_bytes;

        if source.encoded.len() <= max_bytes {
            info!(
                "{} bytes already within {} byte budget, keeping original",
                source.encoded.len(),
                max_bytes
            );
            return Ok(EncodeAttemptResult {
                bytes: source.encoded,
                quality: 1.0,
                dimensions: source.dimensions,
                stage: EncodeStage::Original,
                attempts: 0,
            });
        }

        // (encoder level, size) of every over-budget attempt
        let mut sizes: Vec<(u32, usize)> = Vec::new();
        for quality in quality_schedule(target.initial_quality, &self.settings) {
            let level = self.raster.quality_level(target.format, quality);
            if sizes.last().is_some_and(|&(last, _)| last == level) {
                debug!("{} quality {quality:.2} encodes like the previous step, skipping", target.format);
                continue;
            }
            self.check_cancelled()?;
            let bytes = self
                .raster
                .encode(Stage::Encode, &source.pixels, target.format, quality)?;
            debug!(
                "{} at quality {quality:.2}: {} bytes (budget {max_bytes})",
                target.format,
                bytes.len()
            );
            if bytes.len() <= max_bytes {
                return Ok(EncodeAttemptResult {
                    bytes,
                    quality,
                    dimensions: source.dimensions,
                    stage: EncodeStage::QualityReduced,
                    attempts: sizes.len() + 1,
                });
            }
            sizes.push((level, bytes.len()));
        }

        let smallest = sizes
            .iter()
            .map(|&(_, size)| size)
            .min()
            .unwrap_or(source.encoded.len());

        if !self.settings.downscale {
            warn!("quality reduction alone cannot reach {max_bytes} bytes (best {smallest})");
            return Err(SizeBoundError::QualityExhausted {
                attempts: sizes.len(),
                smallest,
                max_bytes,
            });
        }
        self.check_cancelled()?;

        // Scale against the size at downscale_quality, not the last attempt:
        // the resized image is encoded at that quality.
        let downscale_level = self
            .raster
            .quality_level(target.format, self.settings.downscale_quality);
        let reference = sizes
            .iter()
            .find(|&&(level, _)| level == downscale_level)
            .map(|&(_, size)| size)
            .unwrap_or(smallest);

        let scale = downscale_factor(max_bytes, reference, self.settings.safety_margin);
        if scale < self.settings.scale_floor {
            warn!(
                "refusing {scale:.3}x downscale of {} (floor {:.2})",
                source.dimensions, self.settings.scale_floor
            );
            return Err(SizeBoundError::ScaleFloorExceeded {
                scale,
                floor: self.settings.scale_floor,
                max_bytes,
            });
        }

        let dimensions = source.dimensions.scaled(scale);
        info!(
            "downscaling {} → {dimensions} ({scale:.3}x) to fit {max_bytes} bytes",
            source.dimensions
        );
        let resized = self.raster.resize(&source.pixels, dimensions)?;
        drop(source);

        let quality = self.settings.downscale_quality;
        let bytes = self
            .raster
            .encode(Stage::Downscale, &resized, target.format, quality)?;
        if bytes.len() > max_bytes {
            warn!(
                "downscaled {dimensions} is {} bytes, still over {max_bytes}",
                bytes.len()
            );
            return Err(SizeBoundError::DownscaleOverBudget {
                dimensions,
                size: bytes.len(),
                max_bytes,
            });
        }

        Ok(EncodeAttemptResult {
            bytes,
            quality,
            dimensions,
            stage: EncodeStage::Downscaled,
            attempts: sizes.len() + 1,
        })
    }
}
