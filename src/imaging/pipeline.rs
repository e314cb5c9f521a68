//! Upload normalization: orientation correction, then size bounding.
//!
//! ```text
//! bytes ─► read_orientation ─┬─ Normal ──────────────────────────────┐
//!                            │                                       ▼
//!                            └─ 2..8 ─► decode ─► draw ─► encode ─► SizeBoundedEncoder ─► bytes
//! ```
//!
//! Already-upright images skip the rasterizer entirely when no target is
//! given or when they already fit it. Every rasterizer failure surfaces with
//! the stage it happened in; the pipeline never falls back to the input.

use super::backend::{Bounded, Dimensions, OutputFormat, Rasterizer, Stage, StageError};
use super::encoder::{
    CancelToken, CompressionTarget, EncodeStage, EncoderSettings, RasterHandle, SizeBoundError,
    SizeBoundedEncoder,
};
use super::exif::read_orientation;
use super::orientation::{self, OrientationCode};
use log::{debug, info};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Compress(#[from] SizeBoundError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            Self::Stage(e) => e.stage(),
            Self::Compress(e) => e.stage(),
        }
    }

    /// True when a rasterizer call exceeded the timeout; worth one retry.
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Stage(e) => e.is_timeout(),
            Self::Compress(e) => e.is_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    pub settings: EncoderSettings,
    /// Quality for re-encoding an orientation-corrected image.
    pub reencode_quality: f32,
    /// Per rasterizer call; `None` is unbounded.
    pub timeout: Option<Duration>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            settings: EncoderSettings::default(),
            reencode_quality: 0.92,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EncodeSummary {
    pub stage: EncodeStage,
    pub quality: f32,
    pub attempts: usize,
}

/// Normalized bytes plus what was done to produce them.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub bytes: Vec<u8>,
    /// Orientation found in the input.
    pub orientation: OrientationCode,
    /// Upright dimensions; `None` when the input was never decoded.
    pub dimensions: Option<Dimensions>,
    pub reoriented: bool,
    pub compression: Option<EncodeSummary>,
}

pub struct ImageNormalizationPipeline<'a, R: ?Sized> {
    rasterizer: &'a R,
    options: PipelineOptions,
    cancel: Option<CancelToken>,
}

impl<'a, R: Rasterizer + ?Sized> ImageNormalizationPipeline<'a, R> {
    pub fn new(rasterizer: &'a R, options: PipelineOptions) -> Self {
        Self {
            rasterizer,
            options,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Upright, size-bounded bytes for `bytes`.
    pub fn normalize(
        &self,
        bytes: &[u8],
        target: Option<&CompressionTarget>,
    ) -> Result<Vec<u8>, PipelineError> {
        self.process(bytes, target).map(|n| n.bytes)
    }

    pub fn process(
        &self,
        bytes: &[u8],
        target: Option<&CompressionTarget>,
    ) -> Result<Normalized, PipelineError> {
        let code = read_orientation(bytes);
        let raster = Bounded::new(self.rasterizer, self.options.timeout);

        if code.is_identity() {
            match target {
                None => {
                    debug!("orientation normal, no target: passing {} bytes through", bytes.len());
                    return Ok(passthrough(bytes, code, None));
                }
                Some(t) if bytes.len() <= t.max_bytes => {
                    info!(
                        "orientation normal and {} bytes within {} byte budget",
                        bytes.len(),
                        t.max_bytes
                    );
                    let summary = EncodeSummary {
                        stage: EncodeStage::Original,
                        quality: 1.0,
                        attempts: 0,
                    };
                    return Ok(passthrough(bytes, code, Some(summary)));
                }
                Some(t) => {
                    let pixels = raster.decode(bytes)?;
                    let dimensions = raster.dimensions(&pixels);
                    let handle = RasterHandle {
                        pixels,
                        encoded: bytes.to_vec(),
                        dimensions,
                    };
                    return self.compress(handle, t, code, false);
                }
            }
        }

        let pixels = raster.decode(bytes)?;
        let raw = raster.dimensions(&pixels);
        let (transform, upright) = orientation::compute(code, raw);
        debug!("orientation {} ({}): {raw} → {upright}", code.to_exif(), code.describe());

        let drawn = raster.draw(&pixels, &transform)?;
        drop(pixels);

        let format = target.map_or_else(|| OutputFormat::sniff(bytes), |t| t.format);
        let encoded = raster.encode(Stage::Encode, &drawn, format, self.options.reencode_quality)?;
        info!(
            "reoriented {raw} → {upright} ({}), {} bytes as {format}",
            code.describe(),
            encoded.len()
        );

        match target {
            None => Ok(Normalized {
                bytes: encoded,
                orientation: code,
                dimensions: Some(upright),
                reoriented: true,
                compression: None,
            }),
            Some(t) => {
                let handle = RasterHandle {
                    pixels: drawn,
                    encoded,
                    dimensions: upright,
                };
                self.compress(handle, t, code, true)
            }
        }
    }

    fn compress(
        &self,
        handle: RasterHandle<R::Pixels>,
        target: &CompressionTarget,
        code: OrientationCode,
        reoriented: bool,
    ) -> Result<Normalized, PipelineError> {
        let mut encoder =
            SizeBoundedEncoder::new(self.rasterizer, self.options.settings.clone(), self.options.timeout);
        if let Some(token) = &self.cancel {
            encoder = encoder.with_cancel(token.clone());
        }

        let result = encoder.encode(handle, target)?;
        Ok(Normalized {
            bytes: result.bytes,
            orientation: code,
            dimensions: Some(result.dimensions),
            reoriented,
            compression: Some(EncodeSummary {
                stage: result.stage,
                quality: result.quality,
                attempts: result.attempts,
            }),
        })
    }
}

fn passthrough(bytes: &[u8], code: OrientationCode, compression: Option<EncodeSummary>) -> Normalized {
    Normalized {
        bytes: bytes.to_vec(),
        orientation: code,
        dimensions: None,
        reoriented: false,
        compression,
    }
}
