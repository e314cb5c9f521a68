//! Pure Rust software rasterizer.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory` |
//! | Identify | `image::ImageReader::into_dimensions` (header only) |
//! | Draw under transform | inverse-mapped nearest-neighbour remap, per color type |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1–100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (quality → compression effort) |
//!
//! Decoding never applies EXIF orientation; that is the pipeline's job.
//!
//! ## Deadlines
//!
//! Drawing checks the deadline before every row. Decode, resize and encode
//! run inside single `image` calls, so the deadline is checked around them
//! and around the color conversion that precedes an encode.

use super::backend::{Deadline, Dimensions, OutputFormat, RasterError, Rasterizer};
use super::orientation::{AffineTransform, Matrix};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageBuffer, ImageEncoder, ImageReader, Pixel};
use std::io::Cursor;

/// CPU rasterizer over the `image` crate.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustRasterizer;

impl RustRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Map `(0, 1]` quality onto the encoder's 1–100 scale.
fn quality_percent(quality: f32) -> u8 {
    (quality.clamp(0.01, 1.0) * 100.0).round() as u8
}

/// PNG effort level: 0 fast, 1 default, 2 best.
fn png_effort(quality: f32) -> u32 {
    if quality >= 0.85 {
        0
    } else if quality >= 0.5 {
        1
    } else {
        2
    }
}

/// Copy each destination pixel from the source pixel its center maps back to.
///
/// Integer-coefficient transforms (all eight orientations) land exactly on
/// source pixel centers, so orientation correction is lossless.
fn remap<P: Pixel>(
    src: &ImageBuffer<P, Vec<P::Subpixel>>,
    canvas: Dimensions,
    inverse: &Matrix,
    deadline: Deadline,
) -> Result<ImageBuffer<P, Vec<P::Subpixel>>, RasterError> {
    let (sw, sh) = (f64::from(src.width()), f64::from(src.height()));
    let mut out = ImageBuffer::new(canvas.width, canvas.height);
    for (_, row) in out.enumerate_rows_mut() {
        deadline.check()?;
        for (dx, dy, px) in row {
            let (sx, sy) = inverse.apply(f64::from(dx) + 0.5, f64::from(dy) + 0.5);
            let (sx, sy) = (sx.floor(), sy.floor());
            if sx >= 0.0 && sy >= 0.0 && sx < sw && sy < sh {
                *px = *src.get_pixel(sx as u32, sy as u32);
            }
        }
    }
    Ok(out)
}

/// Draw preserving the source color type and bit depth.
fn draw_affine(
    img: &DynamicImage,
    transform: &AffineTransform,
    deadline: Deadline,
) -> Result<DynamicImage, RasterError> {
    let canvas = transform.canvas;
    if canvas.width == 0 || canvas.height == 0 {
        return Err(RasterError::Draw(format!("empty canvas {canvas}")));
    }
    let inverse = transform
        .matrix
        .invert()
        .ok_or_else(|| RasterError::Draw("transform is not invertible".into()))?;

    let d = deadline;
    Ok(match img {
        DynamicImage::ImageLuma8(b) => DynamicImage::ImageLuma8(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageLumaA8(b) => DynamicImage::ImageLumaA8(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageRgb8(b) => DynamicImage::ImageRgb8(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageRgba8(b) => DynamicImage::ImageRgba8(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageLuma16(b) => DynamicImage::ImageLuma16(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageLumaA16(b) => {
            DynamicImage::ImageLumaA16(remap(b, canvas, &inverse, d)?)
        }
        DynamicImage::ImageRgb16(b) => DynamicImage::ImageRgb16(remap(b, canvas, &inverse, d)?),
        DynamicImage::ImageRgba16(b) => DynamicImage::ImageRgba16(remap(b, canvas, &inverse, d)?),
        other => DynamicImage::ImageRgba8(remap(&other.to_rgba8(), canvas, &inverse, d)?),
    })
}

/// JPEG is 8-bit without alpha: grayscale stays L8, everything else goes to RGB8.
fn encode_jpeg(img: &DynamicImage, quality: f32, deadline: Deadline) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality_percent(quality));
    let result = if img.color().has_color() {
        let rgb = img.to_rgb8();
        deadline.check()?;
        encoder.write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
    } else {
        let luma = img.to_luma8();
        deadline.check()?;
        encoder.write_image(
            luma.as_raw(),
            luma.width(),
            luma.height(),
            image::ExtendedColorType::L8,
        )
    };
    result.map_err(|e| RasterError::Encode(format!("JPEG: {e}")))?;
    Ok(buf)
}

/// PNG is lossless: lower quality buys more compression effort, not fewer bits per pixel.
fn encode_png(img: &DynamicImage, quality: f32) -> Result<Vec<u8>, RasterError> {
    let compression = match png_effort(quality) {
        0 => CompressionType::Fast,
        1 => CompressionType::Default,
        _ => CompressionType::Best,
    };

    let mut buf = Vec::new();
    let encoder = PngEncoder::new_with_quality(&mut buf, compression, PngFilter::Adaptive);
    let result = match img {
        DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
            DynamicImage::ImageRgba16(img.to_rgba16()).write_with_encoder(encoder)
        }
        _ => img.write_with_encoder(encoder),
    };
    result.map_err(|e| RasterError::Encode(format!("PNG: {e}")))?;
    Ok(buf)
}

impl Rasterizer for RustRasterizer {
    type Pixels = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, RasterError> {
        image::load_from_memory(bytes).map_err(|e| RasterError::Decode(e.to_string()))
    }

    fn dimensions(&self, pixels: &DynamicImage) -> Dimensions {
        Dimensions::new(pixels.width(), pixels.height())
    }

    fn draw(
        &self,
        pixels: &DynamicImage,
        transform: &AffineTransform,
    ) -> Result<DynamicImage, RasterError> {
        draw_affine(pixels, transform, Deadline::NONE)
    }

    fn encode(
        &self,
        pixels: &DynamicImage,
        format: OutputFormat,
        quality: f32,
    ) -> Result<Vec<u8>, RasterError> {
        self.encode_within(pixels, format, quality, Deadline::NONE)
    }

    /// JPEG quality is whole percent; PNG has three effort levels.
    fn quality_level(&self, format: OutputFormat, quality: f32) -> u32 {
        match format {
            OutputFormat::Jpeg => u32::from(quality_percent(quality)),
            OutputFormat::Png => png_effort(quality),
        }
    }

    fn decode_within(&self, bytes: &[u8], deadline: Deadline) -> Result<DynamicImage, RasterError> {
        deadline.check()?;
        let img = self.decode(bytes)?;
        deadline.check()?;
        Ok(img)
    }

    fn draw_within(
        &self,
        pixels: &DynamicImage,
        transform: &AffineTransform,
        deadline: Deadline,
    ) -> Result<DynamicImage, RasterError> {
        draw_affine(pixels, transform, deadline)
    }

    fn resize_within(
        &self,
        pixels: &DynamicImage,
        to: Dimensions,
        deadline: Deadline,
    ) -> Result<DynamicImage, RasterError> {
        deadline.check()?;
        let resized = self.resize(pixels, to)?;
        deadline.check()?;
        Ok(resized)
    }

    fn encode_within(
        &self,
        pixels: &DynamicImage,
        format: OutputFormat,
        quality: f32,
        deadline: Deadline,
    ) -> Result<Vec<u8>, RasterError> {
        deadline.check()?;
        let bytes = match format {
            OutputFormat::Jpeg => encode_jpeg(pixels, quality, deadline)?,
            OutputFormat::Png => encode_png(pixels, quality)?,
        };
        deadline.check()?;
        Ok(bytes)
    }

    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, RasterError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RasterError::Decode(e.to_string()))?
            .into_dimensions()
            .map_err(|e| RasterError::Decode(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, pixels: &DynamicImage, to: Dimensions) -> Result<DynamicImage, RasterError> {
        if to.width == 0 || to.height == 0 {
            return Err(RasterError::Draw(format!("cannot resize to {to}")));
        }
        Ok(pixels.resize_exact(to.width, to.height, FilterType::Lanczos3))
    }
}
