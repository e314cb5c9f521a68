//! # snapfit
//!
//! Client-side image normalization for photo uploads. Phones store pixels in
//! sensor order and record the intended rotation in an EXIF tag; upload
//! targets want upright pixels under a byte budget. snapfit does both.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Orient     bytes  →  upright pixels   (EXIF tag → affine redraw)
//! 2. Fit        pixels →  bytes ≤ budget   (quality steps → bounded downscale)
//! ```
//!
//! Both stages call into an injected [`imaging::Rasterizer`] for every pixel
//! operation, so the orientation and compression logic is tested against a
//! recording mock and runs unchanged over any decode/draw/encode backend.
//! Portrait validation runs beside the pipeline on the upright dimensions.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | EXIF reader, orientation transforms, rasterizer, size-bounded encoder, pipeline, validation |
//! | [`config`] | `snapfit.toml` loading, validation, and merging over stock defaults |
//! | [`naming`] | Collision-free output file names for a batch |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fail Soft on Metadata, Loud on Pixels
//!
//! A missing or corrupt EXIF block is not an error: the image is treated as
//! upright. Rasterizer failures and unreachable budgets are typed errors that
//! name the stage, and the pipeline never substitutes the original bytes.
//! Whether to fall back is the caller's decision.
//!
//! ## Never Over Budget
//!
//! The encoder either returns bytes within the budget or an error. A downscale
//! that would shrink the image below the configured floor is refused rather
//! than producing something unusable.
//!
//! ## Raw Byte Sizes
//!
//! Budgets compare raw encoded bytes. Any base64 or data-URL wrapping done by
//! a transport layer is not counted.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;

#[cfg(test)]
pub(crate) mod test_helpers;
