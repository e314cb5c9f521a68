//! Image normalization: EXIF orientation, upright redraw, size-bounded encoding.
//!
//! | Operation | Module / function |
//! |---|---|
//! | **Read orientation** | [`exif::read_orientation`], APP1 + TIFF IFD0 walk |
//! | **Upright transform** | [`orientation::compute`], code → affine matrix + canvas |
//! | **Fit a byte budget** | [`SizeBoundedEncoder`], quality schedule then downscale |
//! | **Normalize an upload** | [`ImageNormalizationPipeline`] |
//! | **Gate portrait uploads** | [`validation::validate`] |
//!
//! The module is split into:
//! - **Pure logic**: `exif`, `orientation`, `validation` (no pixels involved)
//! - **Backend**: [`Rasterizer`] trait + [`RustRasterizer`]
//! - **Drivers**: `encoder` and `pipeline`, written against the trait

pub mod backend;
pub mod encoder;
pub mod exif;
pub mod orientation;
pub mod pipeline;
pub mod rust_backend;
pub mod validation;

pub use backend::{Dimensions, OutputFormat, RasterError, Rasterizer, Stage, StageError};
pub use encoder::{
    CancelToken, CompressionTarget, EncodeAttemptResult, EncodeStage, EncoderSettings,
    RasterHandle, SizeBoundError, SizeBoundedEncoder,
};
pub use exif::read_orientation;
pub use orientation::{AffineTransform, Matrix, OrientationCode};
pub use pipeline::{
    EncodeSummary, ImageNormalizationPipeline, Normalized, PipelineError, PipelineOptions,
};
pub use rust_backend::RustRasterizer;
pub use validation::{FrameOrientation, OrientationValidation, PortraitRequirements};
