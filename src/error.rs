// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error taxonomy for the compute layer.
//!
//! Context and compile failures are normally absorbed by the numeric kernels into a permanent
//! CPU fallback. Everything else reaches the caller: a call returns either a correct matrix
//! or one of these errors, never silently wrong data.

use crate::uniform::UniformType;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// No GPU device could be obtained (or the backend was compiled out / disabled).
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),
    #[error("shader compile error in kernel `{label}`: {message}")]
    ShaderCompile { label: String, message: String },
    #[error("shader link error in kernel `{label}`: {message}")]
    ShaderLink { label: String, message: String },
    /// The output target cannot be rendered to.
    #[error("framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),
    #[error("dimension mismatch: width of A ({width_a}) must equal height of B ({height_b})")]
    DimensionMismatch { width_a: usize, height_b: usize },
    #[error("invalid dimensions {width}x{height}: width and height must be positive")]
    InvalidDimensions { width: usize, height: usize },
    /// Declared dimensions do not describe the matrix that was passed.
    #[error(
        "matrix `{name}` is {actual_width}x{actual_height} but was declared as {declared_width}x{declared_height}"
    )]
    ShapeMismatch {
        name: String,
        declared_width: usize,
        declared_height: usize,
        actual_width: usize,
        actual_height: usize,
    },
    #[error("texture {width}x{height} exceeds the device limit of {max}")]
    TextureTooLarge { width: usize, height: usize, max: u32 },
    /// A finite value that binary32 cannot hold; on the GPU it would become an infinity.
    #[error("`{name}` holds {value}, outside the binary32 range")]
    ValueOutOfRange { name: String, value: f64 },
    #[error("kernel input `{0}` was not supplied")]
    MissingInput(String),
    #[error("kernel has no input named `{0}`")]
    UnknownInput(String),
    #[error("uniform `{0}` was not supplied")]
    MissingUniform(String),
    #[error("kernel has no uniform named `{0}`")]
    UnknownUniform(String),
    #[error("`{0}` was supplied more than once")]
    DuplicateArgument(String),
    #[error("uniform `{name}` is declared {expected:?} but was given {actual:?}")]
    UniformTypeMismatch {
        name: String,
        expected: UniformType,
        actual: UniformType,
    },
    #[error("draw failed: {0}")]
    Dispatch(String),
    #[error("readback failed: {0}")]
    Readback(String),
    /// Another invocation currently holds the context.
    #[error("the GPU context is busy with another invocation")]
    Busy,
}

impl Error {
    /// Whether this error moves a numeric kernel into permanent fallback.
    pub fn is_fallback_trigger(&self) -> bool {
        matches!(
            self,
            Error::ContextUnavailable(_) | Error::ShaderCompile { .. } | Error::ShaderLink { .. }
        )
    }
}
