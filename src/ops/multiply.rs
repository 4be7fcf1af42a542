// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Dense matrix product.

use super::{KernelSlot, KernelState, fits_binary32, overflowed};
use crate::Error;
use crate::context::ContextManager;
use crate::kernel::{KernelInput, KernelSource};
use crate::matrix::{Matrix, multiply_cpu};
use crate::uniform::{UniformType, UniformValue};

/// Longest shared dimension the shader loop walks. Longer products run on the CPU.
pub const MAX_SHARED_DIMENSION: usize = 2048;

//Walks row i of mtx1 and column j of mtx2 at texel centres. The loop bound has to be a
//constant on some backends, so it exits early at the real width.
const MULTIPLY_BODY: &str = r#"fn kernel(uv: vec2<f32>) -> f32 {
    let increment1 = 1.0 / f32(params.width1);
    let increment2 = 1.0 / f32(params.height2);
    var sum = 0.0;
    for (var k = 0; k < 2048; k = k + 1) {
        if (k >= params.width1) {
            break;
        }
        let a = read_mtx1(vec2<f32>((f32(k) + 0.5) * increment1, uv.y));
        let b = read_mtx2(vec2<f32>(uv.x, (f32(k) + 0.5) * increment2));
        sum = sum + a * b;
    }
    return sum;
}
"#;

pub(crate) fn multiply_source() -> KernelSource {
    KernelSource::new("matrix_multiply", MULTIPLY_BODY)
        .input("mtx1")
        .input("mtx2")
        .uniform("width1", UniformType::Int)
        .uniform("height2", UniformType::Int)
}

/// `C = A · B` on the GPU, or on the CPU when asked to or when the GPU is unusable.
#[derive(Debug)]
pub struct MatrixMultiply {
    slot: KernelSlot,
}

impl MatrixMultiply {
    pub fn new() -> Self {
        MatrixMultiply {
            slot: KernelSlot::new(multiply_source()),
        }
    }

    pub fn state(&self) -> KernelState {
        self.slot.state()
    }

    pub fn fallback_reason(&self) -> Option<Error> {
        self.slot.fallback_reason()
    }

    /// Multiplies `a` (`height_a × width_a`) by `b` (`height_b × width_b`).
    ///
    /// Fails with [`Error::DimensionMismatch`] when `width_a != height_b`, before any GPU work.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply(
        &self,
        contexts: &ContextManager,
        a: &Matrix,
        b: &Matrix,
        width_a: usize,
        height_a: usize,
        width_b: usize,
        height_b: usize,
        use_gpu: bool,
    ) -> Result<Matrix, Error> {
        if width_a != height_b {
            return Err(Error::DimensionMismatch { width_a, height_b });
        }
        for (w, h) in [(width_a, height_a), (width_b, height_b)] {
            if w == 0 || h == 0 {
                return Err(Error::InvalidDimensions {
                    width: w,
                    height: h,
                });
            }
        }
        check_shape("A", a, width_a, height_a)?;
        check_shape("B", b, width_b, height_b)?;

        if !use_gpu {
            return Ok(multiply_cpu(a, b));
        }
        if width_a > MAX_SHARED_DIMENSION {
            logwise::trace_sync!(
                "Shared dimension {k} exceeds the shader loop; multiplying on the CPU",
                k = width_a
            );
            return Ok(multiply_cpu(a, b));
        }
        if !fits_binary32(&[a, b], &[]) {
            logwise::trace_sync!("Inputs exceed binary32; multiplying on the CPU");
            return Ok(multiply_cpu(a, b));
        }
        let Some(kernel) = self.slot.kernel(contexts)? else {
            return Ok(multiply_cpu(a, b));
        };
        let product = kernel.invoke(
            &[
                KernelInput::with_dimensions("mtx1", a, width_a, height_a),
                KernelInput::with_dimensions("mtx2", b, width_b, height_b),
            ],
            &[
                ("width1", UniformValue::Int(width_a as i32)),
                ("height2", UniformValue::Int(height_b as i32)),
            ],
            width_b,
            height_a,
        )?;
        if overflowed(&product, &[a, b], &[]) {
            logwise::trace_sync!("Product overflowed binary32; multiplying on the CPU");
            return Ok(multiply_cpu(a, b));
        }
        Ok(product)
    }
}

impl Default for MatrixMultiply {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn check_shape(name: &str, m: &Matrix, width: usize, height: usize) -> Result<(), Error> {
    if m.width() != width || m.height() != height {
        return Err(Error::ShapeMismatch {
            name: name.to_string(),
            declared_width: width,
            declared_height: height,
            actual_width: m.width(),
            actual_height: m.height(),
        });
    }
    Ok(())
}
