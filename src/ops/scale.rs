// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Elementwise scaling by a constant.

use super::multiply::check_shape;
use super::{KernelSlot, KernelState, fits_binary32, overflowed};
use crate::Error;
use crate::context::ContextManager;
use crate::kernel::{KernelInput, KernelSource};
use crate::matrix::{Matrix, scale_cpu};
use crate::uniform::{UniformType, UniformValue};

const SCALE_BODY: &str = r#"fn kernel(uv: vec2<f32>) -> f32 {
    return params.factor * read_mtx(uv);
}
"#;

pub(crate) fn scale_source() -> KernelSource {
    KernelSource::new("matrix_scale", SCALE_BODY)
        .input("mtx")
        .uniform("factor", UniformType::Float)
}

/// `factor · A` on the GPU, or on the CPU when asked to or when the GPU is unusable.
#[derive(Debug)]
pub struct MatrixScale {
    slot: KernelSlot,
}

impl MatrixScale {
    pub fn new() -> Self {
        MatrixScale {
            slot: KernelSlot::new(scale_source()),
        }
    }

    pub fn state(&self) -> KernelState {
        self.slot.state()
    }

    pub fn fallback_reason(&self) -> Option<Error> {
        self.slot.fallback_reason()
    }

    /// Scales the `rows × cols` matrix `a` by `factor`.
    pub fn scale(
        &self,
        contexts: &ContextManager,
        a: &Matrix,
        rows: usize,
        cols: usize,
        factor: f64,
        use_gpu: bool,
    ) -> Result<Matrix, Error> {
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        check_shape("A", a, cols, rows)?;
        if !use_gpu {
            return Ok(scale_cpu(a, factor));
        }
        if !fits_binary32(&[a], &[factor]) {
            logwise::trace_sync!("Inputs exceed binary32; scaling on the CPU");
            return Ok(scale_cpu(a, factor));
        }
        let Some(kernel) = self.slot.kernel(contexts)? else {
            return Ok(scale_cpu(a, factor));
        };
        let scaled = kernel.invoke(
            &[KernelInput::with_dimensions("mtx", a, cols, rows)],
            &[("factor", UniformValue::Float(factor as f32))],
            cols,
            rows,
        )?;
        if overflowed(&scaled, &[a], &[factor]) {
            logwise::trace_sync!("Scaled values overflowed binary32; scaling on the CPU");
            return Ok(scale_cpu(a, factor));
        }
        Ok(scaled)
    }
}

impl Default for MatrixScale {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_scenario_on_cpu() {
        let op = MatrixScale::new();
        let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
        let scaled = op
            .scale(&ContextManager::unavailable("cpu"), &a, 2, 2, 2.0, false)
            .unwrap();
        assert_eq!(scaled, Matrix::from_rows(&[[2.0, 4.0], [6.0, 8.0]]));
    }

    #[test]
    fn forced_fallback_matches_cpu() {
        let op = MatrixScale::new();
        let contexts = ContextManager::unavailable("cpu");
        let a = Matrix::from_fn(3, 5, |r, c| r as f64 * 1.25 - c as f64);
        let gpu = op.scale(&contexts, &a, 3, 5, -0.75, true).unwrap();
        let cpu = op.scale(&contexts, &a, 3, 5, -0.75, false).unwrap();
        assert_eq!(gpu, cpu);
        assert_eq!(op.state(), KernelState::PermanentlyFallback);
    }

    #[test]
    fn rows_and_cols_are_checked() {
        let op = MatrixScale::new();
        let a = Matrix::zeros(2, 3);
        let err = op
            .scale(&ContextManager::unavailable("cpu"), &a, 3, 2, 1.0, false)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                actual_width: 3,
                actual_height: 2,
                ..
            }
        ));
    }

    #[test]
    fn factor_beyond_binary32_never_reaches_the_gpu() {
        let op = MatrixScale::new();
        let contexts = ContextManager::unavailable("cpu");
        let a = Matrix::from_rows(&[[1.0e-30, -2.0e-30]]);
        let scaled = op.scale(&contexts, &a, 1, 2, 1.0e39, true).unwrap();
        assert!(scaled.approx_eq(&Matrix::from_rows(&[[1.0e9, -2.0e9]]), 1e-12));
        //routed before the kernel was asked for
        assert_eq!(op.state(), KernelState::Uncompiled);
    }
}
