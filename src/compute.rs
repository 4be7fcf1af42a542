// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The entry point collaborators call.

use crate::Error;
use crate::context::{Context, ContextManager};
use crate::matrix::Matrix;
use crate::ops::{KernelState, MatrixMultiply, MatrixScale};
use std::sync::Arc;

/**
Matrix arithmetic with a GPU path and a CPU fallback.

Each numeric call takes a `use_gpu` flag. With `use_gpu = false` the CPU runs the operation and no
GPU resource is touched. With `use_gpu = true` the GPU runs it, unless the context is unavailable
or the kernel failed to build, in which case the CPU runs it instead. Either way the caller gets a
correct matrix or an error.

```
use shader_matrix::{Compute, Matrix};

let compute = Compute::cpu_only();
let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
let b = Matrix::from_rows(&[[5.0, 6.0], [7.0, 8.0]]);
let c = compute.multiply(&a, &b, 2, 2, 2, 2, true)?;
assert_eq!(c, Matrix::from_rows(&[[19.0, 22.0], [43.0, 50.0]]));
# Ok::<(), shader_matrix::Error>(())
```
*/
#[derive(Debug)]
pub struct Compute {
    contexts: ContextManager,
    multiply: MatrixMultiply,
    scale: MatrixScale,
}

impl Compute {
    /// Configured from the environment; the GPU context is created on first use.
    pub fn new() -> Self {
        Self::with_manager(ContextManager::from_env())
    }

    pub fn with_manager(contexts: ContextManager) -> Self {
        Compute {
            contexts,
            multiply: MatrixMultiply::new(),
            scale: MatrixScale::new(),
        }
    }

    /// Uses a context the caller already created.
    pub fn with_context(context: Arc<Context>) -> Self {
        Self::with_manager(ContextManager::with_context(context))
    }

    /// Never touches the GPU.
    pub fn cpu_only() -> Self {
        Self::with_manager(ContextManager::unavailable("GPU disabled for this Compute"))
    }

    /// `height_a × width_b` product of `a` and `b`.
    #[allow(clippy::too_many_arguments)]
    pub fn multiply(
        &self,
        a: &Matrix,
        b: &Matrix,
        width_a: usize,
        height_a: usize,
        width_b: usize,
        height_b: usize,
        use_gpu: bool,
    ) -> Result<Matrix, Error> {
        self.multiply.multiply(
            &self.contexts,
            a,
            b,
            width_a,
            height_a,
            width_b,
            height_b,
            use_gpu,
        )
    }

    /// `rows × cols` matrix `a` scaled by `factor`.
    pub fn scale(
        &self,
        a: &Matrix,
        rows: usize,
        cols: usize,
        factor: f64,
        use_gpu: bool,
    ) -> Result<Matrix, Error> {
        self.scale
            .scale(&self.contexts, a, rows, cols, factor, use_gpu)
    }

    pub fn multiply_state(&self) -> KernelState {
        self.multiply.state()
    }

    pub fn scale_state(&self) -> KernelState {
        self.scale.state()
    }

    pub fn multiply_kernel(&self) -> &MatrixMultiply {
        &self.multiply
    }

    pub fn scale_kernel(&self) -> &MatrixScale {
        &self.scale
    }

    pub fn context_manager(&self) -> &ContextManager {
        &self.contexts
    }
}

impl Default for Compute {
    fn default() -> Self {
        Self::new()
    }
}
