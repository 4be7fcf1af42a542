// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! shader_matrix offloads dense matrix arithmetic onto a GPU render pipeline, with a CPU fallback
that always works.

Each operation is a fragment-stage kernel. The inputs are uploaded as textures, one value per
texel, the kernel is drawn over a full-screen quad into an output texture the size of the result,
and the output is read back and decoded.

```
use shader_matrix::{Compute, Matrix};

let compute = Compute::new();
let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
let scaled = compute.scale(&a, 2, 2, 2.0, true)?;
assert_eq!(scaled, Matrix::from_rows(&[[2.0, 4.0], [6.0, 8.0]]));
# Ok::<(), shader_matrix::Error>(())
```

# Layers

| Module      | Role                                                                  |
|-------------|-----------------------------------------------------------------------|
| [`context`] | One lazily created GPU context, its framebuffer and its texture store  |
| [`codec`]   | How a value travels through a texel                                   |
| [`kernel`]  | Compiling a WGSL body into a callable [`kernel::Kernel`] and invoking it |
| [`ops`]     | The multiply and scale kernels, with their CPU paths                   |
| [`compute`] | The entry point collaborators call                                    |

# Encodings

Where the adapter can render to `R32Float`, a value is one 32-bit float texel. Elsewhere the
binary32 bit pattern is split over the four channels of an `Rgba8Uint` texel. Either way the GPU
computes in `f32`. An element of a GPU product differs from the CPU one by at most
[`codec::accumulation_tolerance`]`(k)` times `Σ_k |A[i,k]| · |B[k,j]|`, which can be far larger
than the element itself when terms cancel; [`codec::product_agrees`] checks exactly that.

Values a binary32 cannot hold never reach the GPU. The numeric kernels run such calls on the CPU,
as well as any GPU result that overflowed from finite inputs, and [`kernel::Kernel::invoke`]
rejects them with [`Error::ValueOutOfRange`].

# Fallback

If no GPU context can be created, or a kernel fails to compile, that kernel runs on the CPU from
then on. Callers see the same matrices either way. Set `SHADER_MATRIX_DISABLE_GPU=1` to force the
CPU path; see [`config`] for the other knobs.

# Backends

The `backend_wgpu` feature (on by default) selects [wgpu](https://wgpu.rs). Without it every
context is unavailable and every kernel runs on the CPU.
*/

pub mod benchmark;
pub mod codec;
pub mod compute;
pub mod config;
pub mod context;
mod error;
mod imp;
pub mod kernel;
pub mod matrix;
pub mod ops;
pub mod uniform;

pub use codec::Encoding;
pub use compute::Compute;
pub use context::{Context, ContextManager};
pub use error::Error;
pub use kernel::{Kernel, KernelInput, KernelSource};
pub use matrix::Matrix;
pub use ops::KernelState;
pub use uniform::{UniformType, UniformValue};

logwise::declare_logging_domain!();
