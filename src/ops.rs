// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The numeric kernels.
//!
//! Each kernel owns a [`KernelSlot`] that compiles its shader lazily, on the first call that asks
//! for the GPU. The slot moves through
//!
//! ```text
//! Uncompiled -> Compiling -> Ready
//!                         -> PermanentlyFallback
//! ```
//!
//! and never leaves `PermanentlyFallback`: once the context is unavailable or the shader fails to
//! build, every later call runs on the CPU.

pub mod multiply;
pub mod scale;

use crate::Error;
use crate::codec::{first_out_of_range, out_of_range};
use crate::context::ContextManager;
use crate::kernel::{Kernel, KernelSource};
use crate::matrix::Matrix;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use multiply::MatrixMultiply;
pub use scale::MatrixScale;

/// Observable state of a numeric kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelState {
    Uncompiled,
    Compiling,
    Ready,
    PermanentlyFallback,
}

#[derive(Debug)]
enum SlotState {
    Uncompiled,
    Compiling,
    Ready(Kernel),
    PermanentlyFallback(Error),
}

/// Lazily compiled kernel with a one-way fallback.
#[derive(Debug)]
pub(crate) struct KernelSlot {
    source: KernelSource,
    state: Mutex<SlotState>,
}

impl KernelSlot {
    pub fn new(source: KernelSource) -> Self {
        KernelSlot {
            source,
            state: Mutex::new(SlotState::Uncompiled),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> KernelState {
        match &*self.lock() {
            SlotState::Uncompiled => KernelState::Uncompiled,
            SlotState::Compiling => KernelState::Compiling,
            SlotState::Ready(_) => KernelState::Ready,
            SlotState::PermanentlyFallback(_) => KernelState::PermanentlyFallback,
        }
    }

    /// Why the slot fell back, if it did.
    pub fn fallback_reason(&self) -> Option<Error> {
        match &*self.lock() {
            SlotState::PermanentlyFallback(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// Returns the kernel, compiling it first if needed.
    ///
    /// `Ok(None)` means the CPU path should run: the slot is in fallback, or another thread is
    /// compiling right now.
    pub fn kernel(&self, contexts: &ContextManager) -> Result<Option<Kernel>, Error> {
        {
            let mut state = self.lock();
            if let SlotState::Ready(kernel) = &*state {
                return Ok(Some(kernel.clone()));
            }
            if !matches!(*state, SlotState::Uncompiled) {
                return Ok(None);
            }
            *state = SlotState::Compiling;
        }
        //compile without holding the lock so the state stays observable
        let result = contexts
            .get_context()
            .and_then(|context| context.make_kernel(&self.source));
        let mut state = self.lock();
        match result {
            Ok(kernel) => {
                *state = SlotState::Ready(kernel.clone());
                Ok(Some(kernel))
            }
            Err(e) if e.is_fallback_trigger() => {
                logwise::warn_sync!(
                    "Kernel {label} falls back to the CPU permanently: {e}",
                    label = logwise::privacy::LogIt(&self.source.label()),
                    e = logwise::privacy::LogIt(&e)
                );
                *state = SlotState::PermanentlyFallback(e);
                Ok(None)
            }
            Err(e) => {
                *state = SlotState::Uncompiled;
                Err(e)
            }
        }
    }
}

/// Whether every matrix element and scalar survives the trip to binary32 without becoming infinite.
pub(crate) fn fits_binary32(matrices: &[&Matrix], scalars: &[f64]) -> bool {
    matrices.iter().all(|m| first_out_of_range(m).is_none())
        && !scalars.iter().any(|s| out_of_range(*s))
}

/// Whether a GPU result overflowed binary32: it has a non-finite element although every input
/// was finite.
pub(crate) fn overflowed(result: &Matrix, matrices: &[&Matrix], scalars: &[f64]) -> bool {
    let finite_inputs = matrices
        .iter()
        .all(|m| m.as_slice().iter().all(|v| v.is_finite()))
        && scalars.iter().all(|s| s.is_finite());
    finite_inputs && result.as_slice().iter().any(|v| !v.is_finite())
}
