// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The GPU context and its lifetime.
//!
//! A [`ContextManager`] creates at most one [`Context`], lazily, on the first call to
//! [`ContextManager::get_context`]. The outcome is cached either way: later calls return the same
//! `Arc<Context>`, or the same [`Error::ContextUnavailable`], without touching the device again.
//!
//! A [`Context`] owns the device, the compiled-kernel cache and the shared output framebuffer.
//! It also exposes the texture store: [`Context::matrix_to_texture`],
//! [`Context::texture_to_matrix`] and [`Context::release_texture`].

use crate::Error;
use crate::codec::Encoding;
use crate::config::ContextOptions;
use crate::imp;
use crate::kernel::{CompiledKernel, KernelSource};
use crate::matrix::Matrix;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, TryLockError};

/// Owns the one GPU context of a [`crate::Compute`].
pub struct ContextManager {
    options: ContextOptions,
    context: OnceLock<Result<Arc<Context>, Error>>,
}

impl ContextManager {
    /// A manager that will create its context from `options` on first use.
    pub fn new(options: ContextOptions) -> Self {
        ContextManager {
            options,
            context: OnceLock::new(),
        }
    }

    /// A manager configured from the environment; see [`crate::config`].
    pub fn from_env() -> Self {
        Self::new(ContextOptions::from_env_or_default())
    }

    /// A manager that hands out a context the caller already created.
    pub fn with_context(context: Arc<Context>) -> Self {
        let manager = Self::new(ContextOptions::default());
        let _ = manager.context.set(Ok(context));
        manager
    }

    /// A manager whose context is never available, so every kernel runs on the CPU.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        let manager = Self::new(ContextOptions {
            disable_gpu: true,
            ..ContextOptions::default()
        });
        let _ = manager
            .context
            .set(Err(Error::ContextUnavailable(reason.into())));
        manager
    }

    /// Returns the context, creating it on the first call.
    pub fn get_context(&self) -> Result<Arc<Context>, Error> {
        self.context
            .get_or_init(|| {
                let result = Context::new(&self.options);
                if let Err(e) = &result {
                    logwise::warn_sync!(
                        "GPU context unavailable, kernels will run on the CPU: {e}",
                        e = logwise::privacy::LogIt(e)
                    );
                }
                result
            })
            .clone()
    }

    /// Whether a context creation has been attempted (or one was supplied).
    pub fn is_initialized(&self) -> bool {
        self.context.get().is_some()
    }

    pub fn options(&self) -> &ContextOptions {
        &self.options
    }
}

impl Default for ContextManager {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Debug for ContextManager {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextManager")
            .field("options", &self.options)
            .field("context", &self.context.get())
            .finish()
    }
}

/// An initialized GPU device with its kernel cache and output framebuffer.
pub struct Context {
    pub(crate) device: imp::Device,
    framebuffer: Mutex<imp::Framebuffer>,
    pub(crate) kernels: Mutex<HashMap<KernelSource, Result<Arc<CompiledKernel>, Error>>>,
}

impl Context {
    /// Creates a device and its framebuffer, blocking until the adapter and device are ready.
    pub fn new(options: &ContextOptions) -> Result<Arc<Self>, Error> {
        let device = test_executors::sleep_on(imp::Device::new(options))?;
        let framebuffer = imp::Framebuffer::new(&device);
        Ok(Arc::new(Context {
            device,
            framebuffer: Mutex::new(framebuffer),
            kernels: Mutex::new(HashMap::new()),
        }))
    }

    /// The texel encoding selected for this device.
    pub fn encoding(&self) -> Encoding {
        self.device.encoding()
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.device.max_texture_dimension()
    }

    pub fn adapter_name(&self) -> &str {
        self.device.adapter_name()
    }

    /// Encodes `matrix` into a new input texture.
    pub fn matrix_to_texture(&self, debug_name: &str, matrix: &Matrix) -> Result<Texture, Error> {
        imp::Texture::upload(&self.device, debug_name, matrix).map(Texture)
    }

    /// Reads a texture back and decodes it.
    ///
    /// Shares the readback path with dispatch, so it fails with [`Error::Busy`] while a kernel
    /// is running on this context.
    pub fn texture_to_matrix(&self, texture: &Texture) -> Result<Matrix, Error> {
        let mut framebuffer = self.try_lock_framebuffer()?;
        framebuffer.read_texture(&self.device, &texture.0)
    }

    /// Destroys a texture.
    pub fn release_texture(&self, texture: Texture) {
        logwise::trace_sync!(
            "Releasing texture {name}",
            name = logwise::privacy::LogIt(&texture.0.debug_name())
        );
        drop(texture);
    }

    /// Takes exclusive use of the framebuffer for one dispatch.
    pub(crate) fn begin_dispatch(&self) -> Result<Dispatch<'_>, Error> {
        let framebuffer = self.try_lock_framebuffer()?;
        Ok(Dispatch {
            device: &self.device,
            framebuffer,
        })
    }

    fn try_lock_framebuffer(&self) -> Result<MutexGuard<'_, imp::Framebuffer>, Error> {
        match self.framebuffer.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(Error::Busy),
            //a panic mid-dispatch leaves nothing we can't reset on the next attach
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    /// Number of distinct kernel sources compiled (or failed) on this context.
    pub fn compiled_kernel_count(&self) -> usize {
        self.kernels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("device", &self.device)
            .field("compiled_kernels", &self.compiled_kernel_count())
            .finish()
    }
}

/// A matrix resident on the GPU, one encoded value per texel.
#[derive(Debug)]
pub struct Texture(pub(crate) imp::Texture);

impl Texture {
    /// Width in texels (the matrix's column count).
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    /// Height in texels (the matrix's row count).
    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

/**
Exclusive use of a context's framebuffer for one dispatch.

Dropping it detaches and destroys the output attachment, on success and on error alike.
*/
pub(crate) struct Dispatch<'a> {
    device: &'a imp::Device,
    framebuffer: MutexGuard<'a, imp::Framebuffer>,
}

impl Dispatch<'_> {
    /// Attaches a fresh `width × height` color texture to the framebuffer.
    pub fn make_output_target(&mut self, width: u32, height: u32) -> Result<(), Error> {
        self.framebuffer.attach(self.device, width, height)
    }

    pub fn draw(
        &mut self,
        program: &imp::Program,
        inputs: &[&imp::Texture],
        uniforms: &[u8],
    ) -> Result<(), Error> {
        self.framebuffer.draw(self.device, program, inputs, uniforms)
    }

    pub fn read_back(&mut self) -> Result<Matrix, Error> {
        self.framebuffer.read_back(self.device)
    }
}

impl Drop for Dispatch<'_> {
    fn drop(&mut self) {
        self.framebuffer.detach();
    }
}
