// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
mod device;
mod error;
mod framebuffer;
mod pixel_format;
mod program;
mod texture;

pub(crate) use device::Device;
pub(crate) use error::Error;
pub(crate) use framebuffer::Framebuffer;
pub(crate) use program::Program;
pub(crate) use texture::Texture;
