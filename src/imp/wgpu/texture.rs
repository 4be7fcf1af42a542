// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::Device;
use super::pixel_format::EncodingFormat;
use crate::Error;
use crate::matrix::Matrix;
use std::fmt::Debug;
use wgpu::util::{DeviceExt, TextureDataOrder};

/**
A GPU texture holding one encoded scalar per texel.

The underlying wgpu texture is destroyed when this value drops.
*/
pub(crate) struct Texture {
    pub(super) texture: wgpu::Texture,
    pub(super) view: wgpu::TextureView,
    width: u32,
    height: u32,
    debug_name: String,
}

impl Texture {
    /// Encodes `matrix` and uploads it as a sampled input texture.
    pub fn upload(device: &Device, debug_name: &str, matrix: &Matrix) -> Result<Self, Error> {
        let (width, height) = (matrix.width(), matrix.height());
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        let max = device.max_texture_dimension();
        if width > max as usize || height > max as usize {
            return Err(Error::TextureTooLarge { width, height, max });
        }
        let bytes = device.encoding().encode_matrix(matrix);
        let usage = wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_DST
            | wgpu::TextureUsages::COPY_SRC;
        let descriptor = Self::get_texture_descriptor(
            debug_name,
            width as u32,
            height as u32,
            device.encoding().wgpu_format(),
            usage,
        );
        let (texture, error) = device.scoped(|d| {
            d.create_texture_with_data(device.queue(), &descriptor, TextureDataOrder::LayerMajor, &bytes)
        });
        if let Some(error) = error {
            texture.destroy();
            return Err(Error::Dispatch(format!(
                "upload of `{debug_name}` failed: {error}"
            )));
        }
        logwise::trace_sync!(
            "Uploaded {name} {w}x{h}",
            name = logwise::privacy::LogIt(&debug_name),
            w = width,
            h = height
        );
        Ok(Self::wrap(texture, width as u32, height as u32, debug_name))
    }

    /// Creates a color attachment of the given size.
    ///
    /// Size checks are the caller's; device validation errors are returned as text.
    pub(super) fn render_target(device: &Device, width: u32, height: u32) -> Result<Self, String> {
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        let descriptor = Self::get_texture_descriptor(
            "output attachment",
            width,
            height,
            device.encoding().wgpu_format(),
            usage,
        );
        let (texture, error) = device.scoped(|d| d.create_texture(&descriptor));
        if let Some(error) = error {
            texture.destroy();
            return Err(error.to_string());
        }
        Ok(Self::wrap(texture, width, height, "output attachment"))
    }

    fn wrap(texture: wgpu::Texture, width: u32, height: u32, debug_name: &str) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some(debug_name),
            ..Default::default()
        });
        Texture {
            texture,
            view,
            width,
            height,
            debug_name: debug_name.to_string(),
        }
    }

    fn get_texture_descriptor(
        debug_name: &str,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> wgpu::TextureDescriptor<'_> {
        wgpu::TextureDescriptor {
            label: Some(debug_name),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        self.texture.destroy();
    }
}

impl Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("debug_name", &self.debug_name)
            .finish()
    }
}
