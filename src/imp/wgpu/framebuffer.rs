// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::pixel_format::padded_bytes_per_row;
use super::program::QUAD_VERTEX_COUNT;
use super::{Device, Program, Texture};
use crate::Error;
use crate::matrix::Matrix;
use wgpu::util::DeviceExt;
use wgpu::{Color, LoadOp, Operations, StoreOp};

/**
The long-lived render target of a context.

Each dispatch attaches a fresh color texture, draws into it, reads it back and detaches it.
The readback staging buffer survives between dispatches and only grows.
*/
#[derive(Debug)]
pub(crate) struct Framebuffer {
    max_dimension: u32,
    attachment: Option<Texture>,
    uniforms: Option<wgpu::Buffer>,
    staging: Option<wgpu::Buffer>,
}

fn check_attachment(width: u32, height: u32, max: u32) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::FramebufferIncomplete(format!(
            "zero-sized attachment {width}x{height}"
        )));
    }
    if width > max || height > max {
        return Err(Error::FramebufferIncomplete(format!(
            "attachment {width}x{height} exceeds the device limit of {max}"
        )));
    }
    Ok(())
}

impl Framebuffer {
    pub fn new(device: &Device) -> Self {
        Framebuffer {
            max_dimension: device.max_texture_dimension(),
            attachment: None,
            uniforms: None,
            staging: None,
        }
    }

    /// Attaches a new `width × height` color texture, replacing any previous one.
    pub fn attach(&mut self, device: &Device, width: u32, height: u32) -> Result<(), Error> {
        self.detach();
        check_attachment(width, height, self.max_dimension)?;
        let target = Texture::render_target(device, width, height)
            .map_err(Error::FramebufferIncomplete)?;
        self.attachment = Some(target);
        Ok(())
    }

    /// Destroys the attachment and any per-dispatch buffers.
    pub fn detach(&mut self) {
        self.attachment = None;
        if let Some(uniforms) = self.uniforms.take() {
            uniforms.destroy();
        }
    }

    /// Draws the quad with `program` into the current attachment.
    pub fn draw(
        &mut self,
        device: &Device,
        program: &Program,
        inputs: &[&Texture],
        uniforms: &[u8],
    ) -> Result<(), Error> {
        let Some(target) = &self.attachment else {
            return Err(Error::FramebufferIncomplete(
                "no color attachment".to_string(),
            ));
        };
        if inputs.len() != program.input_count {
            return Err(Error::Dispatch(format!(
                "kernel `{}` binds {} inputs, got {}",
                program.label,
                program.input_count,
                inputs.len()
            )));
        }
        let (uniform_buffer, error) = device.scoped(|d| {
            let uniform_buffer = (program.uniform_size > 0).then(|| {
                d.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("kernel uniforms"),
                    contents: uniforms,
                    usage: wgpu::BufferUsages::UNIFORM,
                })
            });
            let mut entries: Vec<wgpu::BindGroupEntry> = inputs
                .iter()
                .enumerate()
                .map(|(binding, texture)| wgpu::BindGroupEntry {
                    binding: binding as u32,
                    resource: wgpu::BindingResource::TextureView(&texture.view),
                })
                .collect();
            if let Some(buffer) = &uniform_buffer {
                entries.push(wgpu::BindGroupEntry {
                    binding: inputs.len() as u32,
                    resource: buffer.as_entire_binding(),
                });
            }
            let bind_group = d.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&program.label),
                layout: &program.bind_group_layout,
                entries: &entries,
            });

            let mut encoder = d.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(&program.label),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some(&program.label),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &target.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: Operations {
                            load: LoadOp::Clear(Color::TRANSPARENT),
                            store: StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.set_vertex_buffer(0, device.quad().slice(..));
                pass.set_viewport(
                    0.0,
                    0.0,
                    target.width() as f32,
                    target.height() as f32,
                    0.0,
                    1.0,
                );
                pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
            }
            device.queue().submit(std::iter::once(encoder.finish()));
            uniform_buffer
        });
        //released on detach, after the draw has been read back
        self.uniforms = uniform_buffer;
        if let Some(error) = error {
            return Err(Error::Dispatch(error.to_string()));
        }
        logwise::trace_sync!(
            "Drew {label} into {w}x{h}",
            label = logwise::privacy::LogIt(&program.label),
            w = target.width(),
            h = target.height()
        );
        Ok(())
    }

    /// Reads the current attachment back into a matrix.
    pub fn read_back(&mut self, device: &Device) -> Result<Matrix, Error> {
        let Some(target) = &self.attachment else {
            return Err(Error::FramebufferIncomplete(
                "no color attachment".to_string(),
            ));
        };
        copy_out(device, &mut self.staging, target)
    }

    /// Reads any texture back into a matrix through the shared staging buffer.
    pub fn read_texture(&mut self, device: &Device, texture: &Texture) -> Result<Matrix, Error> {
        copy_out(device, &mut self.staging, texture)
    }
}

fn staging_buffer<'a>(
    device: &Device,
    staging: &'a mut Option<wgpu::Buffer>,
    size: u64,
) -> &'a wgpu::Buffer {
    if staging.as_ref().is_some_and(|b| b.size() < size) {
        if let Some(old) = staging.take() {
            old.destroy();
        }
    }
    staging.get_or_insert_with(|| {
        logwise::trace_sync!("Allocating {size} byte staging buffer", size = size);
        device.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback staging"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })
    })
}

fn copy_out(
    device: &Device,
    staging: &mut Option<wgpu::Buffer>,
    texture: &Texture,
) -> Result<Matrix, Error> {
    let _readback_guard = logwise::perfwarn_begin!("texture readback");
    let (width, height) = (texture.width(), texture.height());
    let bytes_per_row = padded_bytes_per_row(width);
    let size = bytes_per_row as u64 * height as u64;
    let buffer = staging_buffer(device, staging, size);

    let ((), error) = device.scoped(|d| {
        let mut encoder = d.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        device.queue().submit(std::iter::once(encoder.finish()));
    });
    if let Some(error) = error {
        return Err(Error::Readback(error.to_string()));
    }

    let (sender, receiver) = std::sync::mpsc::channel();
    buffer.map_async(wgpu::MapMode::Read, ..size, move |result| {
        let _ = sender.send(result);
    });
    device.wait().map_err(Error::Readback)?;
    match receiver.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Readback(e.to_string())),
        Err(_) => {
            return Err(Error::Readback(
                "map callback was dropped without running".to_string(),
            ));
        }
    }
    let matrix = {
        let mapped = buffer.slice(..size).get_mapped_range();
        device.encoding().decode_matrix(
            &mapped,
            bytes_per_row as usize,
            width as usize,
            height as usize,
        )
    };
    buffer.unmap();
    logwise::trace_sync!(
        "Read back {name} {w}x{h}",
        name = logwise::privacy::LogIt(&texture.debug_name()),
        w = width,
        h = height
    );
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::check_attachment;
    use crate::Error;

    #[test]
    fn attachment_respects_the_recorded_limit() {
        assert_eq!(check_attachment(8192, 1, 8192), Ok(()));
        assert!(matches!(
            check_attachment(8193, 1, 8192),
            Err(Error::FramebufferIncomplete(_))
        ));
        assert!(matches!(
            check_attachment(1, 8193, 8192),
            Err(Error::FramebufferIncomplete(_))
        ));
        assert!(matches!(
            check_attachment(0, 4, 8192),
            Err(Error::FramebufferIncomplete(_))
        ));
    }
}
