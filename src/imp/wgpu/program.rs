// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use super::Device;
use super::pixel_format::EncodingFormat;
use crate::Error;
use std::num::NonZero;
use wgpu::{
    BindGroupLayoutEntry, BindingType, BufferBindingType, ColorTargetState, MultisampleState,
    PipelineLayoutDescriptor, PolygonMode, PrimitiveState, PrimitiveTopology, RenderPipeline,
    RenderPipelineDescriptor, TextureViewDimension, VertexAttribute, VertexBufferLayout,
    VertexState, VertexStepMode,
};

/// Full-screen quad as a triangle strip: position (x, y, z), texture coordinate (u, v).
///
/// Texture coordinate (0, 0) is the top-left texel, row 0 of the matrix.
pub(super) const QUAD_VERTICES: [[f32; 5]; 4] = [
    [-1.0, -1.0, 0.0, 0.0, 1.0],
    [1.0, -1.0, 0.0, 1.0, 1.0],
    [-1.0, 1.0, 0.0, 0.0, 0.0],
    [1.0, 1.0, 0.0, 1.0, 0.0],
];
pub(super) const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;
const QUAD_STRIDE: u64 = 5 * 4;

const QUAD_ATTRIBUTES: [VertexAttribute; 2] = [
    //position
    VertexAttribute {
        format: wgpu::VertexFormat::Float32x3,
        offset: 0,
        shader_location: 0,
    },
    //texture coordinate
    VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 3 * 4,
        shader_location: 1,
    },
];

/**
A linked render pipeline for one kernel.

Bindings in group 0: input textures at `0..input_count`, then the uniform buffer (if any).
*/
#[derive(Debug)]
pub(crate) struct Program {
    pub(super) pipeline: RenderPipeline,
    pub(super) bind_group_layout: wgpu::BindGroupLayout,
    pub(super) input_count: usize,
    pub(super) uniform_size: u64,
    pub(super) label: String,
}

impl Program {
    pub fn compile(
        device: &Device,
        label: &str,
        wgsl: &str,
        input_count: usize,
        uniform_size: u64,
    ) -> Result<Self, Error> {
        let (module, error) = device.scoped(|d| {
            d.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(std::borrow::Cow::Borrowed(wgsl)),
            })
        });
        if let Some(error) = error {
            return Err(Error::ShaderCompile {
                label: label.to_string(),
                message: error.to_string(),
            });
        }

        let encoding = device.encoding();
        let mut layouts = Vec::with_capacity(input_count + 1);
        for binding in 0..input_count {
            layouts.push(BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: encoding.sample_type(),
                    view_dimension: TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None, //not array
            });
        }
        if let Some(size) = NonZero::new(uniform_size) {
            layouts.push(BindGroupLayoutEntry {
                binding: input_count as u32,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: Some(size),
                },
                count: None,
            });
        }

        let ((bind_group_layout, pipeline), error) = device.scoped(|d| {
            let bind_group_layout = d.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries: layouts.as_slice(),
            });
            let pipeline_layout = d.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });
            let vertex_buffers = [VertexBufferLayout {
                array_stride: QUAD_STRIDE,
                step_mode: VertexStepMode::Vertex,
                attributes: &QUAD_ATTRIBUTES,
            }];
            let render_descriptor = RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &vertex_buffers,
                },
                primitive: PrimitiveState {
                    topology: PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    //the quad must cover every texel regardless of winding
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(ColorTargetState {
                        format: encoding.wgpu_format(),
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            };
            let pipeline = d.create_render_pipeline(&render_descriptor);
            (bind_group_layout, pipeline)
        });
        if let Some(error) = error {
            return Err(Error::ShaderLink {
                label: label.to_string(),
                message: error.to_string(),
            });
        }
        logwise::trace_sync!(
            "Created render pipeline {label}",
            label = logwise::privacy::LogIt(&label)
        );
        Ok(Program {
            pipeline,
            bind_group_layout,
            input_count,
            uniform_size,
            label: label.to_string(),
        })
    }
}
