// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use crate::codec::Encoding;

pub(super) trait EncodingFormat {
    fn wgpu_format(&self) -> wgpu::TextureFormat;
    fn sample_type(&self) -> wgpu::TextureSampleType;
}

impl EncodingFormat for Encoding {
    fn wgpu_format(&self) -> wgpu::TextureFormat {
        match self {
            Encoding::NativeFloat => wgpu::TextureFormat::R32Float,
            Encoding::PackedBytes => wgpu::TextureFormat::Rgba8Uint,
        }
    }

    fn sample_type(&self) -> wgpu::TextureSampleType {
        match self {
            //R32Float is not filterable without an extra feature; we only textureLoad anyway
            Encoding::NativeFloat => wgpu::TextureSampleType::Float { filterable: false },
            Encoding::PackedBytes => wgpu::TextureSampleType::Uint,
        }
    }
}

/// Usages an encoding's format must allow for inputs, outputs and readback.
pub(super) const REQUIRED_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::RENDER_ATTACHMENT
    .union(wgpu::TextureUsages::TEXTURE_BINDING)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Rounds a row of `width` texels up to the copy alignment.
pub(super) fn padded_bytes_per_row(width: u32) -> u32 {
    let unaligned = width * crate::codec::BYTES_PER_TEXEL as u32;
    unaligned.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}
