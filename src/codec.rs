// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Transport of scalar values through 4-byte texels.
//!
//! Every matrix element travels to the GPU as one texel. There are two encodings:
//!
//! | Encoding | Texture format | Texel bytes |
//! |----------|----------------|-------------|
//! | [`Encoding::NativeFloat`] | `R32Float` | little-endian IEEE-754 binary32 |
//! | [`Encoding::PackedBytes`] | `Rgba8Uint` | binary32 bit pattern split by [`BYTE_LADDER`], R most significant |
//!
//! Native-float is canonical. It needs an adapter that can both sample and render `R32Float`;
//! when it cannot, the context falls back to packed-byte.
//!
//! The byte ladder `[16777216, 65536, 256, 1]` is applied to the *bit pattern* of the value,
//! not to the value itself. Applied to the value it only carries small non-negative integers;
//! applied to the bits it carries the sign, the exponent and the fraction unchanged.
//!
//! # Precision
//!
//! Both encodings are exact at binary32 precision: `decode(encode(x)) == x as f32 as f64`.
//! A finite `f64` within `±f32::MAX` comes back with relative error at most [`VALUE_EPSILON`].
//! Signed zeros, infinities and subnormals survive, NaN stays NaN, and larger magnitudes
//! saturate to infinity. [`first_out_of_range`] finds those before they are encoded.
//!
//! A GPU dot product of `k` terms accumulates in binary32, so its error grows with
//! `Σ |a_k · b_k|` rather than with the size of the result. When terms cancel, the result can be
//! far smaller than its error. [`product_error_bound`] gives the per-element bound and
//! [`product_agrees`] checks a GPU product against the CPU one.
//!
//! ```
//! use shader_matrix::codec::Encoding;
//!
//! let texel = Encoding::PackedBytes.encode(-1.5);
//! assert_eq!(texel, [0xBF, 0xC0, 0x00, 0x00]);
//! assert_eq!(Encoding::PackedBytes.decode(texel), -1.5);
//! ```

use crate::matrix::Matrix;

/// Divisors that split a 32-bit pattern into four 8-bit channels, most significant first.
pub const BYTE_LADDER: [u32; 4] = [16_777_216, 65_536, 256, 1];

pub const BYTES_PER_TEXEL: usize = 4;

/// One encoded scalar, in texture memory order.
pub type Texel = [u8; BYTES_PER_TEXEL];

/// Relative error bound of a single value after an encode/decode round trip (2⁻²⁴).
pub const VALUE_EPSILON: f64 = 1.0 / 16_777_216.0;

/// Tolerance, relative to `Σ |a_k · b_k|`, for a GPU sum of `terms` products against the CPU sum.
///
/// Covers rounding the inputs to binary32 plus binary32 accumulation on the GPU. It is *not* a
/// bound relative to the result; see [`product_error_bound`].
pub fn accumulation_tolerance(terms: usize) -> f64 {
    2.0 * (terms as f64 + 2.0) * VALUE_EPSILON
}

/// Per-element bound on `|gpu - cpu|` for the product `a · b`.
///
/// Element `(i, j)` is `accumulation_tolerance(k) · Σ_k |a[i,k]| · |b[k,j]|`, plus one smallest
/// normal binary32 per term for devices that flush subnormals.
pub fn product_error_bound(a: &Matrix, b: &Matrix) -> Matrix {
    let terms = a.cols();
    let tolerance = accumulation_tolerance(terms);
    let flush = terms as f64 * f32::MIN_POSITIVE as f64;
    Matrix::from_fn(a.rows(), b.cols(), |i, j| {
        let magnitude: f64 = (0..terms).map(|k| (a[(i, k)] * b[(k, j)]).abs()).sum();
        tolerance * magnitude + flush
    })
}

/// Whether `gpu` and `cpu`, both computed as `a · b`, agree within [`product_error_bound`].
///
/// Equal values (including infinities) and NaN against NaN agree. Shapes must match.
pub fn product_agrees(gpu: &Matrix, cpu: &Matrix, a: &Matrix, b: &Matrix) -> bool {
    if gpu.rows() != cpu.rows() || gpu.cols() != cpu.cols() {
        return false;
    }
    let bound = product_error_bound(a, b);
    gpu.as_slice()
        .iter()
        .zip(cpu.as_slice())
        .zip(bound.as_slice())
        .all(|((g, c), limit)| g == c || (g.is_nan() && c.is_nan()) || (g - c).abs() <= *limit)
}

/// The first finite element of `matrix` that binary32 cannot hold, if any.
///
/// Such a value would be encoded as an infinity.
pub fn first_out_of_range(matrix: &Matrix) -> Option<f64> {
    matrix.as_slice().iter().copied().find(|v| out_of_range(*v))
}

/// Whether `value` is finite but rounds to an infinity in binary32.
pub fn out_of_range(value: f64) -> bool {
    value.is_finite() && (value as f32).is_infinite()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// One `R32Float` texel per value.
    NativeFloat,
    /// One `Rgba8Uint` texel per value, bit pattern split across the channels.
    PackedBytes,
}

/// Splits a 32-bit pattern into channel bytes with [`BYTE_LADDER`].
pub fn pack_bits(bits: u32) -> Texel {
    BYTE_LADDER.map(|divisor| ((bits / divisor) % 256) as u8)
}

/// Reassembles a 32-bit pattern from channel bytes.
pub fn unpack_bits(texel: Texel) -> u32 {
    texel
        .iter()
        .zip(BYTE_LADDER)
        .map(|(byte, divisor)| *byte as u32 * divisor)
        .sum()
}

impl Encoding {
    pub fn encode(self, value: f64) -> Texel {
        let value = value as f32;
        match self {
            Encoding::NativeFloat => value.to_le_bytes(),
            Encoding::PackedBytes => pack_bits(value.to_bits()),
        }
    }

    pub fn decode(self, texel: Texel) -> f64 {
        match self {
            Encoding::NativeFloat => f32::from_le_bytes(texel) as f64,
            Encoding::PackedBytes => f32::from_bits(unpack_bits(texel)) as f64,
        }
    }

    /// Encodes a whole matrix, tightly packed, row 0 first.
    pub fn encode_matrix(self, matrix: &Matrix) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(matrix.as_slice().len() * BYTES_PER_TEXEL);
        for value in matrix.as_slice() {
            bytes.extend_from_slice(&self.encode(*value));
        }
        bytes
    }

    /// Decodes a `height × width` matrix from texel rows spaced `bytes_per_row` apart.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is too short for the requested shape.
    pub fn decode_matrix(
        self,
        bytes: &[u8],
        bytes_per_row: usize,
        width: usize,
        height: usize,
    ) -> Matrix {
        assert!(
            bytes_per_row >= width * BYTES_PER_TEXEL,
            "row pitch {} is smaller than {} texels",
            bytes_per_row,
            width
        );
        let needed = if height == 0 {
            0
        } else {
            (height - 1) * bytes_per_row + width * BYTES_PER_TEXEL
        };
        assert!(
            bytes.len() >= needed,
            "readback holds {} bytes, need {} for {}x{}",
            bytes.len(),
            needed,
            width,
            height
        );
        Matrix::from_fn(height, width, |r, c| {
            let offset = r * bytes_per_row + c * BYTES_PER_TEXEL;
            let texel = [
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ];
            self.decode(texel)
        })
    }

    /// WGSL scalar type returned by `textureLoad` for this encoding's format.
    pub(crate) const fn wgsl_channel_type(self) -> &'static str {
        match self {
            Encoding::NativeFloat => "f32",
            Encoding::PackedBytes => "u32",
        }
    }

    /// WGSL `decode_texel` / `encode_value` pair mirroring [`Encoding::decode`] / [`Encoding::encode`].
    pub(crate) const fn wgsl_helpers(self) -> &'static str {
        match self {
            Encoding::NativeFloat => {
                r#"
fn decode_texel(texel: vec4<f32>) -> f32 {
    return texel.r;
}

fn encode_value(value: f32) -> vec4<f32> {
    return vec4<f32>(value, 0.0, 0.0, 1.0);
}
"#
            }
            Encoding::PackedBytes => {
                r#"
fn decode_texel(texel: vec4<u32>) -> f32 {
    let bits = (texel.r << 24u) | (texel.g << 16u) | (texel.b << 8u) | texel.a;
    return bitcast<f32>(bits);
}

fn encode_value(value: f32) -> vec4<u32> {
    let bits = bitcast<u32>(value);
    return vec4<u32>(bits >> 24u, (bits >> 16u) & 0xffu, (bits >> 8u) & 0xffu, bits & 0xffu);
}
"#
            }
        }
    }
}
