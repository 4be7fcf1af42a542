// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Type-tagged uniform values and their layout in a kernel's uniform block.
//!
//! Each kernel declares its uniforms as `(name, UniformType)` pairs. The compiler places them in
//! one WGSL struct, `KernelParams`, bound as `params`, so a body reads `params.<name>`.
//! Offsets follow the WGSL uniform address-space rules and are resolved once per kernel.

use std::fmt::Write;

/// Declared type of a uniform.
///
/// `Bool` is stored as an `i32` (0 or 1); WGSL does not allow `bool` in host-shareable memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformType {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    IVec2,
    IVec3,
    IVec4,
    Mat2,
    Mat3,
    Mat4,
}

impl UniformType {
    pub const fn wgsl_type(self) -> &'static str {
        match self {
            UniformType::Bool | UniformType::Int => "i32",
            UniformType::Float => "f32",
            UniformType::Vec2 => "vec2<f32>",
            UniformType::Vec3 => "vec3<f32>",
            UniformType::Vec4 => "vec4<f32>",
            UniformType::IVec2 => "vec2<i32>",
            UniformType::IVec3 => "vec3<i32>",
            UniformType::IVec4 => "vec4<i32>",
            UniformType::Mat2 => "mat2x2<f32>",
            UniformType::Mat3 => "mat3x3<f32>",
            UniformType::Mat4 => "mat4x4<f32>",
        }
    }

    /// Required alignment in the uniform address space, in bytes.
    pub const fn align(self) -> u64 {
        match self {
            UniformType::Bool | UniformType::Int | UniformType::Float => 4,
            UniformType::Vec2 | UniformType::IVec2 | UniformType::Mat2 => 8,
            UniformType::Vec3
            | UniformType::Vec4
            | UniformType::IVec3
            | UniformType::IVec4
            | UniformType::Mat3
            | UniformType::Mat4 => 16,
        }
    }

    /// Size in bytes, including the padding between matrix columns.
    pub const fn size(self) -> u64 {
        match self {
            UniformType::Bool | UniformType::Int | UniformType::Float => 4,
            UniformType::Vec2 | UniformType::IVec2 => 8,
            UniformType::Vec3 | UniformType::IVec3 => 12,
            UniformType::Vec4 | UniformType::IVec4 => 16,
            UniformType::Mat2 => 16,
            UniformType::Mat3 => 48,
            UniformType::Mat4 => 64,
        }
    }
}

/// A uniform value tagged with its type. Matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    IVec2([i32; 2]),
    IVec3([i32; 3]),
    IVec4([i32; 4]),
    Mat2([[f32; 2]; 2]),
    Mat3([[f32; 3]; 3]),
    Mat4([[f32; 4]; 4]),
}

impl UniformValue {
    pub const fn type_tag(&self) -> UniformType {
        match self {
            UniformValue::Bool(_) => UniformType::Bool,
            UniformValue::Int(_) => UniformType::Int,
            UniformValue::Float(_) => UniformType::Float,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::IVec2(_) => UniformType::IVec2,
            UniformValue::IVec3(_) => UniformType::IVec3,
            UniformValue::IVec4(_) => UniformType::IVec4,
            UniformValue::Mat2(_) => UniformType::Mat2,
            UniformValue::Mat3(_) => UniformType::Mat3,
            UniformValue::Mat4(_) => UniformType::Mat4,
        }
    }

    /// Writes the little-endian representation at the start of `out`.
    ///
    /// `out` must hold at least `self.type_tag().size()` bytes.
    pub(crate) fn write_bytes(&self, out: &mut [u8]) {
        fn put<const N: usize>(out: &mut [u8], at: usize, bytes: [u8; N]) {
            out[at..at + N].copy_from_slice(&bytes);
        }
        match self {
            UniformValue::Bool(b) => put(out, 0, (*b as i32).to_le_bytes()),
            UniformValue::Int(i) => put(out, 0, i.to_le_bytes()),
            UniformValue::Float(f) => put(out, 0, f.to_le_bytes()),
            UniformValue::Vec2(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, f)| put(out, i * 4, f.to_le_bytes())),
            UniformValue::Vec3(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, f)| put(out, i * 4, f.to_le_bytes())),
            UniformValue::Vec4(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, f)| put(out, i * 4, f.to_le_bytes())),
            UniformValue::IVec2(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, n)| put(out, i * 4, n.to_le_bytes())),
            UniformValue::IVec3(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, n)| put(out, i * 4, n.to_le_bytes())),
            UniformValue::IVec4(v) => v
                .iter()
                .enumerate()
                .for_each(|(i, n)| put(out, i * 4, n.to_le_bytes())),
            //column stride is the vector alignment: 8 for mat2, 16 for mat3 and mat4
            UniformValue::Mat2(m) => write_columns(out, m, 8),
            UniformValue::Mat3(m) => write_columns(out, m, 16),
            UniformValue::Mat4(m) => write_columns(out, m, 16),
        }
    }
}

fn write_columns<const N: usize>(out: &mut [u8], columns: &[[f32; N]; N], stride: usize) {
    for (c, column) in columns.iter().enumerate() {
        for (r, value) in column.iter().enumerate() {
            let at = c * stride + r * 4;
            out[at..at + 4].copy_from_slice(&value.to_le_bytes());
        }
    }
}

impl From<bool> for UniformValue {
    fn from(value: bool) -> Self {
        UniformValue::Bool(value)
    }
}

impl From<i32> for UniformValue {
    fn from(value: i32) -> Self {
        UniformValue::Int(value)
    }
}

impl From<f32> for UniformValue {
    fn from(value: f32) -> Self {
        UniformValue::Float(value)
    }
}

/// One uniform's position in the block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformSlot {
    pub name: String,
    pub ty: UniformType,
    pub offset: u64,
}

/// Resolved layout of a kernel's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformLayout {
    slots: Vec<UniformSlot>,
    size: u64,
}

impl UniformLayout {
    /// Lays out the declarations in order.
    pub fn new(declarations: &[(String, UniformType)]) -> Self {
        let mut offset = 0u64;
        let mut struct_align = 4u64;
        let mut slots = Vec::with_capacity(declarations.len());
        for (name, ty) in declarations {
            offset = round_up(offset, ty.align());
            struct_align = struct_align.max(ty.align());
            slots.push(UniformSlot {
                name: name.clone(),
                ty: *ty,
                offset,
            });
            offset += ty.size();
        }
        //uniform buffers are bound in 16-byte units
        let size = if slots.is_empty() {
            0
        } else {
            round_up(round_up(offset, struct_align), 16)
        };
        UniformLayout { slots, size }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Buffer size in bytes; zero when there are no uniforms.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn slots(&self) -> &[UniformSlot] {
        &self.slots
    }

    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.iter().find(|s| s.name == name)
    }

    /// WGSL declaration of the `KernelParams` struct and its binding, or an empty string.
    pub(crate) fn wgsl_declaration(&self, binding: usize) -> String {
        if self.slots.is_empty() {
            return String::new();
        }
        let mut out = String::from("struct KernelParams {\n");
        for slot in &self.slots {
            let _ = writeln!(out, "    {}: {},", slot.name, slot.ty.wgsl_type());
        }
        out.push_str("}\n\n");
        let _ = writeln!(
            out,
            "@group(0) @binding({binding}) var<uniform> params: KernelParams;"
        );
        out
    }

    /// Serializes values into a buffer of [`UniformLayout::size`] bytes.
    ///
    /// Values are assumed to be validated against the declared types.
    pub(crate) fn serialize<'a, I>(&self, values: I) -> Vec<u8>
    where
        I: IntoIterator<Item = (&'a str, &'a UniformValue)>,
    {
        let mut bytes = vec![0u8; self.size as usize];
        for (name, value) in values {
            if let Some(slot) = self.slot(name) {
                let start = slot.offset as usize;
                let end = start + slot.ty.size() as usize;
                value.write_bytes(&mut bytes[start..end]);
            }
        }
        bytes
    }
}

const fn round_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
