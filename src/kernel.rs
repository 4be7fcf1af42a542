// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Reusable fragment kernels: compile once, invoke many times.
//!
//! A [`KernelSource`] is a WGSL body defining `fn kernel(uv: vec2<f32>) -> f32`, plus the names of
//! the matrices it reads and the uniforms it takes. [`Context::make_kernel`] wraps the body in a
//! generated prelude and links it into a render pipeline that draws a full-screen quad; every
//! output texel runs `kernel` once, with `uv` at the texel's centre.
//!
//! Inside the body:
//!
//! * `read_<input>(uv)` returns the element of `<input>` under texture coordinate `uv`
//!   (x across columns, y down rows, both in `0..1`).
//! * `params.<uniform>` reads a uniform; `bool` uniforms arrive as `i32`.
//!
//! ```no_run
//! use shader_matrix::context::ContextManager;
//! use shader_matrix::kernel::{KernelInput, KernelSource};
//! use shader_matrix::matrix::Matrix;
//! use shader_matrix::uniform::{UniformType, UniformValue};
//!
//! let source = KernelSource::new("offset", "fn kernel(uv: vec2<f32>) -> f32 {\n    return read_m(uv) + params.delta;\n}")
//!     .input("m")
//!     .uniform("delta", UniformType::Float);
//! let context = ContextManager::from_env().get_context()?;
//! let kernel = context.make_kernel(&source)?;
//! let m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
//! let out = kernel.invoke(
//!     &[KernelInput::new("m", &m)],
//!     &[("delta", UniformValue::Float(0.5))],
//!     2,
//!     2,
//! )?;
//! assert_eq!(out.row(0), &[1.5, 2.5]);
//! # Ok::<(), shader_matrix::Error>(())
//! ```

use crate::Error;
use crate::codec::{Encoding, first_out_of_range};
use crate::context::Context;
use crate::imp;
use crate::matrix::Matrix;
use crate::uniform::{UniformLayout, UniformType, UniformValue};
use std::collections::HashSet;
use std::fmt::Write;
use std::sync::{Arc, PoisonError};

const VERTEX_STAGE: &str = r#"
struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) tex_coord: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) tex_coord: vec2<f32>,
}

@vertex
fn vs_main(in: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(in.position, 1.0);
    out.tex_coord = in.tex_coord;
    return out;
}
"#;

/// Source of a kernel. Equal sources share one compiled pipeline per context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSource {
    label: String,
    inputs: Vec<String>,
    uniforms: Vec<(String, UniformType)>,
    body: String,
}

impl KernelSource {
    pub fn new(label: impl Into<String>, body: impl Into<String>) -> Self {
        KernelSource {
            label: label.into(),
            inputs: Vec::new(),
            uniforms: Vec::new(),
            body: body.into(),
        }
    }

    /// Declares the next input matrix. Inputs bind in declaration order.
    pub fn input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(name.into());
        self
    }

    /// Declares the next uniform.
    pub fn uniform(mut self, name: impl Into<String>, ty: UniformType) -> Self {
        self.uniforms.push((name.into(), ty));
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    pub fn uniforms(&self) -> &[(String, UniformType)] {
        &self.uniforms
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    fn validate(&self) -> Result<(), Error> {
        let mut seen = HashSet::new();
        let names = self
            .inputs
            .iter()
            .chain(self.uniforms.iter().map(|(name, _)| name));
        for name in names {
            if !is_identifier(name) {
                return Err(self.compile_error(format!("`{name}` is not a valid WGSL identifier")));
            }
            if !seen.insert(name.as_str()) {
                return Err(self.compile_error(format!("`{name}` is declared more than once")));
            }
        }
        Ok(())
    }

    fn compile_error(&self, message: String) -> Error {
        Error::ShaderCompile {
            label: self.label.clone(),
            message,
        }
    }

    /// The complete WGSL module for `encoding`.
    pub fn to_wgsl(&self, encoding: Encoding) -> String {
        let channel = encoding.wgsl_channel_type();
        let mut out = String::new();
        let _ = writeln!(out, "// kernel `{}`", self.label);
        out.push_str(encoding.wgsl_helpers());
        out.push('\n');
        for (binding, name) in self.inputs.iter().enumerate() {
            let _ = write!(
                out,
                r#"@group(0) @binding({binding}) var input_{name}: texture_2d<{channel}>;

fn read_{name}(uv: vec2<f32>) -> f32 {{
    let dims = vec2<i32>(textureDimensions(input_{name}));
    let texel = clamp(vec2<i32>(floor(uv * vec2<f32>(dims))), vec2<i32>(0, 0), dims - vec2<i32>(1, 1));
    return decode_texel(textureLoad(input_{name}, texel, 0));
}}

"#
            );
        }
        let layout = UniformLayout::new(&self.uniforms);
        out.push_str(&layout.wgsl_declaration(self.inputs.len()));
        out.push_str(VERTEX_STAGE);
        out.push('\n');
        out.push_str(&self.body);
        let _ = write!(
            out,
            r#"

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<{channel}> {{
    return encode_value(kernel(in.tex_coord));
}}
"#
        );
        out
    }
}

/// The output size as a texture extent. Fails before any GPU work.
fn output_extent(width: usize, height: usize) -> Result<(u32, u32), Error> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    match (u32::try_from(width), u32::try_from(height)) {
        (Ok(width), Ok(height)) => Ok((width, height)),
        _ => Err(Error::FramebufferIncomplete(format!(
            "output {width}x{height} does not fit a texture extent"
        ))),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    //WGSL reserves identifiers starting with two underscores
    !name.starts_with("__") && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// One matrix bound to a kernel input for a single invocation.
#[derive(Debug, Clone, Copy)]
pub struct KernelInput<'a> {
    pub name: &'a str,
    pub matrix: &'a Matrix,
    pub width: usize,
    pub height: usize,
}

impl<'a> KernelInput<'a> {
    /// Binds `matrix` with its own dimensions.
    pub fn new(name: &'a str, matrix: &'a Matrix) -> Self {
        KernelInput {
            name,
            matrix,
            width: matrix.width(),
            height: matrix.height(),
        }
    }

    /// Binds `matrix` with declared dimensions, checked against the matrix at invocation.
    pub fn with_dimensions(name: &'a str, matrix: &'a Matrix, width: usize, height: usize) -> Self {
        KernelInput {
            name,
            matrix,
            width,
            height,
        }
    }
}

/// A linked pipeline plus its input bindings and uniform layout. Immutable once built.
#[derive(Debug)]
pub struct CompiledKernel {
    program: imp::Program,
    label: String,
    inputs: Vec<String>,
    uniforms: UniformLayout,
}

impl CompiledKernel {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Binding index of an input texture.
    pub fn input_binding(&self, name: &str) -> Option<u32> {
        self.inputs.iter().position(|n| n == name).map(|i| i as u32)
    }

    pub fn uniform_layout(&self) -> &UniformLayout {
        &self.uniforms
    }
}

impl Context {
    /// Compiles `source`, or returns the cached result of an earlier compile.
    ///
    /// Failures are cached too; a source that failed is not compiled again on this context.
    pub fn make_kernel(self: &Arc<Self>, source: &KernelSource) -> Result<Kernel, Error> {
        let mut kernels = self.kernels.lock().unwrap_or_else(PoisonError::into_inner);
        let compiled = match kernels.get(source) {
            Some(cached) => cached.clone(),
            None => {
                let result = self.compile(source).map(Arc::new);
                if let Err(e) = &result {
                    logwise::error_sync!(
                        "Kernel {label} failed to build: {e}",
                        label = logwise::privacy::LogIt(&source.label),
                        e = logwise::privacy::LogIt(e)
                    );
                }
                kernels.insert(source.clone(), result.clone());
                result
            }
        }?;
        Ok(Kernel {
            context: self.clone(),
            compiled,
        })
    }

    fn compile(&self, source: &KernelSource) -> Result<CompiledKernel, Error> {
        let _compile_guard = logwise::perfwarn_begin!("kernel compile");
        source.validate()?;
        let wgsl = source.to_wgsl(self.encoding());
        logwise::debuginternal_sync!("Generated WGSL: {wgsl}", wgsl = logwise::privacy::LogIt(&wgsl));
        let uniforms = UniformLayout::new(&source.uniforms);
        let program = imp::Program::compile(
            &self.device,
            &source.label,
            &wgsl,
            source.inputs.len(),
            uniforms.size(),
        )?;
        logwise::info_sync!(
            "Compiled kernel {label}",
            label = logwise::privacy::LogIt(&source.label)
        );
        Ok(CompiledKernel {
            program,
            label: source.label.clone(),
            inputs: source.inputs.clone(),
            uniforms,
        })
    }
}

/// A compiled kernel bound to its context.
#[derive(Debug, Clone)]
pub struct Kernel {
    context: Arc<Context>,
    compiled: Arc<CompiledKernel>,
}

impl Kernel {
    pub fn compiled(&self) -> &CompiledKernel {
        &self.compiled
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    /// Runs the kernel once and returns the `output_height × output_width` result.
    ///
    /// The request is validated before any GPU work. Every texture and buffer created for the call
    /// is destroyed before it returns, whether it succeeds or fails. Fails with [`Error::Busy`]
    /// if another invocation holds the context.
    pub fn invoke(
        &self,
        inputs: &[KernelInput<'_>],
        uniforms: &[(&str, UniformValue)],
        output_width: usize,
        output_height: usize,
    ) -> Result<Matrix, Error> {
        let (extent_width, extent_height) = output_extent(output_width, output_height)?;
        let ordered_inputs = self.bind_inputs(inputs)?;
        self.check_uniforms(uniforms)?;

        let mut dispatch = self.context.begin_dispatch()?;
        logwise::trace_sync!(
            "Dispatching {label} into {w}x{h}",
            label = logwise::privacy::LogIt(&self.compiled.label),
            w = output_width,
            h = output_height
        );
        dispatch.make_output_target(extent_width, extent_height)?;
        let mut textures = Vec::with_capacity(ordered_inputs.len());
        for input in &ordered_inputs {
            textures.push(imp::Texture::upload(
                &self.context.device,
                input.name,
                input.matrix,
            )?);
        }
        let uniform_bytes = self
            .compiled
            .uniforms
            .serialize(uniforms.iter().map(|(name, value)| (*name, value)));
        let bound: Vec<&imp::Texture> = textures.iter().collect();
        dispatch.draw(&self.compiled.program, &bound, &uniform_bytes)?;
        dispatch.read_back()
        //textures drop here, then the dispatch detaches the output
    }

    /// Checks inputs against the declarations and returns them in binding order.
    fn bind_inputs<'a>(&self, inputs: &[KernelInput<'a>]) -> Result<Vec<KernelInput<'a>>, Error> {
        for (i, input) in inputs.iter().enumerate() {
            if self.compiled.input_binding(input.name).is_none() {
                return Err(Error::UnknownInput(input.name.to_string()));
            }
            if inputs[..i].iter().any(|other| other.name == input.name) {
                return Err(Error::DuplicateArgument(input.name.to_string()));
            }
            if input.width == 0 || input.height == 0 {
                return Err(Error::InvalidDimensions {
                    width: input.width,
                    height: input.height,
                });
            }
            if input.matrix.width() != input.width || input.matrix.height() != input.height {
                return Err(Error::ShapeMismatch {
                    name: input.name.to_string(),
                    declared_width: input.width,
                    declared_height: input.height,
                    actual_width: input.matrix.width(),
                    actual_height: input.matrix.height(),
                });
            }
            if let Some(value) = first_out_of_range(input.matrix) {
                return Err(Error::ValueOutOfRange {
                    name: input.name.to_string(),
                    value,
                });
            }
        }
        self.compiled
            .inputs
            .iter()
            .map(|name| {
                inputs
                    .iter()
                    .find(|input| input.name == name)
                    .copied()
                    .ok_or_else(|| Error::MissingInput(name.clone()))
            })
            .collect()
    }

    fn check_uniforms(&self, uniforms: &[(&str, UniformValue)]) -> Result<(), Error> {
        let layout = &self.compiled.uniforms;
        for (i, (name, value)) in uniforms.iter().enumerate() {
            let Some(slot) = layout.slot(name) else {
                return Err(Error::UnknownUniform(name.to_string()));
            };
            if uniforms[..i].iter().any(|(other, _)| other == name) {
                return Err(Error::DuplicateArgument(name.to_string()));
            }
            if slot.ty != value.type_tag() {
                return Err(Error::UniformTypeMismatch {
                    name: name.to_string(),
                    expected: slot.ty,
                    actual: value.type_tag(),
                });
            }
        }
        for slot in layout.slots() {
            if !uniforms.iter().any(|(name, _)| *name == slot.name) {
                return Err(Error::MissingUniform(slot.name.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offset_source() -> KernelSource {
        KernelSource::new(
            "offset",
            "fn kernel(uv: vec2<f32>) -> f32 {\n    return read_m(uv) + params.delta;\n}",
        )
        .input("m")
        .uniform("delta", UniformType::Float)
    }

    #[test]
    fn output_extent_checks_size() {
        assert_eq!(output_extent(3, 2), Ok((3, 2)));
        assert_eq!(
            output_extent(0, 2),
            Err(Error::InvalidDimensions { width: 0, height: 2 })
        );
        let max = u32::MAX as usize;
        assert_eq!(output_extent(max, 1), Ok((u32::MAX, 1)));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn output_extent_never_truncates() {
        let wide = (1usize << 32) + 1;
        assert!(matches!(
            output_extent(wide, 1),
            Err(Error::FramebufferIncomplete(_))
        ));
        assert!(matches!(
            output_extent(1, wide),
            Err(Error::FramebufferIncomplete(_))
        ));
    }

    #[test]
    fn wgsl_native_prelude() {
        let wgsl = offset_source().to_wgsl(Encoding::NativeFloat);
        assert!(wgsl.contains("@group(0) @binding(0) var input_m: texture_2d<f32>;"));
        assert!(wgsl.contains("fn read_m(uv: vec2<f32>) -> f32"));
        assert!(wgsl.contains("@group(0) @binding(1) var<uniform> params: KernelParams;"));
        assert!(wgsl.contains("fn fs_main(in: VertexOutput) -> @location(0) vec4<f32>"));
        assert!(wgsl.contains("fn vs_main"));
        assert!(wgsl.contains("return read_m(uv) + params.delta;"));
    }

    #[test]
    fn wgsl_packed_prelude() {
        let wgsl = offset_source().to_wgsl(Encoding::PackedBytes);
        assert!(wgsl.contains("var input_m: texture_2d<u32>;"));
        assert!(wgsl.contains("bitcast<f32>(bits)"));
        assert!(wgsl.contains("-> @location(0) vec4<u32>"));
    }

    #[test]
    fn wgsl_without_uniforms_has_no_block() {
        let source = KernelSource::new("copy", "fn kernel(uv: vec2<f32>) -> f32 { return read_a(uv); }")
            .input("a");
        assert!(!source.to_wgsl(Encoding::NativeFloat).contains("KernelParams"));
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(is_identifier("mtx1"));
        assert!(is_identifier("_x"));
        assert!(!is_identifier("1mtx"));
        assert!(!is_identifier("__x"));
        assert!(!is_identifier("a-b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let source = KernelSource::new("dup", "").input("a").uniform("a", UniformType::Int);
        assert!(matches!(
            source.validate(),
            Err(Error::ShaderCompile { label, .. }) if label == "dup"
        ));
        assert!(offset_source().validate().is_ok());
    }

    #[test]
    fn equal_sources_hash_equal() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(offset_source());
        set.insert(offset_source());
        assert_eq!(set.len(), 1);
        set.insert(offset_source().uniform("extra", UniformType::Bool));
        assert_eq!(set.len(), 2);
    }
}
