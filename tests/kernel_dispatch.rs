// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Custom kernels against a real device. Every test returns early when no adapter is available.

use shader_matrix::{
    Context, ContextManager, Error, KernelInput, KernelSource, Matrix, UniformType, UniformValue,
};
use std::sync::Arc;

fn context() -> Option<Arc<Context>> {
    ContextManager::from_env().get_context().ok()
}

fn add_source() -> KernelSource {
    KernelSource::new(
        "add",
        "fn kernel(uv: vec2<f32>) -> f32 {\n    return read_lhs(uv) + read_rhs(uv);\n}",
    )
    .input("lhs")
    .input("rhs")
}

fn affine_source() -> KernelSource {
    //mixes scalar, vector and bool uniforms so their offsets are exercised together
    KernelSource::new(
        "affine",
        r#"fn kernel(uv: vec2<f32>) -> f32 {
    var v = params.coefficients.x * read_m(uv) + params.coefficients.y;
    if (params.negate != 0) {
        v = -v;
    }
    return v + f32(params.bias);
}
"#,
    )
    .input("m")
    .uniform("negate", UniformType::Bool)
    .uniform("coefficients", UniformType::Vec2)
    .uniform("bias", UniformType::Int)
}

#[test]
fn elementwise_add() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&add_source()).unwrap();
    let lhs = Matrix::from_rows(&[[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]);
    let rhs = Matrix::from_rows(&[[0.5, 0.25, -3.0], [10.0, -5.0, 0.0]]);
    //inputs may arrive in any order
    let out = kernel
        .invoke(
            &[KernelInput::new("rhs", &rhs), KernelInput::new("lhs", &lhs)],
            &[],
            3,
            2,
        )
        .unwrap();
    assert_eq!(out, Matrix::from_rows(&[[1.5, 2.25, 0.0], [14.0, 0.0, 6.0]]));
}

#[test]
fn mixed_uniforms() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&affine_source()).unwrap();
    let m = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
    let run = |negate: bool| {
        kernel
            .invoke(
                &[KernelInput::new("m", &m)],
                &[
                    ("coefficients", UniformValue::Vec2([2.0, 1.0])),
                    ("bias", UniformValue::Int(100)),
                    ("negate", UniformValue::from(negate)),
                ],
                2,
                2,
            )
            .unwrap()
    };
    assert_eq!(run(false), Matrix::from_rows(&[[103.0, 105.0], [107.0, 109.0]]));
    assert_eq!(run(true), Matrix::from_rows(&[[97.0, 95.0], [93.0, 91.0]]));
}

#[test]
fn invocation_is_validated() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&affine_source()).unwrap();
    let m = Matrix::from_rows(&[[1.0, 2.0]]);
    let all_uniforms = [
        ("negate", UniformValue::Bool(false)),
        ("coefficients", UniformValue::Vec2([1.0, 0.0])),
        ("bias", UniformValue::Int(0)),
    ];
    let input = [KernelInput::new("m", &m)];

    assert_eq!(
        kernel.invoke(&[], &all_uniforms, 2, 1),
        Err(Error::MissingInput("m".to_string()))
    );
    assert_eq!(
        kernel.invoke(&[KernelInput::new("q", &m)], &all_uniforms, 2, 1),
        Err(Error::UnknownInput("q".to_string()))
    );
    assert_eq!(
        kernel.invoke(&[input[0], input[0]], &all_uniforms, 2, 1),
        Err(Error::DuplicateArgument("m".to_string()))
    );
    assert_eq!(
        kernel.invoke(&input, &all_uniforms[..2], 2, 1),
        Err(Error::MissingUniform("bias".to_string()))
    );
    assert_eq!(
        kernel.invoke(&input, &[("scale", UniformValue::Float(1.0))], 2, 1),
        Err(Error::UnknownUniform("scale".to_string()))
    );
    assert_eq!(
        kernel.invoke(
            &input,
            &[
                ("negate", UniformValue::Bool(false)),
                ("coefficients", UniformValue::Vec2([1.0, 0.0])),
                ("bias", UniformValue::Float(0.0)),
            ],
            2,
            1
        ),
        Err(Error::UniformTypeMismatch {
            name: "bias".to_string(),
            expected: UniformType::Int,
            actual: UniformType::Float,
        })
    );
    assert_eq!(
        kernel.invoke(&input, &all_uniforms, 0, 1),
        Err(Error::InvalidDimensions { width: 0, height: 1 })
    );
    assert!(matches!(
        kernel.invoke(
            &[KernelInput::with_dimensions("m", &m, 1, 2)],
            &all_uniforms,
            2,
            1
        ),
        Err(Error::ShapeMismatch { .. })
    ));
    //a valid call still works after the rejected ones
    assert_eq!(
        kernel.invoke(&input, &all_uniforms, 2, 1),
        Ok(Matrix::from_rows(&[[1.0, 2.0]]))
    );
}

#[test]
fn output_larger_than_the_device_is_incomplete() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&add_source()).unwrap();
    let m = Matrix::from_rows(&[[1.0]]);
    let too_wide = context.max_texture_dimension() as usize + 1;
    let result = kernel.invoke(
        &[KernelInput::new("lhs", &m), KernelInput::new("rhs", &m)],
        &[],
        too_wide,
        1,
    );
    assert!(matches!(result, Err(Error::FramebufferIncomplete(_))));
    //the framebuffer is usable again
    let ok = kernel.invoke(
        &[KernelInput::new("lhs", &m), KernelInput::new("rhs", &m)],
        &[],
        1,
        1,
    );
    assert_eq!(ok, Ok(Matrix::from_rows(&[[2.0]])));
}

#[test]
fn compiles_are_cached() {
    let Some(context) = context() else {
        return;
    };
    assert_eq!(context.compiled_kernel_count(), 0);
    let first = context.make_kernel(&add_source()).unwrap();
    let second = context.make_kernel(&add_source()).unwrap();
    assert_eq!(context.compiled_kernel_count(), 1);
    assert!(std::ptr::eq(first.compiled(), second.compiled()));
    assert_eq!(first.compiled().input_binding("rhs"), Some(1));
    assert_eq!(first.compiled().label(), "add");
}

#[test]
fn broken_shader_fails_once_and_stays_failed() {
    let Some(context) = context() else {
        return;
    };
    let broken = KernelSource::new(
        "broken",
        "fn kernel(uv: vec2<f32>) -> f32 {\n    return undefined_value;\n}",
    );
    let first = context.make_kernel(&broken).unwrap_err();
    assert!(matches!(first, Error::ShaderCompile { ref label, .. } if label == "broken"));
    assert!(first.is_fallback_trigger());
    let second = context.make_kernel(&broken).unwrap_err();
    assert_eq!(first, second);
    assert_eq!(context.compiled_kernel_count(), 1);
}

#[test]
fn invalid_input_name_is_a_compile_error() {
    let Some(context) = context() else {
        return;
    };
    let source = KernelSource::new("bad_name", "fn kernel(uv: vec2<f32>) -> f32 { return 0.0; }")
        .input("not-an-identifier");
    assert!(matches!(
        context.make_kernel(&source),
        Err(Error::ShaderCompile { .. })
    ));
}

#[test]
fn inputs_beyond_binary32_are_rejected() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&add_source()).unwrap();
    let fine = Matrix::from_rows(&[[1.0, 2.0]]);
    let huge = Matrix::from_rows(&[[1.0, -1.0e39]]);
    assert_eq!(
        kernel.invoke(
            &[KernelInput::new("lhs", &fine), KernelInput::new("rhs", &huge)],
            &[],
            2,
            1
        ),
        Err(Error::ValueOutOfRange {
            name: "rhs".to_string(),
            value: -1.0e39
        })
    );
}

#[cfg(target_pointer_width = "64")]
#[test]
fn oversized_output_is_not_truncated() {
    let Some(context) = context() else {
        return;
    };
    let kernel = context.make_kernel(&add_source()).unwrap();
    let m = Matrix::from_rows(&[[1.0]]);
    let result = kernel.invoke(
        &[KernelInput::new("lhs", &m), KernelInput::new("rhs", &m)],
        &[],
        (1usize << 32) + 1,
        1,
    );
    assert!(matches!(result, Err(Error::FramebufferIncomplete(_))));
}
