// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Multiply and scale through the public entry point, on both paths.
//!
//! GPU assertions only run when this machine can create a context; the CPU assertions always run.

use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use shader_matrix::benchmark::random_matrix;
use shader_matrix::codec::{VALUE_EPSILON, accumulation_tolerance, product_agrees};
use shader_matrix::{Compute, Error, Matrix};

fn gpu_compute() -> Option<Compute> {
    let compute = Compute::new();
    compute.context_manager().get_context().ok()?;
    Some(compute)
}

fn as_f32(m: &Matrix) -> Matrix {
    Matrix::from_fn(m.rows(), m.cols(), |r, c| m[(r, c)] as f32 as f64)
}

#[test]
fn multiply_scenario() {
    let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
    let b = Matrix::from_rows(&[[5.0, 6.0], [7.0, 8.0]]);
    let expected = Matrix::from_rows(&[[19.0, 22.0], [43.0, 50.0]]);

    let cpu = Compute::cpu_only();
    assert_eq!(cpu.multiply(&a, &b, 2, 2, 2, 2, false).unwrap(), expected);

    if let Some(gpu) = gpu_compute() {
        //small integers are exact in f32
        assert_eq!(gpu.multiply(&a, &b, 2, 2, 2, 2, true).unwrap(), expected);
    }
}

#[test]
fn scale_scenario() {
    let a = Matrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]);
    let expected = Matrix::from_rows(&[[2.0, 4.0], [6.0, 8.0]]);

    assert_eq!(Compute::cpu_only().scale(&a, 2, 2, 2.0, false).unwrap(), expected);
    if let Some(gpu) = gpu_compute() {
        assert_eq!(gpu.scale(&a, 2, 2, 2.0, true).unwrap(), expected);
    }
}

#[test]
fn mismatched_inner_dimension_is_rejected() {
    let compute = Compute::new();
    let a = Matrix::zeros(2, 2);
    let b = Matrix::zeros(3, 2);
    for use_gpu in [false, true] {
        assert_eq!(
            compute.multiply(&a, &b, 2, 2, 2, 3, use_gpu),
            Err(Error::DimensionMismatch {
                width_a: 2,
                height_b: 3
            })
        );
    }
    //rejected before any GPU work
    assert!(!compute.context_manager().is_initialized());
}

#[test]
fn rectangular_product_has_height_a_by_width_b() {
    //4x5 times 5x6
    let a = Matrix::from_fn(4, 5, |r, c| (r * 5 + c) as f64);
    let b = Matrix::from_fn(5, 6, |r, c| (r as f64) - (c as f64) * 0.5);
    let c = Compute::cpu_only().multiply(&a, &b, 5, 4, 6, 5, true).unwrap();
    assert_eq!((c.rows(), c.cols()), (4, 6));
    let mut expected = 0.0;
    for k in 0..5 {
        expected += a[(3, k)] * b[(k, 5)];
    }
    assert_eq!(c[(3, 5)], expected);
}

#[test]
fn identity_is_neutral() {
    let mut rng = StdRng::seed_from_u64(11);
    let a = random_matrix(&mut rng, 6, 4);
    let i = Matrix::identity(6);

    let cpu = Compute::cpu_only().multiply(&i, &a, 6, 6, 4, 6, false).unwrap();
    assert_eq!(cpu, a);

    if let Some(gpu) = gpu_compute() {
        let product = gpu.multiply(&i, &a, 6, 6, 4, 6, true).unwrap();
        //every term but one is an exact zero
        assert_eq!(product, as_f32(&a));
    }
}

#[test]
fn scaling_by_one_is_identity() {
    let a = Matrix::from_rows(&[[0.5, -1.25, 3.0], [1024.0, -0.0, 7.75]]);
    assert_eq!(Compute::cpu_only().scale(&a, 2, 3, 1.0, false).unwrap(), a);
    if let Some(gpu) = gpu_compute() {
        assert_eq!(gpu.scale(&a, 2, 3, 1.0, true).unwrap(), a);
    }
}

#[test]
fn scaling_composes() {
    let mut rng = StdRng::seed_from_u64(3);
    let a = random_matrix(&mut rng, 5, 7);
    let (s1, s2) = (1.5, -0.25);

    let cpu = Compute::cpu_only();
    let twice = cpu
        .scale(&cpu.scale(&a, 5, 7, s1, false).unwrap(), 5, 7, s2, false)
        .unwrap();
    let once = cpu.scale(&a, 5, 7, s1 * s2, false).unwrap();
    assert!(twice.approx_eq(&once, 1e-12));

    if let Some(gpu) = gpu_compute() {
        let twice = gpu
            .scale(&gpu.scale(&a, 5, 7, s1, true).unwrap(), 5, 7, s2, true)
            .unwrap();
        let once = gpu.scale(&a, 5, 7, s1 * s2, true).unwrap();
        assert!(twice.approx_eq(&once, 4.0 * VALUE_EPSILON));
    }
}

#[test]
fn gpu_agrees_with_cpu() {
    let Some(gpu) = gpu_compute() else {
        return;
    };
    let mut rng = StdRng::seed_from_u64(42);
    for (m, k, n) in [(1, 1, 1), (3, 7, 2), (7, 13, 5), (16, 64, 9), (33, 100, 17)] {
        let a = random_matrix(&mut rng, m, k);
        let b = random_matrix(&mut rng, k, n);
        let on_gpu = gpu.multiply(&a, &b, k, m, n, k, true).unwrap();
        let on_cpu = gpu.multiply(&a, &b, k, m, n, k, false).unwrap();
        assert!(
            product_agrees(&on_gpu, &on_cpu, &a, &b),
            "{m}x{k} by {k}x{n}: {on_gpu:?} vs {on_cpu:?}"
        );

        let factor = 0.37;
        let on_gpu = gpu.scale(&a, m, k, factor, true).unwrap();
        let on_cpu = gpu.scale(&a, m, k, factor, false).unwrap();
        assert!(on_gpu.approx_eq(&on_cpu, accumulation_tolerance(1)));
    }
}

#[test]
fn texture_store_round_trips() {
    let Some(gpu) = gpu_compute() else {
        return;
    };
    let context = gpu.context_manager().get_context().unwrap();
    let m = Matrix::from_rows(&[
        [0.0, -0.0, -2.5, 1.0e-3],
        [f64::from(f32::MAX), f64::from(f32::MIN_POSITIVE), 1.0e-40, 123456.789],
        [f64::INFINITY, f64::NEG_INFINITY, 65.0, -1.0e6],
    ]);
    let texture = context.matrix_to_texture("round_trip", &m).unwrap();
    assert_eq!((texture.width(), texture.height()), (4, 3));
    let back = context.texture_to_matrix(&texture).unwrap();
    context.release_texture(texture);
    assert_eq!(back, as_f32(&m));
}

#[test]
fn gpu_agrees_with_cpu_when_terms_cancel() {
    let Some(gpu) = gpu_compute() else {
        return;
    };
    //1e8 + 1 rounds back to 1e8 in binary32
    let a = Matrix::from_rows(&[[1.0e8, 1.0, -1.0e8]]);
    let b = Matrix::from_rows(&[[1.0], [1.0], [1.0]]);
    let on_gpu = gpu.multiply(&a, &b, 3, 1, 1, 3, true).unwrap();
    let on_cpu = gpu.multiply(&a, &b, 3, 1, 1, 3, false).unwrap();
    assert_eq!(on_cpu[(0, 0)], 1.0);
    assert!(product_agrees(&on_gpu, &on_cpu, &a, &b));

    let mut rng = StdRng::seed_from_u64(17);
    for (m, k, n) in [(4, 9, 3), (12, 200, 7)] {
        let a = Matrix::from_fn(m, k, |_, _| rng.gen_range(-1.0e3..1.0e3));
        let b = Matrix::from_fn(k, n, |_, _| rng.gen_range(-1.0e3..1.0e3));
        let on_gpu = gpu.multiply(&a, &b, k, m, n, k, true).unwrap();
        let on_cpu = gpu.multiply(&a, &b, k, m, n, k, false).unwrap();
        assert!(product_agrees(&on_gpu, &on_cpu, &a, &b), "{m}x{k} by {k}x{n}");
    }
}

#[test]
fn inputs_beyond_binary32_match_cpu() {
    let compute = Compute::new();
    let a = Matrix::from_rows(&[[1.0e39, 2.0], [3.0, -4.0e39]]);
    let b = Matrix::from_rows(&[[1.0e-20, 0.0], [0.0, 1.0e-20]]);
    assert_eq!(
        compute.multiply(&a, &b, 2, 2, 2, 2, true).unwrap(),
        compute.multiply(&a, &b, 2, 2, 2, 2, false).unwrap()
    );
    assert_eq!(
        compute.scale(&a, 2, 2, 0.5, true).unwrap(),
        compute.scale(&a, 2, 2, 0.5, false).unwrap()
    );
}

#[test]
fn factor_beyond_binary32_matches_cpu() {
    let compute = Compute::new();
    let a = Matrix::from_rows(&[[1.0e-20, -3.0e-20], [0.0, 2.0]]);
    let on_gpu = compute.scale(&a, 2, 2, 1.0e40, true).unwrap();
    assert!(on_gpu.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(on_gpu, compute.scale(&a, 2, 2, 1.0e40, false).unwrap());
}

#[test]
fn binary32_overflow_matches_cpu() {
    //every input fits binary32; the products do not
    let compute = Compute::new();
    let a = Matrix::from_rows(&[[1.0e30, 1.0e30], [1.0, 2.0]]);
    let b = Matrix::from_rows(&[[1.0e30, 0.0], [1.0e30, 1.0]]);
    let on_gpu = compute.multiply(&a, &b, 2, 2, 2, 2, true).unwrap();
    assert!(on_gpu.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(on_gpu, compute.multiply(&a, &b, 2, 2, 2, 2, false).unwrap());

    let scaled = compute.scale(&a, 2, 2, 1.0e20, true).unwrap();
    assert!(scaled.as_slice().iter().all(|v| v.is_finite()));
    assert_eq!(scaled, compute.scale(&a, 2, 2, 1.0e20, false).unwrap());
}
