// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
CPU-vs-GPU timing over a range of square sizes.

For each size `n` the benchmark draws random `n × n` inputs (two for multiply, one for scale) with
values in `[0, 1000)` at two decimal places, then times the operation once with `use_gpu = false` and once with
`use_gpu = true`. Only the numeric call is timed; generating inputs is not.

The GPU column includes the first-call shader compile on the first size, and on a machine without
a usable GPU it measures the CPU fallback.
*/

use crate::Error;
use crate::compute::Compute;
use crate::matrix::Matrix;
use rand::Rng;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Sizes the bundled bench walks by default.
pub const DEFAULT_SIZES: [usize; 6] = [16, 32, 64, 128, 256, 512];

/// Which operation to time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BenchmarkOp {
    /// `A · B` for two `n × n` matrices.
    Multiply,
    /// `factor · A` for one `n × n` matrix.
    Scale { factor: f64 },
}

/// One row of the results table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkRow {
    pub size: usize,
    pub cpu_millis: f64,
    pub gpu_millis: f64,
}

impl BenchmarkRow {
    /// CPU time over GPU time. Above 1 the GPU was faster.
    pub fn speedup(&self) -> f64 {
        self.cpu_millis / self.gpu_millis
    }
}

/// A random `rows × cols` matrix with entries `k / 100` for integer `k` in `0..100_000`.
pub fn random_matrix<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Matrix {
    Matrix::from_fn(rows, cols, |_, _| rng.gen_range(0..100_000u32) as f64 / 100.0)
}

/// Times `op` on both paths for every entry of `sizes`.
///
/// Stops at the first error. A size of zero fails with [`Error::InvalidDimensions`].
pub fn run<R: Rng + ?Sized>(
    compute: &Compute,
    sizes: &[usize],
    op: BenchmarkOp,
    rng: &mut R,
) -> Result<Vec<BenchmarkRow>, Error> {
    let mut rows = Vec::with_capacity(sizes.len());
    for &n in sizes {
        let a = random_matrix(rng, n, n);
        let (cpu, gpu) = match op {
            BenchmarkOp::Multiply => {
                let b = random_matrix(rng, n, n);
                time_both(|use_gpu| compute.multiply(&a, &b, n, n, n, n, use_gpu))?
            }
            BenchmarkOp::Scale { factor } => {
                time_both(|use_gpu| compute.scale(&a, n, n, factor, use_gpu))?
            }
        };
        logwise::info_sync!(
            "benchmark n={n} cpu={cpu} gpu={gpu}",
            n = n,
            cpu = logwise::privacy::LogIt(&cpu),
            gpu = logwise::privacy::LogIt(&gpu)
        );
        rows.push(BenchmarkRow {
            size: n,
            cpu_millis: cpu.as_secs_f64() * 1000.0,
            gpu_millis: gpu.as_secs_f64() * 1000.0,
        });
    }
    Ok(rows)
}

fn time_both<F: Fn(bool) -> Result<Matrix, Error>>(f: F) -> Result<(Duration, Duration), Error> {
    let start = Instant::now();
    f(false)?;
    let cpu = start.elapsed();
    let start = Instant::now();
    f(true)?;
    Ok((cpu, start.elapsed()))
}

/// Renders rows as a plain-text table with the columns `Matrix Size`, `CPU Time(ms)` and
/// `GPU Time(ms)`.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a>(pub &'a [BenchmarkRow]);

impl Display for Table<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<14}{:>14}{:>14}", "Matrix Size", "CPU Time(ms)", "GPU Time(ms)")?;
        for row in self.0 {
            let label = format!("{0}x{0}", row.size);
            writeln!(
                f,
                "{:<14}{:>14.3}{:>14.3}",
                label, row.cpu_millis, row.gpu_millis
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_values_have_two_decimals() {
        let mut rng = StdRng::seed_from_u64(7);
        let m = random_matrix(&mut rng, 4, 5);
        assert_eq!((m.height(), m.width()), (4, 5));
        for &v in m.as_slice() {
            assert!((0.0..1000.0).contains(&v));
            let hundredths = v * 100.0;
            assert!((hundredths - hundredths.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn one_row_per_size() {
        let compute = Compute::cpu_only();
        let mut rng = StdRng::seed_from_u64(1);
        let rows = run(&compute, &[1, 3, 8], BenchmarkOp::Multiply, &mut rng).unwrap();
        let sizes: Vec<usize> = rows.iter().map(|r| r.size).collect();
        assert_eq!(sizes, vec![1, 3, 8]);
        assert!(rows.iter().all(|r| r.cpu_millis >= 0.0 && r.gpu_millis >= 0.0));
    }

    #[test]
    fn zero_size_is_an_error() {
        let compute = Compute::cpu_only();
        let mut rng = StdRng::seed_from_u64(1);
        let err = run(&compute, &[2, 0], BenchmarkOp::Scale { factor: 2.0 }, &mut rng).unwrap_err();
        assert_eq!(err, Error::InvalidDimensions { width: 0, height: 0 });
    }

    #[test]
    fn table_has_header_and_rows() {
        let rows = [BenchmarkRow {
            size: 64,
            cpu_millis: 1.5,
            gpu_millis: 0.25,
        }];
        let text = Table(&rows).to_string();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.contains("Matrix Size"));
        assert!(header.contains("CPU Time(ms)"));
        assert!(header.contains("GPU Time(ms)"));
        let row = lines.next().unwrap();
        assert!(row.starts_with("64x64"));
        assert!(row.contains("1.500"));
        assert!(row.contains("0.250"));
        assert_eq!(rows[0].speedup(), 6.0);
    }
}
