//! Higher-precision reference path the engine output is checked
//! against. Deliberately a different numeric route than the kernels:
//! the integer product is recomputed through f32 arithmetic and the
//! floating product through f64, so an agreement within tolerance is
//! meaningful.

use half::bf16;

use crate::error::KernelError;
use crate::types::{check_inner_dims, check_scale_lens, Element, Matrix, ScaleVector};

/// f32 matmul of the widened int8 operands, scales applied in f32,
/// bf16 cast last. Mirrors the dequantization contract step by step.
pub fn quant_matmul_golden(
    a: &Matrix<i8>,
    b: &Matrix<i8>,
    channel_scale: &ScaleVector,
    per_token_scale: &ScaleVector,
) -> Result<Matrix<bf16>, KernelError> {
    let sizes = check_inner_dims(a, b)?;
    check_scale_lens(&sizes, channel_scale, per_token_scale)?;

    let ch = channel_scale.to_f32_vec();
    let pt = per_token_scale.to_f32_vec();

    let mut out = Vec::with_capacity(sizes.m * sizes.n);
    for row in 0..sizes.m {
        for col in 0..sizes.n {
            let mut acc: f32 = 0.0;
            for t in 0..sizes.k {
                acc += a.element(row, t) as f32 * b.element(t, col) as f32;
            }
            out.push(bf16::from_f32(acc * pt[row] * ch[col]));
        }
    }
    Matrix::from_vec(sizes.m, sizes.n, out)
}

/// Floating GEMM reference with f64 accumulation.
pub fn basic_matmul_golden<F: Element>(
    a: &Matrix<F>,
    b: &Matrix<F>,
) -> Result<Matrix<F>, KernelError> {
    let sizes = check_inner_dims(a, b)?;
    let mut out = Vec::with_capacity(sizes.m * sizes.n);
    for row in 0..sizes.m {
        for col in 0..sizes.n {
            let mut acc: f64 = 0.0;
            for t in 0..sizes.k {
                acc += a.element(row, t).to_f32() as f64 * b.element(t, col).to_f32() as f64;
            }
            out.push(F::from_f32(acc as f32));
        }
    }
    Matrix::from_vec(sizes.m, sizes.n, out)
}

/// Largest relative error over all cells, |r - g| / max(|g|, eps).
pub fn max_rel_err<F: Element>(result: &Matrix<F>, golden: &Matrix<F>) -> f32 {
    const EPS: f32 = 1e-6;
    result
        .as_slice()
        .iter()
        .zip(golden.as_slice())
        .map(|(r, g)| {
            let r = r.to_f32();
            let g = g.to_f32();
            (r - g).abs() / g.abs().max(EPS)
        })
        .fold(0.0f32, f32::max)
}

pub fn rtol_close<F: Element>(result: &Matrix<F>, golden: &Matrix<F>, rtol: f32) -> bool {
    result.rows() == golden.rows()
        && result.cols() == golden.cols()
        && max_rel_err(result, golden) <= rtol
}

#[cfg(test)]
mod tests {
    use super::*;
    use half::f16;
    use crate::cpu::CpuExec;

    #[test]
    fn golden_matches_integer_engine_exactly_for_small_values() {
        // Products of +-16 values over short K are exact in f32, so the
        // two paths must agree bit for bit.
        let a = Matrix::from_vec(2, 2, vec![1i8, 2, 3, 4]).unwrap();
        let b = Matrix::from_vec(2, 2, vec![10i8, 0, -1, 1]).unwrap().transposed();
        let ch = ScaleVector::from_f32(&[0.5, 1.0]);
        let pt = ScaleVector::from_f32(&[1.0, 0.25]);

        let golden = quant_matmul_golden(&a, &b, &ch, &pt).unwrap();
        let engine = CpuExec::new().quant_matmul(&a, &b, &ch, &pt).unwrap();
        assert_eq!(golden, engine);
        assert_eq!(max_rel_err(&engine, &golden), 0.0);
    }

    #[test]
    fn rel_err_flags_divergence() {
        let g = Matrix::from_vec(1, 2, vec![bf16::from_f32(1.0), bf16::from_f32(2.0)]).unwrap();
        let r = Matrix::from_vec(1, 2, vec![bf16::from_f32(1.0), bf16::from_f32(2.5)]).unwrap();
        assert!(max_rel_err(&r, &g) > 0.2);
        assert!(!rtol_close(&r, &g, 1e-2));
        assert!(rtol_close(&g, &g, 1e-2));
    }

    #[test]
    fn basic_golden_all_ones() {
        let a = Matrix::filled(2, 3, f16::from_f32(1.0));
        let b = Matrix::filled(3, 4, f16::from_f32(1.0));
        let out = basic_matmul_golden(&a, &b).unwrap();
        for v in out.as_slice() {
            assert_eq!(v.to_f32(), 3.0);
        }
    }
}
