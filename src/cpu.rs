use half::bf16;

use crate::error::KernelError;
use crate::types::{check_inner_dims, check_scale_lens, Element, Matrix, ScaleVector};

pub struct CpuExec;

impl CpuExec {
    pub fn new() -> Self {
        Self
    }

    /// Exact INT8 product into i32 accumulators, row-major M x N.
    ///
    /// Summation runs k = 0..K ascending for every cell, so the result
    /// is bit-identical across calls and backends. i32 holds the worst
    /// case K * 127 * 127 for any K up to ~1.3e5.
    pub fn gemm_int8(&self, a: &Matrix<i8>, b: &Matrix<i8>) -> Result<Vec<i32>, KernelError> {
        let sizes = check_inner_dims(a, b)?;
        let mut acc = vec![0i32; sizes.m * sizes.n];
        for row in 0..sizes.m {
            for col in 0..sizes.n {
                let mut sum: i32 = 0;
                for t in 0..sizes.k {
                    sum += a.element(row, t) as i32 * b.element(t, col) as i32;
                }
                acc[row * sizes.n + col] = sum;
            }
        }
        Ok(acc)
    }

    /// INT8 GEMM with fused dequantization epilogue.
    ///
    /// Each accumulator cell is widened to f32 once, multiplied by
    /// per_token_scale[row] and channel_scale[col] at f32 precision,
    /// then cast to bf16 with round-to-nearest-even. The accumulator
    /// matrix is never materialized past this call.
    pub fn quant_matmul(
        &self,
        a: &Matrix<i8>,
        b: &Matrix<i8>,
        channel_scale: &ScaleVector,
        per_token_scale: &ScaleVector,
    ) -> Result<Matrix<bf16>, KernelError> {
        let sizes = check_inner_dims(a, b)?;
        check_scale_lens(&sizes, channel_scale, per_token_scale)?;

        let acc = self.gemm_int8(a, b)?;
        let ch = channel_scale.to_f32_vec();
        let pt = per_token_scale.to_f32_vec();

        let mut out = Vec::with_capacity(sizes.m * sizes.n);
        for row in 0..sizes.m {
            for col in 0..sizes.n {
                let deq = acc[row * sizes.n + col] as f32 * pt[row] * ch[col];
                out.push(bf16::from_f32(deq));
            }
        }
        Matrix::from_vec(sizes.m, sizes.n, out)
    }

    /// Dense floating GEMM for f16/bf16 elements, f32 accumulation,
    /// one narrowing cast per output cell. No epilogue.
    pub fn basic_matmul<F: Element>(
        &self,
        a: &Matrix<F>,
        b: &Matrix<F>,
    ) -> Result<Matrix<F>, KernelError> {
        let sizes = check_inner_dims(a, b)?;
        let mut out = Vec::with_capacity(sizes.m * sizes.n);
        for row in 0..sizes.m {
            for col in 0..sizes.n {
                let mut sum: f32 = 0.0;
                for t in 0..sizes.k {
                    sum += a.element(row, t).to_f32() * b.element(t, col).to_f32();
                }
                out.push(F::from_f32(sum));
            }
        }
        Matrix::from_vec(sizes.m, sizes.n, out)
    }
}
