use anyhow::Result;
use blake3::Hasher;
use chrono::Utc;
use half::{bf16, f16};
use hex::ToHex;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::engine::Engine;
use crate::golden;
use crate::prng::{derive_seed, DPrng};
use crate::types::{Element, Matrix, ScaleVector, Sizes};

pub const QUANT_KERNEL_VER: &str = "quant_matmul_bf16_v1";
pub const BASIC_KERNEL_VER: &str = "basic_matmul_f16_v1";

/// Verification inputs stay in the +-16 range the reference harness
/// uses; full-range int8 would still be exact in i32 but makes golden
/// divergence harder to attribute.
const INPUT_BOUND: i8 = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub kernel: String,
    pub backend: String,
    pub sizes: Sizes,
    pub nonce: u32,
    pub rtol: f32,
    pub max_rel_err: f32,
    pub passed: bool,
    pub deterministic: bool,
    pub output_digest_hex: String,
    pub elapsed_ms: u64,
    pub timestamp: String,
}

fn gen_int8_matrix(pr: &mut DPrng, rows: usize, cols: usize) -> Result<Matrix<i8>> {
    let mut v = Vec::with_capacity(rows * cols);
    for _ in 0..rows * cols {
        v.push(pr.next_i8_in(INPUT_BOUND));
    }
    Ok(Matrix::from_vec(rows, cols, v)?)
}

fn gen_scale_vector(pr: &mut DPrng, len: usize) -> ScaleVector {
    let mut v = Vec::with_capacity(len);
    for _ in 0..len {
        v.push(bf16::from_f32(pr.next_unit_f32()));
    }
    ScaleVector::new(v)
}

/// Digest of the output: blake3 over up to 256 deterministically
/// sampled cell bit patterns plus the shape. Bit-identical outputs and
/// only bit-identical outputs produce equal digests for a given seed.
pub fn digest_output<F: Element>(out: &Matrix<F>, seed16: &[u8; 16]) -> [u8; 32] {
    let total = out.rows() * out.cols();
    let sample_count = total.min(256);
    let mut indices: Vec<usize> = (0..total).collect();
    // Shuffle with a RNG seeded by a 32-byte blake3 digest of the 16-byte seed
    let seed32: [u8; 32] = blake3::hash(seed16).into();
    indices.shuffle(&mut rand::rngs::StdRng::from_seed(seed32));
    let take = &indices[..sample_count];

    let mut hasher = Hasher::new();
    for &idx in take {
        hasher.update(&out.as_slice()[idx].to_bits().to_le_bytes());
    }
    hasher.update(&out.rows().to_le_bytes());
    hasher.update(&out.cols().to_le_bytes());
    hasher.finalize().into()
}

/// One quant_matmul verification run: deterministic inputs from
/// (epoch_hash, nonce), engine result vs the f32 golden path, plus a
/// repeat call to confirm bit-identical output.
pub fn run_quant_verification(
    engine: &Engine,
    epoch_hash_32: &[u8; 32],
    nonce: u32,
    sizes: &Sizes,
    rtol: f32,
) -> Result<VerificationReport> {
    let seed = derive_seed(epoch_hash_32, nonce);
    let mut pr = DPrng::from_seed(seed);

    let a = gen_int8_matrix(&mut pr, sizes.m, sizes.k)?;
    // B is produced the way callers produce it: a row-major (N, K)
    // buffer logically transposed into the column-major (K, N) operand.
    let b = gen_int8_matrix(&mut pr, sizes.n, sizes.k)?.transposed();
    let channel_scale = gen_scale_vector(&mut pr, sizes.n);
    let per_token_scale = gen_scale_vector(&mut pr, sizes.m);

    let t0 = std::time::Instant::now();
    let result = engine.quant_matmul(&a, &b, &channel_scale, &per_token_scale)?;
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    let reference = golden::quant_matmul_golden(&a, &b, &channel_scale, &per_token_scale)?;
    let max_rel_err = golden::max_rel_err(&result, &reference);
    let passed = golden::rtol_close(&result, &reference, rtol);

    let digest = digest_output(&result, &seed);
    let repeat = engine.quant_matmul(&a, &b, &channel_scale, &per_token_scale)?;
    let deterministic = digest_output(&repeat, &seed) == digest;

    Ok(VerificationReport {
        kernel: QUANT_KERNEL_VER.to_string(),
        backend: engine.backend_name().to_string(),
        sizes: *sizes,
        nonce,
        rtol,
        max_rel_err,
        passed: passed && deterministic,
        deterministic,
        output_digest_hex: digest.encode_hex::<String>(),
        elapsed_ms,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// basic_matmul sanity run: all-ones f16 (2,3) x (3,4), every output
/// cell must equal 3.0 and match the f64-accumulated golden.
pub fn run_basic_verification(engine: &Engine, rtol: f32) -> Result<VerificationReport> {
    let sizes = Sizes { m: 2, n: 4, k: 3 };
    let a = Matrix::filled(sizes.m, sizes.k, f16::from_f32(1.0));
    let b = Matrix::filled(sizes.k, sizes.n, f16::from_f32(1.0));

    let t0 = std::time::Instant::now();
    let result = engine.basic_matmul(&a, &b, "float16")?;
    let elapsed_ms = t0.elapsed().as_millis() as u64;

    let reference = golden::basic_matmul_golden(&a, &b)?;
    let max_rel_err = golden::max_rel_err(&result, &reference);
    let all_three = result.as_slice().iter().all(|v| v.to_f32() == 3.0);
    let passed = golden::rtol_close(&result, &reference, rtol) && all_three;

    let seed = [0u8; 16];
    let digest = digest_output(&result, &seed);
    let repeat = engine.basic_matmul(&a, &b, "float16")?;
    let deterministic = digest_output(&repeat, &seed) == digest;

    Ok(VerificationReport {
        kernel: BASIC_KERNEL_VER.to_string(),
        backend: engine.backend_name().to_string(),
        sizes,
        nonce: 0,
        rtol,
        max_rel_err,
        passed: passed && deterministic,
        deterministic,
        output_digest_hex: digest.encode_hex::<String>(),
        elapsed_ms,
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendKind, Config};

    fn cpu_engine() -> Engine {
        let config = Config {
            backend: BackendKind::Cpu,
            ..Config::default()
        };
        Engine::new(&config).unwrap()
    }

    #[test]
    fn quant_verification_passes_on_cpu() {
        let engine = cpu_engine();
        let sizes = Sizes { m: 17, n: 23, k: 31 };
        let report =
            run_quant_verification(&engine, &[0xaau8; 32], 1, &sizes, 1e-2).unwrap();
        assert!(report.passed, "max_rel_err = {}", report.max_rel_err);
        assert!(report.deterministic);
        assert_eq!(report.backend, "cpu");
        assert_eq!(report.output_digest_hex.len(), 64);
    }

    #[test]
    fn reports_are_reproducible_per_nonce() {
        let engine = cpu_engine();
        let sizes = Sizes { m: 8, n: 8, k: 8 };
        let r1 = run_quant_verification(&engine, &[1u8; 32], 5, &sizes, 1e-2).unwrap();
        let r2 = run_quant_verification(&engine, &[1u8; 32], 5, &sizes, 1e-2).unwrap();
        let r3 = run_quant_verification(&engine, &[1u8; 32], 6, &sizes, 1e-2).unwrap();
        assert_eq!(r1.output_digest_hex, r2.output_digest_hex);
        assert_ne!(r1.output_digest_hex, r3.output_digest_hex);
    }

    #[test]
    fn basic_verification_passes_on_cpu() {
        let engine = cpu_engine();
        let report = run_basic_verification(&engine, 1e-2).unwrap();
        assert!(report.passed);
        assert_eq!(report.max_rel_err, 0.0);
    }

    #[test]
    fn digest_covers_shape() {
        let seed = [7u8; 16];
        let flat = Matrix::from_vec(1, 4, vec![bf16::from_f32(1.0); 4]).unwrap();
        let square = Matrix::from_vec(2, 2, vec![bf16::from_f32(1.0); 4]).unwrap();
        assert_ne!(digest_output(&flat, &seed), digest_output(&square, &seed));
    }
}
