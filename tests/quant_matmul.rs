use half::{bf16, f16};

use qgemm_engine::config::{BackendKind, Config};
use qgemm_engine::engine::Engine;
use qgemm_engine::error::KernelError;
use qgemm_engine::golden;
use qgemm_engine::prng::{derive_seed, DPrng};
use qgemm_engine::types::{Matrix, ScaleVector};
use qgemm_engine::verify::digest_output;

fn cpu_engine() -> Engine {
    let config = Config {
        backend: BackendKind::Cpu,
        ..Config::default()
    };
    Engine::new(&config).unwrap()
}

fn gen_matrix(pr: &mut DPrng, rows: usize, cols: usize, bound: i8) -> Matrix<i8> {
    let data = (0..rows * cols).map(|_| pr.next_i8_in(bound)).collect();
    Matrix::from_vec(rows, cols, data).unwrap()
}

fn gen_scales(pr: &mut DPrng, len: usize) -> ScaleVector {
    ScaleVector::new((0..len).map(|_| bf16::from_f32(pr.next_unit_f32())).collect())
}

#[test]
fn quant_matmul_hand_checked_scenario() {
    let engine = cpu_engine();
    let a = Matrix::from_vec(2, 2, vec![1i8, 2, 3, 4]).unwrap();
    // Logical B = [[10,-1],[0,1]] supplied as the transpose of its
    // row-major (2,2) buffer [[10,0],[-1,1]].
    let b = Matrix::from_vec(2, 2, vec![10i8, 0, -1, 1]).unwrap().transposed();
    let channel_scale = ScaleVector::from_f32(&[0.5, 1.0]);
    let per_token_scale = ScaleVector::from_f32(&[1.0, 0.25]);

    let out = engine
        .quant_matmul(&a, &b, &channel_scale, &per_token_scale)
        .unwrap();
    let got: Vec<f32> = out.as_slice().iter().map(|v| v.to_f32()).collect();
    assert_eq!(got, vec![4.0, 2.0, 3.25, 1.0]);
}

#[test]
fn quant_matmul_matches_golden_on_random_shapes() {
    let engine = cpu_engine();
    let rtol = 1e-2;
    for (nonce, (m, n, k)) in [(1u32, (33, 47, 29)), (2, (5, 64, 128)), (3, (64, 3, 7))]
        .into_iter()
    {
        let mut pr = DPrng::from_seed(derive_seed(&[0x5cu8; 32], nonce));
        let a = gen_matrix(&mut pr, m, k, 16);
        let b = gen_matrix(&mut pr, n, k, 16).transposed();
        let ch = gen_scales(&mut pr, n);
        let pt = gen_scales(&mut pr, m);

        let out = engine.quant_matmul(&a, &b, &ch, &pt).unwrap();
        let reference = golden::quant_matmul_golden(&a, &b, &ch, &pt).unwrap();
        let err = golden::max_rel_err(&out, &reference);
        assert!(err <= rtol, "({m},{n},{k}): max_rel_err = {err}");
    }
}

#[test]
fn quant_matmul_full_range_inputs_stay_exact() {
    // Full-range int8 over a short K is still exactly representable on
    // both the i32 engine path and the f32 golden path.
    let engine = cpu_engine();
    let mut pr = DPrng::from_seed(derive_seed(&[9u8; 32], 0));
    let a = gen_matrix(&mut pr, 16, 48, 127);
    let b = gen_matrix(&mut pr, 24, 48, 127).transposed();
    let ch = gen_scales(&mut pr, 24);
    let pt = gen_scales(&mut pr, 16);

    let out = engine.quant_matmul(&a, &b, &ch, &pt).unwrap();
    let reference = golden::quant_matmul_golden(&a, &b, &ch, &pt).unwrap();
    assert_eq!(out, reference);
}

#[test]
fn layout_invariance_between_transpose_and_col_major() {
    let engine = cpu_engine();
    let mut pr = DPrng::from_seed(derive_seed(&[3u8; 32], 0));
    let (m, n, k) = (9, 13, 21);
    let a = gen_matrix(&mut pr, m, k, 16);
    let b_buf: Vec<i8> = (0..k * n).map(|_| pr.next_i8_in(16)).collect();
    let ch = gen_scales(&mut pr, n);
    let pt = gen_scales(&mut pr, m);

    let b_transposed = Matrix::from_vec(n, k, b_buf.clone()).unwrap().transposed();
    let b_col_major = Matrix::col_major(k, n, b_buf).unwrap();

    let via_transpose = engine.quant_matmul(&a, &b_transposed, &ch, &pt).unwrap();
    let via_col_major = engine.quant_matmul(&a, &b_col_major, &ch, &pt).unwrap();

    let bits = |m: &Matrix<bf16>| m.as_slice().iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&via_transpose), bits(&via_col_major));
}

#[test]
fn shape_mismatch_is_reported_before_compute() {
    let engine = cpu_engine();
    let a = Matrix::from_vec(2, 3, vec![0i8; 6]).unwrap();
    let b = Matrix::from_vec(4, 2, vec![0i8; 8]).unwrap();
    let ch = ScaleVector::from_f32(&[1.0, 1.0]);
    let pt = ScaleVector::from_f32(&[1.0, 1.0]);

    assert!(matches!(
        engine.quant_matmul(&a, &b, &ch, &pt),
        Err(KernelError::ShapeMismatch { .. })
    ));

    // Scale-length violations on an otherwise valid product.
    let b = Matrix::from_vec(3, 2, vec![0i8; 6]).unwrap();
    let bad_ch = ScaleVector::from_f32(&[1.0, 1.0, 1.0]);
    assert!(matches!(
        engine.quant_matmul(&a, &b, &bad_ch, &pt),
        Err(KernelError::ShapeMismatch { .. })
    ));
    let bad_pt = ScaleVector::from_f32(&[1.0]);
    assert!(matches!(
        engine.quant_matmul(&a, &b, &ch, &bad_pt),
        Err(KernelError::ShapeMismatch { .. })
    ));

    let fa = Matrix::filled(2, 3, f16::from_f32(1.0));
    let fb = Matrix::filled(4, 2, f16::from_f32(1.0));
    assert!(matches!(
        engine.basic_matmul(&fa, &fb, "float16"),
        Err(KernelError::ShapeMismatch { .. })
    ));
}

#[test]
fn identical_inputs_give_bit_identical_outputs() {
    let engine = cpu_engine();
    let seed = derive_seed(&[0x11u8; 32], 42);
    let mut pr = DPrng::from_seed(seed);
    let a = gen_matrix(&mut pr, 12, 18, 16);
    let b = gen_matrix(&mut pr, 10, 18, 16).transposed();
    let ch = gen_scales(&mut pr, 10);
    let pt = gen_scales(&mut pr, 12);

    let first = engine.quant_matmul(&a, &b, &ch, &pt).unwrap();
    let second = engine.quant_matmul(&a, &b, &ch, &pt).unwrap();
    assert_eq!(digest_output(&first, &seed), digest_output(&second, &seed));
}

#[test]
fn basic_matmul_all_ones_and_dtype_tags() {
    let engine = cpu_engine();

    let a = Matrix::filled(2, 3, f16::from_f32(1.0));
    let b = Matrix::filled(3, 4, f16::from_f32(1.0));
    let out = engine.basic_matmul(&a, &b, "float16").unwrap();
    assert!(out.as_slice().iter().all(|v| v.to_f32() == 3.0));

    let a = Matrix::filled(2, 3, bf16::from_f32(1.0));
    let b = Matrix::filled(3, 4, bf16::from_f32(1.0));
    let out = engine.basic_matmul(&a, &b, "bfloat16").unwrap();
    assert!(out.as_slice().iter().all(|v| v.to_f32() == 3.0));

    // Tag naming a type the operands do not hold, and an unknown tag.
    assert!(matches!(
        engine.basic_matmul(&a, &b, "float16"),
        Err(KernelError::UnsupportedDtype(_))
    ));
    assert!(matches!(
        engine.basic_matmul(&a, &b, "float8"),
        Err(KernelError::UnsupportedDtype(_))
    ));
}
