use anyhow::bail;

use qgemm_engine::config::Config;
use qgemm_engine::cpu::CpuExec;
use qgemm_engine::engine::Engine;
use qgemm_engine::prometheus_metrics::PrometheusMetrics;
use qgemm_engine::types::{Matrix, ScaleVector};
use qgemm_engine::verify;

fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    config.validate()?;

    let engine = Engine::new(&config)?;
    println!("backend: {}", engine.backend_name());

    let prom = PrometheusMetrics::new();
    let mut all_passed = true;

    // Walked-through small example first; mismatches here point at the
    // contract, not at tolerance.
    run_small_example(&engine, config.debug_report)?;

    let report = verify::run_basic_verification(&engine, config.rtol)?;
    prom.record_call(report.elapsed_ms * 1000, report.passed);
    all_passed &= report.passed;
    println!("{}", serde_json::to_string(&report)?);

    let epoch_hash = config.epoch_hash()?;
    let presets = config.parse_presets()?;
    for sizes in &presets {
        let report =
            verify::run_quant_verification(&engine, &epoch_hash, config.nonce, sizes, config.rtol)?;
        prom.record_call(report.elapsed_ms * 1000, report.passed);
        all_passed &= report.passed;
        println!("{}", serde_json::to_string(&report)?);
    }

    if config.metrics_enabled {
        let snapshot = engine.metrics().get_metrics();
        prom.set_uptime(snapshot.uptime_seconds);
        print!("{}", prom.export_metrics()?);
    }

    if !all_passed {
        bail!("verification failed");
    }
    println!("ok presets={} backend={}", presets.len(), engine.backend_name());
    Ok(())
}

/// The 2x2 example with hand-checkable numbers:
///   A = [[1,2],[3,4]], logical B = [[10,-1],[0,1]] supplied transposed,
///   channel scale [0.5, 1.0], per-token scale [1.0, 0.25]
///   -> bf16 [[4.0, 2.0], [3.25, 1.0]]
fn run_small_example(engine: &Engine, debug: bool) -> anyhow::Result<()> {
    let a = Matrix::from_vec(2, 2, vec![1i8, 2, 3, 4])?;
    let b = Matrix::from_vec(2, 2, vec![10i8, 0, -1, 1])?.transposed();
    let channel_scale = ScaleVector::from_f32(&[0.5, 1.0]);
    let per_token_scale = ScaleVector::from_f32(&[1.0, 0.25]);

    if debug {
        let acc = CpuExec::new().gemm_int8(&a, &b)?;
        println!("integer product: {acc:?}");
        let pt = per_token_scale.to_f32_vec();
        let ch = channel_scale.to_f32_vec();
        let staged: Vec<f32> = acc
            .iter()
            .enumerate()
            .map(|(idx, &v)| v as f32 * pt[idx / 2])
            .collect();
        println!("after per-token scaling: {staged:?}");
        let staged: Vec<f32> = staged
            .iter()
            .enumerate()
            .map(|(idx, &v)| v * ch[idx % 2])
            .collect();
        println!("after channel scaling: {staged:?}");
    }

    let out = engine.quant_matmul(&a, &b, &channel_scale, &per_token_scale)?;
    let got: Vec<f32> = out.as_slice().iter().map(|v| v.to_f32()).collect();
    let expected = [4.0f32, 2.0, 3.25, 1.0];
    if got != expected {
        bail!("small example mismatch: got {got:?}, expected {expected:?}");
    }
    println!("small example ok: {got:?}");
    Ok(())
}
