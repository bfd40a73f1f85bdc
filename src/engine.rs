use std::sync::Arc;
use std::time::Instant;

use half::bf16;

use crate::config::{BackendKind, Config};
use crate::cpu::CpuExec;
use crate::error::KernelError;
#[cfg(feature = "opencl")]
use crate::gpu::GpuExec;
use crate::metrics::{ErrorType, MetricsCollector};
use crate::types::{DType, Element, Matrix, ScaleVector};

pub enum Backend {
    Cpu(CpuExec),
    #[cfg(feature = "opencl")]
    Gpu(GpuExec),
}

#[cfg(feature = "opencl")]
fn opencl_backend(config: &Config) -> Result<Backend, KernelError> {
    Ok(Backend::Gpu(GpuExec::with_tuning(config.local_work())?))
}

#[cfg(not(feature = "opencl"))]
fn opencl_backend(_config: &Config) -> Result<Backend, KernelError> {
    Err(KernelError::DeviceUnavailable(
        "built without the `opencl` feature".to_string(),
    ))
}

/// Front door for both kernels: picks a backend once, checks shape
/// preconditions before dispatch, and records call metrics. Holds no
/// per-call state; concurrent calls only touch the atomic counters.
pub struct Engine {
    backend: Backend,
    metrics: Arc<MetricsCollector>,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self, KernelError> {
        let backend = match config.backend {
            BackendKind::Cpu => Backend::Cpu(CpuExec::new()),
            BackendKind::OpenCl => opencl_backend(config)?,
            BackendKind::Auto => match opencl_backend(config) {
                Ok(backend) => backend,
                Err(_) => Backend::Cpu(CpuExec::new()),
            },
        };
        Ok(Self {
            backend,
            metrics: Arc::new(MetricsCollector::new()),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Cpu(_) => "cpu",
            #[cfg(feature = "opencl")]
            Backend::Gpu(_) => "opencl",
        }
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        Arc::clone(&self.metrics)
    }

    /// `quant_matmul(A, B, scale, per_token_scale)`: INT8 GEMM with the
    /// fused two-stage dequantization epilogue, bf16 output. The channel
    /// scale comes first, mirroring the operator interface.
    pub fn quant_matmul(
        &self,
        a: &Matrix<i8>,
        b: &Matrix<i8>,
        channel_scale: &ScaleVector,
        per_token_scale: &ScaleVector,
    ) -> Result<Matrix<bf16>, KernelError> {
        let t0 = Instant::now();
        let result = match &self.backend {
            Backend::Cpu(cpu) => cpu.quant_matmul(a, b, channel_scale, per_token_scale),
            #[cfg(feature = "opencl")]
            Backend::Gpu(gpu) => gpu.quant_matmul(a, b, channel_scale, per_token_scale),
        };
        self.finish_call(t0, &result);
        result
    }

    /// `basic_matmul(A, B, dtype_tag)`: dense floating GEMM. The tag
    /// must name the element type the operands already hold.
    pub fn basic_matmul<F: Element>(
        &self,
        a: &Matrix<F>,
        b: &Matrix<F>,
        dtype_tag: &str,
    ) -> Result<Matrix<F>, KernelError> {
        let t0 = Instant::now();
        let result = self.basic_matmul_inner(a, b, dtype_tag);
        self.finish_call(t0, &result);
        result
    }

    fn basic_matmul_inner<F: Element>(
        &self,
        a: &Matrix<F>,
        b: &Matrix<F>,
        dtype_tag: &str,
    ) -> Result<Matrix<F>, KernelError> {
        let tag = DType::parse(dtype_tag)?;
        if tag != F::DTYPE {
            return Err(KernelError::UnsupportedDtype(format!(
                "dtype tag {} does not match operand dtype {}",
                tag.as_str(),
                F::DTYPE.as_str(),
            )));
        }
        match &self.backend {
            Backend::Cpu(cpu) => cpu.basic_matmul(a, b),
            #[cfg(feature = "opencl")]
            Backend::Gpu(gpu) => gpu.basic_matmul(a, b),
        }
    }

    fn finish_call<T>(&self, t0: Instant, result: &Result<T, KernelError>) {
        match result {
            Ok(_) => self
                .metrics
                .record_call(t0.elapsed().as_micros() as u64, true),
            Err(e) => {
                self.metrics.record_call(0, false);
                self.metrics.record_error(match e {
                    KernelError::ShapeMismatch { .. } => ErrorType::Shape,
                    KernelError::UnsupportedDtype(_) => ErrorType::Dtype,
                    KernelError::DeviceUnavailable(_) => ErrorType::Device,
                });
            }
        }
    }
}
