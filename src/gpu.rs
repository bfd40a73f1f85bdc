use half::bf16;
use ocl::{Buffer, Context, Device, Kernel, Platform, Program, Queue, SpatialDims};

use crate::cl_kernels::GEMM_KERNELS;
use crate::error::KernelError;
use crate::types::{check_inner_dims, check_scale_lens, DType, Element, Matrix, ScaleVector};

fn device_err(e: impl std::fmt::Display) -> KernelError {
    KernelError::DeviceUnavailable(e.to_string())
}

pub struct GpuExec {
    q: Queue,
    prog: Program,
    local_work: Option<(u32, u32)>,
}

impl GpuExec {
    pub fn new() -> Result<Self, KernelError> {
        Self::with_tuning(None)
    }

    /// `local_work` optionally fixes the (rows, cols) work-group shape
    /// (config knobs WG_M / WG_N); the driver picks otherwise.
    pub fn with_tuning(local_work: Option<(u32, u32)>) -> Result<Self, KernelError> {
        // Choose a GPU device if available, else report DeviceUnavailable
        // (caller may fall back to the CPU engine).
        let platform = Platform::default();
        let devices = Device::list(platform, Some(ocl::flags::DEVICE_TYPE_GPU)).map_err(device_err)?;
        let device = devices
            .into_iter()
            .next()
            .ok_or_else(|| KernelError::DeviceUnavailable("no GPU device found".into()))?;
        let ctx = Context::builder()
            .platform(platform)
            .devices(device.clone())
            .build()
            .map_err(device_err)?;
        let q = Queue::new(&ctx, device, None).map_err(device_err)?;
        let prog = Program::builder().src(GEMM_KERNELS).build(&ctx).map_err(device_err)?;
        Ok(Self { q, prog, local_work })
    }

    fn local_dims(&self) -> Option<SpatialDims> {
        self.local_work.map(|(m, n)| SpatialDims::Two(m as usize, n as usize))
    }

    /// INT8 GEMM with fused dequantization epilogue on the device.
    /// Layouts are honored through element strides; buffers are copied
    /// in physical order, never transposed on the host.
    pub fn quant_matmul(
        &self,
        a: &Matrix<i8>,
        b: &Matrix<i8>,
        channel_scale: &ScaleVector,
        per_token_scale: &ScaleVector,
    ) -> Result<Matrix<bf16>, KernelError> {
        let sizes = check_inner_dims(a, b)?;
        check_scale_lens(&sizes, channel_scale, per_token_scale)?;

        let (a_rs, a_cs) = a.strides();
        let (b_rs, b_cs) = b.strides();

        let buf_a: Buffer<i8> = Buffer::builder()
            .queue(self.q.clone())
            .len(a.as_slice().len())
            .copy_host_slice(a.as_slice())
            .build()
            .map_err(device_err)?;
        let buf_b: Buffer<i8> = Buffer::builder()
            .queue(self.q.clone())
            .len(b.as_slice().len())
            .copy_host_slice(b.as_slice())
            .build()
            .map_err(device_err)?;

        let ch_bits: Vec<u16> = channel_scale.as_slice().iter().map(|v| v.to_bits()).collect();
        let pt_bits: Vec<u16> = per_token_scale.as_slice().iter().map(|v| v.to_bits()).collect();
        let buf_ch: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(ch_bits.len())
            .copy_host_slice(&ch_bits)
            .build()
            .map_err(device_err)?;
        let buf_pt: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(pt_bits.len())
            .copy_host_slice(&pt_bits)
            .build()
            .map_err(device_err)?;
        let buf_y: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(sizes.m * sizes.n)
            .build()
            .map_err(device_err)?;

        let mut builder = Kernel::builder();
        builder
            .program(&self.prog)
            .name("quant_matmul_bf16")
            .queue(self.q.clone())
            .global_work_size([sizes.m, sizes.n])
            .arg(&buf_a)
            .arg(&buf_b)
            .arg(&buf_ch)
            .arg(&buf_pt)
            .arg(&buf_y)
            .arg(&(sizes.m as i32))
            .arg(&(sizes.n as i32))
            .arg(&(sizes.k as i32))
            .arg(&(a_rs as i32))
            .arg(&(a_cs as i32))
            .arg(&(b_rs as i32))
            .arg(&(b_cs as i32));
        if let Some(local) = self.local_dims() {
            builder.local_work_size(local);
        }
        let kernel = builder.build().map_err(device_err)?;

        unsafe { kernel.enq().map_err(device_err)? };
        self.q.finish().map_err(device_err)?;

        let mut y_bits = vec![0u16; sizes.m * sizes.n];
        buf_y.read(&mut y_bits).enq().map_err(device_err)?;
        let out = y_bits.into_iter().map(bf16::from_bits).collect();
        Matrix::from_vec(sizes.m, sizes.n, out)
    }

    /// Dense floating GEMM on the device. Elements travel as raw u16
    /// bit patterns; the kernel widens to f32 and narrows once.
    pub fn basic_matmul<F: Element>(
        &self,
        a: &Matrix<F>,
        b: &Matrix<F>,
    ) -> Result<Matrix<F>, KernelError> {
        let kernel_name = match F::DTYPE {
            DType::Float16 => "basic_matmul_f16",
            DType::BFloat16 => "basic_matmul_bf16",
            other => return Err(KernelError::UnsupportedDtype(other.as_str().to_string())),
        };

        let sizes = check_inner_dims(a, b)?;
        let (a_rs, a_cs) = a.strides();
        let (b_rs, b_cs) = b.strides();

        let a_bits: Vec<u16> = a.as_slice().iter().map(|v| v.to_bits()).collect();
        let b_bits: Vec<u16> = b.as_slice().iter().map(|v| v.to_bits()).collect();

        let buf_a: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(a_bits.len())
            .copy_host_slice(&a_bits)
            .build()
            .map_err(device_err)?;
        let buf_b: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(b_bits.len())
            .copy_host_slice(&b_bits)
            .build()
            .map_err(device_err)?;
        let buf_y: Buffer<u16> = Buffer::builder()
            .queue(self.q.clone())
            .len(sizes.m * sizes.n)
            .build()
            .map_err(device_err)?;

        let mut builder = Kernel::builder();
        builder
            .program(&self.prog)
            .name(kernel_name)
            .queue(self.q.clone())
            .global_work_size([sizes.m, sizes.n])
            .arg(&buf_a)
            .arg(&buf_b)
            .arg(&buf_y)
            .arg(&(sizes.m as i32))
            .arg(&(sizes.n as i32))
            .arg(&(sizes.k as i32))
            .arg(&(a_rs as i32))
            .arg(&(a_cs as i32))
            .arg(&(b_rs as i32))
            .arg(&(b_cs as i32));
        if let Some(local) = self.local_dims() {
            builder.local_work_size(local);
        }
        let kernel = builder.build().map_err(device_err)?;

        unsafe { kernel.enq().map_err(device_err)? };
        self.q.finish().map_err(device_err)?;

        let mut y_bits = vec![0u16; sizes.m * sizes.n];
        buf_y.read(&mut y_bits).enq().map_err(device_err)?;
        let out = y_bits.into_iter().map(F::from_bits).collect();
        Matrix::from_vec(sizes.m, sizes.n, out)
    }
}
