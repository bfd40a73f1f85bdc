pub mod types;
pub mod error;
pub mod prng;
pub mod cl_kernels;
#[cfg(feature = "opencl")]
pub mod gpu;
pub mod cpu;
pub mod engine;
pub mod golden;
pub mod verify;
pub mod config;
pub mod metrics;
pub mod prometheus_metrics;
