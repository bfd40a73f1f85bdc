use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metrics {
    // Call metrics
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub average_time_us: f64,
    pub min_time_us: u64,
    pub max_time_us: u64,

    // Error metrics
    pub shape_errors: u64,
    pub dtype_errors: u64,
    pub device_errors: u64,

    pub uptime_seconds: u64,
}

#[derive(Debug)]
pub struct MetricsCollector {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    shape_errors: AtomicU64,
    dtype_errors: AtomicU64,
    device_errors: AtomicU64,

    start_time: Instant,

    total_time_us: AtomicU64,
    min_time_us: AtomicU64,
    max_time_us: AtomicU64,
    timed_calls: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            shape_errors: AtomicU64::new(0),
            dtype_errors: AtomicU64::new(0),
            device_errors: AtomicU64::new(0),
            start_time: Instant::now(),
            total_time_us: AtomicU64::new(0),
            min_time_us: AtomicU64::new(u64::MAX),
            max_time_us: AtomicU64::new(0),
            timed_calls: AtomicU64::new(0),
        }
    }

    pub fn record_call(&self, time_us: u64, success: bool) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_calls.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
            return;
        }

        self.total_time_us.fetch_add(time_us, Ordering::Relaxed);
        self.timed_calls.fetch_add(1, Ordering::Relaxed);

        let mut current_min = self.min_time_us.load(Ordering::Relaxed);
        while time_us < current_min {
            match self.min_time_us.compare_exchange_weak(
                current_min, time_us, Ordering::Relaxed, Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(new_min) => current_min = new_min,
            }
        }

        let mut current_max = self.max_time_us.load(Ordering::Relaxed);
        while time_us > current_max {
            match self.max_time_us.compare_exchange_weak(
                current_max, time_us, Ordering::Relaxed, Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(new_max) => current_max = new_max,
            }
        }
    }

    pub fn record_error(&self, error_type: ErrorType) {
        match error_type {
            ErrorType::Shape => self.shape_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Dtype => self.dtype_errors.fetch_add(1, Ordering::Relaxed),
            ErrorType::Device => self.device_errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn get_metrics(&self) -> Metrics {
        let total_time_us = self.total_time_us.load(Ordering::Relaxed);
        let timed_calls = self.timed_calls.load(Ordering::Relaxed);
        let min_time_us = self.min_time_us.load(Ordering::Relaxed);

        let average_time_us = if timed_calls > 0 {
            total_time_us as f64 / timed_calls as f64
        } else {
            0.0
        };

        Metrics {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            average_time_us,
            min_time_us: if min_time_us == u64::MAX { 0 } else { min_time_us },
            max_time_us: self.max_time_us.load(Ordering::Relaxed),
            shape_errors: self.shape_errors.load(Ordering::Relaxed),
            dtype_errors: self.dtype_errors.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorType {
    Shape,
    Dtype,
    Device,
}
