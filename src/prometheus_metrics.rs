use prometheus_client::{
    encoding::text::encode,
    metrics::{counter::Counter, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};
use crate::metrics::ErrorType;

pub struct PrometheusMetrics {
    registry: Registry,

    // Counters
    total_calls: Counter,
    successful_calls: Counter,
    failed_calls: Counter,
    shape_errors: Counter,
    dtype_errors: Counter,
    device_errors: Counter,

    // Gauges
    uptime_seconds: Gauge<i64>,

    // Histograms
    call_duration_us: Histogram,
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let total_calls = Counter::default();
        let successful_calls = Counter::default();
        let failed_calls = Counter::default();
        let shape_errors = Counter::default();
        let dtype_errors = Counter::default();
        let device_errors = Counter::default();

        let uptime_seconds = Gauge::default();

        let call_duration_us = Histogram::new(
            [50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 25000.0, 100000.0].into_iter(),
        );

        registry.register(
            "qgemm_total_calls",
            "Total number of kernel calls",
            total_calls.clone(),
        );
        registry.register(
            "qgemm_successful_calls",
            "Total number of successful kernel calls",
            successful_calls.clone(),
        );
        registry.register(
            "qgemm_failed_calls",
            "Total number of failed kernel calls",
            failed_calls.clone(),
        );
        registry.register(
            "qgemm_shape_errors",
            "Total number of shape precondition failures",
            shape_errors.clone(),
        );
        registry.register(
            "qgemm_dtype_errors",
            "Total number of unsupported dtype failures",
            dtype_errors.clone(),
        );
        registry.register(
            "qgemm_device_errors",
            "Total number of device failures",
            device_errors.clone(),
        );
        registry.register(
            "qgemm_uptime_seconds",
            "Engine uptime in seconds",
            uptime_seconds.clone(),
        );
        registry.register(
            "qgemm_call_duration_us",
            "Kernel call duration in microseconds",
            call_duration_us.clone(),
        );

        Self {
            registry,
            total_calls,
            successful_calls,
            failed_calls,
            shape_errors,
            dtype_errors,
            device_errors,
            uptime_seconds,
            call_duration_us,
        }
    }

    pub fn record_call(&self, duration_us: u64, success: bool) {
        self.total_calls.inc();
        if success {
            self.successful_calls.inc();
            self.call_duration_us.observe(duration_us as f64);
        } else {
            self.failed_calls.inc();
        }
    }

    pub fn record_error(&self, error_type: ErrorType) {
        match error_type {
            ErrorType::Shape => self.shape_errors.inc(),
            ErrorType::Dtype => self.dtype_errors.inc(),
            ErrorType::Device => self.device_errors.inc(),
        };
    }

    pub fn set_uptime(&self, seconds: u64) {
        self.uptime_seconds.set(seconds as i64);
    }

    pub fn export_metrics(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

impl Default for PrometheusMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_registered_metrics() {
        let pm = PrometheusMetrics::new();
        pm.record_call(150, true);
        pm.record_call(0, false);
        pm.record_error(ErrorType::Shape);
        pm.set_uptime(3);

        let text = pm.export_metrics().unwrap();
        assert!(text.contains("qgemm_total_calls"));
        assert!(text.contains("qgemm_shape_errors"));
        assert!(text.contains("qgemm_call_duration_us"));
    }
}
