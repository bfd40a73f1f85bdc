use thiserror::Error;

#[derive(Error, Debug)]
pub enum KernelError {
    #[error("shape mismatch in {what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        got: usize,
    },
    #[error("unsupported dtype: {0}")]
    UnsupportedDtype(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl KernelError {
    pub fn shape(what: &str, expected: usize, got: usize) -> Self {
        KernelError::ShapeMismatch {
            what: what.to_string(),
            expected,
            got,
        }
    }
}
