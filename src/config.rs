use std::env;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Sizes;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    Auto,
    Cpu,
    OpenCl,
}

impl BackendKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(BackendKind::Auto),
            "cpu" => Some(BackendKind::Cpu),
            "opencl" => Some(BackendKind::OpenCl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Backend selection
    pub backend: BackendKind,

    // Verification sweep
    pub verify_presets: Vec<String>,
    pub rtol: f32,
    pub epoch_hash_hex: String,
    pub nonce: u32,

    // OpenCL tuning
    pub wg_m: Option<u32>,
    pub wg_n: Option<u32>,

    // Monitoring and logging
    pub debug_report: bool,
    pub log_level: String,
    pub metrics_enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,

            verify_presets: vec![
                "64,64,64".to_string(),
                "128,128,128".to_string(),
            ],
            rtol: 1e-2,
            epoch_hash_hex: "aa".repeat(32),
            nonce: 1,

            wg_m: None,
            wg_n: None,

            debug_report: false,
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(val) = env::var("QGEMM_BACKEND") {
            config.backend = BackendKind::parse(&val)
                .ok_or_else(|| ConfigError::InvalidEnvVar("QGEMM_BACKEND".to_string(), val))?;
        }

        if let Ok(val) = env::var("QGEMM_PRESETS") {
            config.verify_presets = val.split(';').map(|s| s.to_string()).collect();
        }

        if let Ok(val) = env::var("QGEMM_RTOL") {
            config.rtol = val.parse()
                .map_err(|_| ConfigError::InvalidEnvVar("QGEMM_RTOL".to_string(), val))?;
        }

        if let Ok(val) = env::var("QGEMM_EPOCH_HASH") {
            config.epoch_hash_hex = val;
        }

        if let Ok(val) = env::var("QGEMM_NONCE") {
            config.nonce = val.parse()
                .map_err(|_| ConfigError::InvalidEnvVar("QGEMM_NONCE".to_string(), val))?;
        }

        // OpenCL tuning parameters
        if let Ok(val) = env::var("WG_M") {
            config.wg_m = Some(val.parse()
                .map_err(|_| ConfigError::InvalidEnvVar("WG_M".to_string(), val))?);
        }

        if let Ok(val) = env::var("WG_N") {
            config.wg_n = Some(val.parse()
                .map_err(|_| ConfigError::InvalidEnvVar("WG_N".to_string(), val))?);
        }

        // Debug and logging
        if let Ok(val) = env::var("QGEMM_DEBUG_REPORT") {
            config.debug_report = val == "1";
        }

        if let Ok(val) = env::var("LOG_LEVEL") {
            config.log_level = val;
        }

        if let Ok(val) = env::var("METRICS_ENABLED") {
            config.metrics_enabled = val == "1";
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.rtol > 0.0) {
            return Err(ConfigError::ValidationError("QGEMM_RTOL must be greater than 0".to_string()));
        }

        if self.epoch_hash_hex.len() != 64 {
            return Err(ConfigError::ValidationError("QGEMM_EPOCH_HASH must be 64 characters".to_string()));
        }
        self.epoch_hash()?;

        if self.verify_presets.is_empty() {
            return Err(ConfigError::ValidationError("QGEMM_PRESETS must not be empty".to_string()));
        }
        self.parse_presets()?;

        Ok(())
    }

    /// Decode the 32-byte epoch hash seeding the verification inputs.
    pub fn epoch_hash(&self) -> Result<[u8; 32], ConfigError> {
        let bytes = hex::decode(&self.epoch_hash_hex).map_err(|_| {
            ConfigError::ValidationError("QGEMM_EPOCH_HASH must be hex".to_string())
        })?;
        bytes.try_into().map_err(|_| {
            ConfigError::ValidationError("QGEMM_EPOCH_HASH must decode to 32 bytes".to_string())
        })
    }

    /// Parse the "m,n,k" preset strings into problem shapes.
    pub fn parse_presets(&self) -> Result<Vec<Sizes>, ConfigError> {
        self.verify_presets
            .iter()
            .map(|preset| {
                let dims: Vec<usize> = preset
                    .split(',')
                    .map(|part| part.trim().parse::<usize>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| {
                        ConfigError::InvalidEnvVar("QGEMM_PRESETS".to_string(), preset.clone())
                    })?;
                match dims.as_slice() {
                    [m, n, k] if *m > 0 && *n > 0 && *k > 0 => Ok(Sizes { m: *m, n: *n, k: *k }),
                    _ => Err(ConfigError::InvalidEnvVar(
                        "QGEMM_PRESETS".to_string(),
                        preset.clone(),
                    )),
                }
            })
            .collect()
    }

    pub fn local_work(&self) -> Option<(u32, u32)> {
        match (self.wg_m, self.wg_n) {
            (Some(m), Some(n)) => Some((m, n)),
            _ => None,
        }
    }
}
