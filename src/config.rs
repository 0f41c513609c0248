use crate::error::Result;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/pincfg-tool/config.yaml";
pub const CONFIG_PATH_ENV: &str = "PINCFG_TOOL_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub limits: Limits,
    pub output: OutputConfig,
    pub storage: StorageConfig,
}

/// Firmware limits the generated configuration is checked against.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub config_max_size: usize,
    pub trigger_max_switches: usize,
    pub sampling_min_ms: f64,
    pub sampling_max_ms: f64,
    pub reporting_min_sec: f64,
    pub reporting_max_sec: f64,
    pub scale_min: f64,
    pub scale_max: f64,
    pub offset_min: f64,
    pub offset_max: f64,
    pub precision_min: f64,
    pub precision_max: f64,
    pub timed_switch_min_ms: u64,
    pub timed_switch_max_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Characters per transport line
    pub chunk_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted editor snapshot
    pub state_dir: PathBuf,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            config_max_size: 480,
            trigger_max_switches: 5,
            sampling_min_ms: 100.0,
            sampling_max_ms: 5000.0,
            reporting_min_sec: 1.0,
            reporting_max_sec: 3600.0,
            scale_min: -1000.0,
            scale_max: 1000.0,
            offset_min: -1000.0,
            offset_max: 1000.0,
            precision_min: 0.0,
            precision_max: 6.0,
            timed_switch_min_ms: 50,
            timed_switch_max_ms: 600_000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { chunk_size: 18 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".pincfg"),
        }
    }
}

impl ToolConfig {
    /// Loads the YAML config, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: ToolConfig = serde_yaml::from_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn resolve_path(explicit: Option<&str>) -> PathBuf {
        explicit
            .map(PathBuf::from)
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}
