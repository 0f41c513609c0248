use crate::error::Result;
use crate::model::Configuration;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Fixed key the editor snapshot is stored under.
pub const STORAGE_KEY: &str = "pinCfgC_config";

/// Durable copy of the editor state, rewritten after every mutation.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(format!("{}.json", STORAGE_KEY)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot. A missing or unreadable snapshot yields an empty model.
    pub fn load(&self) -> Configuration {
        if !self.path.exists() {
            debug!("No stored snapshot at {}", self.path.display());
            return Configuration::default();
        }
        match fs::read_to_string(&self.path)
            .map_err(Into::into)
            .and_then(|text| parse_snapshot(&text))
        {
            Ok(config) => {
                info!("Restored editor state from {}", self.path.display());
                config
            }
            Err(e) => {
                warn!("Failed to load stored snapshot {}: {}", self.path.display(), e);
                Configuration::default()
            }
        }
    }

    pub fn save(&self, config: &Configuration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string(config)?)?;
        debug!("Saved editor state to {}", self.path.display());
        Ok(())
    }
}

pub fn parse_snapshot(text: &str) -> Result<Configuration> {
    let mut config: Configuration = serde_json::from_str(text)?;
    config.global.fill_empty_defaults();
    Ok(config)
}

pub fn default_export_filename(date: NaiveDate) -> String {
    format!("pincfg-config-{}.json", date.format("%Y-%m-%d"))
}

/// Uses the requested name (with `.json` appended when missing) or
/// today's date-stamped default.
pub fn export_filename(requested: Option<&str>) -> String {
    match requested.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) if name.ends_with(".json") => name.to_string(),
        Some(name) => format!("{}.json", name),
        None => default_export_filename(chrono::Local::now().date_naive()),
    }
}

pub fn export_to(path: &Path, config: &Configuration) -> Result<()> {
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    info!("Exported configuration to {}", path.display());
    Ok(())
}

pub fn import_from(path: &Path) -> Result<Configuration> {
    let text = fs::read_to_string(path)?;
    parse_snapshot(&text)
}
