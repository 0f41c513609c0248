use crate::command::{CliCommand, CommandBuilder};
use crate::config::ToolConfig;
use crate::decoder::{decode_with, DecodeOptions};
use crate::encoder::{encode, Encoded, SizeStatus};
use crate::error::{PinCfgError, Result};
use crate::model::{Configuration, GlobalKey, MeasurementParams, SwitchKind, TriggerAction};
use crate::store::{self, Store};
use crate::transport::{ChunkedOutput, Envelope};
use crate::validator::validate;
use log::{info, warn};
use std::path::Path;
use uuid::Uuid;

/// Result of generating the configuration text.
#[derive(Debug, Clone)]
pub struct Generation {
    pub encoded: Encoded,
    pub size_status: SizeStatus,
    pub max_size: usize,
    pub output: ChunkedOutput,
}

/// Single owner of the editable configuration. Every mutation goes
/// through here and is persisted before returning.
pub struct Editor {
    config: Configuration,
    store: Store,
    tool: ToolConfig,
    output: Option<ChunkedOutput>,
}

impl Editor {
    pub fn new(tool: ToolConfig) -> Self {
        let store = Store::new(&tool.storage.state_dir);
        Self::with_store(tool, store)
    }

    pub fn with_store(tool: ToolConfig, store: Store) -> Self {
        let config = store.load();
        info!(
            "Editor ready: {} switches, {} inputs, {} triggers, {} measurement sources, {} sensor reporters",
            config.switches.len(),
            config.inputs.len(),
            config.triggers.len(),
            config.measurement_sources.len(),
            config.sensor_reporters.len()
        );
        Self {
            config,
            store,
            tool,
            output: None,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn tool(&self) -> &ToolConfig {
        &self.tool
    }

    /// Applies `change` to the model and persists the result.
    pub fn update<R>(&mut self, change: impl FnOnce(&mut Configuration) -> Result<R>) -> Result<R> {
        let result = change(&mut self.config)?;
        self.store.save(&self.config)?;
        Ok(result)
    }

    pub fn add_switch(&mut self, kind: SwitchKind) -> Result<Uuid> {
        self.update(|c| Ok(c.add_switch(kind).id))
    }

    pub fn add_input(&mut self) -> Result<Uuid> {
        self.update(|c| Ok(c.add_input().id))
    }

    pub fn add_trigger(&mut self) -> Result<Uuid> {
        self.update(|c| Ok(c.add_trigger().id))
    }

    pub fn add_measurement_source(&mut self, type_code: &str) -> Result<Uuid> {
        let params = MeasurementParams::defaults_for(type_code);
        self.update(|c| Ok(c.add_measurement_source(params).id))
    }

    pub fn add_sensor_reporter(&mut self) -> Result<Uuid> {
        self.update(|c| Ok(c.add_sensor_reporter().id))
    }

    /// Removes whichever entity carries `id`.
    pub fn remove(&mut self, id: Uuid) -> Result<()> {
        self.update(|c| {
            let removed = c.remove_switch(id)
                || c.remove_input(id)
                || c.remove_trigger(id)
                || c.remove_measurement_source(id)
                || c.remove_sensor_reporter(id);
            if removed {
                Ok(())
            } else {
                Err(PinCfgError::Model(format!("No entity with id {}", id)))
            }
        })
    }

    pub fn set_global(
        &mut self,
        key: GlobalKey,
        value: Option<&str>,
        enabled: Option<bool>,
    ) -> Result<()> {
        self.update(|c| {
            let setting = c.global.get_mut(key);
            if let Some(value) = value {
                setting.value = value.to_string();
            }
            if let Some(enabled) = enabled {
                setting.enabled = enabled;
            }
            Ok(())
        })
    }

    pub fn add_trigger_action(&mut self, trigger_id: Uuid, action: TriggerAction) -> Result<()> {
        let max = self.tool.limits.trigger_max_switches;
        self.update(|c| {
            c.trigger_mut(trigger_id)
                .ok_or_else(|| PinCfgError::Model(format!("No trigger {}", trigger_id)))?
                .add_action(action, max)
        })
    }

    pub fn bind_reporter_source(&mut self, reporter_id: Uuid, source_name: &str) -> Result<()> {
        self.update(|c| c.bind_reporter_source(reporter_id, source_name))
    }

    pub fn set_reporter_cumulative(&mut self, reporter_id: Uuid, cumulative: bool) -> Result<()> {
        let sampling_min = self.tool.limits.sampling_min_ms.to_string();
        self.update(|c| c.set_reporter_cumulative(reporter_id, cumulative, &sampling_min))
    }

    /// Hashes the password and persists once the digest is available.
    pub async fn set_password(&mut self, password: &str) -> Result<()> {
        self.config.set_password(password).await?;
        self.store.save(&self.config)
    }

    pub fn set_password_hash(&mut self, hash: &str) -> Result<()> {
        self.update(|c| c.set_password_hash(hash))
    }

    /// Replaces the model with decoded wire text. Credentials survive when
    /// the text carries none; a legacy plaintext password is hashed first.
    pub async fn load_wire_text(
        &mut self,
        text: &str,
        options: DecodeOptions,
    ) -> Result<Vec<String>> {
        let decoded = decode_with(text, options)?;
        let mut config = decoded.config;
        config.auth_password = std::mem::take(&mut self.config.auth_password);
        config.auth_password_hash = std::mem::take(&mut self.config.auth_password_hash);
        if let Some(credential) = decoded.credential {
            config.apply_credential(credential).await?;
        }
        self.config = config;
        self.output = None;
        self.store.save(&self.config)?;
        if !decoded.skipped.is_empty() {
            warn!("Skipped {} unrecognised record(s)", decoded.skipped.len());
        }
        Ok(decoded.skipped)
    }

    /// Loads a JSON snapshot. The model is cleared first, so a failed
    /// import leaves it empty.
    pub fn import(&mut self, path: &Path) -> Result<()> {
        self.update(|c| {
            c.clear();
            Ok(())
        })?;
        self.output = None;
        let loaded = store::import_from(path)?;
        self.update(|c| {
            *c = loaded;
            Ok(())
        })?;
        info!("Configuration loaded from {}", path.display());
        Ok(())
    }

    pub fn export(&self, path: &Path) -> Result<()> {
        store::export_to(path, &self.config)
    }

    pub fn generate(&mut self) -> Generation {
        let encoded = encode(&self.config);
        let max_size = self.tool.limits.config_max_size;
        let size_status = encoded.size_status(max_size);
        match size_status {
            SizeStatus::Ok => {}
            SizeStatus::Warning => {
                warn!("Configuration is {} of {} bytes", encoded.size(), max_size)
            }
            SizeStatus::Error => warn!(
                "Configuration exceeds the maximum size: {} of {} bytes",
                encoded.size(),
                max_size
            ),
        }
        let envelope = Envelope::config(&self.config.auth_password_hash, &encoded.canonical());
        let output = ChunkedOutput::new(envelope, self.tool.output.chunk_size);
        self.output = Some(output.clone());
        Generation {
            encoded,
            size_status,
            max_size,
            output,
        }
    }

    pub fn output(&self) -> Option<&ChunkedOutput> {
        self.output.as_ref()
    }

    /// Re-chunks the last generated envelope without regenerating it.
    pub fn set_chunk_size(&mut self, chunk_size: usize) -> Option<&ChunkedOutput> {
        self.tool.output.chunk_size = chunk_size.max(1);
        if let Some(output) = self.output.as_mut() {
            output.set_chunk_size(chunk_size);
        }
        self.output.as_ref()
    }

    pub fn validate(&self, text: &str) -> Vec<String> {
        validate(text, &self.tool.limits)
    }

    pub fn build_command(&self, command: &CliCommand) -> Result<ChunkedOutput> {
        CommandBuilder::build(
            command,
            &self.config.auth_password_hash,
            self.tool.output.chunk_size,
        )
    }
}
