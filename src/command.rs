use crate::auth::is_hash;
use crate::error::{PinCfgError, Result};
use crate::transport::{ChunkedOutput, Envelope};
use log::info;

/// Commands understood by the device CLI after authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    GetConfig,
    Reset,
    GetTransportErrors,
    ClearTransportErrors,
    FirmwareCheck,
    GetFirmwareVersion,
    ChangePassword { new_hash: String },
}

impl CliCommand {
    pub const NAMES: [&'static str; 7] = [
        "GET_CFG",
        "RESET",
        "GET_TSP_ERRORS",
        "CLR_TSP_ERRORS",
        "FW_CHCK",
        "GET_FW_VERSION",
        "CHANGE_PWD:",
    ];

    /// Looks a command up by name. `CHANGE_PWD` needs the new password hash.
    pub fn parse(name: &str, new_hash: Option<&str>) -> Result<Self> {
        let command = match name.trim().trim_end_matches(':') {
            "GET_CFG" => CliCommand::GetConfig,
            "RESET" => CliCommand::Reset,
            "GET_TSP_ERRORS" => CliCommand::GetTransportErrors,
            "CLR_TSP_ERRORS" => CliCommand::ClearTransportErrors,
            "FW_CHCK" => CliCommand::FirmwareCheck,
            "GET_FW_VERSION" => CliCommand::GetFirmwareVersion,
            "CHANGE_PWD" => {
                let new_hash = new_hash
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        PinCfgError::Command("Please enter a new password".to_string())
                    })?;
                if !is_hash(new_hash) {
                    return Err(PinCfgError::Command(
                        "New password hash must be 64 hex characters".to_string(),
                    ));
                }
                CliCommand::ChangePassword {
                    new_hash: new_hash.to_lowercase(),
                }
            }
            other => {
                return Err(PinCfgError::Command(format!("Unknown command: {}", other)));
            }
        };
        Ok(command)
    }

    pub fn description(&self) -> &'static str {
        match self {
            CliCommand::GetConfig => "Read back the stored configuration",
            CliCommand::Reset => "Restart the device",
            CliCommand::GetTransportErrors => "Read the transport error log",
            CliCommand::ClearTransportErrors => "Clear the transport error log",
            CliCommand::FirmwareCheck => "Verify the firmware CRC",
            CliCommand::GetFirmwareVersion => "Read the firmware version",
            CliCommand::ChangePassword { .. } => "Replace the CLI password",
        }
    }

    pub fn payload(&self) -> String {
        match self {
            CliCommand::GetConfig => "GET_CFG".to_string(),
            CliCommand::Reset => "RESET".to_string(),
            CliCommand::GetTransportErrors => "GET_TSP_ERRORS".to_string(),
            CliCommand::ClearTransportErrors => "CLR_TSP_ERRORS".to_string(),
            CliCommand::FirmwareCheck => "FW_CHCK".to_string(),
            CliCommand::GetFirmwareVersion => "GET_FW_VERSION".to_string(),
            CliCommand::ChangePassword { new_hash } => format!("CHANGE_PWD:{}", new_hash),
        }
    }
}

pub struct CommandBuilder;

impl CommandBuilder {
    /// Frames a command for the device. Commands always carry the password hash.
    pub fn build(
        command: &CliCommand,
        password_hash: &str,
        chunk_size: usize,
    ) -> Result<ChunkedOutput> {
        if password_hash.is_empty() {
            return Err(PinCfgError::Command(
                "Please enter a password for authentication".to_string(),
            ));
        }
        let envelope = Envelope::command(password_hash, &command.payload());
        info!("Built command {} ({} bytes)", command.payload(), envelope.len());
        Ok(ChunkedOutput::new(envelope, chunk_size))
    }
}
