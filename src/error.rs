use thiserror::Error;

#[derive(Error, Debug)]
pub enum PinCfgError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Model error: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, PinCfgError>;
