/// pinCfg configuration tool
///
/// Builds the switch, input, trigger and sensor configuration of a pinCfg
/// device and converts it to and from the compact text the device CLI reads.

pub mod auth;
pub mod command;
pub mod config;
pub mod decoder;
pub mod editor;
pub mod encoder;
pub mod error;
pub mod model;
pub mod store;
pub mod transport;
pub mod validator;

// Re-export main types for convenience
pub use decoder::{decode, decode_with, DecodeOptions, Decoded};
pub use editor::Editor;
pub use encoder::{encode, Encoded, SizeStatus};
pub use error::{PinCfgError, Result};
pub use model::Configuration;
pub use transport::{chunk, ChunkedOutput, Envelope};
pub use validator::validate;
