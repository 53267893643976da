//! Server config loader (strict parsing).

pub mod schema;

use std::fs;
use std::path::Path;

use contador_core::error::{CoapError, Result};

pub use schema::{CounterSection, ObserveSection, ServerConfig, ServerSection};

/// Config file read when no path is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "contador.yaml";

pub fn load_from_file(path: &str) -> Result<ServerConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| CoapError::Internal(format!("read config failed ({path}): {e}")))?;
    load_from_str(&s)
}

pub fn load_from_str(s: &str) -> Result<ServerConfig> {
    let cfg: ServerConfig = serde_yaml::from_str(s)
        .map_err(|e| CoapError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load an explicit path, or the default file if present, or built-in defaults.
pub fn load(path: Option<&str>) -> Result<ServerConfig> {
    match path {
        Some(p) => load_from_file(p),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_from_file(DEFAULT_CONFIG_PATH),
        None => {
            tracing::info!(path = DEFAULT_CONFIG_PATH, "config file not found, using defaults");
            Ok(ServerConfig::default())
        }
    }
}
