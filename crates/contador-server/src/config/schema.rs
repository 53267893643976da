use std::net::SocketAddr;

use serde::Deserialize;
use contador_core::error::{CoapError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub counter: CounterSection,

    #[serde(default)]
    pub observe: ObserveSection,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            counter: CounterSection::default(),
            observe: ObserveSection::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(CoapError::BadRequest(format!(
                "unsupported config version: {}",
                self.version
            )));
        }

        self.server.validate()?;
        self.counter.validate()?;
        self.observe.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_max_datagram_bytes")]
    pub max_datagram_bytes: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_datagram_bytes: default_max_datagram_bytes(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        if self.listen.parse::<SocketAddr>().is_err() {
            return Err(CoapError::BadRequest(format!(
                "server.listen must be a valid SocketAddr, got {:?}",
                self.listen
            )));
        }
        if !(64..=65507).contains(&self.max_datagram_bytes) {
            return Err(CoapError::BadRequest(
                "server.max_datagram_bytes must be between 64 and 65507".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CounterSection {
    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default)]
    pub initial_value: i32,

    #[serde(default = "default_notify_interval_ms")]
    pub notify_interval_ms: u64,

    #[serde(default = "default_notify_payload")]
    pub notify_payload: String,
}

impl Default for CounterSection {
    fn default() -> Self {
        Self {
            path: default_path(),
            initial_value: 0,
            notify_interval_ms: default_notify_interval_ms(),
            notify_payload: default_notify_payload(),
        }
    }
}

impl CounterSection {
    pub fn validate(&self) -> Result<()> {
        let seg = self.path.trim_matches('/');
        if seg.is_empty() || seg.contains('/') || seg.len() > 255 {
            return Err(CoapError::BadRequest(
                "counter.path must be a single non-empty path segment (max 255 bytes)".into(),
            ));
        }
        if !(10..=3_600_000).contains(&self.notify_interval_ms) {
            return Err(CoapError::BadRequest(
                "counter.notify_interval_ms must be between 10 and 3600000".into(),
            ));
        }
        if self.notify_payload.is_empty() || self.notify_payload.len() > 1024 {
            return Err(CoapError::BadRequest(
                "counter.notify_payload must be 1..=1024 bytes".into(),
            ));
        }
        Ok(())
    }

    /// Resource path in `/segment` form.
    pub fn resource_path(&self) -> String {
        format!("/{}", self.path.trim_matches('/'))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObserveSection {
    #[serde(default = "default_max_observers")]
    pub max_observers: usize,

    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for ObserveSection {
    fn default() -> Self {
        Self {
            max_observers: default_max_observers(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl ObserveSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=4096).contains(&self.max_observers) {
            return Err(CoapError::BadRequest(
                "observe.max_observers must be between 1 and 4096".into(),
            ));
        }
        if !(1..=60_000).contains(&self.send_timeout_ms) {
            return Err(CoapError::BadRequest(
                "observe.send_timeout_ms must be between 1 and 60000".into(),
            ));
        }
        Ok(())
    }
}

fn default_listen() -> String {
    "0.0.0.0:5683".into()
}
fn default_max_datagram_bytes() -> usize {
    1152
}
fn default_path() -> String {
    "contador".into()
}
fn default_notify_interval_ms() -> u64 {
    5000
}
fn default_notify_payload() -> String {
    "aumento identificado".into()
}
fn default_max_observers() -> usize {
    64
}
fn default_send_timeout_ms() -> u64 {
    1000
}
