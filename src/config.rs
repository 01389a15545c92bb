//! Relay configuration.
//!
//! Everything has a default, so an empty file (or no file at all) gives the
//! same behavior as the dashboard server the game is normally pointed at:
//!
//! ```yaml
//! udp_bind: 0.0.0.0:1555
//! ws_bind: 0.0.0.0:8765
//! subscriber_queue: 16
//! send_timeout_ms: 1000
//! handshake_timeout_ms: 5000
//! schema: ./my-layout.yaml   # optional, defaults to the built-in Dash table
//! ```
//!
//! `RELAY_UDP_PORT` and `RELAY_WS_PORT` override the ports of the bind addresses.

use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::schema::{SchemaDefinition, TelemetrySchema, dash_schema};
use crate::transport::ConnectionOptions;
use crate::{RelayError, Result};

/// Default UDP port the game sends telemetry to.
pub const DEFAULT_UDP_PORT: u16 = 1555;

/// Default WebSocket port dashboards connect to.
pub const DEFAULT_WS_PORT: u16 = 8765;

pub const UDP_PORT_ENV: &str = "RELAY_UDP_PORT";
pub const WS_PORT_ENV: &str = "RELAY_WS_PORT";

/// Relay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Telemetry listener address (default: 0.0.0.0:1555)
    pub udp_bind: SocketAddr,
    /// Subscriber listener address (default: 0.0.0.0:8765)
    pub ws_bind: SocketAddr,
    /// Per-subscriber queue depth (default: 16)
    pub subscriber_queue: usize,
    /// Per-frame write timeout in milliseconds (default: 1000)
    pub send_timeout_ms: u64,
    /// WebSocket handshake timeout in milliseconds (default: 5000)
    pub handshake_timeout_ms: u64,
    /// Optional YAML schema definition replacing the built-in table
    pub schema: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            udp_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_UDP_PORT)),
            ws_bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_WS_PORT)),
            subscriber_queue: 16,
            send_timeout_ms: 1000,
            handshake_timeout_ms: 5000,
            schema: None,
        }
    }
}

impl RelayConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml_ng::from_str(yaml).map_err(|e| RelayError::config("relay configuration", e.to_string()))
    }

    /// Load a configuration file.
    ///
    /// A relative `schema` path is resolved against the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| RelayError::io(format!("reading config {}", path.display()), e))?;
        let mut config = Self::from_yaml_str(&yaml)?;

        if let (Some(schema), Some(dir)) = (config.schema.as_mut(), path.parent()) {
            if schema.is_relative() {
                *schema = dir.join(&*schema);
            }
        }

        info!(path = %path.display(), "Loaded relay configuration");
        Ok(config)
    }

    /// Apply `RELAY_UDP_PORT` / `RELAY_WS_PORT` from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply port overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = port_override(&lookup, UDP_PORT_ENV)? {
            debug!(port, "UDP port overridden from environment");
            self.udp_bind.set_port(port);
        }
        if let Some(port) = port_override(&lookup, WS_PORT_ENV)? {
            debug!(port, "WebSocket port overridden from environment");
            self.ws_bind.set_port(port);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscriber_queue == 0 {
            return Err(RelayError::config("subscriber_queue", "must be at least 1"));
        }
        if self.send_timeout_ms == 0 {
            return Err(RelayError::config("send_timeout_ms", "must be greater than zero"));
        }
        if self.handshake_timeout_ms == 0 {
            return Err(RelayError::config("handshake_timeout_ms", "must be greater than zero"));
        }
        Ok(())
    }

    /// Build the configured schema, falling back to the built-in Dash table.
    pub fn build_schema(&self) -> Result<TelemetrySchema> {
        match &self.schema {
            Some(path) => SchemaDefinition::load(path)?.into_schema(),
            None => dash_schema(),
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            queue_capacity: self.subscriber_queue,
            send_timeout: Duration::from_millis(self.send_timeout_ms),
            handshake_timeout: Duration::from_millis(self.handshake_timeout_ms),
        }
    }
}

fn port_override<F>(lookup: &F, key: &str) -> Result<Option<u16>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else { return Ok(None) };
    raw.trim()
        .parse::<u16>()
        .map(Some)
        .map_err(|e| RelayError::config(key, format!("'{raw}' is not a valid port: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_dashboard_ports() {
        let config = RelayConfig::default();
        assert_eq!(config.udp_bind.port(), 1555);
        assert_eq!(config.ws_bind.port(), 8765);
        assert!(config.schema.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn empty_and_partial_documents_use_defaults() {
        assert_eq!(RelayConfig::from_yaml_str("").unwrap(), RelayConfig::default());

        let config = RelayConfig::from_yaml_str("ws_bind: 127.0.0.1:9000\nsubscriber_queue: 4\n").unwrap();
        assert_eq!(config.ws_bind, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.subscriber_queue, 4);
        assert_eq!(config.udp_bind, RelayConfig::default().udp_bind);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = RelayConfig::from_yaml_str("udp_port: 1555\n");
        assert!(matches!(result, Err(RelayError::Config { .. })));
    }

    #[test]
    fn env_overrides_replace_ports_only() {
        let mut config = RelayConfig::from_yaml_str("udp_bind: 127.0.0.1:1555\n").unwrap();
        config.apply_overrides(env(&[(UDP_PORT_ENV, "20777"), (WS_PORT_ENV, " 9001 ")])).unwrap();

        assert_eq!(config.udp_bind, "127.0.0.1:20777".parse().unwrap());
        assert_eq!(config.ws_bind.port(), 9001);
    }

    #[test]
    fn invalid_env_port_is_a_config_error() {
        let mut config = RelayConfig::default();
        let err = config.apply_overrides(env(&[(WS_PORT_ENV, "70000")])).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains(WS_PORT_ENV));
        assert_eq!(config.ws_bind.port(), DEFAULT_WS_PORT);
    }

    #[test]
    fn zero_limits_fail_validation() {
        let config = RelayConfig { subscriber_queue: 0, ..RelayConfig::default() };
        assert!(config.validate().is_err());

        let config = RelayConfig { send_timeout_ms: 0, ..RelayConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_schema_is_the_dash_table() {
        let schema = RelayConfig::default().build_schema().unwrap();
        assert_eq!(schema.len(), 72);
        assert_eq!(schema.packet_len(), 323);
    }

    #[test]
    fn connection_options_follow_config() {
        let config = RelayConfig { send_timeout_ms: 250, ..RelayConfig::default() };
        let options = config.connection_options();
        assert_eq!(options.queue_capacity, 16);
        assert_eq!(options.send_timeout, Duration::from_millis(250));
        assert_eq!(options.handshake_timeout, Duration::from_secs(5));
    }

    #[test]
    fn schema_path_resolves_relative_to_config_file() {
        let dir = std::env::temp_dir().join(format!("telemetry-relay-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("layout.yaml"), "fields:\n  - { name: Gear, offset: 2, type: uint8 }\n")
            .unwrap();
        let config_path = dir.join("relay.yaml");
        std::fs::write(&config_path, "schema: layout.yaml\n").unwrap();

        let config = RelayConfig::load(&config_path).unwrap();
        assert_eq!(config.schema.as_deref(), Some(dir.join("layout.yaml").as_path()));

        let schema = config.build_schema().unwrap();
        assert_eq!(schema.packet_len(), 3);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
