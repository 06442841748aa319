//! Client configuration.
//!
//! Supports TOML config files, environment variable overrides, and defaults.

use crate::error::{ClientError, Result};
use base_sync_core::diagnostics::DEFAULT_DIAGNOSTIC_CAPACITY;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// What to do when an update changes a field's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResyncMode {
    /// Keep the replica and mark the field's options as stale.
    #[default]
    MarkStale,
    /// Fetch a fresh snapshot and replace the replica.
    Refetch,
}

impl std::str::FromStr for ResyncMode {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mark-stale" => Ok(ResyncMode::MarkStale),
            "refetch" => Ok(ResyncMode::Refetch),
            other => Err(ClientError::Config(format!("Invalid resync mode: {}", other))),
        }
    }
}

/// Configuration for a sync client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address, `host:port` (default: "127.0.0.1:3434")
    pub server_address: String,
    /// Token attached to every request (default: none)
    pub auth_token: Option<String>,
    /// Appended to the base id to form the change channel (default: ":changed")
    pub channel_suffix: String,
    /// Route that returns the initial snapshot (default: "base-sync:create")
    pub snapshot_route: String,
    /// Buffered diagnostics per subscriber (default: 256)
    pub diagnostics_capacity: usize,
    /// TCP connect timeout in milliseconds (default: 10000)
    pub connect_timeout_ms: u64,
    /// Type change handling (default: mark-stale)
    pub resync: ResyncMode,
    /// Log every applied change (default: false)
    pub verbose: bool,
    /// Fire the data callback only after the snapshot (default: false)
    pub data_callback_only_once: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:3434".to_string(),
            auth_token: None,
            channel_suffix: ":changed".to_string(),
            snapshot_route: "base-sync:create".to_string(),
            diagnostics_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
            connect_timeout_ms: 10_000,
            resync: ResyncMode::MarkStale,
            verbose: false,
            data_callback_only_once: false,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ClientError::Config(format!("Failed to read config file: {}", e)))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| ClientError::Config(format!("Invalid TOML: {}", e)))
    }

    /// Saves the configuration to a TOML file.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| ClientError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), toml)
            .map_err(|e| ClientError::Config(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Applies environment variable overrides.
    /// Environment variables are prefixed with `BASESYNC_`.
    /// Example: `BASESYNC_SERVER_ADDRESS=10.0.0.2:3434` overrides `server_address`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = env::var("BASESYNC_SERVER_ADDRESS") {
            self.server_address = val;
        }
        if let Ok(val) = env::var("BASESYNC_AUTH_TOKEN") {
            self.auth_token = Some(val);
        }
        if let Ok(val) = env::var("BASESYNC_CHANNEL_SUFFIX") {
            self.channel_suffix = val;
        }
        if let Ok(val) = env::var("BASESYNC_SNAPSHOT_ROUTE") {
            self.snapshot_route = val;
        }
        if let Ok(val) = env::var("BASESYNC_DIAGNOSTICS_CAPACITY") {
            self.diagnostics_capacity = val.parse().map_err(|_| {
                ClientError::Config(format!("Invalid diagnostics_capacity: {}", val))
            })?;
        }
        if let Ok(val) = env::var("BASESYNC_CONNECT_TIMEOUT_MS") {
            self.connect_timeout_ms = val.parse().map_err(|_| {
                ClientError::Config(format!("Invalid connect_timeout_ms: {}", val))
            })?;
        }
        if let Ok(val) = env::var("BASESYNC_RESYNC") {
            self.resync = val.parse()?;
        }
        if let Ok(val) = env::var("BASESYNC_VERBOSE") {
            self.verbose = val
                .parse()
                .map_err(|_| ClientError::Config(format!("Invalid verbose: {}", val)))?;
        }
        if let Ok(val) = env::var("BASESYNC_DATA_CALLBACK_ONLY_ONCE") {
            self.data_callback_only_once = val.parse().map_err(|_| {
                ClientError::Config(format!("Invalid data_callback_only_once: {}", val))
            })?;
        }
        Ok(())
    }

    /// Validates configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.server_address.is_empty() {
            return Err(ClientError::Config(
                "server_address must not be empty".to_string(),
            ));
        }
        if self.snapshot_route.is_empty() {
            return Err(ClientError::Config(
                "snapshot_route must not be empty".to_string(),
            ));
        }
        if self.diagnostics_capacity == 0 {
            return Err(ClientError::Config(
                "diagnostics_capacity must be greater than 0".to_string(),
            ));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ClientError::Config(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the TCP connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Change channel for the given base.
    pub fn channel_for(&self, base_id: &str) -> String {
        format!("{}{}", base_id, self.channel_suffix)
    }

    /// Per-sync options derived from this configuration.
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            only_once: self.data_callback_only_once,
            verbose: self.verbose,
        }
    }
}

/// Options for a single `start_sync` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Fire the data callback only after the snapshot.
    pub only_once: bool,
    /// Log every applied change.
    pub verbose: bool,
}

impl SyncOptions {
    pub fn only_once(mut self) -> Self {
        self.only_once = true;
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;
    use tempfile::tempdir;

    #[test]
    #[timeout(1000)]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.channel_suffix, ":changed");
        assert_eq!(config.snapshot_route, "base-sync:create");
        assert_eq!(config.resync, ResyncMode::MarkStale);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    #[timeout(1000)]
    fn test_from_toml_partial() {
        let config = ClientConfig::from_toml(
            r#"
            server_address = "10.0.0.5:4000"
            resync = "refetch"
            data_callback_only_once = true
            "#,
        )
        .unwrap();
        assert_eq!(config.server_address, "10.0.0.5:4000");
        assert_eq!(config.resync, ResyncMode::Refetch);
        assert!(config.data_callback_only_once);
        // Missing keys keep their defaults
        assert_eq!(config.channel_suffix, ":changed");
    }

    #[test]
    #[timeout(1000)]
    fn test_invalid_toml() {
        let err = ClientConfig::from_toml("server_address = [").unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    #[timeout(1000)]
    fn test_save_and_load_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.toml");

        let mut config = ClientConfig::default();
        config.auth_token = Some("secret".to_string());
        config.verbose = true;
        config.save_to_file(&path).unwrap();

        let loaded = ClientConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    #[timeout(1000)]
    fn test_missing_file() {
        let dir = tempdir().unwrap();
        let err = ClientConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    #[timeout(1000)]
    fn test_env_overrides() {
        env::set_var("BASESYNC_SERVER_ADDRESS", "192.168.1.9:3434");
        env::set_var("BASESYNC_RESYNC", "refetch");
        env::set_var("BASESYNC_CONNECT_TIMEOUT_MS", "2500");

        let mut config = ClientConfig::default();
        config.apply_env_overrides().unwrap();

        env::remove_var("BASESYNC_SERVER_ADDRESS");
        env::remove_var("BASESYNC_RESYNC");
        env::remove_var("BASESYNC_CONNECT_TIMEOUT_MS");

        assert_eq!(config.server_address, "192.168.1.9:3434");
        assert_eq!(config.resync, ResyncMode::Refetch);
        assert_eq!(config.connect_timeout_ms, 2500);
    }

    #[test]
    #[timeout(1000)]
    fn test_validate_rejects_zero_capacity() {
        let config = ClientConfig {
            diagnostics_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    #[timeout(1000)]
    fn test_channel_and_options() {
        let config = ClientConfig {
            data_callback_only_once: true,
            ..Default::default()
        };
        assert_eq!(config.channel_for("appB1"), "appB1:changed");
        assert_eq!(
            config.sync_options(),
            SyncOptions {
                only_once: true,
                verbose: false
            }
        );
        assert!(SyncOptions::default().verbose().verbose);
    }
}
