//! Configuration file support
//!
//! Loads and validates command layer configuration from TOML files.
//! Default location: /etc/ovn/ovn-nb-batch.toml

use crate::acl::AclRemovalPolicy;
use crate::error::{NbError, NbResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ovn/ovn-nb-batch.toml";

/// Row store connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Snapshot file backing the in-memory row store
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Transaction timeout in seconds (0 disables the timeout)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Log definitive transaction errors at error level
    #[serde(default = "default_log_errors")]
    pub log_errors: bool,
}

/// ACL reconciliation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AclConfig {
    /// How direct-mode removal matches existing ACLs
    #[serde(default)]
    pub direct_removal: AclRemovalPolicy,
}

/// Query configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Only report switches, ports and routers carrying Neutron name tags
    #[serde(default)]
    pub managed_only: bool,
}

/// Complete command layer configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NbConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,

    #[serde(default)]
    pub acl: AclConfig,

    #[serde(default)]
    pub query: QueryConfig,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("/var/lib/ovn/ovnnb_db.json")
}

fn default_timeout_secs() -> u64 {
    180
}

fn default_log_errors() -> bool {
    true
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            timeout_secs: default_timeout_secs(),
            log_errors: default_log_errors(),
        }
    }
}

impl NbConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> NbResult<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: NbConfig = toml::from_str(&content).map_err(|e| {
                    NbError::invalid_config(path.display().to_string(), e.to_string())
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(NbError::Io(e)),
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> NbResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| NbError::invalid_config("config", e.to_string()))?;
        fs::write(path.as_ref(), content)?;
        Ok(())
    }

    /// Transaction timeout, `None` when disabled
    pub fn transaction_timeout(&self) -> Option<Duration> {
        match self.connection.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> NbResult<()> {
        if self.connection.snapshot_path.as_os_str().is_empty() {
            return Err(NbError::invalid_config(
                "connection.snapshot_path",
                "must not be empty",
            ));
        }
        if self.connection.timeout_secs > 24 * 3600 {
            return Err(NbError::invalid_config(
                "connection.timeout_secs",
                "must be at most one day",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NbConfig::default();
        assert_eq!(config.connection.timeout_secs, 180);
        assert!(config.connection.log_errors);
        assert_eq!(config.acl.direct_removal, AclRemovalPolicy::MatchOnly);
        assert!(!config.query.managed_only);
    }

    #[test]
    fn test_transaction_timeout() {
        let mut config = NbConfig::default();
        assert_eq!(config.transaction_timeout(), Some(Duration::from_secs(180)));
        config.connection.timeout_secs = 0;
        assert_eq!(config.transaction_timeout(), None);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(NbConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_timeout() {
        let mut config = NbConfig::default();
        config.connection.timeout_secs = 100_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
[connection]
timeout_secs = 30

[acl]
direct_removal = "full_value"
"#;
        let config: NbConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.connection.timeout_secs, 30);
        assert_eq!(config.acl.direct_removal, AclRemovalPolicy::FullValue);
        // Unspecified values should use defaults
        assert!(config.connection.log_errors);
        assert!(!config.query.managed_only);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.toml");
        let mut config = NbConfig::default();
        config.query.managed_only = true;
        config.save(&path).unwrap();

        let loaded = NbConfig::load_or_default(&path).unwrap();
        assert!(loaded.query.managed_only);
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = NbConfig::load_or_default("/nonexistent/path.toml").unwrap();
        assert_eq!(config.connection.timeout_secs, 180);
    }
}
