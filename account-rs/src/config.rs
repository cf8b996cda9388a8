//! Configuration for account-rs
//!
//! Every field has a default so a partial (or missing) file still yields a
//! usable configuration. Values are layered as: defaults, then the TOML
//! file, then `ACCOUNT__<SECTION>__<FIELD>` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{AccountError, Result};

pub const DEFAULT_COMMAND_PREFIX: &str = "$account";
pub const DEFAULT_DENIED_REPLY: &str =
    "Account {identity} has expired or is not activated. Please contact an administrator to renew.";
pub const DEFAULT_FAILURE_REPLY: &str =
    "Your request could not be processed right now, please try again later.";

/// Main configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountConfig {
    pub storage: StorageConfig,
    pub quota: QuotaConfig,
    pub access: AccessConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path of the SQLite database file, or `:memory:`
    pub database_path: String,
    /// Pool size; in-memory databases always use a single connection
    pub max_connections: u32,
}

/// Free quota configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Free uses granted per calendar day to identities without a paid plan
    pub daily_free_limit: u32,
    /// Replies get a quota hint once the remaining count drops to this value
    pub hint_threshold: u32,
}

/// Access control configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Identities that bypass every check and may run admin commands
    pub admin_ids: Vec<String>,
    /// Text that introduces an admin command, e.g. `$account list`
    pub command_prefix: String,
    /// Reply sent on denial; `{identity}` is replaced with the denied identity
    pub denied_reply: String,
    /// Reply sent when the request failed internally
    pub failure_reply: String,
    /// Trial length used when first-contact trials are enabled
    pub default_trial_days: u32,
    /// Start unknown identities on an active trial instead of expired
    pub grant_trial_on_first_contact: bool,
    /// Also check the sender when their group is allowed
    pub check_group_members: bool,
}

/// HTTP gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "accounts.db".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_free_limit: 30,
            hint_threshold: 3,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            admin_ids: Vec::new(),
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            denied_reply: DEFAULT_DENIED_REPLY.to_string(),
            failure_reply: DEFAULT_FAILURE_REPLY.to_string(),
            default_trial_days: 30,
            grant_trial_on_first_contact: false,
            check_group_members: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8095".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl StorageConfig {
    /// Storage for tests and throwaway runs.
    pub fn in_memory() -> Self {
        Self {
            database_path: ":memory:".to_string(),
            max_connections: 1,
        }
    }

    pub fn is_memory(&self) -> bool {
        self.database_path == ":memory:" || self.database_path == "sqlite::memory:"
    }

    /// SQLx connection URL for the configured path.
    pub fn database_url(&self) -> String {
        if self.is_memory() {
            "sqlite::memory:".to_string()
        } else if self.database_path.starts_with("sqlite:") {
            self.database_path.clone()
        } else {
            format!("sqlite://{}", self.database_path)
        }
    }

    /// Effective pool size.
    pub fn pool_size(&self) -> u32 {
        if self.is_memory() {
            1
        } else {
            self.max_connections.max(1)
        }
    }
}

impl AccessConfig {
    /// Denial text for a given identity.
    pub fn denied_reply_for(&self, identity: &str) -> String {
        self.denied_reply.replace("{identity}", identity)
    }
}

impl AccountConfig {
    /// Load configuration from an optional TOML file plus environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix("ACCOUNT")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("access.admin_ids")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: AccountConfig = settings.try_deserialize()?;
        config.validate();
        Ok(config)
    }

    /// Load configuration, falling back to defaults instead of failing.
    ///
    /// A missing file is created with the default values so operators have
    /// something to edit.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            match config.write_to(path) {
                Ok(()) => info!("Wrote default configuration to {}", path.display()),
                Err(e) => warn!("Could not write default configuration to {}: {}", path.display(), e),
            }
        }

        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Invalid configuration in {}, using defaults: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Serialize the configuration to a TOML file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| AccountError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Normalise values that have a safe default.
    pub fn validate(&mut self) {
        let mut seen = HashSet::new();
        self.access.admin_ids = self
            .access
            .admin_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty() && seen.insert(id.clone()))
            .collect();

        if self.access.command_prefix.trim().is_empty() {
            warn!("Empty command prefix, using {}", DEFAULT_COMMAND_PREFIX);
            self.access.command_prefix = DEFAULT_COMMAND_PREFIX.to_string();
        } else {
            self.access.command_prefix = self.access.command_prefix.trim().to_string();
        }

        if self.access.denied_reply.trim().is_empty() {
            self.access.denied_reply = DEFAULT_DENIED_REPLY.to_string();
        }
        if self.access.failure_reply.trim().is_empty() {
            self.access.failure_reply = DEFAULT_FAILURE_REPLY.to_string();
        }

        if self.storage.database_path.trim().is_empty() {
            self.storage.database_path = StorageConfig::default().database_path;
        }
        self.storage.max_connections = self.storage.max_connections.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AccountConfig::default();
        assert_eq!(config.quota.daily_free_limit, 30);
        assert_eq!(config.quota.hint_threshold, 3);
        assert_eq!(config.access.default_trial_days, 30);
        assert_eq!(config.access.command_prefix, "$account");
        assert!(config.access.admin_ids.is_empty());
        assert!(!config.access.grant_trial_on_first_contact);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("account.toml");
        std::fs::write(
            &path,
            r#"
            [access]
            admin_ids = ["admin_1", " admin_2 ", "admin_1", ""]

            [quota]
            daily_free_limit = 5
            "#,
        )
        .unwrap();

        let config = AccountConfig::load(&path).unwrap();
        assert_eq!(config.access.admin_ids, vec!["admin_1", "admin_2"]);
        assert_eq!(config.quota.daily_free_limit, 5);
        assert_eq!(config.quota.hint_threshold, 3);
        assert_eq!(config.storage.database_path, "accounts.db");
    }

    #[test]
    fn test_load_or_default_writes_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("account.toml");

        let config = AccountConfig::load_or_default(&path);
        assert_eq!(config.quota.daily_free_limit, 30);
        assert!(path.exists());

        let reloaded = AccountConfig::load(&path).unwrap();
        assert_eq!(reloaded.access.command_prefix, config.access.command_prefix);
    }

    #[test]
    fn test_load_or_default_survives_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("account.toml");
        std::fs::write(&path, "[quota]\ndaily_free_limit = \"many\"\n").unwrap();

        let config = AccountConfig::load_or_default(&path);
        assert_eq!(config.quota.daily_free_limit, 30);
    }

    #[test]
    fn test_validate_restores_empty_prefix() {
        let mut config = AccountConfig::default();
        config.access.command_prefix = "   ".to_string();
        config.storage.max_connections = 0;
        config.validate();
        assert_eq!(config.access.command_prefix, "$account");
        assert_eq!(config.storage.max_connections, 1);
    }

    #[test]
    fn test_database_url() {
        let mut storage = StorageConfig::default();
        assert_eq!(storage.database_url(), "sqlite://accounts.db");
        assert_eq!(storage.pool_size(), 5);

        storage.database_path = ":memory:".to_string();
        assert_eq!(storage.database_url(), "sqlite::memory:");
        assert_eq!(storage.pool_size(), 1);
    }

    #[test]
    fn test_denied_reply_template() {
        let access = AccessConfig::default();
        let reply = access.denied_reply_for("wxid_abc");
        assert!(reply.contains("wxid_abc"));
        assert!(reply.contains("administrator"));
    }
}
