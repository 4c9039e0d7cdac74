//! Facade configuration.
//!
//! Settings come from an optional `[locksmith]` table in a TOML file, with
//! every field defaulted, and can then be overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `LOCKSMITH_DEFAULT_SERVICE` | `default_service` |
//! | `LOCKSMITH_DATA_DIR` | `data_dir` |
//! | `LOCKSMITH_KEYCHAIN` | `keychain` |
//!
//! ```toml
//! [locksmith]
//! default_service = "com.example.app"
//! data_dir = "/var/lib/example"
//! database_file = "vault.db"
//! keychain = "file"   # or "system" on macOS
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use locksmith_store::FileKeychain;
use serde::{Deserialize, Serialize};

use crate::error::{LocksmithError, Result};

/// Service used when a facade call omits one.
pub const DEFAULT_SERVICE: &str = "locksmith";

pub const ENV_DEFAULT_SERVICE: &str = "LOCKSMITH_DEFAULT_SERVICE";
pub const ENV_DATA_DIR: &str = "LOCKSMITH_DATA_DIR";
pub const ENV_KEYCHAIN: &str = "LOCKSMITH_KEYCHAIN";

/// Where the vault master key is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeychainBackend {
    /// A wrapped key file under `data_dir`.
    #[default]
    File,
    /// The macOS login keychain.
    System,
}

impl fmt::Display for KeychainBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::System => f.write_str("system"),
        }
    }
}

impl FromStr for KeychainBackend {
    type Err = LocksmithError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "file" => Ok(Self::File),
            "system" => Ok(Self::System),
            other => Err(LocksmithError::Config {
                reason: format!("unknown keychain backend {other:?}, expected file or system"),
            }),
        }
    }
}

/// Settings for [`Locksmith::open`](crate::Locksmith::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocksmithConfig {
    /// Service name for calls that do not pass one.
    pub default_service: String,
    /// Directory holding the database and the master key file.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_file: String,
    /// Master key storage.
    pub keychain: KeychainBackend,
}

impl Default for LocksmithConfig {
    fn default() -> Self {
        Self {
            default_service: DEFAULT_SERVICE.to_string(),
            data_dir: PathBuf::from("data"),
            database_file: "vault.db".to_string(),
            keychain: KeychainBackend::File,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    locksmith: LocksmithConfig,
}

impl LocksmithConfig {
    /// Parse a TOML document. A missing `[locksmith]` table yields defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| LocksmithError::Config {
            reason: format!("failed to parse TOML config: {e}"),
        })?;
        file.locksmith.validated()
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "configuration file does not exist, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| LocksmithError::Config {
            reason: format!("failed to read {}: {e}", path.display()),
        })?;
        let config = Self::from_toml_str(&content)?;

        tracing::info!(path = %path.display(), "configuration loaded from file");
        Ok(config)
    }

    /// Apply `LOCKSMITH_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides looked up by variable name. Empty values are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let value = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(service) = value(ENV_DEFAULT_SERVICE) {
            tracing::debug!(
                default_service = %service,
                "default service overridden from environment"
            );
            self.default_service = service;
        }
        if let Some(dir) = value(ENV_DATA_DIR) {
            tracing::debug!(data_dir = %dir, "data directory overridden from environment");
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = value(ENV_KEYCHAIN) {
            self.keychain = backend.parse()?;
            tracing::debug!(keychain = %self.keychain, "keychain overridden from environment");
        }
        self.validated()
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }

    pub fn key_path(&self) -> PathBuf {
        FileKeychain::default_path(&self.data_dir)
    }

    fn validated(self) -> Result<Self> {
        if self.default_service.is_empty() {
            return Err(LocksmithError::Config {
                reason: "default_service must not be empty".into(),
            });
        }
        if self.database_file.is_empty() {
            return Err(LocksmithError::Config {
                reason: "database_file must not be empty".into(),
            });
        }
        if self.keychain == KeychainBackend::System && !cfg!(target_os = "macos") {
            return Err(LocksmithError::Config {
                reason: "the system keychain is only available on macOS".into(),
            });
        }
        Ok(self)
    }
}
