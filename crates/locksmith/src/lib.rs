//! Keychain-style credential storage with a default service.
//!
//! [`Locksmith`] is the short way in: it stores a [`Payload`] per user
//! account as a generic credential, under either an explicit service or the
//! default one it was built with. Each call is a direct pass-through to the
//! [`Createable`], [`Readable`], [`Updateable`] and [`Deleteable`] roles of
//! `locksmith-core`, so it behaves exactly like driving those roles by hand.
//!
//! ```rust,no_run
//! use locksmith::{Locksmith, LocksmithConfig, Payload};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LocksmithConfig::from_file("locksmith.toml")?.with_env_overrides()?;
//! let locksmith = Locksmith::open(&config)?;
//!
//! let data: Payload = [("some", "data")].into_iter().collect();
//! locksmith.save(data, "myUser", None)?;
//! assert!(locksmith.load("myUser", None)?.is_some());
//! locksmith.delete("myUser", None)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

use locksmith_core::{Createable, Deleteable, Identity, Readable, Record, Updateable};
use locksmith_core::Result as VaultResult;
use locksmith_store::{FileKeychain, KeychainProvider, SqliteVault, load_or_create_master_key};

#[cfg(target_os = "macos")]
use locksmith_store::SystemKeychain;

pub use config::{KeychainBackend, LocksmithConfig};
pub use error::{LocksmithError, Result};
pub use locksmith_core::{Payload, RequestExecutor, VaultError};

/// CRUD on generic credentials through one executor, with a default service.
#[derive(Debug)]
pub struct Locksmith<E: RequestExecutor> {
    executor: E,
    default_service: String,
}

impl Locksmith<SqliteVault> {
    /// Open the encrypted SQLite vault described by `config`, creating the
    /// data directory, master key and database on first use.
    pub fn open(config: &LocksmithConfig) -> Result<Self> {
        let master_key = load_or_create_master_key(keychain_for(config)?.as_ref())?;
        let vault = SqliteVault::open(config.database_path(), master_key)?;

        tracing::info!(
            data_dir = %config.data_dir.display(),
            default_service = %config.default_service,
            keychain = %config.keychain,
            "locksmith ready"
        );
        Ok(Self::new(vault, config.default_service.clone()))
    }
}

fn keychain_for(config: &LocksmithConfig) -> Result<Box<dyn KeychainProvider>> {
    match config.keychain {
        KeychainBackend::File => Ok(Box::new(FileKeychain::new(config.key_path()))),
        #[cfg(target_os = "macos")]
        KeychainBackend::System => Ok(Box::new(SystemKeychain::with_names(
            config.default_service.clone(),
            SystemKeychain::DEFAULT_ACCOUNT,
        ))),
        #[cfg(not(target_os = "macos"))]
        KeychainBackend::System => Err(LocksmithError::Config {
            reason: "the system keychain is only available on macOS".into(),
        }),
    }
}

impl<E: RequestExecutor> Locksmith<E> {
    pub fn new(executor: E, default_service: impl Into<String>) -> Self {
        Self {
            executor,
            default_service: default_service.into(),
        }
    }

    pub fn default_service(&self) -> &str {
        &self.default_service
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Store `data` for `account`.
    ///
    /// # Errors
    ///
    /// [`VaultError::DuplicateItem`] if the account already has data in
    /// this service.
    pub fn save(&self, data: Payload, account: &str, service: Option<&str>) -> VaultResult<()> {
        self.record(account, service)?
            .with_payload(data)
            .create(&self.executor)
    }

    /// The data stored for `account`, or `None` if there is none.
    pub fn load(&self, account: &str, service: Option<&str>) -> VaultResult<Option<Payload>> {
        let record = self.identity(account, service)?.read(&self.executor)?;
        Ok(record.and_then(Record::into_payload))
    }

    /// Replace the data stored for `account`.
    ///
    /// # Errors
    ///
    /// [`VaultError::ItemNotFound`] if nothing is stored yet.
    pub fn update(&self, data: Payload, account: &str, service: Option<&str>) -> VaultResult<()> {
        self.record(account, service)?
            .with_payload(data)
            .update(&self.executor)
    }

    /// Remove the data stored for `account`. Succeeds if there is none.
    pub fn delete(&self, account: &str, service: Option<&str>) -> VaultResult<()> {
        self.identity(account, service)?.delete(&self.executor)
    }

    fn identity(&self, account: &str, service: Option<&str>) -> VaultResult<Identity> {
        Identity::generic(account, service.unwrap_or(&self.default_service))
    }

    fn record(&self, account: &str, service: Option<&str>) -> VaultResult<Record> {
        Ok(Record::from_identity(self.identity(account, service)?))
    }
}
