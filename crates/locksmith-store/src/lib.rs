//! Persistent vault provider for locksmith.
//!
//! [`SqliteVault`] implements the [`RequestExecutor`](locksmith_core::RequestExecutor)
//! protocol on top of SQLite. Every item is encrypted at rest with
//! AES-256-GCM under a master key, which in turn is kept by a
//! [`KeychainProvider`] (by default the file-based [`FileKeychain`]).
//!
//! # Modules
//!
//! - [`sqlite`]: the encrypted item table and the executor implementation.
//! - [`crypto`]: AES-256-GCM sealing, PBKDF2 derivation, the master key type.
//! - [`keychain`]: master key storage (key file, or the macOS login keychain).
//! - [`error`]: store error type.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use locksmith_core::{Createable, Identity, Readable, Record};
//! use locksmith_store::{FileKeychain, SqliteVault, load_or_create_master_key};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keychain = FileKeychain::new("data/master.key");
//! let master_key = load_or_create_master_key(&keychain)?;
//! let vault = SqliteVault::open("data/vault.db", master_key)?;
//!
//! Record::generic("myUser", "myService")?
//!     .with_payload([("some", "data")].into_iter().collect())
//!     .create(&vault)?;
//!
//! let record = Identity::generic("myUser", "myService")?.read(&vault)?;
//! assert!(record.is_some());
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod keychain;
pub mod sqlite;

pub use crypto::MasterKey;
pub use error::{Result, StoreError};
pub use keychain::{FileKeychain, KeychainProvider, load_or_create_master_key};
pub use sqlite::{ItemSummary, SqliteVault};

#[cfg(target_os = "macos")]
pub use keychain::SystemKeychain;
