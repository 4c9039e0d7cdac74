//! Facade error type.

use locksmith_core::VaultError;
use locksmith_store::StoreError;

/// Errors raised while configuring or opening a [`Locksmith`](crate::Locksmith).
#[derive(Debug, thiserror::Error)]
pub enum LocksmithError {
    /// A CRUD operation failed.
    #[error(transparent)]
    Vault(#[from] VaultError),

    /// The persistent provider or its master key could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The configuration file could not be read or is invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },
}

pub type Result<T> = std::result::Result<T, LocksmithError>;
