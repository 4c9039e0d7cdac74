//! Store error types.
//!
//! [`StoreError`] covers everything that can go wrong while opening the item
//! database, sealing or opening item blobs, and managing the master key.
//! Errors raised while serving a request never leave the provider as a
//! `StoreError`: the executor seam reports them as a provider status.

/// Error type for the encrypted item store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // -- Crypto errors ------------------------------------------------------
    /// Sealing an item or key blob failed.
    #[error("encryption failed: {reason}")]
    EncryptionFailed { reason: String },

    /// Opening a sealed blob failed (wrong key, tampered data, bad nonce).
    #[error("decryption failed: {reason}")]
    DecryptionFailed { reason: String },

    /// A master key of the wrong size was supplied or stored.
    #[error("master key must be {expected} bytes, got {found}")]
    InvalidKeyLength { expected: usize, found: usize },

    /// The system random number generator failed.
    #[error("secure random generator unavailable")]
    RandomUnavailable,

    // -- Keychain errors ----------------------------------------------------
    /// No master key has been stored yet.
    #[error("master key not found in keychain")]
    MasterKeyNotFound,

    /// The stored master key file is not in the expected format.
    #[error("corrupted key file {path}: {reason}")]
    CorruptKeyFile { path: String, reason: String },

    /// The platform keychain refused or failed a request.
    #[error("keychain unavailable: {reason}")]
    KeychainUnavailable { reason: String },

    // -- Database errors ----------------------------------------------------
    /// Schema setup failed.
    #[error("migration failed: {reason}")]
    MigrationFailed { reason: String },

    /// A stored row could not be turned back into an item.
    #[error("corrupted item {account}/{service}: {reason}")]
    CorruptItem {
        account: String,
        service: String,
        reason: String,
    },

    // -- Underlying errors --------------------------------------------------
    /// SQLite error from `rusqlite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization of an item mapping failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error (key file, database directory).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;
