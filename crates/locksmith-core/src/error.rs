//! Vault error types.
//!
//! Every public operation in this crate surfaces failures through
//! [`VaultError`]. Mapper failures are raised before any request reaches the
//! provider; operation failures are derived from the provider [`Status`]
//! and never carry provider-specific codes beyond the `reason` text.
//!
//! [`Status`]: crate::executor::Status

use crate::value::WireType;

/// Unified error type for records, the attribute mapper and the CRUD
/// operation contracts.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    // -- Provider outcomes --------------------------------------------------
    /// An item with this identity already exists.
    #[error("item already exists: account={account}, service={service}")]
    DuplicateItem { account: String, service: String },

    /// No item matches this identity.
    #[error("item not found: account={account}, service={service}")]
    ItemNotFound { account: String, service: String },

    /// The provider matched more than one item for a single identity.
    #[error("ambiguous match: account={account}, service={service}")]
    AmbiguousMatch { account: String, service: String },

    /// The provider (or identity validation) rejected a field.
    #[error("invalid attribute: {reason}")]
    InvalidAttribute { reason: String },

    /// The vault could not be reached, is locked, or denied access.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    // -- Mapper errors ------------------------------------------------------
    /// A payload value cannot be represented by the payload encoding.
    #[error("unsupported payload value for key {key:?}: {reason}")]
    UnsupportedPayloadValue { key: String, reason: String },

    /// A stored attribute has a different wire type than its field expects.
    #[error("attribute {key:?} has wire type {found}, expected {expected}")]
    AttributeTypeMismatch {
        key: &'static str,
        expected: WireType,
        found: WireType,
    },

    /// The stored payload blob is not a valid encoded payload.
    #[error("corrupt payload: {reason}")]
    CorruptPayload { reason: String },

    /// The provider answered with a mapping the mapper cannot decode.
    #[error("malformed response: {reason}")]
    MalformedResponse { reason: String },
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, VaultError>;
