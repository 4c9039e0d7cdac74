//! Typed credential records over a query-based secure item vault.
//!
//! Callers describe a credential as a [`Record`] (or just an [`Identity`]
//! for reads and deletes). The [`mapper`] turns it into the vault's native
//! [`AttributeMap`], the [`operations`] roles run create/read/update/delete
//! through an injected [`RequestExecutor`], and responses are decoded back
//! into typed records.
//!
//! # Modules
//!
//! - [`record`]: identities and records.
//! - [`attributes`]: kind-specific optional attributes and the key table.
//! - [`payload`]: caller data stored as an encoded blob.
//! - [`value`]: wire values and the attribute mapping.
//! - [`mapper`]: record to mapping conversion.
//! - [`operations`]: `Createable` / `Readable` / `Updateable` / `Deleteable`.
//! - [`executor`]: the provider seam, status vocabulary and a recording stub.
//! - [`memory`]: an in-process vault provider.
//! - [`error`]: unified error type.
//!
//! # Quick Start
//!
//! ```rust
//! use locksmith_core::{Createable, Identity, MemoryVault, Payload, Readable, Record};
//!
//! # fn example() -> locksmith_core::Result<()> {
//! let vault = MemoryVault::new();
//!
//! let payload: Payload = [("some", "data")].into_iter().collect();
//! Record::generic("myUser", "myService")?
//!     .with_payload(payload.clone())
//!     .create(&vault)?;
//!
//! let read = Identity::generic("myUser", "myService")?.read(&vault)?;
//! assert_eq!(read.and_then(|r| r.into_payload()), Some(payload));
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod attributes;
pub mod error;
pub mod executor;
pub mod mapper;
pub mod memory;
pub mod operations;
pub mod payload;
pub mod record;
pub mod value;

// Re-export the most commonly used types at the crate root for convenience.
pub use attributes::{
    Accessibility, Attributes, AuthenticationType, GenericAttributes, InternetProtocol, ItemKind,
    NetworkAttributes,
};
pub use error::{Result, VaultError};
pub use executor::{Operation, QueryOptions, RequestExecutor, Response, Status, StubExecutor};
pub use memory::MemoryVault;
pub use operations::{Createable, Deleteable, Readable, SecureStorable, Updateable};
pub use payload::Payload;
pub use record::{Identity, Record};
pub use value::{AttributeMap, Value, WireType};
