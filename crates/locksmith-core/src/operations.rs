//! CRUD capability roles layered on the request executor.
//!
//! Each role asks its implementor only for what the operation needs:
//! [`Readable`] and [`Deleteable`] need an identity, [`Createable`] and
//! [`Updateable`] need a full [`Record`]. [`Identity`] therefore implements
//! the read and delete roles, and [`Record`] implements all four.
//!
//! Outcomes are derived from the provider [`Status`] only:
//!
//! | Status | create | read | update | delete |
//! |--------|--------|------|--------|--------|
//! | `Success` | `Ok` | decoded record | `Ok` | `Ok` |
//! | `DuplicateItem` | `DuplicateItem` | error | error | error |
//! | `ItemNotFound` | error | `Ok(None)` | `ItemNotFound` | `Ok` |
//! | `AmbiguousMatch` | error | `AmbiguousMatch` | `AmbiguousMatch` | error |
//! | `InvalidParameter` | `InvalidAttribute` | same | same | same |
//! | `Unavailable` / `Other` | `StorageUnavailable` | same | same | same |
//!
//! Delete is idempotent: deleting an identity that has no item succeeds.
//! Update merges: attributes set on the record overwrite the stored ones,
//! unset attributes are kept, and a payload (when present) replaces the
//! stored payload wholesale.

use crate::error::{Result, VaultError};
use crate::executor::{Operation, QueryOptions, RequestExecutor, Response, Status};
use crate::mapper;
use crate::record::{Identity, Record};
use crate::value::{AttributeMap, keys};

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Anything that addresses a single vault item.
pub trait SecureStorable {
    fn identity(&self) -> &Identity;

    /// The class/account/service mapping that selects this item.
    fn identity_query(&self) -> AttributeMap {
        mapper::identity_map(self.identity())
    }
}

/// Insert a new item.
pub trait Createable: SecureStorable {
    /// The full request mapping for the new item.
    fn create_request(&self) -> Result<AttributeMap>;

    /// Add this item to the vault.
    ///
    /// # Errors
    ///
    /// [`VaultError::DuplicateItem`] if the identity already exists,
    /// [`VaultError::InvalidAttribute`] if the provider rejects a field,
    /// [`VaultError::StorageUnavailable`] if the vault cannot be reached.
    fn create(&self, executor: &dyn RequestExecutor) -> Result<()> {
        let request = self.create_request()?;
        let response = perform(executor, self.identity(), &request, &Operation::AddItem);
        check(response.status, self.identity())?;

        tracing::info!(
            account = self.identity().account(),
            service = self.identity().service(),
            kind = %self.identity().kind(),
            "created vault item"
        );
        Ok(())
    }
}

/// Fetch an item's attributes and payload.
pub trait Readable: SecureStorable {
    /// Read the current item for this identity.
    ///
    /// Returns `Ok(None)` when no item exists; that is not an error.
    ///
    /// # Errors
    ///
    /// [`VaultError::AmbiguousMatch`] if several items match,
    /// [`VaultError::StorageUnavailable`] if the vault cannot be reached,
    /// [`VaultError::MalformedResponse`] or a decode error if the result
    /// cannot be turned back into a record.
    fn read(&self, executor: &dyn RequestExecutor) -> Result<Option<Record>> {
        let identity = self.identity();
        let request = self.identity_query();
        let operation = Operation::QueryItem(QueryOptions::single_item());
        let response = perform(executor, identity, &request, &operation);

        if response.status == Status::ItemNotFound {
            tracing::debug!(
                account = identity.account(),
                service = identity.service(),
                "vault item not found"
            );
            return Ok(None);
        }
        check(response.status, identity)?;

        let result = response.result.ok_or_else(|| VaultError::MalformedResponse {
            reason: "query succeeded without a result".into(),
        })?;
        let record = mapper::decode(&result)?;

        if record.identity() != identity {
            return Err(VaultError::MalformedResponse {
                reason: format!(
                    "query for {}/{} ({}) returned {}/{} ({})",
                    identity.account(),
                    identity.service(),
                    identity.kind(),
                    record.account(),
                    record.service(),
                    record.kind(),
                ),
            });
        }
        Ok(Some(record))
    }
}

/// Modify an existing item.
pub trait Updateable: SecureStorable {
    /// The change set to apply; never contains identity keys.
    fn update_changes(&self) -> Result<AttributeMap>;

    /// Apply this record's attributes and payload to the stored item.
    ///
    /// # Errors
    ///
    /// [`VaultError::ItemNotFound`] if no item matches the identity,
    /// [`VaultError::AmbiguousMatch`] if several do,
    /// [`VaultError::StorageUnavailable`] if the vault cannot be reached.
    fn update(&self, executor: &dyn RequestExecutor) -> Result<()> {
        let changes = self.update_changes()?;
        if changes.touches_identity() {
            return Err(VaultError::InvalidAttribute {
                reason: "update changes must not rewrite identity keys".into(),
            });
        }

        let request = self.identity_query();
        let operation = Operation::UpdateItem { changes };
        let response = perform(executor, self.identity(), &request, &operation);
        check(response.status, self.identity())?;

        tracing::info!(
            account = self.identity().account(),
            service = self.identity().service(),
            "updated vault item"
        );
        Ok(())
    }
}

/// Remove an item.
pub trait Deleteable: SecureStorable {
    /// Delete the item for this identity. Succeeds if no item exists.
    ///
    /// # Errors
    ///
    /// [`VaultError::StorageUnavailable`] if the vault cannot be reached.
    fn delete(&self, executor: &dyn RequestExecutor) -> Result<()> {
        let identity = self.identity();
        let request = self.identity_query();
        let response = perform(executor, identity, &request, &Operation::DeleteItem);

        match response.status {
            Status::ItemNotFound => {
                tracing::debug!(
                    account = identity.account(),
                    service = identity.service(),
                    "delete found no vault item"
                );
                Ok(())
            }
            status => {
                check(status, identity)?;
                tracing::info!(
                    account = identity.account(),
                    service = identity.service(),
                    "deleted vault item"
                );
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

impl SecureStorable for Identity {
    fn identity(&self) -> &Identity {
        self
    }
}

impl Readable for Identity {}
impl Deleteable for Identity {}

impl SecureStorable for Record {
    fn identity(&self) -> &Identity {
        Record::identity(self)
    }
}

impl Createable for Record {
    fn create_request(&self) -> Result<AttributeMap> {
        mapper::encode(self)
    }
}

impl Readable for Record {}

impl Updateable for Record {
    fn update_changes(&self) -> Result<AttributeMap> {
        mapper::encode_changes(self)
    }
}

impl Deleteable for Record {}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn perform(
    executor: &dyn RequestExecutor,
    identity: &Identity,
    request: &AttributeMap,
    operation: &Operation,
) -> Response {
    tracing::debug!(
        operation = operation.name(),
        account = identity.account(),
        service = identity.service(),
        class = request.get_str(keys::CLASS).unwrap_or_default(),
        keys = request.len(),
        "performing vault request"
    );
    let response = executor.perform(request, operation);
    tracing::debug!(
        operation = operation.name(),
        status = %response.status,
        has_result = response.result.is_some(),
        "vault request finished"
    );
    response
}

/// Map a provider status onto the error taxonomy.
fn check(status: Status, identity: &Identity) -> Result<()> {
    let account = || identity.account().to_string();
    let service = || identity.service().to_string();

    match status {
        Status::Success => Ok(()),
        Status::DuplicateItem => Err(VaultError::DuplicateItem {
            account: account(),
            service: service(),
        }),
        Status::ItemNotFound => Err(VaultError::ItemNotFound {
            account: account(),
            service: service(),
        }),
        Status::AmbiguousMatch => Err(VaultError::AmbiguousMatch {
            account: account(),
            service: service(),
        }),
        Status::InvalidParameter => Err(VaultError::InvalidAttribute {
            reason: "provider rejected a request parameter".into(),
        }),
        Status::Unavailable => Err(VaultError::StorageUnavailable {
            reason: "vault unavailable or access denied".into(),
        }),
        Status::Other(code) => Err(VaultError::StorageUnavailable {
            reason: format!("provider status {code}"),
        }),
    }
}
