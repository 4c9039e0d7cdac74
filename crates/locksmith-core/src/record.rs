//! Typed credential records.
//!
//! An [`Identity`] addresses one vault item by `(account, service, kind)`.
//! A [`Record`] adds the kind-specific [`Attributes`] and an optional
//! [`Payload`]. Records are transient: the vault owns persistent state.

use crate::attributes::{Attributes, GenericAttributes, ItemKind, NetworkAttributes};
use crate::error::{Result, VaultError};
use crate::payload::Payload;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The `(account, service, kind)` triple that uniquely addresses an item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    account: String,
    service: String,
    kind: ItemKind,
}

impl Identity {
    /// Create an identity.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidAttribute`] if `account` or `service`
    /// is empty.
    pub fn new(
        account: impl Into<String>,
        service: impl Into<String>,
        kind: ItemKind,
    ) -> Result<Self> {
        let account = account.into();
        let service = service.into();

        if account.is_empty() {
            return Err(VaultError::InvalidAttribute {
                reason: "account must not be empty".into(),
            });
        }
        if service.is_empty() {
            return Err(VaultError::InvalidAttribute {
                reason: "service must not be empty".into(),
            });
        }

        Ok(Self {
            account,
            service,
            kind,
        })
    }

    /// Identity of a generic credential.
    pub fn generic(account: impl Into<String>, service: impl Into<String>) -> Result<Self> {
        Self::new(account, service, ItemKind::GenericCredential)
    }

    /// Identity of a network credential.
    pub fn network(account: impl Into<String>, service: impl Into<String>) -> Result<Self> {
        Self::new(account, service, ItemKind::NetworkCredential)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn kind(&self) -> ItemKind {
        self.kind
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A credential item: identity, optional attributes and optional payload.
///
/// The identity's kind always agrees with the attribute set's kind; both are
/// fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    identity: Identity,
    attributes: Attributes,
    payload: Option<Payload>,
}

impl Record {
    /// Create a record whose kind is taken from `attributes`.
    pub fn new(
        account: impl Into<String>,
        service: impl Into<String>,
        attributes: impl Into<Attributes>,
    ) -> Result<Self> {
        let attributes = attributes.into();
        let identity = Identity::new(account, service, attributes.kind())?;
        Ok(Self {
            identity,
            attributes,
            payload: None,
        })
    }

    /// A generic credential with no attributes set.
    pub fn generic(account: impl Into<String>, service: impl Into<String>) -> Result<Self> {
        Self::new(account, service, GenericAttributes::default())
    }

    /// A network credential with no attributes set.
    pub fn network(account: impl Into<String>, service: impl Into<String>) -> Result<Self> {
        Self::new(account, service, NetworkAttributes::default())
    }

    /// An attribute-less record for an existing identity.
    pub fn from_identity(identity: Identity) -> Self {
        let attributes = Attributes::empty(identity.kind());
        Self {
            identity,
            attributes,
            payload: None,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn account(&self) -> &str {
        self.identity.account()
    }

    pub fn service(&self) -> &str {
        self.identity.service()
    }

    pub fn kind(&self) -> ItemKind {
        self.identity.kind()
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Generic attributes, `None` for a network credential.
    pub fn generic_attributes(&self) -> Option<&GenericAttributes> {
        match &self.attributes {
            Attributes::Generic(a) => Some(a),
            Attributes::Network(_) => None,
        }
    }

    pub fn generic_attributes_mut(&mut self) -> Option<&mut GenericAttributes> {
        match &mut self.attributes {
            Attributes::Generic(a) => Some(a),
            Attributes::Network(_) => None,
        }
    }

    /// Network attributes, `None` for a generic credential.
    pub fn network_attributes(&self) -> Option<&NetworkAttributes> {
        match &self.attributes {
            Attributes::Network(a) => Some(a),
            Attributes::Generic(_) => None,
        }
    }

    pub fn network_attributes_mut(&mut self) -> Option<&mut NetworkAttributes> {
        match &mut self.attributes {
            Attributes::Network(a) => Some(a),
            Attributes::Generic(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn set_payload(&mut self, payload: Option<Payload>) {
        self.payload = payload;
    }

    /// Consume the record, returning its payload.
    pub fn into_payload(self) -> Option<Payload> {
        self.payload
    }
}
