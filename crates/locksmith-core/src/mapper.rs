//! Conversion between typed records and the provider's attribute mapping.
//!
//! Encoding is pure and deterministic: identity keys and the class
//! discriminator are always written, each optional attribute only when set,
//! and the payload (if any) as an encoded blob under [`keys::DATA`].
//!
//! Decoding walks the same per-kind key table. Keys the table does not know
//! about (provider metadata such as `cdat`/`mdat`) are ignored; keys it does
//! know must carry the expected wire type.

use crate::attributes::{Attributes, ItemKind};
use crate::error::{Result, VaultError};
use crate::payload::Payload;
use crate::record::{Identity, Record};
use crate::value::{AttributeMap, Value, WireType, keys};

/// The mapping that addresses `identity`: class, account and service.
pub fn identity_map(identity: &Identity) -> AttributeMap {
    let mut map = AttributeMap::new();
    map.insert(keys::CLASS, identity.kind().class());
    map.insert(keys::ACCOUNT, identity.account());
    map.insert(keys::SERVICE, identity.service());
    map
}

/// Encode a record into a full request mapping.
///
/// # Errors
///
/// Returns [`VaultError::UnsupportedPayloadValue`] if the payload cannot be
/// encoded.
pub fn encode(record: &Record) -> Result<AttributeMap> {
    let mut map = identity_map(record.identity());
    write_attributes(record, &mut map)?;
    Ok(map)
}

/// Encode the non-identity part of a record as an update change set.
///
/// The result never contains class, account or service.
pub fn encode_changes(record: &Record) -> Result<AttributeMap> {
    let mut map = AttributeMap::new();
    write_attributes(record, &mut map)?;
    Ok(map)
}

fn write_attributes(record: &Record, map: &mut AttributeMap) -> Result<()> {
    let attributes = record.attributes();
    for field in record.kind().fields() {
        if let Some(value) = attributes.get(*field) {
            map.insert(field.key(), value);
        }
    }

    if let Some(payload) = record.payload() {
        map.insert(keys::DATA, Value::Data(payload.encode()?));
    }
    Ok(())
}

/// Decode a response mapping into a record.
///
/// # Errors
///
/// - [`VaultError::MalformedResponse`] if class, account or service is
///   missing, not a string, or names an unknown class.
/// - [`VaultError::AttributeTypeMismatch`] if a known attribute has the
///   wrong wire type.
/// - [`VaultError::InvalidAttribute`] if an enumerated or numeric attribute
///   holds a value outside its domain.
/// - [`VaultError::CorruptPayload`] if the payload blob does not decode.
pub fn decode(map: &AttributeMap) -> Result<Record> {
    let class = required_str(map, keys::CLASS)?;
    let kind = ItemKind::from_class(class).ok_or_else(|| VaultError::MalformedResponse {
        reason: format!("unknown item class {class:?}"),
    })?;
    let account = required_str(map, keys::ACCOUNT)?;
    let service = required_str(map, keys::SERVICE)?;

    let mut attributes = Attributes::empty(kind);
    for field in kind.fields() {
        if let Some(value) = map.get(field.key()) {
            attributes.set(*field, value)?;
        }
    }

    let payload = match map.get(keys::DATA) {
        Some(Value::Data(bytes)) => Some(Payload::decode(bytes)?),
        Some(other) => {
            return Err(VaultError::AttributeTypeMismatch {
                key: keys::DATA,
                expected: WireType::Data,
                found: other.wire_type(),
            });
        }
        None => None,
    };

    let mut record = Record::new(account, service, attributes).map_err(|e| {
        VaultError::MalformedResponse {
            reason: e.to_string(),
        }
    })?;
    record.set_payload(payload);
    Ok(record)
}

fn required_str<'a>(map: &'a AttributeMap, key: &str) -> Result<&'a str> {
    match map.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(VaultError::MalformedResponse {
            reason: format!("{key} has wire type {}, expected string", other.wire_type()),
        }),
        None => Err(VaultError::MalformedResponse {
            reason: format!("missing {key}"),
        }),
    }
}
