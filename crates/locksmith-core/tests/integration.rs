//! Integration tests for the locksmith-core crate.
//!
//! These tests drive the CRUD roles end to end against the in-process
//! [`MemoryVault`], covering the full record lifecycle, update semantics and
//! kind discrimination.

use locksmith_core::{
    Accessibility, AuthenticationType, Createable, Deleteable, GenericAttributes, Identity,
    InternetProtocol, MemoryVault, NetworkAttributes, Payload, Readable, Record, Updateable,
    VaultError,
};

fn some_data() -> Payload {
    [("some", "data")].into_iter().collect()
}

fn ruckus() -> Payload {
    [("this update", "brings the ruckus")].into_iter().collect()
}

fn my_identity() -> Identity {
    Identity::generic("myUser", "myService").unwrap()
}

// ═══════════════════════════════════════════════════════════════════════
//  Record lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn create_read_update_delete() {
    let vault = MemoryVault::new();

    // Create.
    Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(some_data())
        .create(&vault)
        .unwrap();

    // Read.
    let read = my_identity().read(&vault).unwrap().unwrap();
    assert_eq!(read.payload(), Some(&some_data()));

    // Update replaces the payload wholesale.
    Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(ruckus())
        .update(&vault)
        .unwrap();

    let read = my_identity().read(&vault).unwrap().unwrap();
    let payload = read.into_payload().unwrap();
    assert_eq!(payload, ruckus());
    assert!(payload.get("some").is_none());

    // Delete.
    my_identity().delete(&vault).unwrap();
    assert!(my_identity().read(&vault).unwrap().is_none());
    assert!(vault.is_empty());
}

#[test]
fn create_then_read_is_equivalent() {
    let vault = MemoryVault::new();
    let record = Record::new(
        "myUser",
        "myService",
        GenericAttributes {
            access_group: Some("myAccessGroup".into()),
            description: Some("myDescription".into()),
            comment: Some("myComment".into()),
            creator: Some(5),
            item_type: Some(10),
            is_invisible: Some(false),
            is_negative: Some(false),
            generic: Some(Vec::new()),
            accessible: Some(Accessibility::Always),
        },
    )
    .unwrap()
    .with_payload(some_data());

    record.create(&vault).unwrap();
    assert_eq!(record.read(&vault).unwrap(), Some(record));
}

#[test]
fn structured_payload_survives_storage() {
    let vault = MemoryVault::new();
    let payload = Payload::from_serializable(&serde_json::json!({
        "token": "abc123",
        "expires_in": 3600,
        "scopes": ["read", "write"],
        "refresh": null,
    }))
    .unwrap();

    Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(payload.clone())
        .create(&vault)
        .unwrap();

    let read = my_identity().read(&vault).unwrap().unwrap();
    let stored = read.payload().unwrap();
    assert_eq!(stored, &payload);
    assert_eq!(stored.get_as::<u64>("expires_in"), Some(3600));
}

#[test]
fn record_without_payload_reads_back_without_one() {
    let vault = MemoryVault::new();
    Record::generic("myUser", "myService")
        .unwrap()
        .create(&vault)
        .unwrap();

    let read = my_identity().read(&vault).unwrap().unwrap();
    assert!(read.payload().is_none());
}

// ═══════════════════════════════════════════════════════════════════════
//  Create / delete semantics
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn duplicate_create_rejected_and_original_kept() {
    let vault = MemoryVault::new();
    Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(some_data())
        .create(&vault)
        .unwrap();

    let err = Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(ruckus())
        .create(&vault)
        .unwrap_err();
    assert!(matches!(err, VaultError::DuplicateItem { .. }));

    let read = my_identity().read(&vault).unwrap().unwrap();
    assert_eq!(read.payload(), Some(&some_data()));
}

#[test]
fn delete_twice_succeeds() {
    let vault = MemoryVault::new();
    Record::generic("myUser", "myService")
        .unwrap()
        .create(&vault)
        .unwrap();

    my_identity().delete(&vault).unwrap();
    my_identity().delete(&vault).unwrap();
    assert!(vault.is_empty());
}

#[test]
fn update_of_missing_item_fails() {
    let vault = MemoryVault::new();
    let err = Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(ruckus())
        .update(&vault)
        .unwrap_err();
    assert!(matches!(err, VaultError::ItemNotFound { .. }));
}

// ═══════════════════════════════════════════════════════════════════════
//  Update merge policy
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn update_keeps_attributes_it_does_not_set() {
    let vault = MemoryVault::new();
    Record::new(
        "myUser",
        "myService",
        GenericAttributes {
            comment: Some("original".into()),
            description: Some("kept".into()),
            ..Default::default()
        },
    )
    .unwrap()
    .with_payload(some_data())
    .create(&vault)
    .unwrap();

    Record::new(
        "myUser",
        "myService",
        GenericAttributes {
            comment: Some("rotated".into()),
            ..Default::default()
        },
    )
    .unwrap()
    .update(&vault)
    .unwrap();

    let read = my_identity().read(&vault).unwrap().unwrap();
    let attributes = read.generic_attributes().unwrap();
    assert_eq!(attributes.comment.as_deref(), Some("rotated"));
    assert_eq!(attributes.description.as_deref(), Some("kept"));
    // No payload on the update: the stored one stays.
    assert_eq!(read.payload(), Some(&some_data()));
}

// ═══════════════════════════════════════════════════════════════════════
//  Kinds
// ═══════════════════════════════════════════════════════════════════════

fn network_record() -> Record {
    Record::new(
        "myUser",
        "myService",
        NetworkAttributes {
            server: Some("server".into()),
            port: Some("8080".into()),
            protocol: Some(InternetProtocol::Http),
            authentication_type: Some(AuthenticationType::HttpBasic),
            path: Some("some_path".into()),
            security_domain: Some("secdomain".into()),
        },
    )
    .unwrap()
    .with_payload(some_data())
}

#[test]
fn network_record_roundtrip() {
    let vault = MemoryVault::new();
    let record = network_record();
    record.create(&vault).unwrap();

    let read = Identity::network("myUser", "myService")
        .unwrap()
        .read(&vault)
        .unwrap()
        .unwrap();
    assert_eq!(read, record);

    let attributes = read.network_attributes().unwrap();
    assert_eq!(attributes.port.as_deref(), Some("8080"));
    assert_eq!(attributes.protocol, Some(InternetProtocol::Http));
}

#[test]
fn kinds_with_same_account_and_service_are_distinct() {
    let vault = MemoryVault::new();
    Record::generic("myUser", "myService")
        .unwrap()
        .with_payload(ruckus())
        .create(&vault)
        .unwrap();
    network_record().create(&vault).unwrap();
    assert_eq!(vault.len(), 2);

    let generic = my_identity().read(&vault).unwrap().unwrap();
    assert_eq!(generic.payload(), Some(&ruckus()));

    let network = Identity::network("myUser", "myService").unwrap();
    network.delete(&vault).unwrap();
    assert!(network.read(&vault).unwrap().is_none());
    assert!(my_identity().read(&vault).unwrap().is_some());
}
