//! In-process vault provider.
//!
//! [`MemoryVault`] keeps items as attribute mappings and answers the full
//! request protocol: add, single-item query, merge update and delete, each
//! selecting items by matching every key of the request mapping. It is what
//! tests use in place of a platform vault, and it is a usable ephemeral
//! store for callers that need one.

use std::sync::{Mutex, MutexGuard};

use crate::executor::{Operation, QueryOptions, RequestExecutor, Response, Status};
use crate::value::{AttributeMap, keys};

/// A vault that lives in memory for the lifetime of the value.
#[derive(Debug, Default)]
pub struct MemoryVault {
    items: Mutex<Vec<AttributeMap>>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// A copy of every stored item.
    pub fn snapshot(&self) -> Vec<AttributeMap> {
        self.items().clone()
    }

    /// Insert `item` without any checks. Lets tests seed states the protocol
    /// would refuse, such as two items sharing one identity.
    pub fn insert_raw(&self, item: AttributeMap) {
        self.items().push(item);
    }

    fn items(&self) -> MutexGuard<'_, Vec<AttributeMap>> {
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn add(&self, request: &AttributeMap) -> Response {
        if !has_identity(request) {
            return Status::InvalidParameter.into();
        }

        let identity: AttributeMap = keys::IDENTITY
            .iter()
            .filter_map(|k| request.get(k).map(|v| (*k, v.clone())))
            .collect();

        let mut items = self.items();
        if items.iter().any(|item| item.matches(&identity)) {
            return Status::DuplicateItem.into();
        }
        items.push(request.clone());
        Response::success()
    }

    fn query(&self, request: &AttributeMap, options: QueryOptions) -> Response {
        let items = self.items();
        let found: Vec<_> = items
            .iter()
            .filter(|item| item.matches(request))
            .take(QueryOptions::MATCH_LIMIT + 1)
            .collect();

        match found.as_slice() {
            [] => Status::ItemNotFound.into(),
            [item] => Response::found(options.apply(item)),
            _ => Status::AmbiguousMatch.into(),
        }
    }

    fn update(&self, request: &AttributeMap, changes: &AttributeMap) -> Response {
        if changes.touches_identity() {
            return Status::InvalidParameter.into();
        }

        let mut items = self.items();
        let mut matches = items.iter_mut().filter(|item| item.matches(request));

        let Some(item) = matches.next() else {
            return Status::ItemNotFound.into();
        };
        if matches.next().is_some() {
            return Status::AmbiguousMatch.into();
        }

        item.merge(changes);
        Response::success()
    }

    fn delete(&self, request: &AttributeMap) -> Response {
        let mut items = self.items();
        let before = items.len();
        items.retain(|item| !item.matches(request));

        if items.len() == before {
            Status::ItemNotFound.into()
        } else {
            Response::success()
        }
    }
}

impl RequestExecutor for MemoryVault {
    fn perform(&self, request: &AttributeMap, operation: &Operation) -> Response {
        match operation {
            Operation::AddItem => self.add(request),
            Operation::QueryItem(options) => self.query(request, *options),
            Operation::UpdateItem { changes } => self.update(request, changes),
            Operation::DeleteItem => self.delete(request),
        }
    }
}

fn has_identity(request: &AttributeMap) -> bool {
    keys::IDENTITY
        .iter()
        .all(|k| request.get_str(k).is_some_and(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(account: &str, comment: &str) -> AttributeMap {
        [
            (keys::CLASS, "genp"),
            (keys::ACCOUNT, account),
            (keys::SERVICE, "myService"),
            (keys::COMMENT, comment),
        ]
        .into_iter()
        .collect()
    }

    fn identity(account: &str) -> AttributeMap {
        [
            (keys::CLASS, "genp"),
            (keys::ACCOUNT, account),
            (keys::SERVICE, "myService"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn add_then_query() {
        let vault = MemoryVault::new();
        let added = vault.perform(&item("a", "x"), &Operation::AddItem);
        assert_eq!(added.status, Status::Success);

        let found = vault.perform(
            &identity("a"),
            &Operation::QueryItem(QueryOptions::single_item()),
        );
        assert_eq!(found.result, Some(item("a", "x")));
    }

    #[test]
    fn add_duplicate_identity_rejected() {
        let vault = MemoryVault::new();
        vault.perform(&item("a", "x"), &Operation::AddItem);
        let second = vault.perform(&item("a", "different"), &Operation::AddItem);
        assert_eq!(second.status, Status::DuplicateItem);
        assert_eq!(vault.len(), 1);
    }

    #[test]
    fn add_without_identity_rejected() {
        let vault = MemoryVault::new();
        let request: AttributeMap = [(keys::ACCOUNT, "a")].into_iter().collect();
        let response = vault.perform(&request, &Operation::AddItem);
        assert_eq!(response.status, Status::InvalidParameter);
    }

    #[test]
    fn query_reports_ambiguity() {
        let vault = MemoryVault::new();
        vault.insert_raw(item("a", "x"));
        vault.insert_raw(item("a", "y"));

        let response = vault.perform(
            &identity("a"),
            &Operation::QueryItem(QueryOptions::single_item()),
        );
        assert_eq!(response.status, Status::AmbiguousMatch);
    }

    #[test]
    fn query_without_data_strips_payload() {
        let vault = MemoryVault::new();
        let mut stored = item("a", "x");
        stored.insert(keys::DATA, vec![1u8, 2, 3]);
        vault.insert_raw(stored);

        let options = QueryOptions {
            return_attributes: true,
            return_data: false,
        };
        let response = vault.perform(&identity("a"), &Operation::QueryItem(options));
        let result = response.result.unwrap();
        assert!(!result.contains_key(keys::DATA));
        assert_eq!(result.get_str(keys::COMMENT), Some("x"));
    }

    #[test]
    fn update_merges_changes() {
        let vault = MemoryVault::new();
        vault.insert_raw(item("a", "x"));

        let changes: AttributeMap = [(keys::DESCRIPTION, "desc")].into_iter().collect();
        let response = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert_eq!(response.status, Status::Success);

        let stored = &vault.snapshot()[0];
        assert_eq!(stored.get_str(keys::COMMENT), Some("x"));
        assert_eq!(stored.get_str(keys::DESCRIPTION), Some("desc"));
    }

    #[test]
    fn update_reports_ambiguity_and_changes_nothing() {
        let vault = MemoryVault::new();
        vault.insert_raw(item("a", "x"));
        vault.insert_raw(item("a", "y"));

        let changes: AttributeMap = [(keys::COMMENT, "z")].into_iter().collect();
        let response = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert_eq!(response.status, Status::AmbiguousMatch);

        let comments: Vec<_> = vault
            .snapshot()
            .iter()
            .map(|item| item.get_str(keys::COMMENT).map(str::to_string))
            .collect();
        assert_eq!(comments, [Some("x".to_string()), Some("y".to_string())]);
    }

    #[test]
    fn update_rejects_identity_changes() {
        let vault = MemoryVault::new();
        vault.insert_raw(item("a", "x"));

        let changes: AttributeMap = [(keys::ACCOUNT, "b")].into_iter().collect();
        let response = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert_eq!(response.status, Status::InvalidParameter);
    }

    #[test]
    fn update_and_delete_missing_item() {
        let vault = MemoryVault::new();
        let changes = AttributeMap::new();

        let updated = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert_eq!(updated.status, Status::ItemNotFound);

        let deleted = vault.perform(&identity("a"), &Operation::DeleteItem);
        assert_eq!(deleted.status, Status::ItemNotFound);
    }

    #[test]
    fn delete_removes_only_matching_items() {
        let vault = MemoryVault::new();
        vault.insert_raw(item("a", "x"));
        vault.insert_raw(item("b", "y"));

        let response = vault.perform(&identity("a"), &Operation::DeleteItem);
        assert_eq!(response.status, Status::Success);
        assert_eq!(vault.len(), 1);
        assert_eq!(vault.snapshot()[0].get_str(keys::ACCOUNT), Some("b"));
    }
}
