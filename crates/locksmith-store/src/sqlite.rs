//! SQLite-backed encrypted vault provider.
//!
//! [`SqliteVault`] answers the request executor protocol from a single
//! `items` table. Each row holds one item, keyed by its class, account and
//! service; the item's whole attribute mapping is serialized to JSON and
//! sealed with AES-256-GCM, with the row identity as associated data.
//!
//! # Schema
//!
//! ```text
//! items(class, account, service, data, nonce, created_at, updated_at)
//!   PRIMARY KEY (class, account, service)
//! ```
//!
//! Requests must name all three identity keys. Any other key in a request
//! narrows the match: the stored item must carry an equal value. Failures
//! inside the provider (database, crypto, corrupted rows) are logged and
//! answered with [`Status::Unavailable`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use locksmith_core::value::keys;
use locksmith_core::{
    AttributeMap, Operation, QueryOptions, RequestExecutor, Response, Status, Value,
};
use rusqlite::{Connection, OptionalExtension, params};

use crate::crypto::{self, MasterKey};
use crate::error::{Result, StoreError};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A stored item's identity and timestamps, read without decrypting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    pub class: String,
    pub account: String,
    pub service: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The row key a request addresses.
struct ItemKey<'a> {
    class: &'a str,
    account: &'a str,
    service: &'a str,
}

impl<'a> ItemKey<'a> {
    /// `None` unless class, account and service are all non-empty strings.
    fn from_request(request: &'a AttributeMap) -> Option<Self> {
        let field = |key: &str| request.get_str(key).filter(|v| !v.is_empty());
        Some(Self {
            class: field(keys::CLASS)?,
            account: field(keys::ACCOUNT)?,
            service: field(keys::SERVICE)?,
        })
    }

    /// Associated data binding a sealed blob to this row. Each field is
    /// length-prefixed so that no two distinct keys share an encoding.
    fn aad(&self) -> Vec<u8> {
        let fields = [self.class, self.account, self.service];
        let mut aad = Vec::with_capacity(fields.iter().map(|f| f.len() + 8).sum());
        for field in fields {
            aad.extend_from_slice(&(field.len() as u64).to_be_bytes());
            aad.extend_from_slice(field.as_bytes());
        }
        aad
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptItem {
            account: self.account.to_string(),
            service: self.service.to_string(),
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Encrypted item vault backed by SQLite.
///
/// # Example
///
/// ```rust,no_run
/// # use locksmith_core::{Createable, Record};
/// # use locksmith_store::{MasterKey, SqliteVault};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let vault = SqliteVault::open("data/vault.db", MasterKey::generate()?)?;
///
/// Record::generic("myUser", "myService")?
///     .with_payload([("some", "data")].into_iter().collect())
///     .create(&vault)?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteVault {
    conn: Mutex<Connection>,
    master_key: MasterKey,
}

impl SqliteVault {
    /// Open (or create) the vault database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database cannot be opened,
    /// or [`StoreError::MigrationFailed`] if schema setup fails.
    pub fn open(path: impl AsRef<Path>, master_key: MasterKey) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!(path = %path.display(), "opening vault database");

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let vault = Self::with_connection(conn, master_key)?;

        tracing::info!("vault database ready");
        Ok(vault)
    }

    /// Open a vault that lives only as long as this value.
    pub fn open_in_memory(master_key: MasterKey) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, master_key)
    }

    fn with_connection(conn: Connection, master_key: MasterKey) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;
        run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            master_key,
        })
    }

    /// Number of stored items.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .connection()
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Every stored item's identity, ordered by class, service and account.
    pub fn list(&self) -> Result<Vec<ItemSummary>> {
        let conn = self.connection();
        let mut stmt = conn.prepare(
            "SELECT class, account, service, created_at, updated_at
             FROM items ORDER BY class, service, account",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ItemSummary {
                class: row.get(0)?,
                account: row.get(1)?,
                service: row.get(2)?,
                created_at: timestamp(row.get(3)?),
                updated_at: timestamp(row.get(4)?),
            })
        })?;

        let summaries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        tracing::debug!(count = summaries.len(), "listed vault items");
        Ok(summaries)
    }

    fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -- Protocol -----------------------------------------------------------

    fn add(&self, conn: &Connection, request: &AttributeMap) -> Result<Response> {
        let Some(key) = ItemKey::from_request(request) else {
            return Ok(Status::InvalidParameter.into());
        };

        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM items WHERE class = ?1 AND account = ?2 AND service = ?3)",
            params![key.class, key.account, key.service],
            |row| row.get(0),
        )?;
        if exists {
            return Ok(Status::DuplicateItem.into());
        }

        let now = Utc::now().timestamp();
        let mut item = request.clone();
        item.insert(keys::CREATED_AT, Value::Number(now));
        item.insert(keys::MODIFIED_AT, Value::Number(now));
        let (nonce, ciphertext) = self.seal(&key, &item)?;

        conn.execute(
            "INSERT INTO items (class, account, service, data, nonce, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                key.class,
                key.account,
                key.service,
                ciphertext,
                nonce.as_slice(),
                now,
                now
            ],
        )?;

        tracing::debug!(
            class = key.class,
            account = key.account,
            service = key.service,
            "stored item"
        );
        Ok(Response::success())
    }

    fn query(
        &self,
        conn: &Connection,
        request: &AttributeMap,
        options: QueryOptions,
    ) -> Result<Response> {
        let Some(key) = ItemKey::from_request(request) else {
            return Ok(Status::InvalidParameter.into());
        };

        match self.load(conn, &key)? {
            Some(item) if item.matches(request) => Ok(Response::found(options.apply(&item))),
            _ => Ok(Status::ItemNotFound.into()),
        }
    }

    fn update(
        &self,
        conn: &Connection,
        request: &AttributeMap,
        changes: &AttributeMap,
    ) -> Result<Response> {
        if changes.touches_identity() {
            return Ok(Status::InvalidParameter.into());
        }
        let Some(key) = ItemKey::from_request(request) else {
            return Ok(Status::InvalidParameter.into());
        };
        let mut item = match self.load(conn, &key)? {
            Some(item) if item.matches(request) => item,
            _ => return Ok(Status::ItemNotFound.into()),
        };

        let now = Utc::now().timestamp();
        item.merge(changes);
        item.insert(keys::MODIFIED_AT, Value::Number(now));
        let (nonce, ciphertext) = self.seal(&key, &item)?;

        conn.execute(
            "UPDATE items SET data = ?1, nonce = ?2, updated_at = ?3
             WHERE class = ?4 AND account = ?5 AND service = ?6",
            params![
                ciphertext,
                nonce.as_slice(),
                now,
                key.class,
                key.account,
                key.service
            ],
        )?;

        tracing::debug!(
            class = key.class,
            account = key.account,
            service = key.service,
            "updated item"
        );
        Ok(Response::success())
    }

    fn delete(&self, conn: &Connection, request: &AttributeMap) -> Result<Response> {
        let Some(key) = ItemKey::from_request(request) else {
            return Ok(Status::InvalidParameter.into());
        };
        match self.load(conn, &key)? {
            Some(item) if item.matches(request) => {}
            _ => return Ok(Status::ItemNotFound.into()),
        }

        conn.execute(
            "DELETE FROM items WHERE class = ?1 AND account = ?2 AND service = ?3",
            params![key.class, key.account, key.service],
        )?;

        tracing::debug!(
            class = key.class,
            account = key.account,
            service = key.service,
            "deleted item"
        );
        Ok(Response::success())
    }

    // -- Row encryption -----------------------------------------------------

    fn seal(
        &self,
        key: &ItemKey<'_>,
        item: &AttributeMap,
    ) -> Result<([u8; crypto::NONCE_LEN_BYTES], Vec<u8>)> {
        let plaintext = serde_json::to_vec(item)?;
        crypto::seal(&self.master_key, &plaintext, &key.aad())
    }

    fn load(&self, conn: &Connection, key: &ItemKey<'_>) -> Result<Option<AttributeMap>> {
        let row = conn
            .query_row(
                "SELECT data, nonce FROM items WHERE class = ?1 AND account = ?2 AND service = ?3",
                params![key.class, key.account, key.service],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;
        let Some((data, nonce)) = row else {
            return Ok(None);
        };

        let nonce: [u8; crypto::NONCE_LEN_BYTES] = nonce
            .as_slice()
            .try_into()
            .map_err(|_| key.corrupt(format!("nonce has {} bytes", nonce.len())))?;
        let plaintext = crypto::open(&self.master_key, &nonce, &data, &key.aad())?;
        let item = serde_json::from_slice(&plaintext).map_err(|e| key.corrupt(e.to_string()))?;
        Ok(Some(item))
    }
}

impl RequestExecutor for SqliteVault {
    fn perform(&self, request: &AttributeMap, operation: &Operation) -> Response {
        let conn = self.connection();
        let outcome = match operation {
            Operation::AddItem => self.add(&conn, request),
            Operation::QueryItem(options) => self.query(&conn, request, *options),
            Operation::UpdateItem { changes } => self.update(&conn, request, changes),
            Operation::DeleteItem => self.delete(&conn, request),
        };

        outcome.unwrap_or_else(|e| {
            tracing::warn!(operation = operation.name(), error = %e, "vault provider failure");
            Status::Unavailable.into()
        })
    }
}

impl std::fmt::Debug for SqliteVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteVault").finish_non_exhaustive()
    }
}

fn run_migrations(conn: &Connection) -> Result<()> {
    tracing::debug!("running vault schema migrations");

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS items (
            class      TEXT NOT NULL,
            account    TEXT NOT NULL,
            service    TEXT NOT NULL,
            data       BLOB NOT NULL,
            nonce      BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            PRIMARY KEY (class, account, service)
        );

        CREATE INDEX IF NOT EXISTS idx_items_service ON items(service);",
    )
    .map_err(|e| StoreError::MigrationFailed {
        reason: e.to_string(),
    })
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vault() -> SqliteVault {
        SqliteVault::open_in_memory(MasterKey::generate().unwrap()).unwrap()
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

    fn item(account: &str, comment: &str) -> AttributeMap {
        let mut item = identity(account);
        item.insert(keys::COMMENT, comment);
        item.insert(keys::DATA, b"{\"some\":\"data\"}".to_vec());
        item
    }

    fn query() -> Operation {
        Operation::QueryItem(QueryOptions::single_item())
    }

    #[test]
    fn add_then_query_adds_timestamps() {
        let vault = vault();
        assert!(vault.perform(&item("a", "x"), &Operation::AddItem).status.is_success());

        let result = vault.perform(&identity("a"), &query()).result.unwrap();
        assert_eq!(result.get_str(keys::COMMENT), Some("x"));
        assert_eq!(
            result.get(keys::DATA),
            Some(&Value::Data(b"{\"some\":\"data\"}".to_vec()))
        );
        assert!(matches!(result.get(keys::CREATED_AT), Some(Value::Number(_))));
        assert_eq!(result.get(keys::CREATED_AT), result.get(keys::MODIFIED_AT));
    }

    #[test]
    fn add_rejects_duplicates_and_missing_identity() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);

        let duplicate = vault.perform(&item("a", "y"), &Operation::AddItem);
        assert_eq!(duplicate.status, Status::DuplicateItem);

        let mut anonymous = item("a", "x");
        anonymous.remove(keys::SERVICE);
        let invalid = vault.perform(&anonymous, &Operation::AddItem);
        assert_eq!(invalid.status, Status::InvalidParameter);
        assert_eq!(vault.len().unwrap(), 1);
    }

    #[test]
    fn query_honours_extra_match_keys() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);

        let mut narrowed = identity("a");
        narrowed.insert(keys::COMMENT, "other");
        assert_eq!(vault.perform(&narrowed, &query()).status, Status::ItemNotFound);
    }

    #[test]
    fn update_merges_and_keeps_created_at() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);
        let before = vault.perform(&identity("a"), &query()).result.unwrap();

        let changes: AttributeMap = [(keys::DESCRIPTION, "desc")].into_iter().collect();
        let response = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert!(response.status.is_success());

        let after = vault.perform(&identity("a"), &query()).result.unwrap();
        assert_eq!(after.get_str(keys::COMMENT), Some("x"));
        assert_eq!(after.get_str(keys::DESCRIPTION), Some("desc"));
        assert_eq!(after.get(keys::CREATED_AT), before.get(keys::CREATED_AT));
    }

    #[test]
    fn update_rejects_identity_changes() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);

        let changes: AttributeMap = [(keys::SERVICE, "elsewhere")].into_iter().collect();
        let response = vault.perform(&identity("a"), &Operation::UpdateItem { changes });
        assert_eq!(response.status, Status::InvalidParameter);
    }

    #[test]
    fn missing_items_are_not_found() {
        let vault = vault();
        let changes = AttributeMap::new();

        assert_eq!(vault.perform(&identity("a"), &query()).status, Status::ItemNotFound);
        assert_eq!(
            vault
                .perform(&identity("a"), &Operation::UpdateItem { changes })
                .status,
            Status::ItemNotFound
        );
        assert_eq!(
            vault.perform(&identity("a"), &Operation::DeleteItem).status,
            Status::ItemNotFound
        );
    }

    #[test]
    fn delete_removes_row() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);
        vault.perform(&item("b", "y"), &Operation::AddItem);

        let response = vault.perform(&identity("a"), &Operation::DeleteItem);
        assert!(response.status.is_success());

        let remaining = vault.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].account, "b");
    }

    #[test]
    fn swapped_ciphertext_is_unavailable() {
        let vault = vault();
        vault.perform(&item("a", "x"), &Operation::AddItem);
        vault.perform(&item("b", "y"), &Operation::AddItem);

        // Copy b's sealed blob onto a's row.
        vault
            .connection()
            .execute(
                "UPDATE items SET (data, nonce) =
                   (SELECT data, nonce FROM items WHERE account = 'b')
                 WHERE account = 'a'",
                [],
            )
            .unwrap();

        let response = vault.perform(&identity("a"), &query());
        assert_eq!(response.status, Status::Unavailable);
    }

    #[test]
    fn row_binding_separates_embedded_nul_fields() {
        let left = ItemKey {
            class: "genp",
            account: "a\0b",
            service: "c",
        };
        let right = ItemKey {
            class: "genp",
            account: "a",
            service: "b\0c",
        };
        assert_ne!(left.aad(), right.aad());

        let vault = vault();
        for key in [&left, &right] {
            let mut request: AttributeMap = [
                (keys::CLASS, key.class),
                (keys::ACCOUNT, key.account),
                (keys::SERVICE, key.service),
            ]
            .into_iter()
            .collect();
            request.insert(keys::COMMENT, key.account);
            assert!(vault.perform(&request, &Operation::AddItem).status.is_success());
        }

        // Move the right row's sealed blob onto the left row.
        vault
            .connection()
            .execute(
                "UPDATE items SET (data, nonce) =
                   (SELECT data, nonce FROM items WHERE account = 'a')
                 WHERE account = ?1",
                params![left.account],
            )
            .unwrap();

        let request: AttributeMap = [
            (keys::CLASS, left.class),
            (keys::ACCOUNT, left.account),
            (keys::SERVICE, left.service),
        ]
        .into_iter()
        .collect();
        assert_eq!(vault.perform(&request, &query()).status, Status::Unavailable);
    }
}
