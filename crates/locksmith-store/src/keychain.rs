//! Master key storage.
//!
//! The key that seals vault items must never sit on disk as plaintext.
//! [`KeychainProvider`] abstracts over where it lives; [`FileKeychain`] is
//! the portable backend, which wraps the key with a second key derived from
//! machine and user identifiers. Anyone with the same machine and account
//! can rebuild that wrapping key, so this guards against copied files, not
//! against a local attacker. On macOS, `SystemKeychain` keeps the key in the
//! login keychain instead.
//!
//! Key file layout (binary):
//!
//! ```text
//! [4 bytes:  magic "LSK1"]
//! [32 bytes: PBKDF2 salt]
//! [12 bytes: AES-256-GCM nonce]
//! [48 bytes: wrapped master key + 16-byte tag]
//! ```

use std::path::{Path, PathBuf};

use locksmith_core::Status;

use crate::crypto::{self, MasterKey};
use crate::error::{Result, StoreError};

const MAGIC: &[u8; 4] = b"LSK1";
const AAD: &[u8] = b"locksmith-master-key";
const FILE_LEN: usize =
    MAGIC.len() + crypto::SALT_LEN + crypto::NONCE_LEN_BYTES + crypto::KEY_LEN + crypto::TAG_LEN;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Secure storage for the vault's master key.
pub trait KeychainProvider: Send + Sync {
    /// Retrieve the master key.
    ///
    /// Returns [`StoreError::MasterKeyNotFound`] if none has been stored.
    fn get_master_key(&self) -> Result<MasterKey>;

    /// Store (or overwrite) the master key.
    fn set_master_key(&self, key: &MasterKey) -> Result<()>;

    fn has_master_key(&self) -> Result<bool>;

    /// Remove the stored key. Succeeds if there is none.
    fn delete_master_key(&self) -> Result<()>;
}

/// Fetch the master key from `keychain`, generating and storing a new one on
/// first use.
pub fn load_or_create_master_key(keychain: &dyn KeychainProvider) -> Result<MasterKey> {
    match keychain.get_master_key() {
        Ok(key) => Ok(key),
        Err(StoreError::MasterKeyNotFound) => {
            let key = MasterKey::generate()?;
            keychain.set_master_key(&key)?;
            tracing::info!("generated new vault master key");
            Ok(key)
        }
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// File keychain
// ---------------------------------------------------------------------------

/// Stores the master key in a file, wrapped with a device-derived key.
#[derive(Debug, Clone)]
pub struct FileKeychain {
    key_file: PathBuf,
}

impl FileKeychain {
    /// A keychain backed by `key_file`. Missing parent directories are
    /// created on the first write.
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
        }
    }

    /// `<data_dir>/master.key`
    pub fn default_path(data_dir: &Path) -> PathBuf {
        data_dir.join("master.key")
    }

    pub fn path(&self) -> &Path {
        &self.key_file
    }

    fn corrupt(&self, reason: impl Into<String>) -> StoreError {
        StoreError::CorruptKeyFile {
            path: self.key_file.display().to_string(),
            reason: reason.into(),
        }
    }
}

impl KeychainProvider for FileKeychain {
    fn get_master_key(&self) -> Result<MasterKey> {
        let data = match std::fs::read(&self.key_file) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::MasterKeyNotFound);
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() != FILE_LEN {
            return Err(self.corrupt(format!("expected {FILE_LEN} bytes, got {}", data.len())));
        }
        let (magic, rest) = data.split_at(MAGIC.len());
        if magic != MAGIC {
            return Err(self.corrupt("unknown file format"));
        }
        let (salt, rest) = rest.split_at(crypto::SALT_LEN);
        let (nonce, wrapped) = rest.split_at(crypto::NONCE_LEN_BYTES);
        let nonce: [u8; crypto::NONCE_LEN_BYTES] =
            nonce.try_into().map_err(|_| self.corrupt("truncated nonce"))?;

        let wrapping = MasterKey::derive(&device_material(), salt);
        let key = crypto::open(&wrapping, &nonce, wrapped, AAD)?;

        tracing::debug!(path = %self.key_file.display(), "loaded master key");
        MasterKey::from_slice(&key)
    }

    fn set_master_key(&self, key: &MasterKey) -> Result<()> {
        let salt = crypto::random_bytes(crypto::SALT_LEN)?;
        let wrapping = MasterKey::derive(&device_material(), &salt);
        let (nonce, wrapped) = crypto::seal(&wrapping, key.as_bytes(), AAD)?;

        let mut data = Vec::with_capacity(FILE_LEN);
        data.extend_from_slice(MAGIC);
        data.extend_from_slice(&salt);
        data.extend_from_slice(&nonce);
        data.extend_from_slice(&wrapped);

        if let Some(parent) = self.key_file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.key_file, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.key_file, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::info!(path = %self.key_file.display(), "stored master key");
        Ok(())
    }

    fn has_master_key(&self) -> Result<bool> {
        Ok(self.key_file.try_exists()?)
    }

    fn delete_master_key(&self) -> Result<()> {
        match std::fs::remove_file(&self.key_file) {
            Ok(()) => {
                tracing::info!(path = %self.key_file.display(), "deleted master key");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ---------------------------------------------------------------------------
// macOS Keychain Services
// ---------------------------------------------------------------------------

/// Stores the master key as a generic password in the user's login keychain.
#[cfg(target_os = "macos")]
#[derive(Debug, Clone)]
pub struct SystemKeychain {
    service: String,
    account: String,
}

#[cfg(target_os = "macos")]
impl SystemKeychain {
    pub const DEFAULT_SERVICE: &'static str = "locksmith";
    pub const DEFAULT_ACCOUNT: &'static str = "master-key";

    pub fn new() -> Self {
        Self::with_names(Self::DEFAULT_SERVICE, Self::DEFAULT_ACCOUNT)
    }

    /// A keychain entry under a custom service and account, so that
    /// separate vaults do not share one master key.
    pub fn with_names(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }
}

#[cfg(target_os = "macos")]
impl Default for SystemKeychain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "macos")]
impl KeychainProvider for SystemKeychain {
    fn get_master_key(&self) -> Result<MasterKey> {
        use security_framework::passwords::get_generic_password;

        let data = get_generic_password(&self.service, &self.account)
            .map_err(|e| keychain_failure("read", e.code()))?;
        tracing::debug!(service = %self.service, "loaded master key from system keychain");
        MasterKey::from_slice(&data)
    }

    fn set_master_key(&self, key: &MasterKey) -> Result<()> {
        use security_framework::passwords::set_generic_password;

        set_generic_password(&self.service, &self.account, key.as_bytes())
            .map_err(|e| keychain_failure("write", e.code()))?;
        tracing::info!(service = %self.service, "stored master key in system keychain");
        Ok(())
    }

    fn has_master_key(&self) -> Result<bool> {
        match self.get_master_key() {
            Ok(_) => Ok(true),
            Err(StoreError::MasterKeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn delete_master_key(&self) -> Result<()> {
        use security_framework::passwords::delete_generic_password;

        match delete_generic_password(&self.service, &self.account) {
            Ok(()) => {
                tracing::info!(service = %self.service, "deleted master key from system keychain");
                Ok(())
            }
            Err(e) => match keychain_failure("delete", e.code()) {
                StoreError::MasterKeyNotFound => Ok(()),
                other => Err(other),
            },
        }
    }
}

/// Translate a Security-framework status code from a keychain call.
#[cfg_attr(not(target_os = "macos"), allow(dead_code))]
fn keychain_failure(action: &str, code: i32) -> StoreError {
    match Status::from_code(code) {
        Status::ItemNotFound => StoreError::MasterKeyNotFound,
        status => StoreError::KeychainUnavailable {
            reason: format!("system keychain {action} failed: {status}"),
        },
    }
}

/// Hostname and user name; stable for one account on one machine.
fn device_material() -> Vec<u8> {
    let host = std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .or_else(|_| std::env::var("HOSTNAME"))
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".into());
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown-user".into());

    let mut material = Vec::with_capacity(host.len() + user.len() + 1);
    material.extend_from_slice(host.as_bytes());
    material.push(0);
    material.extend_from_slice(user.as_bytes());
    material
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keychain(dir: &tempfile::TempDir) -> FileKeychain {
        FileKeychain::new(FileKeychain::default_path(dir.path()))
    }

    #[test]
    fn roundtrip_master_key() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = keychain(&dir);
        assert!(!keychain.has_master_key().unwrap());

        let key = MasterKey::generate().unwrap();
        keychain.set_master_key(&key).unwrap();
        assert!(keychain.has_master_key().unwrap());
        assert_eq!(keychain.get_master_key().unwrap(), key);

        keychain.delete_master_key().unwrap();
        assert!(!keychain.has_master_key().unwrap());
        // Deleting again is a no-op.
        keychain.delete_master_key().unwrap();
    }

    #[test]
    fn missing_key_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            keychain(&dir).get_master_key(),
            Err(StoreError::MasterKeyNotFound)
        ));
    }

    #[test]
    fn key_file_is_never_plaintext() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = keychain(&dir);
        let key = MasterKey::from_slice(&[0x5A; crypto::KEY_LEN]).unwrap();
        keychain.set_master_key(&key).unwrap();

        let data = std::fs::read(keychain.path()).unwrap();
        assert_eq!(data.len(), FILE_LEN);
        assert!(!data.windows(crypto::KEY_LEN).any(|w| w == key.as_bytes()));
    }

    #[test]
    fn truncated_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = keychain(&dir);
        std::fs::write(keychain.path(), b"LSK1short").unwrap();

        assert!(matches!(
            keychain.get_master_key(),
            Err(StoreError::CorruptKeyFile { .. })
        ));
    }

    #[test]
    fn keychain_codes_map_to_store_errors() {
        assert!(matches!(
            keychain_failure("read", -25300),
            StoreError::MasterKeyNotFound
        ));

        let err = keychain_failure("write", -25308);
        assert!(matches!(err, StoreError::KeychainUnavailable { .. }));
        assert!(err.to_string().contains("write failed: unavailable"));

        let err = keychain_failure("read", -34018);
        assert!(err.to_string().contains("provider status -34018"));
    }

    #[cfg(target_os = "macos")]
    #[test]
    #[ignore = "touches the login keychain"]
    fn system_keychain_roundtrip() {
        let keychain = SystemKeychain::with_names("locksmith.tests", "master-key");
        keychain.delete_master_key().unwrap();
        assert!(!keychain.has_master_key().unwrap());

        let key = load_or_create_master_key(&keychain).unwrap();
        assert_eq!(keychain.get_master_key().unwrap(), key);

        keychain.delete_master_key().unwrap();
        keychain.delete_master_key().unwrap();
    }

    #[test]
    fn load_or_create_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let keychain = keychain(&dir);

        let first = load_or_create_master_key(&keychain).unwrap();
        let second = load_or_create_master_key(&keychain).unwrap();
        assert_eq!(first, second);
    }

    #[cfg(unix)]
    #[test]
    fn key_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let keychain = keychain(&dir);
        keychain.set_master_key(&MasterKey::generate().unwrap()).unwrap();

        let mode = std::fs::metadata(keychain.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
