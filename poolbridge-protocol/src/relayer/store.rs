// Durable swap-mapping store. One JSON document on disk, keyed by the
// originating swap id, optionally encrypted at rest with ChaCha20-Poly1305.
// Opening never fails: an unreadable file leaves the store empty and records
// the load error so the status surface can report degraded durability.

use crate::data_structures::{AccountId, AssetId, SwapId};
use crate::error::RelayerError;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MappingEntry {
    pub counterpart_swap_id: SwapId,
    pub origin_chain_id: u64,
    pub counterpart_chain_id: u64,
    pub participant: AccountId,
    pub asset: AssetId,
    pub created_at: DateTime<Utc>,
}

struct StoreInner {
    entries: HashMap<SwapId, MappingEntry>,
    load_error: Option<String>,
}

pub struct MappingStore {
    path: PathBuf,
    key: Option<[u8; 32]>,
    inner: Mutex<StoreInner>,
}

impl MappingStore {
    /// Opens the store at `path`, loading any existing file. A missing file
    /// starts empty; a corrupt or undecryptable file also starts empty but
    /// keeps the error visible through `load_error`.
    pub fn open(path: impl Into<PathBuf>, key: Option<[u8; 32]>) -> MappingStore {
        let path = path.into();
        let (entries, load_error) = match Self::load(&path, key.as_ref()) {
            Ok(entries) => (entries, None),
            Err(e) => {
                log::warn!("mapping store {}: starting empty: {e}", path.display());
                (HashMap::new(), Some(e))
            }
        };
        MappingStore {
            path,
            key,
            inner: Mutex::new(StoreInner { entries, load_error }),
        }
    }

    pub fn load_error(&self) -> Option<String> {
        self.inner.lock().unwrap().load_error.clone()
    }

    pub fn insert(&self, origin_swap_id: SwapId, entry: MappingEntry) -> Result<(), RelayerError> {
        let mut inner = self.inner.lock().unwrap();
        inner.entries.insert(origin_swap_id, entry);
        self.persist(&inner.entries)
    }

    pub fn get(&self, origin_swap_id: &SwapId) -> Option<MappingEntry> {
        self.inner.lock().unwrap().entries.get(origin_swap_id).cloned()
    }

    /// Removes and persists. Returns the removed entry if it existed.
    pub fn remove(&self, origin_swap_id: &SwapId) -> Result<Option<MappingEntry>, RelayerError> {
        let mut inner = self.inner.lock().unwrap();
        let removed = inner.entries.remove(origin_swap_id);
        if removed.is_some() {
            self.persist(&inner.entries)?;
        }
        Ok(removed)
    }

    pub fn list(&self) -> Vec<(SwapId, MappingEntry)> {
        let inner = self.inner.lock().unwrap();
        inner.entries.iter().map(|(id, e)| (*id, e.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn load(
        path: &Path,
        key: Option<&[u8; 32]>,
    ) -> Result<HashMap<SwapId, MappingEntry>, String> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| format!("read failed: {e}"))?;
        let json = match key {
            Some(key) => decrypt(raw.trim(), key)?,
            None => raw,
        };
        serde_json::from_str(&json).map_err(|e| format!("parse failed: {e}"))
    }

    // Write-then-rename so a crash mid-write never clobbers the old file.
    fn persist(&self, entries: &HashMap<SwapId, MappingEntry>) -> Result<(), RelayerError> {
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| RelayerError::Resource(format!("serialize mappings: {e}")))?;
        let contents = match &self.key {
            Some(key) => encrypt(&json, key)?,
            None => json,
        };
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, contents)
            .map_err(|e| RelayerError::Resource(format!("write {}: {e}", tmp.display())))?;
        restrict_permissions(&tmp)?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| RelayerError::Resource(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }
}

// nonce:ciphertext, both base64. The nonce is fresh per write.
fn encrypt(plaintext: &str, key: &[u8; 32]) -> Result<String, RelayerError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|_| RelayerError::Resource("mapping encryption failed".to_string()))?;
    Ok(format!("{}:{}", BASE64.encode(nonce), BASE64.encode(ciphertext)))
}

fn decrypt(contents: &str, key: &[u8; 32]) -> Result<String, String> {
    let (nonce_b64, ct_b64) = contents
        .split_once(':')
        .ok_or_else(|| "expected nonce:ciphertext".to_string())?;
    let nonce_bytes = BASE64
        .decode(nonce_b64)
        .map_err(|e| format!("bad nonce encoding: {e}"))?;
    let ciphertext = BASE64
        .decode(ct_b64)
        .map_err(|e| format!("bad ciphertext encoding: {e}"))?;
    if nonce_bytes.len() != 12 {
        return Err("bad nonce length".to_string());
    }
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
        .map_err(|_| "decryption failed (wrong key or corrupt file)".to_string())?;
    String::from_utf8(plaintext).map_err(|e| format!("not utf-8: {e}"))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), RelayerError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| RelayerError::Resource(format!("chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), RelayerError> {
    Ok(())
}

/// Parses a 64-char hex string into a store encryption key.
pub fn parse_key_hex(key_hex: &str) -> Result<[u8; 32], RelayerError> {
    let bytes = hex::decode(key_hex)
        .map_err(|e| RelayerError::Validation(format!("bad store key hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|_| RelayerError::Validation("store key must be 32 bytes".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(counterpart: SwapId) -> MappingEntry {
        MappingEntry {
            counterpart_swap_id: counterpart,
            origin_chain_id: 1,
            counterpart_chain_id: 2,
            participant: AccountId { chain_id: 2, address: "bob".to_string() },
            asset: AssetId { chain_id: 2, symbol: "TOK".to_string() },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn plaintext_round_trip_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let origin = SwapId([1u8; 32]);
        let e = entry(SwapId([2u8; 32]));

        let store = MappingStore::open(&path, None);
        assert!(store.load_error().is_none());
        store.insert(origin, e.clone()).unwrap();

        let reopened = MappingStore::open(&path, None);
        assert!(reopened.load_error().is_none());
        assert_eq!(reopened.get(&origin), Some(e));
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn encrypted_file_is_opaque_and_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let key = [42u8; 32];
        let origin = SwapId([1u8; 32]);

        let store = MappingStore::open(&path, Some(key));
        store.insert(origin, entry(SwapId([2u8; 32]))).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("counterpart_swap_id"));
        assert!(raw.contains(':'));

        let reopened = MappingStore::open(&path, Some(key));
        assert!(reopened.load_error().is_none());
        assert!(reopened.get(&origin).is_some());
    }

    #[test]
    fn wrong_key_starts_empty_with_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let store = MappingStore::open(&path, Some([1u8; 32]));
        store.insert(SwapId([1u8; 32]), entry(SwapId([2u8; 32]))).unwrap();

        let reopened = MappingStore::open(&path, Some([9u8; 32]));
        assert!(reopened.is_empty());
        assert!(reopened.load_error().is_some());
    }

    #[test]
    fn corrupt_file_starts_empty_with_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = MappingStore::open(&path, None);
        assert!(store.is_empty());
        assert!(store.load_error().is_some());
    }

    #[test]
    fn remove_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let origin = SwapId([1u8; 32]);

        let store = MappingStore::open(&path, None);
        store.insert(origin, entry(SwapId([2u8; 32]))).unwrap();
        assert!(store.remove(&origin).unwrap().is_some());
        assert!(store.remove(&origin).unwrap().is_none());

        let reopened = MappingStore::open(&path, None);
        assert!(reopened.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn file_permissions_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let path = dir.path().join("mappings.json");
        let store = MappingStore::open(&path, None);
        store.insert(SwapId([1u8; 32]), entry(SwapId([2u8; 32]))).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn key_hex_parsing() {
        assert!(parse_key_hex(&"ab".repeat(32)).is_ok());
        assert!(parse_key_hex("zz").is_err());
        assert!(parse_key_hex("abcd").is_err()); // wrong length
    }
}
