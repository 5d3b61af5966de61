use rocksdb::{IteratorMode, Options, DB};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tracing::warn;

use crate::error::{KeyringError, Result};

pub const ACCOUNT_PREFIX: &str = "account:";
pub const ADDRESS_PREFIX: &str = "address:";

pub fn account_key(address: &str) -> String {
    format!("{}{}", ACCOUNT_PREFIX, address)
}

pub fn address_key(address: &str) -> String {
    format!("{}{}", ADDRESS_PREFIX, address)
}

/// Byte-oriented key/value backend. No transactional guarantees are assumed.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, key: &str, value: &[u8]) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Visit every stored record. Keys that are not valid UTF-8 are skipped.
    fn for_each(&self, visitor: &mut dyn FnMut(&str, &[u8])) -> Result<()>;
}

impl<'a> dyn KeyValueStore + 'a {
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key)? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let serialized = serde_json::to_vec(value)?;
        self.set(key, &serialized)
    }

    /// Collect every record whose key starts with `prefix`.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let mut found = Vec::new();
        self.for_each(&mut |key, value| {
            if key.starts_with(prefix) {
                found.push((key.to_string(), value.to_vec()));
            }
        })?;
        Ok(found)
    }
}

pub struct RocksStore {
    db: DB,
}

impl RocksStore {
    pub fn open(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, Path::new(path))?;
        Ok(Self { db })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl KeyValueStore for RocksStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key.as_bytes())?)
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.db.put(key.as_bytes(), value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db.delete(key.as_bytes())?;
        Ok(())
    }

    fn for_each(&self, visitor: &mut dyn FnMut(&str, &[u8])) -> Result<()> {
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item?;
            match std::str::from_utf8(&key) {
                Ok(key) => visitor(key, &value),
                Err(_) => warn!("Skipping non UTF-8 key {}", hex::encode(&key)),
            }
        }
        Ok(())
    }
}

/// In-process store used by tests and ephemeral keyrings.
#[derive(Default)]
pub struct MemoryStore {
    kv: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>>> {
        self.kv
            .lock()
            .map_err(|e| KeyringError::Storage(format!("Mutex poisoned: {}", e)))
    }

    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.map()?.keys().cloned().collect())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.map()?.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.map()?.remove(key);
        Ok(())
    }

    fn for_each(&self, visitor: &mut dyn FnMut(&str, &[u8])) -> Result<()> {
        // Snapshot first so the visitor may call back into the store.
        let snapshot = self.map()?.clone();
        for (key, value) in &snapshot {
            visitor(key, value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    fn exercise(store: Arc<dyn KeyValueStore>) {
        store.set_json(&account_key("a"), &json!({ "address": "a" })).unwrap();
        store.set_json(&address_key("b"), &json!({ "address": "b" })).unwrap();
        store.set("other", b"x").unwrap();

        let value: serde_json::Value = store.get_json(&account_key("a")).unwrap().unwrap();
        assert_eq!(value["address"], "a");

        let accounts = store.scan_prefix(ACCOUNT_PREFIX).unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].0, "account:a");

        store.remove(&account_key("a")).unwrap();
        store.remove(&account_key("missing")).unwrap();
        assert!(store.get(&account_key("a")).unwrap().is_none());

        let mut count = 0;
        store.for_each(&mut |_, _| count += 1).unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_memory_store() {
        exercise(Arc::new(MemoryStore::new()));
    }

    #[test]
    fn test_rocks_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksStore::open(dir.path().to_str().unwrap()).unwrap();
        exercise(Arc::new(store));
    }
}
