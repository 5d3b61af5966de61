//! One-time rewrite of storage keys that are not in canonical address form.
//!
//! Older releases keyed records by the `0x` hex public key (and sometimes
//! under a different network prefix). Each such record is rewritten under
//! `account:<address>` / `address:<address>` with its `address` field updated,
//! and the old key is deleted.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::address::Address;
use crate::error::{KeyringError, Result};
use crate::storage::{KeyValueStore, ACCOUNT_PREFIX, ADDRESS_PREFIX};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MigrationReport {
    /// `(old key, new key)`
    pub migrated: Vec<(String, String)>,
    /// `(key, reason)`
    pub failed: Vec<(String, String)>,
}

impl MigrationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn split_key(key: &str) -> Option<(&'static str, &str)> {
    [ACCOUNT_PREFIX, ADDRESS_PREFIX]
        .into_iter()
        .find_map(|ns| key.strip_prefix(ns).map(|segment| (ns, segment)))
}

fn migrate_record(store: &dyn KeyValueStore, ns: &str, old_key: &str, value: &[u8], canonical: &Address) -> Result<String> {
    let new_key = format!("{}{}", ns, canonical);

    if store.get(&new_key)?.is_some() {
        debug!("{} already present, dropping legacy {}", new_key, old_key);
    } else {
        let mut json: Value = serde_json::from_slice(value)?;
        let obj = json
            .as_object_mut()
            .ok_or_else(|| KeyringError::Serialization("record is not a JSON object".to_string()))?;
        obj.insert("address".to_string(), Value::String(canonical.to_string()));
        store.set_json(&new_key, &json)?;
    }

    store.remove(old_key)?;
    Ok(new_key)
}

pub fn migrate_legacy_keys(store: &dyn KeyValueStore, prefix: u8) -> Result<MigrationReport> {
    let mut records = Vec::new();
    store.for_each(&mut |key, value| {
        if let Some((ns, segment)) = split_key(key) {
            records.push((ns, segment.to_string(), key.to_string(), value.to_vec()));
        }
    })?;

    let mut report = MigrationReport::default();
    for (ns, segment, key, value) in records {
        let canonical = match Address::normalize(&segment, prefix) {
            Ok(address) => address,
            Err(e) => {
                warn!("Cannot migrate {}: {}", key, e);
                report.failed.push((key, e.to_string()));
                continue;
            }
        };
        if canonical.as_str() == segment {
            continue;
        }

        match migrate_record(store, ns, &key, &value, &canonical) {
            Ok(new_key) => {
                info!("Migrated {} -> {}", key, new_key);
                report.migrated.push((key, new_key));
            }
            Err(e) => {
                warn!("Cannot migrate {}: {}", key, e);
                report.failed.push((key, e.to_string()));
            }
        }
    }
    Ok(report)
}
