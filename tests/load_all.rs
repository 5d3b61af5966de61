use std::sync::Arc;

use compass_keyring::address::to_legacy_hex;
use compass_keyring::crypto::{encode_secret, keypair_from_seed};
use compass_keyring::storage::{account_key, address_key};
use compass_keyring::{Address, KeyValueStore, Keyring, KeyringConfig, MemoryStore, Meta, RocksStore};
use serde_json::json;

const PREFIX: u8 = 42;

fn config() -> KeyringConfig {
    KeyringConfig {
        kdf_iterations: 16,
        ..KeyringConfig::default()
    }
}

fn public_key(seed: u8) -> [u8; 32] {
    keypair_from_seed(&[seed; 32]).unwrap().verifying_key().to_bytes()
}

fn legacy_account(store: &dyn KeyValueStore, seed: u8, meta: serde_json::Value) -> String {
    let pk = public_key(seed);
    let legacy = to_legacy_hex(&pk);
    let encoded = encode_secret(&[seed; 32], Some("pw"), 16).unwrap();
    store
        .set_json(
            &account_key(&legacy),
            &json!({ "address": legacy, "encoded": hex::encode(encoded), "meta": meta }),
        )
        .unwrap();
    Address::from_public_key(&pk, PREFIX).to_string()
}

#[test]
fn reload_from_rocksdb() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db");
    let config = KeyringConfig {
        db_path: path.to_string_lossy().into_owned(),
        ..config()
    };
    let contact = Address::from_public_key(&[8u8; 32], PREFIX).to_string();

    let account = {
        let store = Arc::new(RocksStore::open(&config.db_path).unwrap());
        let mut kr = Keyring::new(store.clone(), config.clone());
        kr.load_all().unwrap();
        let account = kr.create_account(&[1u8; 32], Some("pw"), Meta::named("main")).unwrap().address().to_string();
        kr.save_address_meta(&contact, Meta::named("friend")).unwrap();
        store.flush().unwrap();
        account
    };

    let store = Arc::new(RocksStore::open(&config.db_path).unwrap());
    let mut kr = Keyring::new(store, config);
    let report = kr.load_all().unwrap();
    assert_eq!(report.accounts, 1);
    assert_eq!(report.addresses, 1);
    assert!(report.skipped.is_empty());

    assert_eq!(kr.get_account(&account).unwrap().meta().name.as_deref(), Some("main"));
    assert_eq!(kr.get_address(&contact).unwrap().meta().name.as_deref(), Some("friend"));
    assert!(kr.get_pair(&account).unwrap().is_locked());
    assert!(kr.backup_account(&account, "pw").is_ok());
    assert_eq!(kr.options().all.len(), 4);
}

#[test]
fn legacy_keys_are_migrated_once() {
    let store = Arc::new(MemoryStore::new());
    let account = legacy_account(store.as_ref(), 1, json!({ "name": "old" }));
    let legacy_contact = to_legacy_hex(&[9u8; 32]);
    let kv: &dyn KeyValueStore = store.as_ref();
    kv.set_json(&address_key(&legacy_contact), &json!({ "address": legacy_contact, "meta": { "name": "c" } }))
        .unwrap();

    let mut kr = Keyring::new(store.clone(), config());
    let report = kr.load_all().unwrap();
    assert_eq!(report.migration.migrated.len(), 2);
    assert_eq!(report.accounts, 1);
    assert_eq!(report.addresses, 1);

    let keys = store.keys().unwrap();
    let contact = Address::from_public_key(&[9u8; 32], PREFIX).to_string();
    assert!(keys.contains(&account_key(&account)));
    assert!(keys.contains(&address_key(&contact)));
    assert!(!keys.iter().any(|k| k.contains("0x")));

    assert_eq!(kr.get_account(&account).unwrap().address().as_str(), account);
    assert!(kr.backup_account(&account, "pw").is_ok());

    let mut again = Keyring::new(store, config());
    assert!(again.load_all().unwrap().migration.migrated.is_empty());
}

#[test]
fn testing_and_empty_accounts_are_not_loaded() {
    let store = Arc::new(MemoryStore::new());
    let testing = legacy_account(store.as_ref(), 1, json!({ "isTesting": true }));
    let empty = Address::from_public_key(&public_key(2), PREFIX).to_string();
    let kv: &dyn KeyValueStore = store.as_ref();
    kv.set_json(&account_key(&empty), &json!({ "address": empty, "encoded": "", "meta": {} }))
        .unwrap();

    let mut kr = Keyring::new(store, config());
    let report = kr.load_all().unwrap();
    assert_eq!(report.accounts, 0);
    assert!(report.skipped.is_empty());
    assert!(kr.get_pair(&testing).is_err());
    assert!(kr.get_pair(&empty).is_err());
}

#[test]
fn malformed_records_are_skipped() {
    let store = Arc::new(MemoryStore::new());
    let good = legacy_account(store.as_ref(), 1, json!({}));
    store.set(&account_key("broken"), b"not json").unwrap();
    store.set(&address_key("nonsense"), br#"{"address":"nonsense"}"#).unwrap();
    store.set("settings:theme", b"dark").unwrap();

    let mut kr = Keyring::new(store, config());
    let report = kr.load_all().unwrap();
    assert_eq!(report.accounts, 1);
    assert_eq!(report.addresses, 0);
    let skipped: Vec<_> = report.skipped.iter().map(|s| s.key.as_str()).collect();
    assert_eq!(skipped, vec!["account:broken", "address:nonsense"]);
    assert!(kr.get_pair(&good).is_ok());
}

#[test]
fn backup_does_not_reseal_stored_account() {
    let store = Arc::new(MemoryStore::new());
    let mut kr = Keyring::new(store.clone(), config());
    kr.load_all().unwrap();
    let address = kr.create_account(&[4u8; 32], None, Meta::default()).unwrap().address().to_string();
    let kv: &dyn KeyValueStore = store.as_ref();
    let before: serde_json::Value = kv.get_json(&account_key(&address)).unwrap().unwrap();

    kr.backup_account(&address, "x").unwrap();
    kr.save_account_meta(&address, Meta::named("renamed")).unwrap();

    let after: serde_json::Value = kv.get_json(&account_key(&address)).unwrap().unwrap();
    assert_eq!(after["encoded"], before["encoded"]);
    assert_eq!(after["meta"]["name"], "renamed");

    let mut reloaded = Keyring::new(store, config());
    reloaded.load_all().unwrap();
    let pair = reloaded.get_pair(&address).unwrap();
    assert!(!pair.is_encrypted());
    // an unsealed account opens with any password
    assert!(reloaded.backup_account(&address, "anything-else").is_ok());
}
