//! Keyring facade: the single entry point that owns the pair registry, the
//! account and address stores and the derived selection options.
//!
//! Data flows one way. Facade operations mutate the registry and the stores;
//! each store mutation synchronously notifies the options aggregator, which
//! rebuilds its snapshot before the operation returns.

pub mod migration;
pub mod observable;
pub mod options;
pub mod pairs;

use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

use crate::address::{Address, PUBLIC_KEY_LENGTH};
use crate::config::KeyringConfig;
use crate::crypto;
use crate::error::{KeyringError, Result};
use crate::meta::{now_millis, Meta};
use crate::pair::{Pair, PairJson};
use crate::storage::{account_key, address_key, KeyValueStore, ACCOUNT_PREFIX, ADDRESS_PREFIX};

use migration::{migrate_legacy_keys, MigrationReport};
use observable::{AddressJson, ObservableStore, StoredJson};
use options::{OptionsAggregator, OptionsListener, OptionsSnapshot};
use pairs::PairRegistry;

pub const MAX_PASS_LEN: usize = 32;

/// Read-only handle over a stored account or address.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyringAddress {
    address: Address,
    public_key: Option<[u8; PUBLIC_KEY_LENGTH]>,
    meta: Meta,
}

impl KeyringAddress {
    fn from_json<T: StoredJson>(json: &T) -> Self {
        let address = Address::from_raw(json.address());
        Self {
            public_key: address.public_key().ok(),
            address,
            meta: json.meta().clone(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn is_valid(&self) -> bool {
        self.public_key.is_some()
    }

    pub fn public_key(&self) -> Option<&[u8; PUBLIC_KEY_LENGTH]> {
        self.public_key.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    pub key: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub accounts: usize,
    pub addresses: usize,
    pub skipped: Vec<SkippedRecord>,
    pub migration: MigrationReport,
}

pub struct Keyring {
    config: KeyringConfig,
    store: Arc<dyn KeyValueStore>,
    pairs: PairRegistry,
    accounts: ObservableStore<PairJson>,
    addresses: ObservableStore<AddressJson>,
    options: OptionsAggregator,
    dev_mode: bool,
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keyring")
            .field("pairs", &self.pairs.len())
            .field("accounts", &self.accounts.value().len())
            .field("addresses", &self.addresses.value().len())
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

impl Keyring {
    pub fn new(store: Arc<dyn KeyValueStore>, config: KeyringConfig) -> Self {
        let prefix = config.network.address_prefix;
        Self {
            pairs: PairRegistry::new(prefix, config.kdf_iterations),
            accounts: ObservableStore::new("accounts", account_key, Arc::clone(&store)),
            addresses: ObservableStore::new("addresses", address_key, Arc::clone(&store)),
            options: OptionsAggregator::new(),
            dev_mode: config.dev_mode,
            store,
            config,
        }
    }

    pub fn config(&self) -> &KeyringConfig {
        &self.config
    }

    fn prefix(&self) -> u8 {
        self.config.network.address_prefix
    }

    /// Canonical form of `address` under this keyring's network, or the
    /// input unchanged when it cannot be decoded.
    fn canonical(&self, address: &str) -> String {
        Address::normalize(address, self.prefix())
            .map(|a| a.to_string())
            .unwrap_or_else(|_| address.to_string())
    }

    // --- Accounts ---

    pub fn create_account(&mut self, seed: &[u8], password: Option<&str>, meta: Meta) -> Result<&Pair> {
        let address = self.pairs.add_from_seed(seed, meta)?.address().to_string();
        self.save_account(&address, password)?;
        info!("Created account {}", address);
        self.pairs.get_pair(&address)
    }

    pub fn create_account_mnemonic(&mut self, phrase: &str, password: Option<&str>, meta: Meta) -> Result<&Pair> {
        let address = self.pairs.add_from_mnemonic(phrase, meta)?.address().to_string();
        self.save_account(&address, password)?;
        info!("Created account {} from mnemonic", address);
        self.pairs.get_pair(&address)
    }

    /// Export an account after checking `password` against its stored
    /// encoding. The pair is left unlocked on success.
    pub fn backup_account(&mut self, address: &str, password: &str) -> Result<PairJson> {
        let pair = self.pairs.get_pair_mut(address)?;
        if !pair.is_locked() {
            pair.lock();
        }
        pair.decode_pkcs8(Some(password))?;
        pair.export(password)
    }

    /// Import an export, verifying the password before anything is stored.
    /// The registered pair is locked again before returning.
    pub fn restore_account(&mut self, json: &PairJson, password: &str) -> Result<&Pair> {
        let mut pair = self.pairs.pair_from_json(json)?;
        pair.decode_pkcs8(Some(password))?;

        let address = self.pairs.add_pair(pair).address().to_string();
        self.save_account(&address, Some(password))?;
        self.pairs.get_pair_mut(&address)?.lock();
        info!("Restored account {}", address);
        self.pairs.get_pair(&address)
    }

    /// Register (if needed) and persist a pair. `whenCreated` is only set the
    /// first time.
    pub fn save_account(&mut self, address: &str, password: Option<&str>) -> Result<()> {
        let pair = self.pairs.get_pair_mut(address)?;
        let meta = pair.meta_mut();
        if meta.when_created.is_none() {
            meta.when_created = Some(now_millis());
        }
        let json = pair.to_json(password)?;
        let address = pair.address().to_string();
        self.accounts.add(&address, json)?;
        Ok(())
    }

    /// Register a pair built elsewhere and persist it.
    pub fn add_pair(&mut self, pair: Pair, password: Option<&str>) -> Result<&Pair> {
        let address = self.pairs.add_pair(pair).address().to_string();
        self.save_account(&address, password)?;
        self.pairs.get_pair(&address)
    }

    /// Merge `meta` into the pair's metadata and persist it.
    pub fn save_account_meta(&mut self, address: &str, meta: Meta) -> Result<()> {
        let pair = self.pairs.get_pair_mut(address)?;
        pair.meta_mut().merge(meta);
        let json = pair.to_json(None)?;
        let address = pair.address().to_string();
        self.accounts.add(&address, json)?;
        Ok(())
    }

    /// Re-seal an unlocked pair under a new password. The pair is replaced by
    /// its re-imported (locked) form.
    pub fn encrypt_account(&mut self, address: &str, password: &str) -> Result<()> {
        let pair = self.pairs.get_pair_mut(address)?;
        let mut json = pair.to_json(Some(password))?;
        json.meta.when_edited = Some(now_millis());

        let address = self.pairs.add_from_json(&json)?.address().to_string();
        self.accounts.add(&address, json)?;
        info!("Re-encrypted account {}", address);
        Ok(())
    }

    pub fn forget_account(&mut self, address: &str) -> Result<()> {
        let canonical = self.canonical(address);
        self.pairs.remove_pair(address);
        self.accounts.remove(&canonical)?;
        info!("Forgot account {}", canonical);
        Ok(())
    }

    // --- Addresses ---

    /// Merge `meta` into the address entry, creating it if needed. The
    /// `isRecent` flag is always cleared: a saved contact is never recent.
    pub fn save_address_meta(&mut self, address: &str, meta: Meta) -> Result<()> {
        let canonical = Address::normalize(address, self.prefix())?.to_string();
        let mut json = match self.addresses.get(&canonical) {
            Some(entry) => entry.json.clone(),
            None => AddressJson {
                address: canonical.clone(),
                meta: Meta {
                    when_created: Some(now_millis()),
                    ..Meta::default()
                },
            },
        };
        json.meta.merge(meta);
        json.meta.is_recent = None;
        self.addresses.add(&canonical, json)?;
        Ok(())
    }

    /// Record `address` as recently used unless it is already known. Returns
    /// whatever is stored for it afterwards.
    pub fn save_recent(&mut self, address: &str) -> Result<AddressJson> {
        let canonical = Address::normalize(address, self.prefix())?.to_string();
        if let Some(entry) = self.addresses.get(&canonical) {
            return Ok(entry.json.clone());
        }

        let json = AddressJson {
            address: canonical.clone(),
            meta: Meta {
                is_recent: Some(true),
                when_created: Some(now_millis()),
                ..Meta::default()
            },
        };
        let entry = self.addresses.add(&canonical, json)?;
        debug!("Saved recent address {}", canonical);
        Ok(entry.json.clone())
    }

    pub fn forget_address(&mut self, address: &str) -> Result<()> {
        let canonical = self.canonical(address);
        self.addresses.remove(&canonical)?;
        info!("Forgot address {}", canonical);
        Ok(())
    }

    // --- Queries ---

    /// True when neither an account nor an address is stored for `address`.
    pub fn is_available(&self, address: &str) -> bool {
        let canonical = self.canonical(address);
        self.accounts.get(&canonical).is_none() && self.addresses.get(&canonical).is_none()
    }

    pub fn is_pass_valid(password: &str) -> bool {
        let len = password.chars().count();
        len > 0 && len <= MAX_PASS_LEN
    }

    /// Stored accounts, excluding testing ones.
    pub fn get_accounts(&self) -> Vec<KeyringAddress> {
        self.accounts
            .value()
            .iter()
            .filter(|entry| !entry.json.meta.is_testing())
            .map(|entry| KeyringAddress::from_json(&entry.json))
            .collect()
    }

    pub fn get_account(&self, address: &str) -> Option<KeyringAddress> {
        self.accounts
            .get(&self.canonical(address))
            .map(|entry| KeyringAddress::from_json(&entry.json))
    }

    pub fn get_addresses(&self) -> Vec<KeyringAddress> {
        self.addresses
            .value()
            .iter()
            .map(|entry| KeyringAddress::from_json(&entry.json))
            .collect()
    }

    pub fn get_address(&self, address: &str) -> Option<KeyringAddress> {
        self.addresses
            .get(&self.canonical(address))
            .map(|entry| KeyringAddress::from_json(&entry.json))
    }

    pub fn get_pair(&self, address: &str) -> Result<&Pair> {
        self.pairs.get_pair(address)
    }

    pub fn get_pair_mut(&mut self, address: &str) -> Result<&mut Pair> {
        self.pairs.get_pair_mut(address)
    }

    /// Registered pairs; testing pairs only show up in development mode.
    pub fn get_pairs(&self) -> Vec<&Pair> {
        self.pairs
            .get_pairs()
            .iter()
            .filter(|pair| self.dev_mode || !pair.meta().is_testing())
            .collect()
    }

    pub fn set_dev_mode(&mut self, enabled: bool) {
        debug!("Development mode {}", if enabled { "on" } else { "off" });
        self.dev_mode = enabled;
    }

    pub fn is_dev_mode(&self) -> bool {
        self.dev_mode
    }

    pub fn generate_mnemonic(words: usize) -> Result<String> {
        crypto::generate_mnemonic(words)
    }

    // --- Options ---

    /// Hook the options aggregator to both stores. Only the first call has an
    /// effect; later calls log a warning and return false.
    pub fn init_options(&mut self) -> bool {
        match self.options.attach(&mut self.accounts, &mut self.addresses) {
            Ok(()) => true,
            Err(e) => {
                warn!("Unable to initialise options: {}", e);
                false
            }
        }
    }

    pub fn options(&self) -> OptionsSnapshot {
        self.options.snapshot()
    }

    pub fn options_recomputations(&self) -> usize {
        self.options.recomputations()
    }

    pub fn subscribe_options(&self, listener: OptionsListener) {
        self.options.subscribe(listener);
    }

    // --- Bootstrap ---

    pub fn migrate_legacy_keys(&self) -> Result<MigrationReport> {
        migrate_legacy_keys(self.store.as_ref(), self.prefix())
    }

    fn load_account(&mut self, value: &[u8]) -> Result<bool> {
        let json: PairJson = serde_json::from_slice(value)?;
        if json.meta.is_testing() || json.encoded.is_empty() {
            return Ok(false);
        }
        let pair = self.pairs.add_from_json(&json)?;
        let json = pair.to_json(None)?;
        let address = pair.address().to_string();
        self.accounts.add(&address, json)?;
        Ok(true)
    }

    fn load_address(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let mut json: AddressJson = serde_json::from_slice(value)?;
        let source = if json.address.is_empty() {
            &key[ADDRESS_PREFIX.len()..]
        } else {
            json.address.as_str()
        };
        let canonical = Address::normalize(source, self.prefix())?.to_string();
        json.address = canonical.clone();
        self.addresses.add(&canonical, json)?;
        Ok(())
    }

    /// Bootstrap from storage: migrate legacy keys, register every stored
    /// account that has key material and is not a testing account, load every
    /// address, then initialise the options aggregator. A record that fails
    /// to load is skipped and reported, the rest still load.
    pub fn load_all(&mut self) -> Result<LoadReport> {
        let mut report = LoadReport {
            migration: self.migrate_legacy_keys()?,
            ..LoadReport::default()
        };

        let mut records = Vec::new();
        self.store.for_each(&mut |key, value| {
            if key.starts_with(ACCOUNT_PREFIX) || key.starts_with(ADDRESS_PREFIX) {
                records.push((key.to_string(), value.to_vec()));
            }
        })?;

        for (key, value) in records {
            let loaded = if key.starts_with(ACCOUNT_PREFIX) {
                self.load_account(&value).map(|added| {
                    if added {
                        report.accounts += 1;
                    }
                })
            } else {
                self.load_address(&key, &value).map(|()| report.addresses += 1)
            };

            if let Err(e) = loaded {
                warn!("Skipping stored record {}: {}", key, e);
                report.skipped.push(SkippedRecord {
                    key,
                    reason: e.to_string(),
                });
            }
        }

        self.init_options();
        info!(
            "Keyring loaded: {} accounts, {} addresses, {} skipped",
            report.accounts,
            report.addresses,
            report.skipped.len()
        );
        Ok(report)
    }
}

/// Holder for the one active keyring. The first request constructs it, the
/// second hands back the same instance and any further request is refused.
#[derive(Default)]
pub struct KeyringSlot {
    instance: Option<Arc<Mutex<Keyring>>>,
    requests: usize,
}

impl KeyringSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create<F>(&mut self, create: F) -> Result<Arc<Mutex<Keyring>>>
    where
        F: FnOnce() -> Keyring,
    {
        self.requests += 1;
        if self.requests > 2 {
            error!("Keyring requested {} times, refusing", self.requests);
            return Err(KeyringError::DuplicateSingleton);
        }
        let instance = self.instance.get_or_insert_with(|| Arc::new(Mutex::new(create())));
        Ok(Arc::clone(instance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn keyring() -> Keyring {
        let config = KeyringConfig {
            kdf_iterations: 16,
            ..KeyringConfig::default()
        };
        Keyring::new(Arc::new(MemoryStore::new()), config)
    }

    #[test]
    fn test_pass_validity() {
        assert!(!Keyring::is_pass_valid(""));
        assert!(Keyring::is_pass_valid("a"));
        assert!(Keyring::is_pass_valid(&"x".repeat(MAX_PASS_LEN)));
        assert!(!Keyring::is_pass_valid(&"x".repeat(MAX_PASS_LEN + 1)));
    }

    #[test]
    fn test_save_account_keeps_when_created() {
        let mut kr = keyring();
        let address = kr.create_account(&[1u8; 32], Some("pw"), Meta::default()).unwrap().address().to_string();
        let created = kr.get_account(&address).unwrap().meta().when_created;
        assert!(created.is_some());

        kr.save_account(&address, None).unwrap();
        assert_eq!(kr.get_account(&address).unwrap().meta().when_created, created);
    }

    #[test]
    fn test_save_account_meta_merges() {
        let mut kr = keyring();
        let address = kr.create_account(&[1u8; 32], None, Meta::named("one")).unwrap().address().to_string();

        let mut update = Meta::default();
        update.extra.insert("tag".into(), serde_json::json!("x"));
        kr.save_account_meta(&address, update).unwrap();

        let meta = kr.get_account(&address).unwrap().meta().clone();
        assert_eq!(meta.name.as_deref(), Some("one"));
        assert_eq!(meta.extra["tag"], "x");
    }

    #[test]
    fn test_encrypt_account_changes_password() {
        let mut kr = keyring();
        let address = kr.create_account(&[1u8; 32], Some("old"), Meta::default()).unwrap().address().to_string();

        kr.encrypt_account(&address, "new").unwrap();
        assert!(kr.get_pair(&address).unwrap().is_locked());
        assert!(kr.get_account(&address).unwrap().meta().when_edited.is_some());

        assert!(matches!(kr.backup_account(&address, "old"), Err(KeyringError::WrongPassword)));
        assert!(kr.backup_account(&address, "new").is_ok());
    }

    #[test]
    fn test_encrypt_locked_account_fails() {
        let mut kr = keyring();
        let address = kr.create_account(&[1u8; 32], Some("pw"), Meta::default()).unwrap().address().to_string();
        kr.get_pair_mut(&address).unwrap().lock();
        assert!(matches!(kr.encrypt_account(&address, "new"), Err(KeyringError::Locked(_))));
        assert!(kr.get_pair(&address).unwrap().meta().when_edited.is_none());

        // a later metadata save must not pick up an edit stamp from the failed call
        kr.save_account_meta(&address, Meta::named("renamed")).unwrap();
        assert!(kr.get_account(&address).unwrap().meta().when_edited.is_none());
    }

    #[test]
    fn test_forget_account() {
        let mut kr = keyring();
        let address = kr.create_account(&[1u8; 32], None, Meta::default()).unwrap().address().to_string();
        kr.forget_account(&address).unwrap();
        assert!(kr.is_available(&address));
        assert!(matches!(kr.get_pair(&address), Err(KeyringError::UnknownAddress(_))));
        kr.forget_account(&address).unwrap();
    }

    #[test]
    fn test_slot_allows_two_requests() {
        let mut slot = KeyringSlot::new();
        let first = slot.get_or_create(keyring).unwrap();
        let second = slot.get_or_create(keyring).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(matches!(slot.get_or_create(keyring), Err(KeyringError::DuplicateSingleton)));
    }

    #[test]
    fn test_init_options_twice_warns() {
        let mut kr = keyring();
        assert!(kr.init_options());
        assert!(!kr.init_options());
    }
}
