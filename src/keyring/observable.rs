//! Persisted, observable maps of address -> stored JSON.
//!
//! Every `add`/`remove` writes through to the key/value store and then calls
//! each listener with the full updated map before returning.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use super::options::KeyringOption;
use crate::error::{KeyringError, Result};
use crate::meta::Meta;
use crate::pair::PairJson;
use crate::storage::KeyValueStore;

/// Stored form of an address without local key material.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AddressJson {
    pub address: String,
    #[serde(default)]
    pub meta: Meta,
}

pub trait StoredJson: Clone + Serialize + DeserializeOwned + Send + 'static {
    fn address(&self) -> &str;
    fn meta(&self) -> &Meta;
}

impl StoredJson for PairJson {
    fn address(&self) -> &str {
        &self.address
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

impl StoredJson for AddressJson {
    fn address(&self) -> &str {
        &self.address
    }

    fn meta(&self) -> &Meta {
        &self.meta
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectEntry<T> {
    pub json: T,
    pub option: KeyringOption,
}

/// Entries in insertion order. Re-adding an address keeps its position.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMap<T> {
    entries: Vec<SubjectEntry<T>>,
}

impl<T> Default for EntryMap<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: StoredJson> EntryMap<T> {
    pub fn get(&self, address: &str) -> Option<&SubjectEntry<T>> {
        self.entries.iter().find(|e| e.json.address() == address)
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubjectEntry<T>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn upsert(&mut self, entry: SubjectEntry<T>) {
        match self.entries.iter().position(|e| e.json.address() == entry.json.address()) {
            Some(index) => self.entries[index] = entry,
            None => self.entries.push(entry),
        }
    }

    fn remove(&mut self, address: &str) {
        self.entries.retain(|e| e.json.address() != address);
    }
}

pub type Listener<T> = Box<dyn FnMut(&EntryMap<T>) + Send>;

pub struct ObservableStore<T> {
    name: &'static str,
    key_of: fn(&str) -> String,
    store: Arc<dyn KeyValueStore>,
    entries: EntryMap<T>,
    listeners: Vec<Listener<T>>,
}

impl<T: StoredJson> ObservableStore<T> {
    pub fn new(name: &'static str, key_of: fn(&str) -> String, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            name,
            key_of,
            store,
            entries: EntryMap::default(),
            listeners: Vec::new(),
        }
    }

    /// Persist and upsert `json` under `address`, then notify listeners.
    pub fn add(&mut self, address: &str, json: T) -> Result<&SubjectEntry<T>> {
        self.store.set_json(&(self.key_of)(address), &json)?;

        let option = KeyringOption::item(address, json.meta());
        self.entries.upsert(SubjectEntry { json, option });
        debug!("{}: stored {}", self.name, address);
        self.emit();

        self.entries
            .get(address)
            .ok_or_else(|| KeyringError::UnknownAddress(address.to_string()))
    }

    /// Delete `address` from storage and the map. Absent addresses are fine.
    pub fn remove(&mut self, address: &str) -> Result<()> {
        self.store.remove(&(self.key_of)(address))?;
        self.entries.remove(address);
        debug!("{}: removed {}", self.name, address);
        self.emit();
        Ok(())
    }

    /// Register a listener. It is called right away with the current map.
    pub fn subscribe(&mut self, mut listener: Listener<T>) {
        listener(&self.entries);
        self.listeners.push(listener);
    }

    pub fn value(&self) -> &EntryMap<T> {
        &self.entries
    }

    pub fn get(&self, address: &str) -> Option<&SubjectEntry<T>> {
        self.entries.get(address)
    }

    fn emit(&mut self) {
        for listener in self.listeners.iter_mut() {
            listener(&self.entries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{address_key, MemoryStore};
    use std::sync::Mutex;

    fn contact(address: &str, name: &str) -> AddressJson {
        AddressJson {
            address: address.to_string(),
            meta: Meta::named(name),
        }
    }

    #[test]
    fn test_add_persists_and_emits_synchronously() {
        let backend = Arc::new(MemoryStore::new());
        let mut subject = ObservableStore::<AddressJson>::new("addresses", address_key, backend.clone());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        subject.subscribe(Box::new(move |map: &EntryMap<AddressJson>| sink.lock().unwrap().push(map.len())));

        subject.add("a", contact("a", "Alice")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![0, 1]);
        assert!(backend.get("address:a").unwrap().is_some());

        let entry = subject.get("a").unwrap();
        assert_eq!(entry.option.text, "Alice");
        assert_eq!(entry.option.value.as_deref(), Some("a"));
        assert!(!entry.option.disabled);
    }

    #[test]
    fn test_upsert_keeps_position() {
        let backend = Arc::new(MemoryStore::new());
        let mut subject = ObservableStore::<AddressJson>::new("addresses", address_key, backend);
        subject.add("a", contact("a", "one")).unwrap();
        subject.add("b", contact("b", "two")).unwrap();
        subject.add("a", contact("a", "three")).unwrap();

        let names: Vec<_> = subject.value().iter().map(|e| e.option.text.clone()).collect();
        assert_eq!(names, vec!["three", "two"]);
    }

    #[test]
    fn test_remove_missing_is_silent() {
        let backend = Arc::new(MemoryStore::new());
        let mut subject = ObservableStore::<AddressJson>::new("addresses", address_key, backend.clone());
        let emissions = Arc::new(Mutex::new(0));
        let counter = emissions.clone();
        subject.subscribe(Box::new(move |_: &EntryMap<AddressJson>| *counter.lock().unwrap() += 1));

        subject.add("a", contact("a", "Alice")).unwrap();
        subject.remove("a").unwrap();
        subject.remove("a").unwrap();

        assert!(subject.value().is_empty());
        assert!(backend.keys().unwrap().is_empty());
        assert_eq!(*emissions.lock().unwrap(), 4);
    }
}
