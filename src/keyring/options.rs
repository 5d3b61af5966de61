//! Grouped selection lists derived from the account and address stores.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::observable::{AddressJson, EntryMap, ObservableStore, StoredJson};
use crate::error::{KeyringError, Result};
use crate::meta::Meta;
use crate::pair::PairJson;

pub const HEADER_ACCOUNTS: &str = "Accounts";
pub const HEADER_DEVELOPMENT: &str = "Development";
pub const HEADER_ADDRESSES: &str = "Addresses";
pub const HEADER_RECENT: &str = "Recent";

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct KeyringOption {
    pub id: String,
    pub text: String,
    /// `None` for section headers
    pub value: Option<String>,
    pub disabled: bool,
}

impl KeyringOption {
    pub fn item(address: &str, meta: &Meta) -> Self {
        Self {
            id: address.to_string(),
            text: meta.name.clone().unwrap_or_else(|| address.to_string()),
            value: Some(address.to_string()),
            disabled: false,
        }
    }

    pub fn header(label: &str) -> Self {
        Self {
            id: format!("header-{}", label.to_lowercase()),
            text: label.to_string(),
            value: None,
            disabled: true,
        }
    }

    pub fn is_header(&self) -> bool {
        self.value.is_none()
    }
}

/// `account` and `address` carry section headers; `testing` and `recent` are
/// the bare partitions; `all` is `account` followed by `address`.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionsSnapshot {
    pub account: Vec<KeyringOption>,
    pub testing: Vec<KeyringOption>,
    pub address: Vec<KeyringOption>,
    pub recent: Vec<KeyringOption>,
    pub all: Vec<KeyringOption>,
}

// An option plus the flag that decides its partition.
type Flagged = (KeyringOption, bool);

fn flagged<T: StoredJson>(map: &EntryMap<T>, flag: fn(&Meta) -> bool) -> Vec<Flagged> {
    map.iter()
        .map(|entry| (entry.option.clone(), flag(entry.json.meta())))
        .collect()
}

fn partition(entries: &[Flagged]) -> (Vec<KeyringOption>, Vec<KeyringOption>) {
    let mut plain = Vec::new();
    let mut flagged = Vec::new();
    for (option, flag) in entries {
        if *flag {
            flagged.push(option.clone());
        } else {
            plain.push(option.clone());
        }
    }
    (plain, flagged)
}

fn link_sections(sections: &[(&str, &[KeyringOption])]) -> Vec<KeyringOption> {
    let mut linked = Vec::new();
    for (label, items) in sections {
        if !items.is_empty() {
            linked.push(KeyringOption::header(label));
            linked.extend(items.iter().cloned());
        }
    }
    linked
}

/// Rebuild every list from scratch. Order inside each partition follows the
/// order of the input slices.
pub fn build_options(accounts: &[Flagged], addresses: &[Flagged]) -> OptionsSnapshot {
    let (account, testing) = partition(accounts);
    let (address, recent) = partition(addresses);

    let account = link_sections(&[(HEADER_ACCOUNTS, &account[..]), (HEADER_DEVELOPMENT, &testing[..])]);
    let address = link_sections(&[(HEADER_ADDRESSES, &address[..]), (HEADER_RECENT, &recent[..])]);
    let all = account.iter().chain(address.iter()).cloned().collect();

    OptionsSnapshot {
        account,
        testing,
        address,
        recent,
        all,
    }
}

pub type OptionsListener = Box<dyn FnMut(&OptionsSnapshot) + Send>;

#[derive(Default)]
struct AggregatorState {
    accounts: Option<Vec<Flagged>>,
    addresses: Option<Vec<Flagged>>,
    snapshot: OptionsSnapshot,
    listeners: Vec<OptionsListener>,
    recomputations: usize,
}

impl AggregatorState {
    // Waits until both stores have emitted at least once.
    fn recompute(&mut self) {
        let (Some(accounts), Some(addresses)) = (&self.accounts, &self.addresses) else {
            return;
        };
        self.snapshot = build_options(accounts, addresses);
        self.recomputations += 1;
        for listener in self.listeners.iter_mut() {
            listener(&self.snapshot);
        }
    }
}

fn lock(state: &Mutex<AggregatorState>) -> MutexGuard<'_, AggregatorState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
pub struct OptionsAggregator {
    state: Arc<Mutex<AggregatorState>>,
    attached: bool,
}

impl OptionsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to both stores. A second call is rejected with
    /// `DoubleInitialization` and leaves the existing subscription alone.
    pub fn attach(
        &mut self,
        accounts: &mut ObservableStore<PairJson>,
        addresses: &mut ObservableStore<AddressJson>,
    ) -> Result<()> {
        if self.attached {
            return Err(KeyringError::DoubleInitialization);
        }
        self.attached = true;

        let state = Arc::clone(&self.state);
        accounts.subscribe(Box::new(move |map: &EntryMap<PairJson>| {
            let mut state = lock(&state);
            state.accounts = Some(flagged(map, Meta::is_testing));
            state.recompute();
        }));

        let state = Arc::clone(&self.state);
        addresses.subscribe(Box::new(move |map: &EntryMap<AddressJson>| {
            let mut state = lock(&state);
            state.addresses = Some(flagged(map, Meta::is_recent));
            state.recompute();
        }));

        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn snapshot(&self) -> OptionsSnapshot {
        lock(&self.state).snapshot.clone()
    }

    /// Number of times the snapshot has been rebuilt.
    pub fn recomputations(&self) -> usize {
        lock(&self.state).recomputations
    }

    /// Observe every rebuilt snapshot. Listeners run while the aggregator's
    /// state is locked and must not call back into it.
    pub fn subscribe(&self, mut listener: OptionsListener) {
        let mut state = lock(&self.state);
        if self.attached {
            listener(&state.snapshot);
        }
        state.listeners.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt(name: &str) -> KeyringOption {
        KeyringOption::item(name, &Meta::default())
    }

    #[test]
    fn test_sections_and_all() {
        let accounts = vec![(opt("A"), false), (opt("B"), true)];
        let addresses = vec![(opt("C"), false), (opt("D"), true)];
        let snap = build_options(&accounts, &addresses);

        assert_eq!(
            snap.account,
            vec![
                KeyringOption::header(HEADER_ACCOUNTS),
                opt("A"),
                KeyringOption::header(HEADER_DEVELOPMENT),
                opt("B"),
            ]
        );
        assert_eq!(snap.testing, vec![opt("B")]);
        assert_eq!(
            snap.address,
            vec![
                KeyringOption::header(HEADER_ADDRESSES),
                opt("C"),
                KeyringOption::header(HEADER_RECENT),
                opt("D"),
            ]
        );
        assert_eq!(snap.recent, vec![opt("D")]);
        assert_eq!(snap.all.len(), 8);
        assert_eq!(snap.all[..4], snap.account[..]);
        assert_eq!(snap.all[4..], snap.address[..]);
    }

    #[test]
    fn test_empty_sections_have_no_header() {
        let snap = build_options(&[(opt("B"), true)], &[]);
        assert_eq!(snap.account, vec![KeyringOption::header(HEADER_DEVELOPMENT), opt("B")]);
        assert!(snap.address.is_empty());
        assert_eq!(build_options(&[], &[]), OptionsSnapshot::default());
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let accounts = vec![(opt("A"), false), (opt("B"), false), (opt("T"), true)];
        let addresses = vec![(opt("R"), true)];
        assert_eq!(build_options(&accounts, &addresses), build_options(&accounts, &addresses));
    }

    #[test]
    fn test_headers_are_disabled() {
        let header = KeyringOption::header(HEADER_RECENT);
        assert!(header.disabled);
        assert!(header.is_header());
        assert_eq!(header.id, "header-recent");
        assert!(!opt("A").is_header());
    }
}
