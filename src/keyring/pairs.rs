//! In-memory registry of live keypairs, kept in insertion order.

use tracing::debug;

use crate::address::{Address, PUBLIC_KEY_LENGTH};
use crate::crypto;
use crate::error::{KeyringError, Result};
use crate::meta::Meta;
use crate::pair::{Pair, PairJson};

#[derive(Debug)]
pub struct PairRegistry {
    pairs: Vec<Pair>,
    prefix: u8,
    kdf_iterations: u32,
}

impl PairRegistry {
    pub fn new(prefix: u8, kdf_iterations: u32) -> Self {
        Self {
            pairs: Vec::new(),
            prefix,
            kdf_iterations,
        }
    }

    pub fn add_from_seed(&mut self, seed: &[u8], meta: Meta) -> Result<&mut Pair> {
        let key = crypto::keypair_from_seed(seed)?;
        let pair = Pair::from_signing_key(key, meta, self.prefix, self.kdf_iterations)?;
        Ok(self.add_pair(pair))
    }

    pub fn add_from_mnemonic(&mut self, phrase: &str, meta: Meta) -> Result<&mut Pair> {
        let key = crypto::keypair_from_mnemonic(phrase)?;
        let pair = Pair::from_signing_key(key, meta, self.prefix, self.kdf_iterations)?;
        Ok(self.add_pair(pair))
    }

    /// Register a pair from its export. The pair stays locked.
    pub fn add_from_json(&mut self, json: &PairJson) -> Result<&mut Pair> {
        let pair = self.pair_from_json(json)?;
        Ok(self.add_pair(pair))
    }

    /// Build a pair from an export without registering it.
    pub fn pair_from_json(&self, json: &PairJson) -> Result<Pair> {
        Pair::from_json(json, self.prefix, self.kdf_iterations)
    }

    /// Insert a pair, replacing any existing pair for the same key in place.
    pub fn add_pair(&mut self, pair: Pair) -> &mut Pair {
        let index = match self.position(pair.public_key()) {
            Some(index) => {
                debug!("Replacing pair {}", pair.address());
                self.pairs[index] = pair;
                index
            }
            None => {
                debug!("Registering pair {}", pair.address());
                self.pairs.push(pair);
                self.pairs.len() - 1
            }
        };
        &mut self.pairs[index]
    }

    pub fn get_pair(&self, address: &str) -> Result<&Pair> {
        let index = self.lookup(address)?;
        Ok(&self.pairs[index])
    }

    pub fn get_pair_mut(&mut self, address: &str) -> Result<&mut Pair> {
        let index = self.lookup(address)?;
        Ok(&mut self.pairs[index])
    }

    pub fn get_pairs(&self) -> &[Pair] {
        &self.pairs
    }

    pub fn contains(&self, address: &str) -> bool {
        self.lookup(address).is_ok()
    }

    /// Removing an address that is not registered is a no-op.
    pub fn remove_pair(&mut self, address: &str) {
        if let Ok(index) = self.lookup(address) {
            let pair = self.pairs.remove(index);
            debug!("Removed pair {}", pair.address());
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn position(&self, public_key: &[u8; PUBLIC_KEY_LENGTH]) -> Option<usize> {
        self.pairs.iter().position(|p| p.public_key() == public_key)
    }

    fn lookup(&self, address: &str) -> Result<usize> {
        Address::decode(address)
            .ok()
            .and_then(|key| self.position(&key))
            .ok_or_else(|| KeyringError::UnknownAddress(address.to_string()))
    }
}
