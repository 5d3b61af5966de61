//! Canonical string form of an Ed25519 public key.
//!
//! Encoded layout (before base58): `prefix(1) | public_key(32) | checksum(2)`.
//! The checksum is the first two bytes of a double SHA-256 over a fixed context
//! string, the prefix and the key. Addresses written by older releases used the
//! raw key as `0x`-prefixed hex; [`Address::decode`] still accepts that form.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{KeyringError, Result};

pub const PUBLIC_KEY_LENGTH: usize = 32;
const CHECKSUM_LENGTH: usize = 2;
const ENCODED_LENGTH: usize = 1 + PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH;
const CHECKSUM_CONTEXT: &[u8] = b"KEYRING-ADDR";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

fn checksum(prefix: u8, public_key: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let first = Sha256::new()
        .chain_update(CHECKSUM_CONTEXT)
        .chain_update([prefix])
        .chain_update(public_key)
        .finalize();
    let second = Sha256::digest(first);
    [second[0], second[1]]
}

impl Address {
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LENGTH], prefix: u8) -> Self {
        let mut raw = Vec::with_capacity(ENCODED_LENGTH);
        raw.push(prefix);
        raw.extend_from_slice(public_key);
        raw.extend_from_slice(&checksum(prefix, public_key));
        Address(bs58::encode(raw).into_string())
    }

    /// Decode either the canonical form or the legacy hex form into the public key.
    pub fn decode(s: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
        if is_legacy_hex(s) {
            return decode_hex_key(s);
        }

        let raw = bs58::decode(s)
            .into_vec()
            .map_err(|e| KeyringError::InvalidAddress(format!("{}: {}", s, e)))?;
        if raw.len() != ENCODED_LENGTH {
            return Err(KeyringError::InvalidAddress(format!(
                "{}: expected {} decoded bytes, got {}",
                s,
                ENCODED_LENGTH,
                raw.len()
            )));
        }

        let prefix = raw[0];
        let (body, sum) = raw[1..].split_at(PUBLIC_KEY_LENGTH);
        if checksum(prefix, body).as_slice() != sum {
            return Err(KeyringError::InvalidAddress(format!("{}: checksum mismatch", s)));
        }

        let mut key = [0u8; PUBLIC_KEY_LENGTH];
        key.copy_from_slice(body);
        Ok(key)
    }

    /// Parse and re-encode under `prefix`, converting legacy hex input.
    pub fn normalize(s: &str, prefix: u8) -> Result<Self> {
        let key = Self::decode(s)?;
        Ok(Self::from_public_key(&key, prefix))
    }

    /// Network prefix of a canonical address. `None` for legacy hex.
    pub fn prefix_of(s: &str) -> Option<u8> {
        if is_legacy_hex(s) {
            return None;
        }
        Self::decode(s).ok()?;
        bs58::decode(s).into_vec().ok().and_then(|raw| raw.first().copied())
    }

    pub fn public_key(&self) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
        Self::decode(&self.0)
    }

    pub fn is_valid(&self) -> bool {
        !is_legacy_hex(&self.0) && Self::decode(&self.0).is_ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a string without validation. Used for entries read back from storage.
    pub(crate) fn from_raw(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

pub fn is_legacy_hex(s: &str) -> bool {
    s.starts_with("0x") || s.starts_with("0X")
}

fn decode_hex_key(s: &str) -> Result<[u8; PUBLIC_KEY_LENGTH]> {
    let bytes = hex::decode(&s[2..]).map_err(|e| KeyringError::InvalidAddress(format!("{}: {}", s, e)))?;
    bytes
        .try_into()
        .map_err(|_| KeyringError::InvalidAddress(format!("{}: expected {} byte key", s, PUBLIC_KEY_LENGTH)))
}

/// Legacy storage form of a public key.
pub fn to_legacy_hex(public_key: &[u8; PUBLIC_KEY_LENGTH]) -> String {
    format!("0x{}", hex::encode(public_key))
}
