//! A single Ed25519 keypair with its sealed export form and metadata.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroizing;

use crate::address::{Address, PUBLIC_KEY_LENGTH};
use crate::crypto;
use crate::error::{KeyringError, Result};
use crate::meta::Meta;

/// Persisted and exported form of a pair. `encoded` is hex.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PairJson {
    pub address: String,
    pub encoded: String,
    #[serde(default)]
    pub meta: Meta,
}

pub struct Pair {
    address: Address,
    public_key: [u8; PUBLIC_KEY_LENGTH],
    // Present only while unlocked. SigningKey zeroizes itself on drop.
    secret: Option<SigningKey>,
    encoded: Vec<u8>,
    meta: Meta,
    kdf_iterations: u32,
}

impl fmt::Debug for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pair")
            .field("address", &self.address)
            .field("locked", &self.is_locked())
            .field("meta", &self.meta)
            .finish()
    }
}

impl Pair {
    /// Wrap a freshly derived key. The pair starts unlocked with an
    /// unencrypted encoding until it is exported with a password.
    pub fn from_signing_key(key: SigningKey, meta: Meta, prefix: u8, kdf_iterations: u32) -> Result<Self> {
        let public_key = key.verifying_key().to_bytes();
        let seed = Zeroizing::new(key.to_bytes());
        let encoded = crypto::encode_secret(&seed, None, kdf_iterations)?;
        Ok(Self {
            address: Address::from_public_key(&public_key, prefix),
            public_key,
            secret: Some(key),
            encoded,
            meta,
            kdf_iterations,
        })
    }

    /// Rebuild a locked pair from its export. Nothing is decrypted here.
    pub fn from_json(json: &PairJson, prefix: u8, kdf_iterations: u32) -> Result<Self> {
        let public_key = Address::decode(&json.address)
            .map_err(|e| KeyringError::MalformedExport(format!("bad address: {}", e)))?;
        let encoded =
            hex::decode(&json.encoded).map_err(|e| KeyringError::MalformedExport(format!("bad encoded hex: {}", e)))?;
        crypto::check_encoded(&encoded)?;

        Ok(Self {
            address: Address::from_public_key(&public_key, prefix),
            public_key,
            secret: None,
            encoded,
            meta: json.meta.clone(),
            kdf_iterations,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.public_key
    }

    pub fn is_locked(&self) -> bool {
        self.secret.is_none()
    }

    /// Drop the decrypted key material.
    pub fn lock(&mut self) {
        self.secret = None;
    }

    /// Decrypt the stored encoding and unlock the pair.
    pub fn decode_pkcs8(&mut self, password: Option<&str>) -> Result<()> {
        let seed = crypto::decode_secret(&self.encoded, password)?;
        let key = SigningKey::from_bytes(&seed);
        if key.verifying_key().to_bytes() != self.public_key {
            return Err(KeyringError::MalformedExport(format!(
                "decoded key does not match {}",
                self.address
            )));
        }
        self.secret = Some(key);
        Ok(())
    }

    /// Export the pair. With a password the (unlocked) key is sealed again
    /// and the pair keeps the new encoding. Without one the current encoding
    /// is handed out unchanged, so a sealed pair is never downgraded.
    pub fn to_json(&mut self, password: Option<&str>) -> Result<PairJson> {
        if let Some(password) = password {
            let key = self
                .secret
                .as_ref()
                .ok_or_else(|| KeyringError::Locked(self.address.to_string()))?;
            let seed = Zeroizing::new(key.to_bytes());
            self.encoded = crypto::encode_secret(&seed, Some(password), self.kdf_iterations)?;
        }
        Ok(PairJson {
            address: self.address.to_string(),
            encoded: hex::encode(&self.encoded),
            meta: self.meta.clone(),
        })
    }

    /// Seal the unlocked key under `password` into a standalone export. The
    /// pair's own encoding is left as it is.
    pub fn export(&self, password: &str) -> Result<PairJson> {
        let key = self
            .secret
            .as_ref()
            .ok_or_else(|| KeyringError::Locked(self.address.to_string()))?;
        let seed = Zeroizing::new(key.to_bytes());
        let encoded = crypto::encode_secret(&seed, Some(password), self.kdf_iterations)?;
        Ok(PairJson {
            address: self.address.to_string(),
            encoded: hex::encode(encoded),
            meta: self.meta.clone(),
        })
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn set_meta(&mut self, meta: Meta) {
        self.meta = meta;
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn is_encrypted(&self) -> bool {
        crypto::is_sealed(&self.encoded)
    }

    pub fn sign(&self, message: &[u8]) -> Result<Signature> {
        let key = self
            .secret
            .as_ref()
            .ok_or_else(|| KeyringError::Locked(self.address.to_string()))?;
        Ok(key.sign(message))
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match VerifyingKey::from_bytes(&self.public_key) {
            Ok(key) => key.verify(message, signature).is_ok(),
            Err(_) => false,
        }
    }
}
