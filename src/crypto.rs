use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use bip39::{Language, Mnemonic};
use ed25519_dalek::SigningKey;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{KeyringError, Result};

/// Ed25519 secret seed length
pub const SEED_LENGTH: usize = 32;

const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const ITERATIONS_LENGTH: usize = 4;
const SEALED_HEADER_LENGTH: usize = 1 + ITERATIONS_LENGTH + SALT_LENGTH + NONCE_LENGTH;

// Leading byte of every encoded secret.
const TAG_PLAIN: u8 = 0x00;
const TAG_SEALED: u8 = 0x01;

/// Derive a signing key from a raw 32 byte seed
pub fn keypair_from_seed(seed: &[u8]) -> Result<SigningKey> {
    let seed: &[u8; SEED_LENGTH] = seed.try_into().map_err(|_| KeyringError::InvalidSeedLength {
        expected: SEED_LENGTH,
        actual: seed.len(),
    })?;
    Ok(SigningKey::from_bytes(seed))
}

/// Restore a signing key from a BIP39 phrase. The first 32 bytes of the
/// BIP39 seed (empty passphrase) become the Ed25519 seed.
pub fn keypair_from_mnemonic(phrase: &str) -> Result<SigningKey> {
    let mnemonic = Mnemonic::parse_in_normalized(Language::English, phrase)
        .map_err(|e| KeyringError::InvalidMnemonic(e.to_string()))?;
    let seed = Zeroizing::new(mnemonic.to_seed(""));
    keypair_from_seed(&seed[..SEED_LENGTH])
}

/// Generate a fresh 12 or 24 word mnemonic
pub fn generate_mnemonic(words: usize) -> Result<String> {
    let mut entropy = Zeroizing::new(match words {
        12 => vec![0u8; 16],
        24 => vec![0u8; 32],
        n => {
            return Err(KeyringError::InvalidMnemonic(format!(
                "unsupported word count {}, expected 12 or 24",
                n
            )))
        }
    });
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy(&entropy).map_err(|e| KeyringError::InvalidMnemonic(e.to_string()))?;
    Ok(mnemonic.to_string())
}

fn derive_encryption_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; 32]> {
    let mut key = Zeroizing::new([0u8; 32]); // AES-256
    pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// Encode a secret seed, sealing it with AES-256-GCM when a password is given.
///
/// Sealed layout: `tag | iterations (u32 le) | salt | nonce | ciphertext`.
pub fn encode_secret(secret: &[u8; SEED_LENGTH], password: Option<&str>, iterations: u32) -> Result<Vec<u8>> {
    let Some(password) = password else {
        let mut blob = Vec::with_capacity(1 + SEED_LENGTH);
        blob.push(TAG_PLAIN);
        blob.extend_from_slice(secret);
        return Ok(blob);
    };

    let mut salt = [0u8; SALT_LENGTH];
    OsRng.fill_bytes(&mut salt);
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let key = derive_encryption_key(password, &salt, iterations);
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| KeyringError::Serialization(format!("cipher init: {:?}", e)))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), &secret[..])
        .map_err(|e| KeyringError::Serialization(format!("Encryption failure: {:?}", e)))?;

    let mut blob = Vec::with_capacity(SEALED_HEADER_LENGTH + ciphertext.len());
    blob.push(TAG_SEALED);
    blob.extend_from_slice(&iterations.to_le_bytes());
    blob.extend_from_slice(&salt);
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

/// Recover the secret seed from [`encode_secret`] output.
pub fn decode_secret(encoded: &[u8], password: Option<&str>) -> Result<Zeroizing<[u8; SEED_LENGTH]>> {
    match encoded.first() {
        Some(&TAG_PLAIN) => {
            let body = <&[u8; SEED_LENGTH]>::try_from(&encoded[1..])
                .map_err(|_| KeyringError::MalformedExport("plain secret has wrong length".to_string()))?;
            Ok(Zeroizing::new(*body))
        }
        Some(&TAG_SEALED) => {
            if encoded.len() <= SEALED_HEADER_LENGTH {
                return Err(KeyringError::MalformedExport("sealed secret is truncated".to_string()));
            }
            let password = password.ok_or(KeyringError::WrongPassword)?;

            let mut iterations = [0u8; ITERATIONS_LENGTH];
            iterations.copy_from_slice(&encoded[1..1 + ITERATIONS_LENGTH]);
            let iterations = u32::from_le_bytes(iterations);
            if iterations == 0 {
                return Err(KeyringError::MalformedExport("zero kdf iterations".to_string()));
            }
            let salt_start = 1 + ITERATIONS_LENGTH;
            let nonce_start = salt_start + SALT_LENGTH;
            let salt = &encoded[salt_start..nonce_start];
            let nonce = Nonce::from_slice(&encoded[nonce_start..SEALED_HEADER_LENGTH]);
            let ciphertext = &encoded[SEALED_HEADER_LENGTH..];

            let key = derive_encryption_key(password, salt, iterations);
            let cipher = Aes256Gcm::new_from_slice(&key[..])
                .map_err(|e| KeyringError::Serialization(format!("cipher init: {:?}", e)))?;
            let plaintext = Zeroizing::new(
                cipher
                    .decrypt(nonce, ciphertext)
                    .map_err(|_| KeyringError::WrongPassword)?,
            );

            let body = <&[u8; SEED_LENGTH]>::try_from(plaintext.as_slice())
                .map_err(|_| KeyringError::MalformedExport("decrypted secret has wrong length".to_string()))?;
            Ok(Zeroizing::new(*body))
        }
        Some(tag) => Err(KeyringError::MalformedExport(format!("unknown encoding tag {:#04x}", tag))),
        None => Err(KeyringError::MalformedExport("empty encoded secret".to_string())),
    }
}

/// Structural check of an encoded secret, without decrypting it.
pub fn check_encoded(encoded: &[u8]) -> Result<()> {
    match encoded.first() {
        Some(&TAG_PLAIN) if encoded.len() == 1 + SEED_LENGTH => Ok(()),
        Some(&TAG_SEALED) if encoded.len() > SEALED_HEADER_LENGTH => Ok(()),
        Some(&TAG_PLAIN) | Some(&TAG_SEALED) => {
            Err(KeyringError::MalformedExport(format!("encoded secret has bad length {}", encoded.len())))
        }
        Some(tag) => Err(KeyringError::MalformedExport(format!("unknown encoding tag {:#04x}", tag))),
        None => Err(KeyringError::MalformedExport("empty encoded secret".to_string())),
    }
}

pub fn is_sealed(encoded: &[u8]) -> bool {
    encoded.first() == Some(&TAG_SEALED)
}
