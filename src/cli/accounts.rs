use crate::error::{KeyringError, Result};
use crate::keyring::{Keyring, MAX_PASS_LEN};
use crate::meta::Meta;
use crate::pair::PairJson;
use zeroize::Zeroizing;

pub fn check_password(password: &str) -> Result<()> {
    if Keyring::is_pass_valid(password) {
        Ok(())
    } else {
        Err(KeyringError::InvalidPassword { max: MAX_PASS_LEN })
    }
}

/// Decode a hex seed. Length is checked when the key is derived.
pub fn parse_seed(seed: &str) -> Result<Zeroizing<Vec<u8>>> {
    hex::decode(seed.trim_start_matches("0x"))
        .map(Zeroizing::new)
        .map_err(|e| KeyringError::InvalidSeed(e.to_string()))
}

pub fn handle_create(
    keyring: &mut Keyring,
    mnemonic: Option<String>,
    seed: Option<String>,
    name: &str,
    password: Option<&str>,
) -> Result<()> {
    if let Some(password) = password {
        check_password(password)?;
    }
    let meta = Meta::named(name);

    let pair = match (mnemonic, seed) {
        (Some(phrase), _) => keyring.create_account_mnemonic(&phrase, password, meta)?,
        (None, Some(seed)) => keyring.create_account(&parse_seed(&seed)?, password, meta)?,
        (None, None) => {
            let phrase = Zeroizing::new(Keyring::generate_mnemonic(12)?);
            println!("[SECRET MNEMONIC] - Write this down securely and NEVER share it:");
            println!("---------------------------------------------------------------");
            println!("{}", phrase.as_str());
            println!("---------------------------------------------------------------");
            keyring.create_account_mnemonic(&phrase, password, meta)?
        }
    };

    println!("Account '{}' created.", name);
    println!("Address: {}", pair.address());
    if pair.is_encrypted() {
        println!("Key material sealed with password.");
    } else {
        println!("WARNING: key material stored without a password.");
    }
    Ok(())
}

pub fn handle_generate_mnemonic(words: usize) -> Result<()> {
    let phrase = Zeroizing::new(Keyring::generate_mnemonic(words)?);
    println!("{}", phrase.as_str());
    Ok(())
}

pub fn handle_list(keyring: &Keyring) {
    let options = keyring.options();
    if options.all.is_empty() {
        println!("Keyring is empty.");
        return;
    }
    for option in &options.all {
        match &option.value {
            None => println!("== {} ==", option.text),
            Some(address) => println!("  {}\t{}", option.text, address),
        }
    }
}

pub fn handle_backup(keyring: &mut Keyring, address: &str, password: &str, out: Option<&str>) -> Result<()> {
    check_password(password)?;
    let json = keyring.backup_account(address, password)?;
    let body = serde_json::to_string_pretty(&json)?;
    match out {
        Some(path) => {
            std::fs::write(path, body).map_err(|e| KeyringError::Storage(format!("{}: {}", path, e)))?;
            println!("Backup of {} written to '{}'", json.address, path);
        }
        None => println!("{}", body),
    }
    Ok(())
}

pub fn handle_restore(keyring: &mut Keyring, file: &str, password: &str) -> Result<()> {
    check_password(password)?;
    let data = std::fs::read_to_string(file).map_err(|e| KeyringError::Storage(format!("{}: {}", file, e)))?;
    let json: PairJson =
        serde_json::from_str(&data).map_err(|e| KeyringError::MalformedExport(e.to_string()))?;
    let pair = keyring.restore_account(&json, password)?;
    println!("Restored account {}", pair.address());
    Ok(())
}

pub fn handle_forget(keyring: &mut Keyring, address: &str) -> Result<()> {
    keyring.forget_account(address)?;
    println!("Account {} removed.", address);
    Ok(())
}

pub fn handle_change_password(keyring: &mut Keyring, address: &str, old: &str, new: &str) -> Result<()> {
    check_password(new)?;
    // unlocks with the old password, then reseals
    keyring.backup_account(address, old)?;
    keyring.encrypt_account(address, new)?;
    println!("Password changed for {}", address);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_password() {
        assert!(check_password("secret").is_ok());
        assert!(matches!(check_password(""), Err(KeyringError::InvalidPassword { max: MAX_PASS_LEN })));
    }

    #[test]
    fn test_parse_seed() {
        assert_eq!(parse_seed(&format!("0x{}", "ab".repeat(32))).unwrap().len(), 32);
        assert!(matches!(parse_seed("not hex"), Err(KeyringError::InvalidSeed(_))));

        // well-formed hex of the wrong size fails when the key is derived
        let mut kr = Keyring::new(
            std::sync::Arc::new(crate::storage::MemoryStore::new()),
            crate::config::KeyringConfig::default(),
        );
        let result = handle_create(&mut kr, None, Some("abcd".into()), "short", None);
        assert!(matches!(result, Err(KeyringError::InvalidSeedLength { expected: 32, actual: 2 })));
    }
}
