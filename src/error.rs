use thiserror::Error;

pub type Result<T> = std::result::Result<T, KeyringError>;

#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("Invalid seed length: expected {expected} bytes, got {actual}")]
    InvalidSeedLength { expected: usize, actual: usize },
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),
    #[error("Malformed export: {0}")]
    MalformedExport(String),
    #[error("Unable to decode using the supplied passphrase")]
    WrongPassword,
    #[error("Unable to retrieve keypair '{0}'")]
    UnknownAddress(String),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Password must be between 1 and {max} characters")]
    InvalidPassword { max: usize },
    #[error("Pair {0} is locked")]
    Locked(String),
    #[error("Keyring has already been constructed twice")]
    DuplicateSingleton,
    #[error("Options aggregator already initialized")]
    DoubleInitialization,
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for KeyringError {
    fn from(err: serde_json::Error) -> Self {
        KeyringError::Serialization(err.to_string())
    }
}

impl From<rocksdb::Error> for KeyringError {
    fn from(err: rocksdb::Error) -> Self {
        KeyringError::Storage(err.to_string())
    }
}
