pub mod address;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keyring;
pub mod meta;
pub mod pair;
pub mod storage;

pub use address::Address;
pub use config::KeyringConfig;
pub use error::{KeyringError, Result};
pub use keyring::{Keyring, KeyringAddress, KeyringSlot, LoadReport};
pub use meta::Meta;
pub use pair::{Pair, PairJson};
pub use storage::{KeyValueStore, MemoryStore, RocksStore};
