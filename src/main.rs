use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use compass_keyring::cli::{accounts, addresses, Cli, Commands};
use compass_keyring::{Keyring, KeyringConfig, Result, RocksStore};

fn run(cli: Cli, config: KeyringConfig) -> Result<()> {
    if let Commands::GenerateMnemonic { words } = cli.command {
        return accounts::handle_generate_mnemonic(words);
    }

    let store = Arc::new(RocksStore::open(&config.db_path)?);
    let mut keyring = Keyring::new(store.clone(), config);
    let report = keyring.load_all()?;
    if !report.migration.migrated.is_empty() {
        info!("Migrated {} legacy records", report.migration.migrated.len());
    }

    match cli.command {
        Commands::Create {
            mnemonic,
            seed,
            name,
            password,
        } => accounts::handle_create(&mut keyring, mnemonic, seed, &name, password.as_deref())?,
        Commands::GenerateMnemonic { .. } => {}
        Commands::List => accounts::handle_list(&keyring),
        Commands::Backup { address, password, out } => {
            accounts::handle_backup(&mut keyring, &address, &password, out.as_deref())?
        }
        Commands::Restore { file, password } => accounts::handle_restore(&mut keyring, &file, &password)?,
        Commands::Forget { address } => accounts::handle_forget(&mut keyring, &address)?,
        Commands::Contact { address, name } => addresses::handle_contact(&mut keyring, &address, &name)?,
        Commands::Recent { address } => addresses::handle_recent(&mut keyring, &address)?,
        Commands::ForgetAddress { address } => addresses::handle_forget_address(&mut keyring, &address)?,
        Commands::ChangePassword { address, old, new } => {
            accounts::handle_change_password(&mut keyring, &address, &old, &new)?
        }
    }

    store.flush()
}

fn main() {
    let cli = Cli::parse();
    let config = KeyringConfig::load_or_default(&cli.config);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();

    if let Err(e) = run(cli, config) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
