pub mod accounts;
pub mod addresses;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "compass-keyring")]
#[command(about = "Compass keyring: accounts, contacts and recent addresses", long_about = None)]
pub struct Cli {
    /// Path to the keyring config file
    #[arg(long, global = true, default_value = "keyring.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create an account from a mnemonic or raw seed (a new mnemonic is generated if neither is given)
    Create {
        #[arg(long, conflicts_with = "seed")]
        mnemonic: Option<String>,
        /// 32 byte seed, hex
        #[arg(long)]
        seed: Option<String>,
        #[arg(long)]
        name: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Print a fresh mnemonic without storing anything
    GenerateMnemonic {
        #[arg(long, default_value_t = 12)]
        words: usize,
    },
    /// List accounts, contacts and recent addresses
    List,
    /// Export an account as password-sealed JSON
    Backup {
        #[arg(long)]
        address: String,
        #[arg(long)]
        password: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        out: Option<String>,
    },
    /// Import an account from a JSON backup
    Restore {
        #[arg(long)]
        file: String,
        #[arg(long)]
        password: String,
    },
    /// Remove an account
    Forget {
        #[arg(long)]
        address: String,
    },
    /// Save or rename a contact
    Contact {
        #[arg(long)]
        address: String,
        #[arg(long)]
        name: String,
    },
    /// Record an address as recently used
    Recent {
        #[arg(long)]
        address: String,
    },
    /// Remove a contact or recent address
    ForgetAddress {
        #[arg(long)]
        address: String,
    },
    /// Re-seal an account under a new password
    ChangePassword {
        #[arg(long)]
        address: String,
        #[arg(long)]
        old: String,
        #[arg(long)]
        new: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_has_no_testing_flag() {
        // testing accounts are never reloaded by a later run
        let args = ["compass-keyring", "create", "--name", "a", "--testing"];
        assert!(Cli::try_parse_from(args).is_err());
        assert!(Cli::try_parse_from(["compass-keyring", "list", "--dev"]).is_err());

        let cli = Cli::try_parse_from(["compass-keyring", "create", "--name", "a", "--seed", "00"]).unwrap();
        assert!(matches!(cli.command, Commands::Create { seed: Some(_), .. }));
        assert!(matches!(Cli::try_parse_from(["compass-keyring", "list"]).unwrap().command, Commands::List));
    }
}
