//! Command-line interface definition for tokensend
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for connecting a wallet, editing the transfer form,
//! sending tokens and watching a pending transfer.

use clap::{Parser, Subcommand};

/// tokensend - ERC20 transfer client
///
/// Connect a wallet, fill in a token contract, recipient and amount, submit
/// the transfer and follow it until it is confirmed or fails.
#[derive(Parser, Debug, Clone)]
#[command(name = "tokensend")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the field store location
    #[arg(long, env = "TOKENSEND_STORAGE_PATH")]
    pub storage_path: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for tokensend
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show the saved form and the state of the last transfer
    Status,

    /// Connect the wallet and print the active account
    Connect,

    /// Edit the saved transfer form
    Set {
        /// Recipient address
        #[arg(short, long)]
        recipient: Option<String>,

        /// Token amount as a decimal string (e.g. 1.5)
        #[arg(short, long)]
        amount: Option<String>,

        /// ERC20 token contract address
        #[arg(long)]
        contract: Option<String>,
    },

    /// Send tokens using the saved form, with optional overrides
    Send {
        /// Recipient address
        #[arg(short, long)]
        recipient: Option<String>,

        /// Token amount as a decimal string (e.g. 1.5)
        #[arg(short, long)]
        amount: Option<String>,

        /// ERC20 token contract address
        #[arg(long)]
        contract: Option<String>,

        /// Return as soon as the transaction is accepted instead of waiting
        /// for a receipt
        #[arg(long)]
        no_wait: bool,
    },

    /// Resume watching the saved in-flight transaction
    Watch,

    /// Forget every saved field and the in-flight transaction
    Clear,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            storage_path: None,
            command: Commands::Status,
        }
    }
}
