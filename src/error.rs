//! Error types for tokensend
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for tokensend operations
///
/// Covers wallet connection, transfer submission, receipt lookup, field
/// validation, configuration loading and local storage failures.
#[derive(Error, Debug)]
pub enum TokenSendError {
    /// No wallet provider was injected into the connector
    #[error("No wallet detected")]
    NoWallet,

    /// The wallet declined the account request
    #[error("Wallet request rejected: {0}")]
    UserRejected(String),

    /// A signing operation was attempted without a connected wallet
    #[error("Wallet not connected")]
    NotConnected,

    /// The contract call could not be signed or broadcast
    #[error("Submission failed: {0}")]
    Submission(String),

    /// Looking up a receipt failed (polling continues)
    #[error("Receipt lookup failed: {0}")]
    ReceiptLookup(String),

    /// The token amount could not be converted to base units
    #[error("Invalid token amount: {0}")]
    InvalidAmount(String),

    /// An address field could not be parsed
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Field storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for tokensend operations
///
/// Uses `anyhow::Error` so callers can attach context while the typed
/// `TokenSendError` stays reachable through `downcast_ref`.
pub type Result<T> = anyhow::Result<T>;

/// Returns the `TokenSendError` carried by an `anyhow::Error`, if any.
pub fn kind(err: &anyhow::Error) -> Option<&TokenSendError> {
    err.downcast_ref::<TokenSendError>()
}
