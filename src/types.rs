//! Shared value types for wallet, submitter and poller

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by the wallet for a submitted transaction.
///
/// Usually a `0x`-prefixed 32-byte hash, but nothing here relies on that;
/// the chain client decides how to interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    /// Wrap a raw identifier string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as stored and displayed
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<alloy::primitives::TxHash> for TransactionId {
    fn from(hash: alloy::primitives::TxHash) -> Self {
        Self(format!("{:#x}", hash))
    }
}

/// Status of the most recent transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    /// Submitted, no receipt yet
    Pending,
    /// Included with a success receipt
    Confirmed,
    /// Included with a failure receipt
    Failed,
    /// Submission failed or polling gave up
    Error,
}

impl TransactionStatus {
    /// True once no further transition is expected
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    /// Display label
    pub fn label(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "Pending",
            TransactionStatus::Confirmed => "Confirmed",
            TransactionStatus::Failed => "Failed",
            TransactionStatus::Error => "Error",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome recorded in a transaction receipt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Execution succeeded (receipt status 1)
    pub success: bool,
    /// Block the transaction was included in
    pub block_number: Option<u64>,
    /// Gas consumed by execution
    pub gas_used: u64,
}

/// Subset of a broadcast transaction needed for the time estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Gas limit the transaction was sent with
    pub gas_limit: u64,
}

/// A fully parsed `transfer(address,uint256)` call against a token contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    /// ERC20 token contract
    pub contract: Address,
    /// Recipient of the tokens
    pub to: Address,
    /// Amount in base units
    pub value: U256,
}
