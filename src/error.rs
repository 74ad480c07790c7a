use crate::resolver::format_units;
use crate::types::ChainSide;
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Closed set of failure classes exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientFunds,
    Network,
    ApprovalRequired,
    MessageNotReady,
    MessageFailed,
    InvalidInput,
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(
        "Insufficient Balance {} > {} ({side} balance of {account:#x})",
        display_amount(.requested, .decimals),
        display_amount(.available, .decimals)
    )]
    InsufficientBalance {
        side: ChainSide,
        token: Address,
        account: Address,
        requested: U256,
        available: U256,
        decimals: u8,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("Provide a transaction hash of a child transaction that sends a child to parent message")]
    MissingTxHash,
    #[error("Hmm, {0} doesn't look like a txn hash...")]
    InvalidTxHash(String),
    #[error("unknown operator {0}")]
    UnknownOperator(String),
    #[error("no signer available (set --operator, --private-key or {env})")]
    MissingSigner { env: String },
    #[error("allowance {allowance} of {token:#x} for spender {spender:#x} does not cover {required}; approval required")]
    ApprovalRequired {
        token: Address,
        spender: Address,
        allowance: U256,
        required: U256,
    },
    #[error("Transaction approve() was sent to chain with hash {tx_hash:#x} but no Approval event was found")]
    ApprovalLogMissing { tx_hash: B256 },
    #[error("transaction {tx_hash:#x} was sent but no {event} event was found")]
    EventMissing { tx_hash: B256, event: &'static str },
    #[error("transaction {tx_hash:#x} reverted")]
    TransactionReverted { tx_hash: B256 },
    #[error("transaction receipt not found for {0:#x}")]
    ReceiptNotFound(B256),
    #[error("no cross-chain message found in transaction {tx_hash:#x}")]
    NoMessages { tx_hash: B256 },
    #[error("transaction {tx_hash:#x} was mined but emitted no cross-chain message")]
    MessageNotEmitted { tx_hash: B256 },
    #[error("transaction {tx_hash:#x} emitted {found} cross-chain messages, expected {expected}")]
    UnexpectedMessageCount {
        tx_hash: B256,
        expected: usize,
        found: usize,
    },
    #[error("message from {tx_hash:#x} is not ready to execute (status {status})")]
    MessageNotReady { tx_hash: B256, status: String },
    #[error("Failed for child network retryable with status \"{status}\"")]
    MessageNotRedeemed { status: String },
    #[error("message from {tx_hash:#x} was already executed")]
    AlreadyExecuted { tx_hash: B256 },
    #[error("{0}")]
    Network(String),
}

fn display_amount(value: &U256, decimals: &u8) -> String {
    format_units(*value, u32::from(*decimals))
}

impl BridgeError {
    pub fn network(err: impl Display) -> Self {
        Self::Network(err.to_string())
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientBalance { .. } => ErrorKind::InsufficientFunds,
            Self::InvalidInput(_)
            | Self::MissingTxHash
            | Self::InvalidTxHash(_)
            | Self::UnknownOperator(_)
            | Self::MissingSigner { .. }
            | Self::NoMessages { .. } => ErrorKind::InvalidInput,
            Self::ApprovalRequired { .. } | Self::ApprovalLogMissing { .. } => {
                ErrorKind::ApprovalRequired
            }
            Self::MessageNotReady { .. } => ErrorKind::MessageNotReady,
            Self::MessageNotRedeemed { .. }
            | Self::MessageNotEmitted { .. }
            | Self::UnexpectedMessageCount { .. }
            | Self::AlreadyExecuted { .. }
            | Self::TransactionReverted { .. }
            | Self::EventMissing { .. } => ErrorKind::MessageFailed,
            Self::ReceiptNotFound(_) | Self::Network(_) => ErrorKind::Network,
        }
    }

    /// Whether retrying the same request later can succeed without changes.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Network | ErrorKind::MessageNotReady
        )
    }
}
