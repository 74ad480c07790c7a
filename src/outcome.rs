//! Uniform results for the CLI and the HTTP surface.

use crate::approval::ApprovalOutcome;
use crate::error::{BridgeError, ErrorKind};
use crate::tracker::ChildToParentStatus;
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{Address, B256, U256};
use serde::Serialize;

/// `child_tx_hash` is the first matching `DepositFinalized` (same token,
/// sender, recipient and amount) not already credited by this process; an
/// identical deposit sent elsewhere in the same window can be picked instead.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositOutcome {
    pub parent_tx_hash: B256,
    pub child_tx_hash: B256,
    pub message_number: U256,
    pub message_count: usize,
    pub approval: ApprovalOutcome,
    pub amount: String,
    pub token: Address,
    pub destination: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawOutcome {
    pub child_tx_hash: B256,
    pub status: ChildToParentStatus,
    pub position: U256,
    pub message_count: usize,
    pub amount: String,
    pub token: Address,
    pub destination: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub tx_hash: B256,
    pub from: Address,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub tx_hash: B256,
    pub from: Address,
    pub to: Address,
    pub amount: String,
    pub token: Address,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredMessage {
    pub effect: &'static str,
    pub message_number: U256,
    pub child_tx_hash: B256,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
    pub parent_tx_hash: B256,
    pub parent_token: Address,
    pub child_token: Address,
    pub messages: Vec<RegisteredMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceOutcome {
    pub side: ChainSide,
    pub token: Address,
    pub account: Address,
    pub decimals: u8,
    pub balance: U256,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOutcome {
    pub tx_hash: B256,
    pub status: ChildToParentStatus,
    pub position: U256,
    pub message_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "operation", rename_all = "camelCase")]
pub enum Outcome {
    Deposit(DepositOutcome),
    Withdraw(WithdrawOutcome),
    Claim(ClaimOutcome),
    Transfer(TransferOutcome),
    Register(RegisterOutcome),
    Balance(BalanceOutcome),
    Status(StatusOutcome),
}

impl Outcome {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// One-line summary for terminal output.
    pub fn summary(&self) -> String {
        match self {
            Self::Deposit(out) => format!(
                "deposited {} of {:#x}: parent tx {:#x}, child tx {:#x}",
                out.amount, out.token, out.parent_tx_hash, out.child_tx_hash
            ),
            Self::Withdraw(out) => format!(
                "withdrawal of {} submitted in {:#x}; outbox message {} is {}",
                out.amount, out.child_tx_hash, out.position, out.status
            ),
            Self::Claim(out) => format!("claimed in {:#x} by {:#x}", out.tx_hash, out.from),
            Self::Transfer(out) => format!(
                "transferred {} to {:#x} in {:#x}",
                out.amount, out.to, out.tx_hash
            ),
            Self::Register(out) => format!(
                "registered {:#x} as {:#x} in {:#x} ({} child messages redeemed)",
                out.parent_token,
                out.child_token,
                out.parent_tx_hash,
                out.messages.len()
            ),
            Self::Balance(out) => format!(
                "{} ({} balance of {:#x})",
                out.formatted, out.side, out.account
            ),
            Self::Status(out) => format!(
                "message {} from {:#x}: {}",
                out.position, out.tx_hash, out.status
            ),
        }
    }
}

/// Error body returned over HTTP and printed with `--json`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&BridgeError> for ErrorBody {
    fn from(err: &BridgeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Collapse a result into `(ok, message)`.
pub fn to_tuple(result: &BridgeResult<Outcome>) -> (bool, String) {
    match result {
        Ok(outcome) => (true, outcome.to_json()),
        Err(err) => (false, err.to_string()),
    }
}
