//! Cross-chain message extraction and status tracking.
//!
//! Deposits create a parent-to-child message through the inbox; withdrawals
//! create a child-to-parent message through `ArbSys`. Only one message per
//! source transaction is followed; see [`first_message`].

use crate::abi::{decode_event, InboxMessageDelivered, L2ToL1Tx, ARB_SYS};
use crate::bridger::{Bridger, ConfirmedTx};
use crate::error::BridgeError;
use crate::types::BridgeResult;
use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// How long to keep polling the destination chain, and how often.
#[derive(Debug, Clone, Copy)]
pub struct PollPolicy {
    pub timeout: Duration,
    pub poll: Duration,
}

/// What a deposit is expected to produce on the child chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositTarget {
    pub parent_token: Address,
    pub child_gateway: Address,
    pub sender: Address,
    pub recipient: Address,
    pub amount: U256,
}

/// The child-chain state change a parent-to-child message was sent for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildEffect {
    /// The child gateway mints the deposit (`DepositFinalized`).
    Deposit(DepositTarget),
    /// The child custom gateway maps the token pair (`TokenSet`).
    TokenSet {
        child_gateway: Address,
        parent_token: Address,
        child_token: Address,
    },
    /// The child router routes the token to its gateway (`GatewaySet`).
    GatewaySet {
        child_router: Address,
        parent_token: Address,
        child_gateway: Address,
    },
}

impl ChildEffect {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Deposit(_) => "deposit",
            Self::TokenSet { .. } => "token_set",
            Self::GatewaySet { .. } => "gateway_set",
        }
    }
}

/// An `InboxMessageDelivered` found in a parent receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxMessage {
    pub message_number: U256,
    pub source_tx: B256,
}

impl InboxMessage {
    /// Attach the effect to look for, searched from `child_from_block`.
    pub fn expecting(self, effect: ChildEffect, child_from_block: u64) -> ParentToChildMessage {
        ParentToChildMessage {
            message_number: self.message_number,
            source_tx: self.source_tx,
            child_from_block,
            effect,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentToChildMessage {
    pub message_number: U256,
    pub source_tx: B256,
    /// Child block observed before the source transaction was submitted.
    pub child_from_block: u64,
    pub effect: ChildEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ParentToChildStatus {
    NotYetCreated,
    #[serde(rename_all = "camelCase")]
    Redeemed { child_tx_hash: B256 },
}

impl fmt::Display for ParentToChildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotYetCreated => f.write_str("NotYetCreated"),
            Self::Redeemed { .. } => f.write_str("Redeemed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildToParentMessage {
    pub source_tx: B256,
    pub event: L2ToL1Tx,
}

impl ChildToParentMessage {
    /// Leaf index of the message in the outbox merkle tree.
    pub fn position(&self) -> U256 {
        self.event.position
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChildToParentStatus {
    Unconfirmed,
    Confirmed,
    Executed,
}

impl ChildToParentStatus {
    pub fn is_ready(self) -> bool {
        matches!(self, Self::Confirmed | Self::Executed)
    }
}

impl fmt::Display for ChildToParentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unconfirmed => "Unconfirmed",
            Self::Confirmed => "Confirmed",
            Self::Executed => "Executed",
        };
        f.write_str(name)
    }
}

/// The message that gets tracked, plus how many the receipt held.
#[derive(Debug, Clone)]
pub struct FirstMessage<T> {
    pub message: T,
    pub count: usize,
}

pub fn parent_to_child_messages(receipt: &ConfirmedTx, inbox: Address) -> Vec<InboxMessage> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == inbox)
        .filter_map(|log| decode_event::<InboxMessageDelivered>(&log.data))
        .map(|event| InboxMessage {
            message_number: event.messageNum,
            source_tx: receipt.hash,
        })
        .collect()
}

pub fn child_to_parent_messages(receipt: &ConfirmedTx) -> Vec<ChildToParentMessage> {
    receipt
        .logs
        .iter()
        .filter(|log| log.address == ARB_SYS)
        .filter_map(|log| decode_event::<L2ToL1Tx>(&log.data))
        .map(|event| ChildToParentMessage {
            source_tx: receipt.hash,
            event,
        })
        .collect()
}

/// Pick the message to follow. Extra messages are logged and counted, never
/// silently dropped; an empty receipt is an error.
pub fn first_message<T>(messages: Vec<T>, tx_hash: B256) -> BridgeResult<FirstMessage<T>> {
    let count = messages.len();
    let message = messages
        .into_iter()
        .next()
        .ok_or(BridgeError::NoMessages { tx_hash })?;
    if count > 1 {
        tracing::warn!(
            %tx_hash,
            count,
            "transaction emitted several cross-chain messages; only the first is tracked"
        );
    }
    Ok(FirstMessage { message, count })
}

/// [`first_message`] for a transaction this process just mined. Gas is
/// already spent, so an empty receipt is a failed bridge call rather than a
/// bad lookup.
pub fn first_emitted<T>(messages: Vec<T>, tx_hash: B256) -> BridgeResult<FirstMessage<T>> {
    first_message(messages, tx_hash).map_err(|err| match err {
        BridgeError::NoMessages { tx_hash } => BridgeError::MessageNotEmitted { tx_hash },
        other => other,
    })
}

/// Poll the child chain until the message's effect lands, returning the
/// child tx hash.
pub async fn wait_for_redemption<B: Bridger + ?Sized>(
    bridger: &B,
    message: &ParentToChildMessage,
    policy: PollPolicy,
) -> BridgeResult<B256> {
    let start = tokio::time::Instant::now();
    loop {
        let status = bridger.redemption_status(message).await?;
        tracing::debug!(
            source_tx = %message.source_tx,
            message_number = %message.message_number,
            effect = message.effect.name(),
            %status,
            "parent to child message status"
        );
        if let ParentToChildStatus::Redeemed { child_tx_hash } = status {
            return Ok(child_tx_hash);
        }
        if start.elapsed() >= policy.timeout {
            return Err(BridgeError::MessageNotRedeemed {
                status: status.to_string(),
            });
        }
        tokio::time::sleep(policy.poll).await;
    }
}

pub async fn status<B: Bridger + ?Sized>(
    bridger: &B,
    message: &ChildToParentMessage,
) -> BridgeResult<ChildToParentStatus> {
    let status = bridger.withdrawal_status(message).await?;
    tracing::debug!(
        source_tx = %message.source_tx,
        position = %message.position(),
        %status,
        "child to parent message status"
    );
    Ok(status)
}

/// Poll until the message can be executed on the parent chain.
pub async fn wait_until_ready<B: Bridger + ?Sized>(
    bridger: &B,
    message: &ChildToParentMessage,
    policy: PollPolicy,
) -> BridgeResult<ChildToParentStatus> {
    let start = tokio::time::Instant::now();
    loop {
        let current = status(bridger, message).await?;
        if current.is_ready() {
            return Ok(current);
        }
        if start.elapsed() >= policy.timeout {
            return Err(BridgeError::MessageNotReady {
                tx_hash: message.source_tx,
                status: current.to_string(),
            });
        }
        tokio::time::sleep(policy.poll).await;
    }
}

pub async fn execute<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    message: &ChildToParentMessage,
) -> BridgeResult<ConfirmedTx> {
    let receipt = bridger.execute(signer, message).await?;
    if !receipt.success {
        return Err(BridgeError::TransactionReverted {
            tx_hash: receipt.hash,
        });
    }
    tracing::info!(
        source_tx = %message.source_tx,
        parent_tx = %receipt.hash,
        "outbox message executed"
    );
    Ok(receipt)
}
