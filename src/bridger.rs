//! The bridging capability the orchestration is written against.
//!
//! Everything that touches a chain goes through [`Bridger`]: token reads,
//! transaction submission, gateway request construction and message status.
//! [`crate::arbitrum::ArbitrumBridger`] implements it over JSON-RPC; tests
//! substitute a recording mock.

use crate::abi::{
    decode_decimals, decode_u256, encode_allowance, encode_balance_of, encode_decimals,
    RetryableFees,
};
use crate::tracker::{
    ChildToParentMessage, ChildToParentStatus, ParentToChildMessage, ParentToChildStatus,
};
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{Address, Bytes, Log, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

/// An unsigned transaction ready to be estimated or submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxPlan {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: Option<u64>,
}

impl TxPlan {
    pub fn call(to: Address, data: Bytes) -> Self {
        Self {
            to,
            data,
            value: U256::ZERO,
            gas_limit: None,
        }
    }
}

/// A mined transaction, reduced to what the flows inspect.
#[derive(Debug, Clone)]
pub struct ConfirmedTx {
    pub hash: B256,
    pub from: Address,
    pub block_number: Option<u64>,
    pub success: bool,
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone)]
pub struct DepositParams {
    pub token: Address,
    pub from: Address,
    pub destination: Address,
    pub amount: U256,
    pub retryable_buffer_percent: u64,
}

/// Parent-chain deposit transaction plus the retryable parameters it pays for.
#[derive(Debug, Clone)]
pub struct DepositPlan {
    pub gateway: Address,
    pub child_gateway: Address,
    pub inbox: Address,
    pub retryable_gas_limit: U256,
    pub gas_price_bid: U256,
    pub max_submission_cost: U256,
    pub tx: TxPlan,
}

#[derive(Debug, Clone)]
pub struct RegistrationParams {
    pub parent_token: Address,
    pub child_token: Address,
    pub from: Address,
    pub retryable_buffer_percent: u64,
}

/// Parent-token call registering a custom token pair, and the two retryables
/// it pays for: one to the child custom gateway, one to the child router.
#[derive(Debug, Clone)]
pub struct RegistrationPlan {
    pub child_gateway: Address,
    pub child_router: Address,
    pub inbox: Address,
    pub gateway: RetryableFees,
    pub router: RetryableFees,
    pub gas_price_bid: U256,
    pub tx: TxPlan,
}

#[async_trait]
pub trait Bridger: Send + Sync {
    async fn call(&self, side: ChainSide, to: Address, data: Bytes) -> BridgeResult<Bytes>;

    async fn estimate_gas(&self, side: ChainSide, from: Address, plan: &TxPlan)
        -> BridgeResult<u64>;

    /// Sign, submit and wait for one confirmation.
    async fn send(
        &self,
        side: ChainSide,
        signer: &PrivateKeySigner,
        plan: TxPlan,
    ) -> BridgeResult<ConfirmedTx>;

    async fn receipt(&self, side: ChainSide, tx_hash: B256) -> BridgeResult<Option<ConfirmedTx>>;

    async fn block_number(&self, side: ChainSide) -> BridgeResult<u64>;

    /// Gateway on the parent chain that escrows `token`.
    async fn parent_gateway(&self, token: Address) -> BridgeResult<Address>;

    /// Child-chain address of the token bridged from `parent_token`.
    async fn child_token(&self, parent_token: Address) -> BridgeResult<Address>;

    async fn deposit_request(&self, params: &DepositParams) -> BridgeResult<DepositPlan>;

    async fn registration_request(
        &self,
        params: &RegistrationParams,
    ) -> BridgeResult<RegistrationPlan>;

    async fn withdrawal_request(
        &self,
        parent_token: Address,
        destination: Address,
        amount: U256,
    ) -> BridgeResult<TxPlan>;

    /// Whether the child-chain effect a message was sent for has happened.
    async fn redemption_status(
        &self,
        message: &ParentToChildMessage,
    ) -> BridgeResult<ParentToChildStatus>;

    async fn withdrawal_status(
        &self,
        message: &ChildToParentMessage,
    ) -> BridgeResult<ChildToParentStatus>;

    /// Execute a confirmed outgoing message on the parent chain's outbox.
    async fn execute(
        &self,
        signer: &PrivateKeySigner,
        message: &ChildToParentMessage,
    ) -> BridgeResult<ConfirmedTx>;

    async fn decimals(&self, side: ChainSide, token: Address) -> BridgeResult<u8> {
        let data = self.call(side, token, encode_decimals()).await?;
        decode_decimals(&data)
    }

    async fn balance_of(
        &self,
        side: ChainSide,
        token: Address,
        account: Address,
    ) -> BridgeResult<U256> {
        let data = self.call(side, token, encode_balance_of(account)).await?;
        decode_u256(&data)
    }

    async fn allowance(
        &self,
        side: ChainSide,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> BridgeResult<U256> {
        let data = self.call(side, token, encode_allowance(owner, spender)).await?;
        decode_u256(&data)
    }
}

/// `value + value * percent / 100`.
pub fn percent_increase(value: U256, percent: u64) -> U256 {
    value + value * U256::from(percent) / U256::from(100u64)
}

pub fn percent_increase_gas(value: u64, percent: u64) -> u64 {
    let bumped = percent_increase(U256::from(value), percent);
    u64::try_from(bumped).unwrap_or(u64::MAX)
}
