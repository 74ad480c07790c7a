//! [`Bridger`] over the Arbitrum token bridge contracts.
//!
//! Gateway resolution, retryable pricing and outbox proofs are all answered
//! by the chain: the routers, `Inbox`, the `NodeInterface` virtual contract
//! and `Outbox`. This module only sequences the calls.

use crate::abi::{
    address_topic, decode_address, decode_bool, decode_bytes, decode_event, decode_outbox_proof,
    decode_u256, encode_calculate_child_token, encode_child_outbound_transfer,
    encode_construct_outbox_proof, encode_counterpart_gateway, encode_estimate_retryable_ticket,
    encode_execute_transaction, encode_get_gateway, encode_get_outbound_calldata, encode_inbox,
    encode_is_spent, encode_outbound_transfer_custom_refund, encode_register_token_from_parent,
    encode_register_token_on_child, encode_set_gateway, encode_submission_fee, DepositFinalized,
    GatewaySet, RetryableFees, SendRootUpdated, TokenSet, NODE_INTERFACE,
};
use crate::bridger::{
    percent_increase, Bridger, ConfirmedTx, DepositParams, DepositPlan, RegistrationParams,
    RegistrationPlan, TxPlan,
};
use crate::error::BridgeError;
use crate::rpc::{self, confirmed_tx, request_from_plan, RpcClient};
use crate::tracker::{
    ChildEffect, ChildToParentMessage, ChildToParentStatus, ParentToChildMessage,
    ParentToChildStatus,
};
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_rpc_types::{Filter, Log};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolEvent;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// Parent base fee is bumped by this much before pricing the submission.
const BASE_FEE_PERCENT_INCREASE: u64 = 200;
const SUBMISSION_FEE_PERCENT_INCREASE: u64 = 300;
const GAS_PRICE_PERCENT_INCREASE: u64 = 200;
/// Block span of a single `eth_getLogs` request.
const LOG_CHUNK_BLOCKS: u64 = 10_000;

/// Contract addresses of one parent/child pair.
#[derive(Debug, Clone)]
pub struct ArbitrumNetwork {
    pub parent_gateway_router: Address,
    pub child_gateway_router: Address,
    pub outbox: Address,
    /// Only needed to register custom tokens.
    pub parent_custom_gateway: Option<Address>,
    /// How far back to look for the latest confirmed send root.
    pub outbox_lookback_blocks: u64,
}

pub struct ArbitrumBridger {
    parent: RpcClient,
    child: RpcClient,
    network: ArbitrumNetwork,
    /// Child deposit txs already credited to a message by this process.
    credited: Mutex<HashSet<B256>>,
}

/// A retryable the parent chain will create, before it is priced.
struct RetryableCall {
    /// Parent contract that creates the ticket.
    sender: Address,
    /// Child contract the ticket calls.
    to: Address,
    data: Bytes,
}

impl ArbitrumBridger {
    pub fn new(parent_rpc: &str, child_rpc: &str, network: ArbitrumNetwork) -> BridgeResult<Self> {
        Ok(Self {
            parent: RpcClient::new(parent_rpc)?,
            child: RpcClient::new(child_rpc)?,
            network,
            credited: Mutex::new(HashSet::new()),
        })
    }

    fn client(&self, side: ChainSide) -> &RpcClient {
        match side {
            ChainSide::Parent => &self.parent,
            ChainSide::Child => &self.child,
        }
    }

    async fn call_address(&self, side: ChainSide, to: Address, data: Bytes) -> BridgeResult<Address> {
        let output = self.call(side, to, data).await?;
        decode_address(&output)
    }

    /// Parent base fee and child gas price, both bumped.
    async fn fee_inputs(&self) -> BridgeResult<(U256, U256)> {
        let base_fee = percent_increase(
            rpc::get_latest_base_fee(&self.parent).await?,
            BASE_FEE_PERCENT_INCREASE,
        );
        let gas_price_bid = percent_increase(
            rpc::get_gas_price(&self.child).await?,
            GAS_PRICE_PERCENT_INCREASE,
        );
        Ok((base_fee, gas_price_bid))
    }

    /// Submission cost from the inbox, gas limit from `NodeInterface`.
    async fn price_retryable(
        &self,
        inbox: Address,
        base_fee: U256,
        refund_to: Address,
        retryable: RetryableCall,
        buffer_percent: u64,
    ) -> BridgeResult<RetryableFees> {
        let fee = self
            .call(
                ChainSide::Parent,
                inbox,
                encode_submission_fee(retryable.data.len(), base_fee),
            )
            .await?;
        let max_submission_cost =
            percent_increase(decode_u256(&fee)?, SUBMISSION_FEE_PERCENT_INCREASE);

        // the node answers with the gas the child would burn redeeming the ticket
        let estimate = TxPlan::call(
            NODE_INTERFACE,
            encode_estimate_retryable_ticket(
                retryable.sender,
                max_submission_cost + U256::from(10u64).pow(U256::from(18u64)),
                retryable.to,
                refund_to,
                retryable.data,
            ),
        );
        let gas = rpc::estimate_gas(&self.child, request_from_plan(None, &estimate)).await?;
        Ok(RetryableFees {
            max_submission_cost,
            gas_limit: percent_increase(U256::from(gas), buffer_percent),
        })
    }

    /// Send count of the child block referenced by the outbox's newest root.
    async fn confirmed_send_count(&self) -> BridgeResult<Option<u64>> {
        let latest = rpc::get_block_number(&self.parent).await?;
        for (from, to) in lookback_windows(latest, self.network.outbox_lookback_blocks, LOG_CHUNK_BLOCKS)
        {
            let filter = Filter::new()
                .address(self.network.outbox)
                .event_signature(SendRootUpdated::SIGNATURE_HASH)
                .from_block(from)
                .to_block(to);
            let logs = rpc::get_logs(&self.parent, &filter).await?;
            let newest = logs
                .iter()
                .rev()
                .find_map(|log| decode_event::<SendRootUpdated>(&log.inner.data));
            if let Some(update) = newest {
                let send_count = rpc::get_send_count(&self.child, update.l2BlockHash).await?;
                tracing::debug!(
                    child_block = %update.l2BlockHash,
                    send_count,
                    "latest confirmed send root"
                );
                return Ok(Some(send_count));
            }
        }
        Ok(None)
    }

    /// First child tx carrying a log that matches `filter`.
    async fn first_child_event(&self, filter: Filter) -> BridgeResult<Option<B256>> {
        let logs = rpc::get_logs(&self.child, &filter).await?;
        Ok(logs.iter().find_map(|log| log.transaction_hash))
    }
}

#[async_trait]
impl Bridger for ArbitrumBridger {
    async fn call(&self, side: ChainSide, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        rpc::eth_call(self.client(side), to, data).await
    }

    async fn estimate_gas(
        &self,
        side: ChainSide,
        from: Address,
        plan: &TxPlan,
    ) -> BridgeResult<u64> {
        rpc::estimate_gas(self.client(side), request_from_plan(Some(from), plan)).await
    }

    async fn send(
        &self,
        side: ChainSide,
        signer: &PrivateKeySigner,
        plan: TxPlan,
    ) -> BridgeResult<ConfirmedTx> {
        let request = request_from_plan(Some(signer.address()), &plan);
        let receipt = rpc::send_transaction(self.client(side), signer, request).await?;
        Ok(confirmed_tx(&receipt))
    }

    async fn receipt(&self, side: ChainSide, tx_hash: B256) -> BridgeResult<Option<ConfirmedTx>> {
        let receipt = rpc::get_transaction_receipt(self.client(side), tx_hash).await?;
        Ok(receipt.as_ref().map(confirmed_tx))
    }

    async fn block_number(&self, side: ChainSide) -> BridgeResult<u64> {
        rpc::get_block_number(self.client(side)).await
    }

    async fn parent_gateway(&self, token: Address) -> BridgeResult<Address> {
        self.call_address(
            ChainSide::Parent,
            self.network.parent_gateway_router,
            encode_get_gateway(token),
        )
        .await
    }

    async fn child_token(&self, parent_token: Address) -> BridgeResult<Address> {
        let token = self
            .call_address(
                ChainSide::Child,
                self.network.child_gateway_router,
                encode_calculate_child_token(parent_token),
            )
            .await?;
        if token == Address::ZERO {
            return Err(BridgeError::invalid(format!(
                "no child token registered for {parent_token:#x}"
            )));
        }
        Ok(token)
    }

    async fn deposit_request(&self, params: &DepositParams) -> BridgeResult<DepositPlan> {
        let gateway = self.parent_gateway(params.token).await?;
        let child_gateway = self
            .call_address(ChainSide::Parent, gateway, encode_counterpart_gateway())
            .await?;
        let inbox = self
            .call_address(ChainSide::Parent, gateway, encode_inbox())
            .await?;
        let outbound = self
            .call(
                ChainSide::Parent,
                gateway,
                encode_get_outbound_calldata(
                    params.token,
                    params.from,
                    params.destination,
                    params.amount,
                ),
            )
            .await?;
        let outbound = decode_bytes(&outbound)?;

        let (base_fee, gas_price_bid) = self.fee_inputs().await?;
        let fees = self
            .price_retryable(
                inbox,
                base_fee,
                params.from,
                RetryableCall {
                    sender: gateway,
                    to: child_gateway,
                    data: outbound,
                },
                params.retryable_buffer_percent,
            )
            .await?;

        let data = encode_outbound_transfer_custom_refund(
            params.token,
            params.from,
            params.destination,
            params.amount,
            fees.gas_limit,
            gas_price_bid,
            fees.max_submission_cost,
        );
        Ok(DepositPlan {
            gateway,
            child_gateway,
            inbox,
            retryable_gas_limit: fees.gas_limit,
            gas_price_bid,
            max_submission_cost: fees.max_submission_cost,
            tx: TxPlan {
                to: self.network.parent_gateway_router,
                data,
                value: fees.value(gas_price_bid),
                gas_limit: None,
            },
        })
    }

    async fn registration_request(
        &self,
        params: &RegistrationParams,
    ) -> BridgeResult<RegistrationPlan> {
        let gateway = self.network.parent_custom_gateway.ok_or_else(|| {
            BridgeError::invalid("network.parent_custom_gateway is not configured")
        })?;
        let child_gateway = self
            .call_address(ChainSide::Parent, gateway, encode_counterpart_gateway())
            .await?;
        let inbox = self
            .call_address(ChainSide::Parent, gateway, encode_inbox())
            .await?;
        let child_router = self.network.child_gateway_router;

        let (base_fee, gas_price_bid) = self.fee_inputs().await?;
        let gateway_fees = self
            .price_retryable(
                inbox,
                base_fee,
                params.from,
                RetryableCall {
                    sender: gateway,
                    to: child_gateway,
                    data: encode_register_token_from_parent(params.parent_token, params.child_token),
                },
                params.retryable_buffer_percent,
            )
            .await?;
        let router_fees = self
            .price_retryable(
                inbox,
                base_fee,
                params.from,
                RetryableCall {
                    sender: self.network.parent_gateway_router,
                    to: child_router,
                    data: encode_set_gateway(params.parent_token, child_gateway),
                },
                params.retryable_buffer_percent,
            )
            .await?;

        let data = encode_register_token_on_child(
            params.child_token,
            gateway_fees,
            router_fees,
            gas_price_bid,
            params.from,
        );
        Ok(RegistrationPlan {
            child_gateway,
            child_router,
            inbox,
            gateway: gateway_fees,
            router: router_fees,
            gas_price_bid,
            tx: TxPlan {
                to: params.parent_token,
                data,
                value: gateway_fees.value(gas_price_bid) + router_fees.value(gas_price_bid),
                gas_limit: None,
            },
        })
    }

    async fn withdrawal_request(
        &self,
        parent_token: Address,
        destination: Address,
        amount: U256,
    ) -> BridgeResult<TxPlan> {
        Ok(TxPlan::call(
            self.network.child_gateway_router,
            encode_child_outbound_transfer(parent_token, destination, amount),
        ))
    }

    async fn redemption_status(
        &self,
        message: &ParentToChildMessage,
    ) -> BridgeResult<ParentToChildStatus> {
        let redeemed = match &message.effect {
            ChildEffect::Deposit(target) => {
                let filter = Filter::new()
                    .address(target.child_gateway)
                    .event_signature(DepositFinalized::SIGNATURE_HASH)
                    .topic1(address_topic(target.parent_token))
                    .topic2(address_topic(target.sender))
                    .topic3(address_topic(target.recipient))
                    .from_block(message.child_from_block);
                let logs = rpc::get_logs(&self.child, &filter).await?;
                let mut credited = self
                    .credited
                    .lock()
                    .map_err(|_| BridgeError::network("deposit ledger poisoned"))?;
                let found = matching_deposit(&logs, target.amount, &credited);
                if let Some(tx_hash) = found {
                    credited.insert(tx_hash);
                }
                found
            }
            ChildEffect::TokenSet {
                child_gateway,
                parent_token,
                child_token,
            } => {
                let filter = Filter::new()
                    .address(*child_gateway)
                    .event_signature(TokenSet::SIGNATURE_HASH)
                    .topic1(address_topic(*parent_token))
                    .topic2(address_topic(*child_token))
                    .from_block(message.child_from_block);
                self.first_child_event(filter).await?
            }
            ChildEffect::GatewaySet {
                child_router,
                parent_token,
                child_gateway,
            } => {
                let filter = Filter::new()
                    .address(*child_router)
                    .event_signature(GatewaySet::SIGNATURE_HASH)
                    .topic1(address_topic(*parent_token))
                    .topic2(address_topic(*child_gateway))
                    .from_block(message.child_from_block);
                self.first_child_event(filter).await?
            }
        };
        Ok(match redeemed {
            Some(child_tx_hash) => ParentToChildStatus::Redeemed { child_tx_hash },
            None => ParentToChildStatus::NotYetCreated,
        })
    }

    async fn withdrawal_status(
        &self,
        message: &ChildToParentMessage,
    ) -> BridgeResult<ChildToParentStatus> {
        let spent = self
            .call(
                ChainSide::Parent,
                self.network.outbox,
                encode_is_spent(message.position()),
            )
            .await?;
        if decode_bool(&spent)? {
            return Ok(ChildToParentStatus::Executed);
        }
        let send_count = self.confirmed_send_count().await?;
        Ok(outbox_status(false, send_count, message.position()))
    }

    async fn execute(
        &self,
        signer: &PrivateKeySigner,
        message: &ChildToParentMessage,
    ) -> BridgeResult<ConfirmedTx> {
        let send_count = self.confirmed_send_count().await?;
        let (size, leaf) = proof_range(send_count, message.position()).ok_or_else(|| {
            BridgeError::MessageNotReady {
                tx_hash: message.source_tx,
                status: ChildToParentStatus::Unconfirmed.to_string(),
            }
        })?;
        let proof = self
            .call(
                ChainSide::Child,
                NODE_INTERFACE,
                encode_construct_outbox_proof(size, leaf),
            )
            .await?;
        let proof = decode_outbox_proof(&proof)?;
        tracing::debug!(size, leaf, proof_len = proof.len(), "outbox proof constructed");
        let plan = TxPlan::call(
            self.network.outbox,
            encode_execute_transaction(proof, &message.event),
        );
        self.send(ChainSide::Parent, signer, plan).await
    }
}

/// Executed once spent; confirmed once the newest confirmed root covers the
/// message's leaf.
fn outbox_status(spent: bool, send_count: Option<u64>, position: U256) -> ChildToParentStatus {
    if spent {
        return ChildToParentStatus::Executed;
    }
    match send_count {
        Some(count) if position < U256::from(count) => ChildToParentStatus::Confirmed,
        _ => ChildToParentStatus::Unconfirmed,
    }
}

/// `(size, leaf)` to prove the message against, or `None` while the
/// confirmed tree does not contain it yet.
fn proof_range(send_count: Option<u64>, position: U256) -> Option<(u64, u64)> {
    let size = send_count?;
    let leaf = u64::try_from(position).ok()?;
    (leaf < size).then_some((size, leaf))
}

/// Inclusive block ranges, newest first, covering `lookback` blocks.
fn lookback_windows(latest: u64, lookback: u64, chunk: u64) -> Vec<(u64, u64)> {
    let floor = latest.saturating_sub(lookback);
    let chunk = chunk.max(1);
    let mut windows = Vec::new();
    let mut to = latest;
    loop {
        let from = to.saturating_sub(chunk - 1).max(floor);
        windows.push((from, to));
        if from <= floor {
            break;
        }
        to = from - 1;
    }
    windows
}

/// First finalized deposit of `amount` not already credited to an earlier
/// message. Deposits made by another process with the same sender,
/// recipient and amount are indistinguishable.
fn matching_deposit(logs: &[Log], amount: U256, credited: &HashSet<B256>) -> Option<B256> {
    logs.iter().find_map(|log| {
        let event = decode_event::<DepositFinalized>(&log.inner.data)?;
        let tx_hash = log.transaction_hash?;
        (event._amount == amount && !credited.contains(&tx_hash)).then_some(tx_hash)
    })
}
