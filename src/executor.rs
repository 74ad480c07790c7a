//! Builds, gas-buffers and submits the bridge transactions.

use crate::abi::{decode_event, encode_transfer, Transfer};
use crate::bridger::{
    percent_increase_gas, Bridger, ConfirmedTx, DepositParams, DepositPlan, RegistrationParams,
    RegistrationPlan, TxPlan,
};
use crate::error::BridgeError;
use crate::types::{BridgeOperation, BridgeResult, ChainSide, Direction};
use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;

/// Percentages added on top of estimates.
#[derive(Debug, Clone, Copy)]
pub struct GasPolicy {
    pub parent_buffer_percent: u64,
    pub retryable_buffer_percent: u64,
    pub withdraw_buffer_percent: u64,
    pub transfer_buffer_percent: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            parent_buffer_percent: 5,
            retryable_buffer_percent: 30,
            withdraw_buffer_percent: 0,
            transfer_buffer_percent: 0,
        }
    }
}

/// Estimate gas for `plan`, add `buffer_percent`, submit and wait for inclusion.
pub async fn submit<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    side: ChainSide,
    mut plan: TxPlan,
    buffer_percent: u64,
) -> BridgeResult<ConfirmedTx> {
    let estimate = bridger.estimate_gas(side, signer.address(), &plan).await?;
    let gas_limit = percent_increase_gas(estimate, buffer_percent);
    plan.gas_limit = Some(gas_limit);
    tracing::info!(%side, to = %plan.to, estimate, gas_limit, "submitting transaction");

    let receipt = bridger.send(side, signer, plan).await?;
    if !receipt.success {
        return Err(BridgeError::TransactionReverted {
            tx_hash: receipt.hash,
        });
    }
    tracing::info!(%side, tx_hash = %receipt.hash, block = ?receipt.block_number, "transaction confirmed");
    Ok(receipt)
}

pub async fn submit_deposit<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    operation: &BridgeOperation,
    gas: GasPolicy,
) -> BridgeResult<(DepositPlan, ConfirmedTx)> {
    debug_assert_eq!(operation.direction, Direction::Deposit);
    let params = DepositParams {
        token: operation.token,
        from: operation.sender,
        destination: operation.beneficiary,
        amount: operation.amount,
        retryable_buffer_percent: gas.retryable_buffer_percent,
    };
    let plan = bridger.deposit_request(&params).await?;
    tracing::debug!(
        gateway = %plan.gateway,
        retryable_gas_limit = %plan.retryable_gas_limit,
        gas_price_bid = %plan.gas_price_bid,
        max_submission_cost = %plan.max_submission_cost,
        "deposit request built"
    );
    let receipt = submit(
        bridger,
        signer,
        ChainSide::Parent,
        plan.tx.clone(),
        gas.parent_buffer_percent,
    )
    .await?;
    Ok((plan, receipt))
}

/// Register a custom token pair from the parent token contract.
pub async fn submit_registration<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    parent_token: Address,
    child_token: Address,
    gas: GasPolicy,
) -> BridgeResult<(RegistrationPlan, ConfirmedTx)> {
    let params = RegistrationParams {
        parent_token,
        child_token,
        from: signer.address(),
        retryable_buffer_percent: gas.retryable_buffer_percent,
    };
    let plan = bridger.registration_request(&params).await?;
    tracing::debug!(
        gateway_gas_limit = %plan.gateway.gas_limit,
        router_gas_limit = %plan.router.gas_limit,
        gas_price_bid = %plan.gas_price_bid,
        value = %plan.tx.value,
        "registration request built"
    );
    let receipt = submit(
        bridger,
        signer,
        ChainSide::Parent,
        plan.tx.clone(),
        gas.parent_buffer_percent,
    )
    .await?;
    Ok((plan, receipt))
}

/// `parent_token` identifies the token to the child gateway router.
pub async fn submit_withdrawal<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    operation: &BridgeOperation,
    parent_token: Address,
    gas: GasPolicy,
) -> BridgeResult<ConfirmedTx> {
    let plan = bridger
        .withdrawal_request(parent_token, operation.beneficiary, operation.amount)
        .await?;
    submit(
        bridger,
        signer,
        ChainSide::Child,
        plan,
        gas.withdraw_buffer_percent,
    )
    .await
}

pub async fn submit_transfer<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    operation: &BridgeOperation,
    gas: GasPolicy,
) -> BridgeResult<ConfirmedTx> {
    let plan = TxPlan::call(
        operation.token,
        encode_transfer(operation.beneficiary, operation.amount),
    );
    let receipt = submit(
        bridger,
        signer,
        ChainSide::Child,
        plan,
        gas.transfer_buffer_percent,
    )
    .await?;
    let transferred = receipt
        .logs
        .iter()
        .filter(|log| log.address == operation.token)
        .filter_map(|log| decode_event::<Transfer>(&log.data))
        .any(|event| event.to == operation.beneficiary && event.value == operation.amount);
    if !transferred {
        return Err(BridgeError::EventMissing {
            tx_hash: receipt.hash,
            event: "Transfer",
        });
    }
    Ok(receipt)
}
