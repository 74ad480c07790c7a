use crate::bridger::{ConfirmedTx, TxPlan};
use crate::error::BridgeError;
use crate::types::{parse_hex_u64, BridgeResult};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types::{
    BlockNumberOrTag, Filter, Log, TransactionInput, TransactionReceipt, TransactionRequest,
};
use alloy_signer_local::PrivateKeySigner;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use url::Url;

#[derive(Clone)]
pub struct RpcClient {
    pub url: Url,
    pub provider: DynProvider,
    pub http: Client,
}

impl RpcClient {
    pub fn new(url: &str) -> BridgeResult<Self> {
        let url: Url = url
            .parse()
            .map_err(|err| BridgeError::invalid(format!("invalid rpc url {url}: {err}")))?;
        let http = Client::new();
        let provider = ProviderBuilder::new().connect_http(url.clone()).erased();
        Ok(Self {
            url,
            provider,
            http,
        })
    }
}

/// Arbitrum-specific block fields, absent from the standard block type.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArbBlockFields {
    send_count: Option<String>,
    send_root: Option<String>,
}

pub fn request_from_plan(from: Option<Address>, plan: &TxPlan) -> TransactionRequest {
    TransactionRequest {
        from,
        to: Some(plan.to.into()),
        input: TransactionInput::new(plan.data.clone()),
        value: Some(plan.value),
        gas: plan.gas_limit,
        ..Default::default()
    }
}

pub fn confirmed_tx(receipt: &TransactionReceipt) -> ConfirmedTx {
    ConfirmedTx {
        hash: receipt.transaction_hash,
        from: receipt.from,
        block_number: receipt.block_number,
        success: receipt.status(),
        logs: receipt
            .inner
            .logs()
            .iter()
            .map(|log| log.inner.clone())
            .collect(),
    }
}

pub async fn get_transaction_receipt(
    client: &RpcClient,
    tx_hash: B256,
) -> BridgeResult<Option<TransactionReceipt>> {
    client
        .provider
        .get_transaction_receipt(tx_hash)
        .await
        .map_err(BridgeError::network)
}

pub async fn get_block_number(client: &RpcClient) -> BridgeResult<u64> {
    client
        .provider
        .get_block_number()
        .await
        .map_err(BridgeError::network)
}

pub async fn get_latest_base_fee(client: &RpcClient) -> BridgeResult<U256> {
    let block = client
        .provider
        .get_block_by_number(BlockNumberOrTag::Latest)
        .await
        .map_err(BridgeError::network)?
        .ok_or_else(|| BridgeError::network("latest block not found"))?;
    let base_fee = block
        .header
        .base_fee_per_gas
        .ok_or_else(|| BridgeError::network("latest block has no base fee"))?;
    Ok(U256::from(base_fee))
}

pub async fn get_gas_price(client: &RpcClient) -> BridgeResult<U256> {
    let price = client
        .provider
        .get_gas_price()
        .await
        .map_err(BridgeError::network)?;
    Ok(U256::from(price))
}

pub async fn get_logs(client: &RpcClient, filter: &Filter) -> BridgeResult<Vec<Log>> {
    client
        .provider
        .get_logs(filter)
        .await
        .map_err(BridgeError::network)
}

/// Number of outgoing messages recorded up to the given child block.
pub async fn get_send_count(client: &RpcClient, block_hash: B256) -> BridgeResult<u64> {
    let block = raw_rpc::<Option<ArbBlockFields>>(
        client,
        "eth_getBlockByHash",
        json!([format!("{block_hash:#x}"), false]),
    )
    .await?
    .ok_or_else(|| BridgeError::network(format!("child block {block_hash:#x} not found")))?;
    if let Some(root) = block.send_root.as_deref() {
        tracing::debug!(%block_hash, send_root = root, "child block send root");
    }
    let send_count = block
        .send_count
        .ok_or_else(|| BridgeError::network("child rpc did not return sendCount"))?;
    parse_hex_u64(&send_count)
}

pub async fn raw_rpc<T: for<'de> Deserialize<'de>>(
    client: &RpcClient,
    method: &str,
    params: serde_json::Value,
) -> BridgeResult<T> {
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    let response = client
        .http
        .post(client.url.clone())
        .json(&payload)
        .send()
        .await
        .map_err(|err| BridgeError::network(format!("rpc request failed: {err}")))?;
    let status = response.status();
    let value: serde_json::Value = response
        .json()
        .await
        .map_err(|err| BridgeError::network(format!("rpc decode failed: {err}")))?;
    if !status.is_success() {
        return Err(BridgeError::network(format!(
            "rpc error status {status}: {value}"
        )));
    }
    if let Some(error) = value.get("error") {
        return Err(BridgeError::network(format!("rpc error: {error}")));
    }
    serde_json::from_value(value.get("result").cloned().unwrap_or_default())
        .map_err(|err| BridgeError::network(format!("rpc missing result: {err}")))
}

pub async fn eth_call(client: &RpcClient, to: Address, data: Bytes) -> BridgeResult<Bytes> {
    let request = TransactionRequest {
        to: Some(to.into()),
        input: TransactionInput::new(data),
        ..Default::default()
    };
    client
        .provider
        .call(request)
        .await
        .map_err(BridgeError::network)
}

pub async fn estimate_gas(client: &RpcClient, request: TransactionRequest) -> BridgeResult<u64> {
    client
        .provider
        .estimate_gas(request)
        .await
        .map_err(BridgeError::network)
}

/// Sign with `signer`, submit, and wait for one confirmation.
pub async fn send_transaction(
    client: &RpcClient,
    signer: &PrivateKeySigner,
    request: TransactionRequest,
) -> BridgeResult<TransactionReceipt> {
    let provider = ProviderBuilder::new()
        .wallet(signer.clone())
        .connect_http(client.url.clone());
    let pending = provider
        .send_transaction(request)
        .await
        .map_err(BridgeError::network)?;
    let tx_hash = *pending.tx_hash();
    tracing::info!(%tx_hash, rpc = %client.url, "transaction submitted");
    pending.get_receipt().await.map_err(BridgeError::network)
}
