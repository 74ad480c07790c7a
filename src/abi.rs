use crate::error::BridgeError;
use crate::types::BridgeResult;
use alloy_primitives::{address, Address, Bytes, LogData, B256, U256};
use alloy_sol_types::{SolCall, SolEvent, SolValue};

/// ArbSys precompile, emits `L2ToL1Tx` for every outgoing child message.
pub const ARB_SYS: Address = address!("0000000000000000000000000000000000000064");
/// NodeInterface virtual contract, only reachable through eth_call/eth_estimateGas.
pub const NODE_INTERFACE: Address = address!("00000000000000000000000000000000000000c8");

alloy_sol_types::sol! {
    function balanceOf(address account) view returns (uint256);
    function allowance(address owner, address spender) view returns (uint256);
    function approve(address spender, uint256 value) returns (bool);
    function transfer(address to, uint256 value) returns (bool);
    function decimals() view returns (uint8);

    event Approval(address indexed owner, address indexed spender, uint256 value);
    event Transfer(address indexed from, address indexed to, uint256 value);

    function getGateway(address _token) view returns (address);
    function outboundTransferCustomRefund(
        address _token,
        address _refundTo,
        address _to,
        uint256 _amount,
        uint256 _maxGas,
        uint256 _gasPriceBid,
        bytes _data
    ) payable returns (bytes);
    function getOutboundCalldata(
        address _token,
        address _from,
        address _to,
        uint256 _amount,
        bytes _data
    ) view returns (bytes);
    function counterpartGateway() view returns (address);
    function inbox() view returns (address);

    function calculateRetryableSubmissionFee(uint256 dataLength, uint256 baseFee) view returns (uint256);
    event InboxMessageDelivered(uint256 indexed messageNum, bytes data);

    function outboundTransfer(address _l1Token, address _to, uint256 _amount, bytes _data) payable returns (bytes);
    function calculateL2TokenAddress(address l1ERC20) view returns (address);
    event DepositFinalized(address indexed l1Token, address indexed _from, address indexed _to, uint256 _amount);

    #[derive(Debug, PartialEq, Eq)]
    event L2ToL1Tx(
        address caller,
        address indexed destination,
        uint256 indexed hash,
        uint256 indexed position,
        uint256 arbBlockNum,
        uint256 ethBlockNum,
        uint256 timestamp,
        uint256 callvalue,
        bytes data
    );

    function estimateRetryableTicket(
        address sender,
        uint256 deposit,
        address to,
        uint256 l2CallValue,
        address excessFeeRefundAddress,
        address callValueRefundAddress,
        bytes data
    );
    function constructOutboxProof(uint64 size, uint64 leaf) view returns (bytes32 send, bytes32 root, bytes32[] proof);

    function isSpent(uint256 index) view returns (bool);
    function executeTransaction(
        bytes32[] proof,
        uint256 index,
        address l2Sender,
        address to,
        uint256 l2Block,
        uint256 l1Block,
        uint256 l2Timestamp,
        uint256 value,
        bytes data
    );
    event SendRootUpdated(bytes32 indexed outputRoot, bytes32 indexed l2BlockHash);

    function registerTokenOnL2(
        address l2CustomTokenAddress,
        uint256 maxSubmissionCostForCustomGateway,
        uint256 maxSubmissionCostForRouter,
        uint256 maxGasForCustomGateway,
        uint256 maxGasForRouter,
        uint256 gasPriceBid,
        uint256 valueForGateway,
        uint256 valueForRouter,
        address creditBackAddress
    ) payable;
    function registerTokenFromL1(address[] l1Address, address[] l2Address);
    function setGateway(address[] _token, address[] _gateway);
    event TokenSet(address indexed l1Address, address indexed l2Address);
    event GatewaySet(address indexed l1Token, address indexed gateway);
}

fn decode_err(what: &str, err: alloy_sol_types::Error) -> BridgeError {
    BridgeError::network(format!("failed to decode {what}: {err}"))
}

pub fn encode_balance_of(account: Address) -> Bytes {
    Bytes::from(balanceOfCall { account }.abi_encode())
}

pub fn encode_allowance(owner: Address, spender: Address) -> Bytes {
    Bytes::from(allowanceCall { owner, spender }.abi_encode())
}

pub fn encode_decimals() -> Bytes {
    Bytes::from(decimalsCall {}.abi_encode())
}

pub fn encode_approve(spender: Address, value: U256) -> Bytes {
    Bytes::from(approveCall { spender, value }.abi_encode())
}

pub fn encode_transfer(to: Address, value: U256) -> Bytes {
    Bytes::from(transferCall { to, value }.abi_encode())
}

pub fn decode_u256(data: &Bytes) -> BridgeResult<U256> {
    let value: (U256,) = <(U256,)>::abi_decode(data).map_err(|err| decode_err("uint256", err))?;
    Ok(value.0)
}

pub fn decode_address(data: &Bytes) -> BridgeResult<Address> {
    let value: (Address,) =
        <(Address,)>::abi_decode(data).map_err(|err| decode_err("address", err))?;
    Ok(value.0)
}

pub fn decode_bool(data: &Bytes) -> BridgeResult<bool> {
    let value: (bool,) = <(bool,)>::abi_decode(data).map_err(|err| decode_err("bool", err))?;
    Ok(value.0)
}

pub fn decode_decimals(data: &Bytes) -> BridgeResult<u8> {
    decimalsCall::abi_decode_returns(data).map_err(|err| decode_err("decimals", err))
}

pub fn decode_bytes(data: &Bytes) -> BridgeResult<Bytes> {
    getOutboundCalldataCall::abi_decode_returns(data).map_err(|err| decode_err("bytes", err))
}

pub fn encode_get_gateway(token: Address) -> Bytes {
    Bytes::from(getGatewayCall { _token: token }.abi_encode())
}

pub fn encode_counterpart_gateway() -> Bytes {
    Bytes::from(counterpartGatewayCall {}.abi_encode())
}

pub fn encode_inbox() -> Bytes {
    Bytes::from(inboxCall {}.abi_encode())
}

pub fn encode_get_outbound_calldata(
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Bytes {
    let call = getOutboundCalldataCall {
        _token: token,
        _from: from,
        _to: to,
        _amount: amount,
        _data: Bytes::new(),
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_submission_fee(data_length: usize, base_fee: U256) -> Bytes {
    let call = calculateRetryableSubmissionFeeCall {
        dataLength: U256::from(data_length),
        baseFee: base_fee,
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_estimate_retryable_ticket(
    sender: Address,
    deposit: U256,
    to: Address,
    refund_to: Address,
    data: Bytes,
) -> Bytes {
    let call = estimateRetryableTicketCall {
        sender,
        deposit,
        to,
        l2CallValue: U256::ZERO,
        excessFeeRefundAddress: refund_to,
        callValueRefundAddress: refund_to,
        data,
    };
    Bytes::from(call.abi_encode())
}

/// Router calldata for a token deposit paying for its own retryable ticket.
#[allow(clippy::too_many_arguments)]
pub fn encode_outbound_transfer_custom_refund(
    token: Address,
    refund_to: Address,
    to: Address,
    amount: U256,
    max_gas: U256,
    gas_price_bid: U256,
    max_submission_cost: U256,
) -> Bytes {
    // gateway data layout: abi.encode(maxSubmissionCost, callHookData)
    let data = (max_submission_cost, Bytes::new()).abi_encode_params();
    let call = outboundTransferCustomRefundCall {
        _token: token,
        _refundTo: refund_to,
        _to: to,
        _amount: amount,
        _maxGas: max_gas,
        _gasPriceBid: gas_price_bid,
        _data: Bytes::from(data),
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_child_outbound_transfer(parent_token: Address, to: Address, amount: U256) -> Bytes {
    let call = outboundTransferCall {
        _l1Token: parent_token,
        _to: to,
        _amount: amount,
        _data: Bytes::new(),
    };
    Bytes::from(call.abi_encode())
}

pub fn encode_calculate_child_token(parent_token: Address) -> Bytes {
    Bytes::from(
        calculateL2TokenAddressCall {
            l1ERC20: parent_token,
        }
        .abi_encode(),
    )
}

pub fn encode_is_spent(index: U256) -> Bytes {
    Bytes::from(isSpentCall { index }.abi_encode())
}

pub fn encode_construct_outbox_proof(size: u64, leaf: u64) -> Bytes {
    Bytes::from(constructOutboxProofCall { size, leaf }.abi_encode())
}

pub fn decode_outbox_proof(data: &Bytes) -> BridgeResult<Vec<B256>> {
    let decoded = constructOutboxProofCall::abi_decode_returns(data)
        .map_err(|err| decode_err("outbox proof", err))?;
    Ok(decoded.proof)
}

pub fn encode_execute_transaction(proof: Vec<B256>, event: &L2ToL1Tx) -> Bytes {
    let call = executeTransactionCall {
        proof,
        index: event.position,
        l2Sender: event.caller,
        to: event.destination,
        l2Block: event.arbBlockNum,
        l1Block: event.ethBlockNum,
        l2Timestamp: event.timestamp,
        value: event.callvalue,
        data: event.data.clone(),
    };
    Bytes::from(call.abi_encode())
}

/// What one retryable ticket pays for on the child chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryableFees {
    pub max_submission_cost: U256,
    pub gas_limit: U256,
}

impl RetryableFees {
    /// Value attached on the parent chain: submission cost plus prepaid child gas.
    pub fn value(&self, gas_price_bid: U256) -> U256 {
        self.max_submission_cost + self.gas_limit * gas_price_bid
    }
}

/// Parent token calldata registering `child_token` on the custom gateway and
/// pointing the router at that gateway. Produces two retryables.
pub fn encode_register_token_on_child(
    child_token: Address,
    gateway: RetryableFees,
    router: RetryableFees,
    gas_price_bid: U256,
    credit_back: Address,
) -> Bytes {
    let call = registerTokenOnL2Call {
        l2CustomTokenAddress: child_token,
        maxSubmissionCostForCustomGateway: gateway.max_submission_cost,
        maxSubmissionCostForRouter: router.max_submission_cost,
        maxGasForCustomGateway: gateway.gas_limit,
        maxGasForRouter: router.gas_limit,
        gasPriceBid: gas_price_bid,
        valueForGateway: gateway.value(gas_price_bid),
        valueForRouter: router.value(gas_price_bid),
        creditBackAddress: credit_back,
    };
    Bytes::from(call.abi_encode())
}

/// What the custom gateway's retryable runs on the child chain.
pub fn encode_register_token_from_parent(parent_token: Address, child_token: Address) -> Bytes {
    let call = registerTokenFromL1Call {
        l1Address: vec![parent_token],
        l2Address: vec![child_token],
    };
    Bytes::from(call.abi_encode())
}

/// What the router's retryable runs on the child chain.
pub fn encode_set_gateway(parent_token: Address, child_gateway: Address) -> Bytes {
    let call = setGatewayCall {
        _token: vec![parent_token],
        _gateway: vec![child_gateway],
    };
    Bytes::from(call.abi_encode())
}

/// Decode `event` from a log when its first topic matches.
pub fn decode_event<E: SolEvent>(data: &LogData) -> Option<E> {
    if data.topics().first() != Some(&E::SIGNATURE_HASH) {
        return None;
    }
    E::decode_log_data(data).ok()
}

pub fn address_topic(value: Address) -> B256 {
    value.into_word()
}
