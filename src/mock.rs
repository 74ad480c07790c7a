//! In-memory [`Bridger`] for tests. Records every submitted transaction and
//! mints receipts carrying the events the real contracts would emit.

use crate::abi::{
    allowanceCall, approveCall, balanceOfCall, decimalsCall, encode_child_outbound_transfer,
    encode_execute_transaction, encode_outbound_transfer_custom_refund,
    encode_register_token_on_child, outboundTransferCall, outboundTransferCustomRefundCall,
    registerTokenOnL2Call, transferCall, Approval, InboxMessageDelivered, L2ToL1Tx,
    RetryableFees, Transfer, ARB_SYS,
};
use crate::bridger::{
    percent_increase, Bridger, ConfirmedTx, DepositParams, DepositPlan, RegistrationParams,
    RegistrationPlan, TxPlan,
};
use crate::error::BridgeError;
use crate::tracker::{
    ChildToParentMessage, ChildToParentStatus, ParentToChildMessage, ParentToChildStatus,
};
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{address, Address, Bytes, Log, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolCall, SolEvent, SolValue};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub const PARENT_TOKEN: Address = address!("1000000000000000000000000000000000000001");
pub const CHILD_TOKEN: Address = address!("2000000000000000000000000000000000000002");
pub const PARENT_GATEWAY: Address = address!("3000000000000000000000000000000000000003");
pub const CHILD_GATEWAY: Address = address!("4000000000000000000000000000000000000004");
pub const INBOX: Address = address!("5000000000000000000000000000000000000005");
pub const PARENT_ROUTER: Address = address!("6000000000000000000000000000000000000006");
pub const CHILD_ROUTER: Address = address!("7000000000000000000000000000000000000007");
pub const OUTBOX: Address = address!("8000000000000000000000000000000000000008");

/// First default anvil account.
pub const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn test_signer() -> PrivateKeySigner {
    TEST_KEY.parse().expect("valid test key")
}

pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

pub fn l2_to_l1_log(position: U256) -> Log {
    let event = L2ToL1Tx {
        caller: CHILD_GATEWAY,
        destination: PARENT_GATEWAY,
        hash: U256::from(0xbeefu64),
        position,
        arbBlockNum: U256::from(100u64),
        ethBlockNum: U256::from(50u64),
        timestamp: U256::from(1_700_000_000u64),
        callvalue: U256::ZERO,
        data: Bytes::new(),
    };
    Log {
        address: ARB_SYS,
        data: event.encode_log_data(),
    }
}

#[derive(Debug)]
pub struct MockState {
    pub decimals: u8,
    pub balances: HashMap<(ChainSide, Address, Address), U256>,
    /// Keyed by (token, owner, spender).
    pub allowances: HashMap<(Address, Address, Address), U256>,
    pub sent: Vec<(ChainSide, TxPlan)>,
    pub receipts: HashMap<B256, ConfirmedTx>,
    pub deposit_statuses: VecDeque<ParentToChildStatus>,
    pub withdrawal_statuses: VecDeque<ChildToParentStatus>,
    pub rpc_calls: usize,
    pub omit_approval_event: bool,
    pub revert_sends: bool,
    /// Answer token reads with empty return data.
    pub truncate_calls: bool,
    pub deposit_messages: usize,
    pub withdraw_messages: usize,
    pub register_messages: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            decimals: 18,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            sent: Vec::new(),
            receipts: HashMap::new(),
            deposit_statuses: VecDeque::new(),
            withdrawal_statuses: VecDeque::new(),
            rpc_calls: 0,
            omit_approval_event: false,
            revert_sends: false,
            truncate_calls: false,
            deposit_messages: 1,
            withdraw_messages: 1,
            register_messages: 2,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockBridger {
    pub state: Mutex<MockState>,
}

impl MockBridger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().expect("mock state poisoned");
        f(&mut state)
    }

    pub fn set_balance(&self, side: ChainSide, token: Address, account: Address, value: U256) {
        self.with(|state| {
            state.balances.insert((side, token, account), value);
        });
    }

    pub fn set_allowance(&self, token: Address, owner: Address, spender: Address, value: U256) {
        self.with(|state| {
            state.allowances.insert((token, owner, spender), value);
        });
    }

    pub fn push_deposit_status(&self, status: ParentToChildStatus) {
        self.with(|state| state.deposit_statuses.push_back(status));
    }

    pub fn push_withdrawal_status(&self, status: ChildToParentStatus) {
        self.with(|state| state.withdrawal_statuses.push_back(status));
    }

    pub fn sent(&self) -> Vec<(ChainSide, TxPlan)> {
        self.with(|state| state.sent.clone())
    }

    pub fn rpc_calls(&self) -> usize {
        self.with(|state| state.rpc_calls)
    }

    pub fn insert_receipt(&self, receipt: ConfirmedTx) {
        self.with(|state| {
            state.receipts.insert(receipt.hash, receipt);
        });
    }

    fn touch(&self) {
        self.with(|state| state.rpc_calls += 1);
    }

    fn mine(&self, side: ChainSide, from: Address, plan: TxPlan) -> ConfirmedTx {
        self.with(|state| {
            state.rpc_calls += 1;
            state.sent.push((side, plan.clone()));
            let hash = B256::with_last_byte(state.sent.len() as u8);
            let mut logs = Vec::new();
            let selector = selector_of(&plan.data);

            if selector == approveCall::SELECTOR {
                let call = approveCall::abi_decode(&plan.data).expect("approve calldata");
                state
                    .allowances
                    .insert((plan.to, from, call.spender), call.value);
                if !state.omit_approval_event {
                    let event = Approval {
                        owner: from,
                        spender: call.spender,
                        value: call.value,
                    };
                    logs.push(Log {
                        address: plan.to,
                        data: event.encode_log_data(),
                    });
                }
            } else if selector == transferCall::SELECTOR {
                let call = transferCall::abi_decode(&plan.data).expect("transfer calldata");
                let event = Transfer {
                    from,
                    to: call.to,
                    value: call.value,
                };
                logs.push(Log {
                    address: plan.to,
                    data: event.encode_log_data(),
                });
            } else if selector == outboundTransferCustomRefundCall::SELECTOR {
                for index in 0..state.deposit_messages {
                    let event = InboxMessageDelivered {
                        messageNum: U256::from(40 + index),
                        data: Bytes::new(),
                    };
                    logs.push(Log {
                        address: INBOX,
                        data: event.encode_log_data(),
                    });
                }
            } else if selector == registerTokenOnL2Call::SELECTOR {
                for index in 0..state.register_messages {
                    let event = InboxMessageDelivered {
                        messageNum: U256::from(60 + index),
                        data: Bytes::new(),
                    };
                    logs.push(Log {
                        address: INBOX,
                        data: event.encode_log_data(),
                    });
                }
            } else if selector == outboundTransferCall::SELECTOR {
                for index in 0..state.withdraw_messages {
                    logs.push(l2_to_l1_log(U256::from(7 + index)));
                }
            }

            let receipt = ConfirmedTx {
                hash,
                from,
                block_number: Some(state.sent.len() as u64),
                success: !state.revert_sends,
                logs,
            };
            state.receipts.insert(hash, receipt.clone());
            receipt
        })
    }
}

fn selector_of(data: &Bytes) -> [u8; 4] {
    data.get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .unwrap_or_default()
}

#[async_trait]
impl Bridger for MockBridger {
    /// Answers the ERC-20 reads from state; anything else is unexpected.
    async fn call(&self, side: ChainSide, to: Address, data: Bytes) -> BridgeResult<Bytes> {
        self.touch();
        let selector = selector_of(&data);
        self.with(|state| {
            let word = if selector == decimalsCall::SELECTOR {
                U256::from(state.decimals)
            } else if selector == balanceOfCall::SELECTOR {
                let call = balanceOfCall::abi_decode(&data).map_err(BridgeError::network)?;
                state
                    .balances
                    .get(&(side, to, call.account))
                    .copied()
                    .unwrap_or_default()
            } else if selector == allowanceCall::SELECTOR {
                let call = allowanceCall::abi_decode(&data).map_err(BridgeError::network)?;
                state
                    .allowances
                    .get(&(to, call.owner, call.spender))
                    .copied()
                    .unwrap_or_default()
            } else {
                return Err(BridgeError::network(format!(
                    "unexpected eth_call to {to:#x}"
                )));
            };
            if state.truncate_calls {
                return Ok(Bytes::new());
            }
            Ok(Bytes::from(word.abi_encode()))
        })
    }

    async fn estimate_gas(
        &self,
        _side: ChainSide,
        _from: Address,
        _plan: &TxPlan,
    ) -> BridgeResult<u64> {
        self.touch();
        Ok(100_000)
    }

    async fn send(
        &self,
        side: ChainSide,
        signer: &PrivateKeySigner,
        plan: TxPlan,
    ) -> BridgeResult<ConfirmedTx> {
        Ok(self.mine(side, signer.address(), plan))
    }

    async fn receipt(&self, _side: ChainSide, tx_hash: B256) -> BridgeResult<Option<ConfirmedTx>> {
        self.touch();
        Ok(self.with(|state| state.receipts.get(&tx_hash).cloned()))
    }

    async fn block_number(&self, _side: ChainSide) -> BridgeResult<u64> {
        self.touch();
        Ok(100)
    }

    async fn parent_gateway(&self, _token: Address) -> BridgeResult<Address> {
        self.touch();
        Ok(PARENT_GATEWAY)
    }

    async fn child_token(&self, _parent_token: Address) -> BridgeResult<Address> {
        self.touch();
        Ok(CHILD_TOKEN)
    }

    async fn deposit_request(&self, params: &DepositParams) -> BridgeResult<DepositPlan> {
        self.touch();
        let retryable_gas_limit =
            percent_increase(U256::from(100_000u64), params.retryable_buffer_percent);
        let gas_price_bid = U256::from(1_000_000_000u64);
        let max_submission_cost = U256::from(1_000u64);
        let data = encode_outbound_transfer_custom_refund(
            params.token,
            params.from,
            params.destination,
            params.amount,
            retryable_gas_limit,
            gas_price_bid,
            max_submission_cost,
        );
        Ok(DepositPlan {
            gateway: PARENT_GATEWAY,
            child_gateway: CHILD_GATEWAY,
            inbox: INBOX,
            retryable_gas_limit,
            gas_price_bid,
            max_submission_cost,
            tx: TxPlan {
                to: PARENT_ROUTER,
                data,
                value: max_submission_cost + retryable_gas_limit * gas_price_bid,
                gas_limit: None,
            },
        })
    }

    async fn registration_request(
        &self,
        params: &RegistrationParams,
    ) -> BridgeResult<RegistrationPlan> {
        self.touch();
        let fees = RetryableFees {
            max_submission_cost: U256::from(1_000u64),
            gas_limit: percent_increase(U256::from(100_000u64), params.retryable_buffer_percent),
        };
        let gas_price_bid = U256::from(1_000_000_000u64);
        let data = encode_register_token_on_child(
            params.child_token,
            fees,
            fees,
            gas_price_bid,
            params.from,
        );
        Ok(RegistrationPlan {
            child_gateway: CHILD_GATEWAY,
            child_router: CHILD_ROUTER,
            inbox: INBOX,
            gateway: fees,
            router: fees,
            gas_price_bid,
            tx: TxPlan {
                to: params.parent_token,
                data,
                value: fees.value(gas_price_bid) * U256::from(2u64),
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
        self.touch();
        Ok(TxPlan::call(
            CHILD_ROUTER,
            encode_child_outbound_transfer(parent_token, destination, amount),
        ))
    }

    async fn redemption_status(
        &self,
        _message: &ParentToChildMessage,
    ) -> BridgeResult<ParentToChildStatus> {
        self.touch();
        Ok(self.with(|state| {
            let next = if state.deposit_statuses.len() > 1 {
                state.deposit_statuses.pop_front()
            } else {
                state.deposit_statuses.front().copied()
            };
            next.unwrap_or(ParentToChildStatus::NotYetCreated)
        }))
    }

    async fn withdrawal_status(
        &self,
        _message: &ChildToParentMessage,
    ) -> BridgeResult<ChildToParentStatus> {
        self.touch();
        Ok(self.with(|state| {
            let next = if state.withdrawal_statuses.len() > 1 {
                state.withdrawal_statuses.pop_front()
            } else {
                state.withdrawal_statuses.front().copied()
            };
            next.unwrap_or(ChildToParentStatus::Unconfirmed)
        }))
    }

    async fn execute(
        &self,
        signer: &PrivateKeySigner,
        message: &ChildToParentMessage,
    ) -> BridgeResult<ConfirmedTx> {
        let plan = TxPlan::call(OUTBOX, encode_execute_transaction(Vec::new(), &message.event));
        Ok(self.mine(ChainSide::Parent, signer.address(), plan))
    }
}
