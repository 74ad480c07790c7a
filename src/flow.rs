//! Deposit, withdraw, claim, transfer and token registration as one
//! parameterised flow each.
//!
//! Operations walk the stages
//! `Start -> BalanceChecked -> Approved -> Submitted -> SourceConfirmed ->
//! DestinationTracked -> Completed | Failed`, skipping those that do not
//! apply. Approval only happens for deposits. A claim starts from an already
//! mined child transaction, so it reaches `SourceConfirmed` and
//! `DestinationTracked` before submitting on the parent chain.
//!
//! Each stage is logged after the step it names: `Submitted` means a
//! transaction reached the chain. Stages are never persisted; a crash
//! mid-flow means the caller re-checks chain state and starts over.

use crate::approval::{ensure_allowance, ApprovalPolicy};
use crate::bridger::{Bridger, RegistrationPlan};
use crate::error::BridgeError;
use crate::executor::{
    submit_deposit, submit_registration, submit_transfer, submit_withdrawal, GasPolicy,
};
use crate::outcome::{
    BalanceOutcome, ClaimOutcome, DepositOutcome, Outcome, RegisterOutcome, RegisteredMessage,
    StatusOutcome, TransferOutcome, WithdrawOutcome,
};
use crate::resolver::{parse_amount, resolve_token};
use crate::signer::Signers;
use crate::tracker::{
    self, child_to_parent_messages, first_emitted, first_message, parent_to_child_messages,
    ChildEffect, ChildToParentMessage, ChildToParentStatus, DepositTarget, FirstMessage,
    PollPolicy,
};
use crate::types::{parse_address, parse_b256, BridgeOperation, BridgeResult, ChainSide, Direction};
use alloy_primitives::{Address, B256};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    BalanceChecked,
    Approved,
    Submitted,
    SourceConfirmed,
    DestinationTracked,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::BalanceChecked => "balance_checked",
            Self::Approved => "approved",
            Self::Submitted => "submitted",
            Self::SourceConfirmed => "source_confirmed",
            Self::DestinationTracked => "destination_tracked",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

struct FlowTrace {
    direction: Direction,
    stage: Stage,
}

impl FlowTrace {
    fn start(direction: Direction) -> Self {
        tracing::info!(%direction, stage = %Stage::Start, "flow started");
        Self {
            direction,
            stage: Stage::Start,
        }
    }

    fn advance(&mut self, stage: Stage) {
        self.stage = stage;
        tracing::info!(direction = %self.direction, %stage, "flow stage");
    }

    /// `Submitted` once the transaction reached the chain, reverted or not.
    fn submitted<T>(&mut self, result: &BridgeResult<T>) {
        let mined = match result {
            Ok(_) => true,
            Err(err) => matches!(
                err,
                BridgeError::TransactionReverted { .. } | BridgeError::EventMissing { .. }
            ),
        };
        if mined {
            self.advance(Stage::Submitted);
        }
    }

    fn finish<T>(mut self, result: &BridgeResult<T>) {
        match result {
            Ok(_) => self.advance(Stage::Completed),
            Err(err) => {
                let reached = self.stage;
                self.stage = Stage::Failed;
                tracing::warn!(
                    direction = %self.direction,
                    stage = %Stage::Failed,
                    %reached,
                    kind = ?err.kind(),
                    error = %err,
                    "flow failed"
                );
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRequest {
    pub amount: String,
    pub token: Option<String>,
    pub destination: Option<String>,
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: String,
    pub token: Option<String>,
    pub destination: Option<String>,
    pub operator: Option<String>,
    /// Poll until the outbox message is executable. On by default.
    #[serde(default = "wait_for_outbox")]
    pub wait_for_outbox: bool,
}

fn wait_for_outbox() -> bool {
    true
}

impl Default for WithdrawRequest {
    fn default() -> Self {
        Self {
            amount: String::new(),
            token: None,
            destination: None,
            operator: None,
            wait_for_outbox: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRequest {
    #[serde(default)]
    pub tx_hash: String,
    pub operator: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub amount: String,
    pub to: String,
    pub token: Option<String>,
    pub operator: Option<String>,
}

/// Register a parent/child custom token pair on the custom gateway.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub token: Option<String>,
    pub child_token: Option<String>,
    pub operator: Option<String>,
}

/// Token defaults and tuning shared by every request.
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    pub parent_token: Option<Address>,
    pub child_token: Option<Address>,
    pub gas: GasPolicy,
    pub approval: ApprovalPolicy,
    pub deposit: PollPolicy,
    pub withdraw: PollPolicy,
}

pub struct BridgeService<B> {
    bridger: B,
    signers: Signers,
    settings: FlowSettings,
}

impl<B: Bridger> BridgeService<B> {
    pub fn new(bridger: B, signers: Signers, settings: FlowSettings) -> Self {
        Self {
            bridger,
            signers,
            settings,
        }
    }

    pub fn signers(&self) -> &Signers {
        &self.signers
    }

    pub async fn deposit(&self, request: DepositRequest) -> BridgeResult<Outcome> {
        let mut flow = FlowTrace::start(Direction::Deposit);
        let result = self.run_deposit(request, &mut flow).await;
        flow.finish(&result);
        result
    }

    pub async fn withdraw(&self, request: WithdrawRequest) -> BridgeResult<Outcome> {
        let mut flow = FlowTrace::start(Direction::Withdraw);
        let result = self.run_withdraw(request, &mut flow).await;
        flow.finish(&result);
        result
    }

    pub async fn claim(&self, request: ClaimRequest) -> BridgeResult<Outcome> {
        let mut flow = FlowTrace::start(Direction::Claim);
        let result = self.run_claim(request, &mut flow).await;
        flow.finish(&result);
        result
    }

    pub async fn transfer(&self, request: TransferRequest) -> BridgeResult<Outcome> {
        let mut flow = FlowTrace::start(Direction::Transfer);
        let result = self.run_transfer(request, &mut flow).await;
        flow.finish(&result);
        result
    }

    pub async fn register(&self, request: RegisterRequest) -> BridgeResult<Outcome> {
        let mut flow = FlowTrace::start(Direction::Register);
        let result = self.run_register(request, &mut flow).await;
        flow.finish(&result);
        result
    }

    async fn run_deposit(
        &self,
        request: DepositRequest,
        flow: &mut FlowTrace,
    ) -> BridgeResult<Outcome> {
        let signer = self.signers.resolve(request.operator.as_deref())?;
        let sender = signer.address();
        let token = self.parent_token(request.token.as_deref())?;
        let destination = optional_address(request.destination.as_deref())?.unwrap_or(sender);

        let snapshot = resolve_token(&self.bridger, ChainSide::Parent, token, sender).await?;
        let amount = parse_amount(&request.amount, snapshot.decimals)?;
        snapshot.ensure_sufficient(amount)?;
        flow.advance(Stage::BalanceChecked);

        let gateway = self.bridger.parent_gateway(token).await?;
        let approval = ensure_allowance(
            &self.bridger,
            signer,
            ChainSide::Parent,
            token,
            gateway,
            amount,
            self.settings.approval,
        )
        .await?;
        flow.advance(Stage::Approved);

        let child_from_block = self.bridger.block_number(ChainSide::Child).await?;
        let operation = BridgeOperation::new(Direction::Deposit, token, amount, sender, destination);
        let submitted = submit_deposit(&self.bridger, signer, &operation, self.settings.gas).await;
        flow.submitted(&submitted);
        let (plan, receipt) = submitted?;
        flow.advance(Stage::SourceConfirmed);

        let FirstMessage { message, count } =
            first_emitted(parent_to_child_messages(&receipt, plan.inbox), receipt.hash)?;
        let target = DepositTarget {
            parent_token: token,
            child_gateway: plan.child_gateway,
            sender,
            recipient: destination,
            amount,
        };
        let message = message.expecting(ChildEffect::Deposit(target), child_from_block);
        let child_tx_hash =
            tracker::wait_for_redemption(&self.bridger, &message, self.settings.deposit).await?;
        flow.advance(Stage::DestinationTracked);

        Ok(Outcome::Deposit(DepositOutcome {
            parent_tx_hash: receipt.hash,
            child_tx_hash,
            message_number: message.message_number,
            message_count: count,
            approval,
            amount: snapshot.format(amount),
            token,
            destination,
        }))
    }

    async fn run_withdraw(
        &self,
        request: WithdrawRequest,
        flow: &mut FlowTrace,
    ) -> BridgeResult<Outcome> {
        let signer = self.signers.resolve(request.operator.as_deref())?;
        let sender = signer.address();
        let parent_token = self.parent_token(request.token.as_deref())?;
        let child_token = self
            .child_token(parent_token, request.token.is_some())
            .await?;
        let destination = optional_address(request.destination.as_deref())?.unwrap_or(sender);

        let snapshot = resolve_token(&self.bridger, ChainSide::Child, child_token, sender).await?;
        let amount = parse_amount(&request.amount, snapshot.decimals)?;
        snapshot.ensure_sufficient(amount)?;
        flow.advance(Stage::BalanceChecked);

        let operation =
            BridgeOperation::new(Direction::Withdraw, child_token, amount, sender, destination);
        let submitted = submit_withdrawal(
            &self.bridger,
            signer,
            &operation,
            parent_token,
            self.settings.gas,
        )
        .await;
        flow.submitted(&submitted);
        let receipt = submitted?;
        flow.advance(Stage::SourceConfirmed);

        let FirstMessage { message, count } =
            first_emitted(child_to_parent_messages(&receipt), receipt.hash)?;
        let status = if request.wait_for_outbox {
            tracker::wait_until_ready(&self.bridger, &message, self.settings.withdraw).await?
        } else {
            tracker::status(&self.bridger, &message).await?
        };
        flow.advance(Stage::DestinationTracked);

        Ok(Outcome::Withdraw(WithdrawOutcome {
            child_tx_hash: receipt.hash,
            status,
            position: message.position(),
            message_count: count,
            amount: snapshot.format(amount),
            token: child_token,
            destination,
        }))
    }

    async fn run_claim(&self, request: ClaimRequest, flow: &mut FlowTrace) -> BridgeResult<Outcome> {
        let tx_hash = validate_tx_hash(&request.tx_hash)?;
        let signer = self.signers.resolve(request.operator.as_deref())?;

        let FirstMessage { message, count } = self.outgoing_message(tx_hash).await?;
        flow.advance(Stage::SourceConfirmed);

        match tracker::status(&self.bridger, &message).await? {
            ChildToParentStatus::Executed => return Err(BridgeError::AlreadyExecuted { tx_hash }),
            ChildToParentStatus::Unconfirmed => {
                return Err(BridgeError::MessageNotReady {
                    tx_hash,
                    status: ChildToParentStatus::Unconfirmed.to_string(),
                })
            }
            ChildToParentStatus::Confirmed => {}
        }
        flow.advance(Stage::DestinationTracked);

        let executed = tracker::execute(&self.bridger, signer, &message).await;
        flow.submitted(&executed);
        let receipt = executed?;
        Ok(Outcome::Claim(ClaimOutcome {
            tx_hash: receipt.hash,
            from: receipt.from,
            message_count: count,
        }))
    }

    async fn run_transfer(
        &self,
        request: TransferRequest,
        flow: &mut FlowTrace,
    ) -> BridgeResult<Outcome> {
        let signer = self.signers.resolve(request.operator.as_deref())?;
        let sender = signer.address();
        let to = optional_address(Some(&request.to))?
            .ok_or_else(|| BridgeError::invalid("recipient address is missing"))?;
        let token = match optional_address(request.token.as_deref())? {
            Some(token) => token,
            None => self.default_child_token().await?,
        };

        let snapshot = resolve_token(&self.bridger, ChainSide::Child, token, sender).await?;
        let amount = parse_amount(&request.amount, snapshot.decimals)?;
        snapshot.ensure_sufficient(amount)?;
        flow.advance(Stage::BalanceChecked);

        let operation = BridgeOperation::new(Direction::Transfer, token, amount, sender, to);
        let submitted = submit_transfer(&self.bridger, signer, &operation, self.settings.gas).await;
        flow.submitted(&submitted);
        let receipt = submitted?;
        flow.advance(Stage::SourceConfirmed);

        Ok(Outcome::Transfer(TransferOutcome {
            tx_hash: receipt.hash,
            from: receipt.from,
            to,
            amount: snapshot.format(amount),
            token,
        }))
    }

    /// Both registration retryables are tracked, each against its own
    /// child-chain effect.
    async fn run_register(
        &self,
        request: RegisterRequest,
        flow: &mut FlowTrace,
    ) -> BridgeResult<Outcome> {
        let signer = self.signers.resolve(request.operator.as_deref())?;
        let parent_token = self.parent_token(request.token.as_deref())?;
        let child_token = match optional_address(request.child_token.as_deref())? {
            Some(child_token) => child_token,
            None => self
                .settings
                .child_token
                .filter(|_| request.token.is_none())
                .ok_or_else(|| BridgeError::invalid("child token address is missing"))?,
        };

        let child_from_block = self.bridger.block_number(ChainSide::Child).await?;
        let submitted = submit_registration(
            &self.bridger,
            signer,
            parent_token,
            child_token,
            self.settings.gas,
        )
        .await;
        flow.submitted(&submitted);
        let (plan, receipt) = submitted?;
        flow.advance(Stage::SourceConfirmed);

        let inbox_messages = parent_to_child_messages(&receipt, plan.inbox);
        let effects = registration_effects(parent_token, child_token, &plan);
        if inbox_messages.is_empty() {
            return Err(BridgeError::MessageNotEmitted {
                tx_hash: receipt.hash,
            });
        }
        if inbox_messages.len() != effects.len() {
            return Err(BridgeError::UnexpectedMessageCount {
                tx_hash: receipt.hash,
                expected: effects.len(),
                found: inbox_messages.len(),
            });
        }

        let mut messages = Vec::with_capacity(effects.len());
        for (inbox_message, effect) in inbox_messages.into_iter().zip(effects) {
            let message = inbox_message.expecting(effect, child_from_block);
            let child_tx_hash =
                tracker::wait_for_redemption(&self.bridger, &message, self.settings.deposit)
                    .await?;
            messages.push(RegisteredMessage {
                effect: message.effect.name(),
                message_number: message.message_number,
                child_tx_hash,
            });
        }
        flow.advance(Stage::DestinationTracked);

        Ok(Outcome::Register(RegisterOutcome {
            parent_tx_hash: receipt.hash,
            parent_token,
            child_token,
            messages,
        }))
    }

    /// Balance of `account` (default: the default signer) on one side.
    pub async fn balance(
        &self,
        token: Option<&str>,
        account: Option<&str>,
        side: ChainSide,
    ) -> BridgeResult<Outcome> {
        let account = match optional_address(account)? {
            Some(account) => account,
            None => self
                .signers
                .default
                .as_ref()
                .map(|signer| signer.address())
                .ok_or_else(|| BridgeError::invalid("account address is missing"))?,
        };
        let token = match (side, optional_address(token)?) {
            (_, Some(token)) => token,
            (ChainSide::Parent, None) => self.parent_token(None)?,
            (ChainSide::Child, None) => self.default_child_token().await?,
        };
        let snapshot = resolve_token(&self.bridger, side, token, account).await?;
        Ok(Outcome::Balance(BalanceOutcome {
            side,
            token,
            account,
            decimals: snapshot.decimals,
            balance: snapshot.balance,
            formatted: snapshot.format(snapshot.balance),
        }))
    }

    /// Status of the first outgoing message of a child transaction.
    pub async fn message_status(&self, tx_hash: &str) -> BridgeResult<Outcome> {
        let tx_hash = validate_tx_hash(tx_hash)?;
        let FirstMessage { message, count } = self.outgoing_message(tx_hash).await?;
        let status = tracker::status(&self.bridger, &message).await?;
        Ok(Outcome::Status(StatusOutcome {
            tx_hash,
            status,
            position: message.position(),
            message_count: count,
        }))
    }

    async fn outgoing_message(
        &self,
        tx_hash: B256,
    ) -> BridgeResult<FirstMessage<ChildToParentMessage>> {
        let receipt = self
            .bridger
            .receipt(ChainSide::Child, tx_hash)
            .await?
            .ok_or(BridgeError::ReceiptNotFound(tx_hash))?;
        first_message(child_to_parent_messages(&receipt), tx_hash)
    }

    fn parent_token(&self, requested: Option<&str>) -> BridgeResult<Address> {
        optional_address(requested)?
            .or(self.settings.parent_token)
            .ok_or_else(|| BridgeError::invalid("token address is missing"))
    }

    /// A configured child token only applies to the configured parent token.
    async fn child_token(&self, parent_token: Address, overridden: bool) -> BridgeResult<Address> {
        match self.settings.child_token {
            Some(child_token) if !overridden => Ok(child_token),
            _ => self.bridger.child_token(parent_token).await,
        }
    }

    async fn default_child_token(&self) -> BridgeResult<Address> {
        let parent_token = self.parent_token(None)?;
        self.child_token(parent_token, false).await
    }
}

/// Retryables in the order the parent token creates them: gateway first,
/// then router.
fn registration_effects(
    parent_token: Address,
    child_token: Address,
    plan: &RegistrationPlan,
) -> [ChildEffect; 2] {
    [
        ChildEffect::TokenSet {
            child_gateway: plan.child_gateway,
            parent_token,
            child_token,
        },
        ChildEffect::GatewaySet {
            child_router: plan.child_router,
            parent_token,
            child_gateway: plan.child_gateway,
        },
    ]
}

fn optional_address(value: Option<&str>) -> BridgeResult<Option<Address>> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_address(value).map(Some),
        None => Ok(None),
    }
}

/// Shape check performed before any chain access.
pub fn validate_tx_hash(value: &str) -> BridgeResult<B256> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::MissingTxHash);
    }
    if !trimmed.starts_with("0x") || trimmed.len() != 66 {
        return Err(BridgeError::InvalidTxHash(trimmed.to_string()));
    }
    parse_b256(trimmed).map_err(|_| BridgeError::InvalidTxHash(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalCeiling, ApprovalOutcome};
    use crate::bridger::ConfirmedTx;
    use crate::error::ErrorKind;
    use crate::mock::{
        ether, l2_to_l1_log, test_signer, MockBridger, CHILD_TOKEN, OUTBOX, PARENT_GATEWAY,
        PARENT_ROUTER, PARENT_TOKEN,
    };
    use crate::outcome::to_tuple;
    use crate::tracker::ParentToChildStatus;
    use alloy_primitives::U256;
    use std::time::Duration;

    fn settings() -> FlowSettings {
        let poll = PollPolicy {
            timeout: Duration::from_millis(40),
            poll: Duration::from_millis(5),
        };
        FlowSettings {
            parent_token: Some(PARENT_TOKEN),
            child_token: None,
            gas: GasPolicy::default(),
            approval: ApprovalPolicy {
                ceiling: ApprovalCeiling::Unlimited,
                auto_approve: true,
            },
            deposit: poll,
            withdraw: poll,
        }
    }

    fn service() -> BridgeService<MockBridger> {
        let signers = Signers {
            default: Some(test_signer()),
            default_env: "PRIVATE_KEY".to_string(),
            operators: Default::default(),
        };
        BridgeService::new(MockBridger::new(), signers, settings())
    }

    fn me() -> Address {
        test_signer().address()
    }

    fn deposit_of(amount: &str) -> DepositRequest {
        DepositRequest {
            amount: amount.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn deposit_over_balance_submits_nothing() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(5));

        let result = service.deposit(deposit_of("10")).await;
        let (ok, message) = to_tuple(&result);
        assert!(!ok);
        assert!(message.starts_with("Insufficient Balance 10 > 5"));
        assert_eq!(result.unwrap_err().kind(), ErrorKind::InsufficientFunds);
        assert!(service.bridger.sent().is_empty());
    }

    #[tokio::test]
    async fn deposit_approves_submits_and_tracks() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(20));
        bridger.push_deposit_status(ParentToChildStatus::Redeemed {
            child_tx_hash: B256::repeat_byte(0xcc),
        });

        let outcome = service.deposit(deposit_of("10")).await.unwrap();
        let Outcome::Deposit(deposit) = outcome else {
            panic!("expected deposit outcome");
        };
        assert_eq!(deposit.child_tx_hash, B256::repeat_byte(0xcc));
        assert_eq!(deposit.amount, "10");
        assert_eq!(deposit.message_count, 1);

        let sent = bridger.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1.to, PARENT_TOKEN);
        assert_eq!(sent[1].1.to, PARENT_ROUTER);
        assert_eq!(
            bridger.with(|state| state.allowances[&(PARENT_TOKEN, me(), PARENT_GATEWAY)]),
            U256::MAX
        );
    }

    #[tokio::test]
    async fn second_deposit_skips_approval() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(20));
        bridger.push_deposit_status(ParentToChildStatus::Redeemed {
            child_tx_hash: B256::repeat_byte(0xcc),
        });

        service.deposit(deposit_of("10")).await.unwrap();
        service.deposit(deposit_of("10")).await.unwrap();
        let approvals = bridger
            .sent()
            .iter()
            .filter(|(_, plan)| plan.to == PARENT_TOKEN)
            .count();
        assert_eq!(approvals, 1);
        assert_eq!(bridger.sent().len(), 3);
    }

    #[tokio::test]
    async fn deposit_without_inbox_message_fails() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(20));
        bridger.with(|state| state.deposit_messages = 0);

        let err = service.deposit(deposit_of("1")).await.unwrap_err();
        assert!(matches!(err, BridgeError::MessageNotEmitted { .. }));
        assert_eq!(err.kind(), ErrorKind::MessageFailed);
        assert_eq!(bridger.sent().len(), 2);
    }

    #[tokio::test]
    async fn existing_allowance_submits_only_the_deposit() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(20));
        bridger.set_allowance(PARENT_TOKEN, me(), PARENT_GATEWAY, ether(10));
        bridger.push_deposit_status(ParentToChildStatus::Redeemed {
            child_tx_hash: B256::repeat_byte(0xcc),
        });

        let outcome = service.deposit(deposit_of("10")).await.unwrap();
        let Outcome::Deposit(deposit) = outcome else {
            panic!("expected deposit outcome");
        };
        assert_eq!(deposit.approval, ApprovalOutcome::Sufficient);
        let sent = bridger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.to, PARENT_ROUTER);
    }

    #[tokio::test]
    async fn unredeemed_deposit_reports_status() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(20));
        let err = service.deposit(deposit_of("1")).await.unwrap_err();
        assert!(matches!(err, BridgeError::MessageNotRedeemed { .. }));
        assert_eq!(err.kind(), ErrorKind::MessageFailed);
    }

    #[tokio::test]
    async fn withdraw_reports_outbox_status() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(3));
        bridger.with(|state| state.withdraw_messages = 2);

        let outcome = service
            .withdraw(WithdrawRequest {
                amount: "1.5".to_string(),
                wait_for_outbox: false,
                ..Default::default()
            })
            .await
            .unwrap();
        let Outcome::Withdraw(withdraw) = outcome else {
            panic!("expected withdraw outcome");
        };
        assert_eq!(withdraw.status, ChildToParentStatus::Unconfirmed);
        assert_eq!(withdraw.message_count, 2);
        assert_eq!(withdraw.position, U256::from(7u64));
        assert_eq!(withdraw.amount, "1.5");
        assert_eq!(bridger.sent()[0].0, ChainSide::Child);
    }

    #[tokio::test]
    async fn withdraw_over_child_balance_submits_nothing() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(1));
        let err = service
            .withdraw(WithdrawRequest {
                amount: "2".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert!(service.bridger.sent().is_empty());
    }

    #[tokio::test]
    async fn withdraw_waits_for_outbox_by_default() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(3));
        let request: WithdrawRequest = serde_json::from_str(r#"{"amount":"1"}"#).unwrap();
        assert!(request.wait_for_outbox);

        let err = service.withdraw(request).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::MessageNotReady { ref status, .. } if status == "Unconfirmed"
        ));
        assert!(err.is_retryable());
        assert_eq!(service.bridger.sent().len(), 1);
    }

    #[tokio::test]
    async fn withdraw_returns_once_confirmed() {
        let service = service();
        let bridger = &service.bridger;
        bridger.set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(3));
        bridger.push_withdrawal_status(ChildToParentStatus::Unconfirmed);
        bridger.push_withdrawal_status(ChildToParentStatus::Confirmed);

        let outcome = service
            .withdraw(WithdrawRequest {
                amount: "1".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let Outcome::Withdraw(withdraw) = outcome else {
            panic!("expected withdraw outcome");
        };
        assert_eq!(withdraw.status, ChildToParentStatus::Confirmed);
    }

    #[tokio::test]
    async fn claim_rejects_short_hash_without_rpc() {
        let service = service();
        let result = service
            .claim(ClaimRequest {
                tx_hash: "0x1234".to_string(),
                operator: None,
            })
            .await;
        assert_eq!(
            to_tuple(&result),
            (
                false,
                "Hmm, 0x1234 doesn't look like a txn hash...".to_string()
            )
        );
        assert_eq!(service.bridger.rpc_calls(), 0);
    }

    #[tokio::test]
    async fn claim_rejects_missing_prefix_and_empty_hash() {
        let service = service();
        let unprefixed = "ab".repeat(33);
        let err = service
            .claim(ClaimRequest {
                tx_hash: unprefixed,
                operator: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidTxHash(_)));

        let err = service.claim(ClaimRequest::default()).await.unwrap_err();
        assert!(matches!(err, BridgeError::MissingTxHash));
        assert_eq!(service.bridger.rpc_calls(), 0);
    }

    fn withdrawal_receipt(service: &BridgeService<MockBridger>) -> B256 {
        let hash = B256::repeat_byte(0x77);
        service.bridger.insert_receipt(ConfirmedTx {
            hash,
            from: me(),
            block_number: Some(5),
            success: true,
            logs: vec![l2_to_l1_log(U256::from(11u64))],
        });
        hash
    }

    fn claim_of(hash: B256) -> ClaimRequest {
        ClaimRequest {
            tx_hash: format!("{hash:#x}"),
            operator: None,
        }
    }

    #[tokio::test]
    async fn claim_executes_confirmed_message() {
        let service = service();
        let hash = withdrawal_receipt(&service);
        service
            .bridger
            .push_withdrawal_status(ChildToParentStatus::Confirmed);

        let outcome = service.claim(claim_of(hash)).await.unwrap();
        let Outcome::Claim(claim) = outcome else {
            panic!("expected claim outcome");
        };
        assert_eq!(claim.from, me());
        let sent = service.bridger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, ChainSide::Parent);
        assert_eq!(sent[0].1.to, OUTBOX);
    }

    #[tokio::test]
    async fn claim_refuses_unconfirmed_and_executed() {
        let service = service();
        let hash = withdrawal_receipt(&service);

        let err = service.claim(claim_of(hash)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MessageNotReady);

        service.bridger.with(|state| {
            state.withdrawal_statuses.clear();
            state
                .withdrawal_statuses
                .push_back(ChildToParentStatus::Executed);
        });
        let err = service.claim(claim_of(hash)).await.unwrap_err();
        assert!(matches!(err, BridgeError::AlreadyExecuted { .. }));
        assert!(service.bridger.sent().is_empty());
    }

    #[tokio::test]
    async fn claim_without_outgoing_message_fails() {
        let service = service();
        let hash = B256::repeat_byte(0x55);
        service.bridger.insert_receipt(ConfirmedTx {
            hash,
            from: me(),
            block_number: Some(5),
            success: true,
            logs: Vec::new(),
        });
        let err = service.claim(claim_of(hash)).await.unwrap_err();
        assert!(matches!(err, BridgeError::NoMessages { .. }));
    }

    #[tokio::test]
    async fn transfer_moves_child_tokens() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(4));
        let recipient = Address::repeat_byte(0x42);
        let outcome = service
            .transfer(TransferRequest {
                amount: "4".to_string(),
                to: format!("{recipient:#x}"),
                ..Default::default()
            })
            .await
            .unwrap();
        let Outcome::Transfer(transfer) = outcome else {
            panic!("expected transfer outcome");
        };
        assert_eq!(transfer.to, recipient);
        assert_eq!(transfer.token, CHILD_TOKEN);
    }

    #[tokio::test]
    async fn transfer_over_balance_submits_nothing() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Child, CHILD_TOKEN, me(), ether(1));
        let err = service
            .transfer(TransferRequest {
                amount: "1.5".to_string(),
                to: format!("{:#x}", Address::repeat_byte(0x42)),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Insufficient Balance 1.5 > 1"));
        assert!(service.bridger.sent().is_empty());
    }

    #[tokio::test]
    async fn message_status_reports_without_executing() {
        let service = service();
        let hash = withdrawal_receipt(&service);
        service
            .bridger
            .push_withdrawal_status(ChildToParentStatus::Confirmed);

        let outcome = service.message_status(&format!("{hash:#x}")).await.unwrap();
        let Outcome::Status(status) = outcome else {
            panic!("expected status outcome");
        };
        assert_eq!(status.status, ChildToParentStatus::Confirmed);
        assert_eq!(status.position, U256::from(11u64));
        assert_eq!(status.message_count, 1);
        assert!(service.bridger.sent().is_empty());
    }

    #[tokio::test]
    async fn message_status_of_unknown_tx_is_not_found() {
        let service = service();
        let err = service
            .message_status(&format!("{:#x}", B256::repeat_byte(0x99)))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::ReceiptNotFound(_)));
        let err = service.message_status("0x12").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    fn register_of(child_token: Address) -> RegisterRequest {
        RegisterRequest {
            child_token: Some(format!("{child_token:#x}")),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn register_tracks_both_retryables() {
        let service = service();
        let bridger = &service.bridger;
        bridger.push_deposit_status(ParentToChildStatus::Redeemed {
            child_tx_hash: B256::repeat_byte(0xd1),
        });
        bridger.push_deposit_status(ParentToChildStatus::Redeemed {
            child_tx_hash: B256::repeat_byte(0xd2),
        });

        let outcome = service.register(register_of(CHILD_TOKEN)).await.unwrap();
        let Outcome::Register(register) = outcome else {
            panic!("expected register outcome");
        };
        assert_eq!(register.parent_token, PARENT_TOKEN);
        assert_eq!(register.messages.len(), 2);
        assert_eq!(register.messages[0].effect, "token_set");
        assert_eq!(register.messages[0].child_tx_hash, B256::repeat_byte(0xd1));
        assert_eq!(register.messages[1].effect, "gateway_set");
        assert_eq!(register.messages[1].child_tx_hash, B256::repeat_byte(0xd2));
        assert_eq!(register.messages[1].message_number, U256::from(61u64));

        let sent = bridger.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.to, PARENT_TOKEN);
    }

    #[tokio::test]
    async fn register_with_missing_retryable_fails() {
        let service = service();
        service.bridger.with(|state| state.register_messages = 1);
        let err = service.register(register_of(CHILD_TOKEN)).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::UnexpectedMessageCount {
                expected: 2,
                found: 1,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::MessageFailed);
    }

    #[tokio::test]
    async fn register_without_child_token_sends_nothing() {
        let service = service();
        let err = service
            .register(RegisterRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(service.bridger.sent().is_empty());
    }

    #[test]
    fn submitted_only_after_the_chain_saw_the_transaction() {
        let mut flow = FlowTrace::start(Direction::Deposit);
        flow.submitted::<()>(&Err(BridgeError::network("estimate failed")));
        assert_eq!(flow.stage, Stage::Start);
        flow.submitted::<()>(&Err(BridgeError::TransactionReverted {
            tx_hash: B256::ZERO,
        }));
        assert_eq!(flow.stage, Stage::Submitted);
    }

    #[tokio::test]
    async fn unknown_operator_is_invalid_input() {
        let service = service();
        let err = service
            .deposit(DepositRequest {
                amount: "1".to_string(),
                operator: Some("ghost".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn balance_defaults_to_signer() {
        let service = service();
        service
            .bridger
            .set_balance(ChainSide::Parent, PARENT_TOKEN, me(), ether(7));
        let outcome = service.balance(None, None, ChainSide::Parent).await.unwrap();
        let Outcome::Balance(balance) = outcome else {
            panic!("expected balance outcome");
        };
        assert_eq!(balance.formatted, "7");
        assert_eq!(balance.account, me());
    }
}
