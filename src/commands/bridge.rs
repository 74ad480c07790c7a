use crate::cli::{
    BalanceArgs, ClaimArgs, DepositArgs, RegisterArgs, RpcArgs, SignerArgs, StatusArgs,
    TransferArgs, WithdrawArgs,
};
use crate::commands::{build_service, emit};
use crate::config::Config;
use crate::flow::{
    ClaimRequest, DepositRequest, RegisterRequest, TransferRequest, WithdrawRequest,
};
use crate::types::address_to_hex;
use anyhow::Result;

pub async fn run_deposit(args: DepositArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let request = DepositRequest {
        amount: args.amount,
        token: args.token,
        destination: args.destination,
        operator: args.signer.operator,
    };
    emit(args.json, service.deposit(request).await)
}

pub async fn run_withdraw(args: WithdrawArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let request = WithdrawRequest {
        amount: args.amount,
        token: args.token,
        destination: args.destination,
        operator: args.signer.operator,
        wait_for_outbox: !args.no_wait,
    };
    emit(args.json, service.withdraw(request).await)
}

pub async fn run_claim(args: ClaimArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let request = ClaimRequest {
        tx_hash: args.tx_hash,
        operator: args.signer.operator,
    };
    emit(args.json, service.claim(request).await)
}

pub async fn run_transfer(args: TransferArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let request = TransferRequest {
        amount: args.amount,
        to: args.to,
        token: args.token,
        operator: args.signer.operator,
    };
    emit(args.json, service.transfer(request).await)
}

pub async fn run_register(args: RegisterArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let request = RegisterRequest {
        token: args.token,
        child_token: args.child_token,
        operator: args.signer.operator,
    };
    emit(args.json, service.register(request).await)
}

pub async fn run_balance(args: BalanceArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    // an operator name stands in for its address
    let account = match (args.account, args.signer.operator.as_deref()) {
        (Some(account), _) => Some(account),
        (None, Some(name)) => {
            let operator = service
                .signers()
                .operators
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("unknown operator {name}"))?;
            Some(address_to_hex(operator.address))
        }
        (None, None) => None,
    };
    let result = service
        .balance(args.token.as_deref(), account.as_deref(), args.side)
        .await;
    emit(args.json, result)
}

pub async fn run_status(args: StatusArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &SignerArgs::default())?;
    emit(args.json, service.message_status(&args.tx_hash).await)
}
