use crate::commands;
use crate::config::Config;
use crate::types::ChainSide;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "arb-token-bridge",
    version,
    about = "Deposit, withdraw and claim ERC-20 tokens across an Arbitrum parent/child pair"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    #[command(flatten)]
    pub rpc: RpcArgs,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub async fn run(self, config: Config) -> Result<()> {
        let rpc = self.rpc;
        match self.command {
            Command::Deposit(args) => commands::bridge::run_deposit(args, config, rpc).await,
            Command::Withdraw(args) => commands::bridge::run_withdraw(args, config, rpc).await,
            Command::Claim(args) => commands::bridge::run_claim(args, config, rpc).await,
            Command::Transfer(args) => commands::bridge::run_transfer(args, config, rpc).await,
            Command::Register(args) => commands::bridge::run_register(args, config, rpc).await,
            Command::Balance(args) => commands::bridge::run_balance(args, config, rpc).await,
            Command::Status(args) => commands::bridge::run_status(args, config, rpc).await,
            Command::Serve(args) => commands::serve::run(args, config, rpc).await,
            Command::Operators(args) => commands::operators::run(args, config),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move tokens from the parent chain to the child chain.
    Deposit(DepositArgs),
    /// Start moving tokens from the child chain back to the parent chain.
    Withdraw(WithdrawArgs),
    /// Execute a confirmed withdrawal on the parent chain.
    Claim(ClaimArgs),
    /// Plain token transfer on the child chain.
    Transfer(TransferArgs),
    /// Register a custom parent/child token pair on the custom gateway.
    Register(RegisterArgs),
    Balance(BalanceArgs),
    /// Outbox status of a withdrawal transaction.
    Status(StatusArgs),
    /// Run the HTTP service.
    Serve(ServeArgs),
    /// List configured operators.
    Operators(OperatorsArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RpcArgs {
    #[arg(long, global = true)]
    pub parent_rpc: Option<String>,

    #[arg(long, global = true)]
    pub child_rpc: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct SignerArgs {
    /// Act as a named operator from the operators file.
    #[arg(long, conflicts_with_all = ["private_key", "private_key_env"])]
    pub operator: Option<String>,

    #[arg(long)]
    pub private_key: Option<String>,

    #[arg(long)]
    pub private_key_env: Option<String>,
}

#[derive(Args, Debug)]
pub struct DepositArgs {
    /// Amount in token units, e.g. `10` or `0.5`.
    pub amount: String,

    /// Parent-chain token (defaults to network.parent_token).
    #[arg(long)]
    pub token: Option<String>,

    /// Child-chain recipient (defaults to the signer).
    #[arg(long)]
    pub destination: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WithdrawArgs {
    pub amount: String,

    /// Parent-chain token being withdrawn.
    #[arg(long)]
    pub token: Option<String>,

    /// Parent-chain recipient (defaults to the signer).
    #[arg(long)]
    pub destination: Option<String>,

    /// Return after one outbox status check instead of waiting for
    /// confirmation.
    #[arg(long)]
    pub no_wait: bool,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ClaimArgs {
    /// Child transaction hash of the withdrawal.
    pub tx_hash: String,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    pub amount: String,

    #[arg(long)]
    pub to: String,

    /// Child-chain token (defaults to the configured or derived child token).
    #[arg(long)]
    pub token: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RegisterArgs {
    /// Child-chain token contract (defaults to network.child_token).
    #[arg(long)]
    pub child_token: Option<String>,

    /// Parent-chain token contract (defaults to network.parent_token).
    #[arg(long)]
    pub token: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct BalanceArgs {
    #[arg(long, default_value = "parent")]
    pub side: ChainSide,

    #[arg(long)]
    pub token: Option<String>,

    /// Defaults to the signer address.
    #[arg(long)]
    pub account: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    pub tx_hash: String,

    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on (defaults to server.bind).
    #[arg(long)]
    pub bind: Option<String>,

    #[command(flatten)]
    pub signer: SignerArgs,
}

#[derive(Args, Debug)]
pub struct OperatorsArgs {
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub json: bool,
}
