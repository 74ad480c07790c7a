pub mod bridge;
pub mod operators;
pub mod serve;

use crate::arbitrum::ArbitrumBridger;
use crate::cli::{RpcArgs, SignerArgs};
use crate::config::Config;
use crate::flow::BridgeService;
use crate::outcome::{to_tuple, ErrorBody, Outcome};
use crate::signer::{load_signer, OperatorRegistry, SignerOptions, Signers};
use crate::types::BridgeResult;
use anyhow::Result;

pub fn load_signers(config: &Config, args: &SignerArgs) -> Result<Signers> {
    let default = load_signer(
        SignerOptions {
            private_key: args.private_key.as_deref(),
            private_key_env: args.private_key_env.as_deref(),
        },
        config,
    )?;
    let operators = match config.operators_file.as_deref() {
        Some(path) => OperatorRegistry::load(path)?,
        None => OperatorRegistry::default(),
    };
    if !operators.is_empty() {
        tracing::debug!(count = operators.len(), "operators loaded");
    }
    Ok(Signers {
        default,
        default_env: args
            .private_key_env
            .clone()
            .unwrap_or_else(|| config.signer_env()),
        operators,
    })
}

pub fn build_service(
    config: &Config,
    rpc: &RpcArgs,
    signer: &SignerArgs,
) -> Result<BridgeService<ArbitrumBridger>> {
    let parent_rpc = config.resolve_rpc(rpc.parent_rpc.as_deref(), "parent")?;
    let child_rpc = config.resolve_rpc(rpc.child_rpc.as_deref(), "child")?;
    let bridger = ArbitrumBridger::new(&parent_rpc, &child_rpc, config.arbitrum_network()?)?;
    tracing::debug!(%parent_rpc, %child_rpc, "rpc endpoints resolved");
    Ok(BridgeService::new(
        bridger,
        load_signers(config, signer)?,
        config.flow_settings()?,
    ))
}

/// Print an outcome; failures are printed too and turn into a non-zero exit.
pub fn emit(json: bool, result: BridgeResult<Outcome>) -> Result<()> {
    match (&result, json) {
        (Ok(outcome), false) => println!("{}", outcome.summary()),
        (Ok(_), true) => println!("{}", to_tuple(&result).1),
        (Err(err), true) => println!(
            "{}",
            serde_json::to_string_pretty(&ErrorBody::from(err)).unwrap_or_default()
        ),
        (Err(_), false) => {}
    }
    result.map(|_| ()).map_err(Into::into)
}
