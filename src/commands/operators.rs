use crate::cli::OperatorsArgs;
use crate::config::Config;
use crate::signer::OperatorRegistry;
use crate::types::address_to_hex;
use anyhow::{anyhow, Result};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperatorOutput {
    name: String,
    address: String,
    private_key_env: String,
}

/// Lists operators without ever printing key material.
pub fn run(args: OperatorsArgs, config: Config) -> Result<()> {
    let path = args
        .file
        .or(config.operators_file)
        .ok_or_else(|| anyhow!("no operators file configured (set --file or operators_file)"))?;
    let registry = OperatorRegistry::load(&path)?;
    let output: Vec<OperatorOutput> = registry
        .iter()
        .map(|operator| OperatorOutput {
            name: operator.name.clone(),
            address: address_to_hex(operator.address),
            private_key_env: operator.key_env.clone(),
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    for operator in output {
        println!(
            "{}\t{}\t(key from ${})",
            operator.name, operator.address, operator.private_key_env
        );
    }
    Ok(())
}
