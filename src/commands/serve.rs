use crate::cli::{RpcArgs, ServeArgs};
use crate::commands::build_service;
use crate::config::Config;
use crate::server::start_server;
use anyhow::Result;
use std::sync::Arc;

pub async fn run(args: ServeArgs, config: Config, rpc: RpcArgs) -> Result<()> {
    let service = build_service(&config, &rpc, &args.signer)?;
    let bind = args.bind.unwrap_or_else(|| config.bind_address());
    start_server(&bind, Arc::new(service)).await
}
