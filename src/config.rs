use crate::approval::{ApprovalCeiling, ApprovalPolicy};
use crate::arbitrum::ArbitrumNetwork;
use crate::executor::GasPolicy;
use crate::flow::FlowSettings;
use crate::tracker::PollPolicy;
use crate::types::parse_address;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    pub parent: Option<ChainConfig>,
    pub child: Option<ChainConfig>,
    pub network: Option<NetworkConfig>,
    #[serde(default)]
    pub gas: GasConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    pub signer: Option<SignerConfig>,
    pub server: Option<ServerConfig>,
    pub operators_file: Option<PathBuf>,
    #[serde(skip)]
    pub path: PathBuf,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ChainConfig {
    pub rpc: String,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct NetworkConfig {
    pub parent_gateway_router: Option<String>,
    pub child_gateway_router: Option<String>,
    pub outbox: Option<String>,
    pub parent_custom_gateway: Option<String>,
    pub parent_token: Option<String>,
    pub child_token: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct GasConfig {
    pub parent_buffer_percent: u64,
    pub retryable_buffer_percent: u64,
    pub withdraw_buffer_percent: u64,
    pub transfer_buffer_percent: u64,
    pub approval: ApprovalCeiling,
    pub auto_approve: bool,
}

impl Default for GasConfig {
    fn default() -> Self {
        let gas = GasPolicy::default();
        Self {
            parent_buffer_percent: gas.parent_buffer_percent,
            retryable_buffer_percent: gas.retryable_buffer_percent,
            withdraw_buffer_percent: gas.withdraw_buffer_percent,
            transfer_buffer_percent: gas.transfer_buffer_percent,
            approval: ApprovalCeiling::Unlimited,
            auto_approve: true,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TrackingConfig {
    pub deposit_timeout_ms: u64,
    pub withdraw_timeout_ms: u64,
    pub poll_ms: u64,
    pub outbox_lookback_blocks: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            deposit_timeout_ms: 900_000,
            withdraw_timeout_ms: 60_000,
            poll_ms: 5_000,
            outbox_lookback_blocks: 100_000,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct SignerConfig {
    pub private_key_env: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub bind: Option<String>,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => default_config_path(),
        };

        if !path.exists() {
            let mut config = Self::default();
            config.path = path;
            return Ok(config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config = Self::parse(&contents)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.path = path;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn signer_env(&self) -> String {
        self.signer
            .as_ref()
            .and_then(|cfg| cfg.private_key_env.clone())
            .unwrap_or_else(|| "PRIVATE_KEY".to_string())
    }

    pub fn bind_address(&self) -> String {
        self.server
            .as_ref()
            .and_then(|cfg| cfg.bind.clone())
            .unwrap_or_else(|| "127.0.0.1:3000".to_string())
    }

    /// A flag wins over the config file.
    pub fn resolve_rpc(&self, flag: Option<&str>, side: &str) -> Result<String> {
        if let Some(rpc) = flag {
            return Ok(rpc.to_string());
        }
        let chain = match side {
            "parent" => self.parent.as_ref(),
            _ => self.child.as_ref(),
        };
        chain
            .map(|chain| chain.rpc.clone())
            .ok_or_else(|| anyhow::anyhow!("no {side} rpc configured (set --{side}-rpc or [{side}] rpc)"))
    }

    pub fn arbitrum_network(&self) -> Result<ArbitrumNetwork> {
        let network = self
            .network
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("missing [network] section in config"))?;
        Ok(ArbitrumNetwork {
            parent_gateway_router: required(&network.parent_gateway_router, "parent_gateway_router")?,
            child_gateway_router: required(&network.child_gateway_router, "child_gateway_router")?,
            outbox: required(&network.outbox, "outbox")?,
            parent_custom_gateway: optional(&network.parent_custom_gateway)?,
            outbox_lookback_blocks: self.tracking.outbox_lookback_blocks,
        })
    }

    pub fn flow_settings(&self) -> Result<FlowSettings> {
        let network = self.network.clone().unwrap_or_default();
        let poll = Duration::from_millis(self.tracking.poll_ms);
        Ok(FlowSettings {
            parent_token: optional(&network.parent_token)?,
            child_token: optional(&network.child_token)?,
            gas: GasPolicy {
                parent_buffer_percent: self.gas.parent_buffer_percent,
                retryable_buffer_percent: self.gas.retryable_buffer_percent,
                withdraw_buffer_percent: self.gas.withdraw_buffer_percent,
                transfer_buffer_percent: self.gas.transfer_buffer_percent,
            },
            approval: ApprovalPolicy {
                ceiling: self.gas.approval,
                auto_approve: self.gas.auto_approve,
            },
            deposit: PollPolicy {
                timeout: Duration::from_millis(self.tracking.deposit_timeout_ms),
                poll,
            },
            withdraw: PollPolicy {
                timeout: Duration::from_millis(self.tracking.withdraw_timeout_ms),
                poll,
            },
        })
    }
}

fn required(value: &Option<String>, name: &str) -> Result<Address> {
    let value = value
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("missing network.{name} in config"))?;
    parse_address(value).with_context(|| format!("network.{name}"))
}

fn optional(value: &Option<String>) -> Result<Option<Address>> {
    match value.as_deref() {
        Some(value) => Ok(Some(parse_address(value)?)),
        None => Ok(None),
    }
}

fn default_config_path() -> PathBuf {
    if let Some(dir) = dirs::config_dir() {
        return dir.join("arb-token-bridge").join("config.toml");
    }
    PathBuf::from("./config.toml")
}
