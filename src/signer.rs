use crate::config::Config;
use crate::error::BridgeError;
use crate::types::{parse_address, BridgeResult};
use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub struct SignerOptions<'a> {
    pub private_key: Option<&'a str>,
    pub private_key_env: Option<&'a str>,
}

pub fn load_signer(options: SignerOptions<'_>, config: &Config) -> Result<Option<PrivateKeySigner>> {
    if options.private_key.is_some() && options.private_key_env.is_some() {
        anyhow::bail!("cannot set both --private-key and --private-key-env");
    }

    let env = options
        .private_key_env
        .map(|value| value.to_string())
        .unwrap_or_else(|| config.signer_env());

    if let Some(key) = options.private_key {
        return Ok(Some(load_wallet(key)?));
    }
    if let Ok(key) = std::env::var(env) {
        return Ok(Some(load_wallet(&key)?));
    }
    Ok(None)
}

fn load_wallet(key: &str) -> Result<PrivateKeySigner> {
    let pk_signer: PrivateKeySigner = key
        .trim()
        .parse()
        .map_err(|err| anyhow!("invalid private key: {err}"))?;
    Ok(pk_signer)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperatorEntry {
    name: String,
    address: String,
    private_key_env: Option<String>,
    private_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperatorsFile {
    operators: Vec<OperatorEntry>,
}

/// A named account the service may sign for.
#[derive(Debug, Clone)]
pub struct Operator {
    pub name: String,
    pub address: Address,
    pub key_env: String,
    signer: PrivateKeySigner,
}

impl Operator {
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    operators: BTreeMap<String, Operator>,
}

impl OperatorRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read operators file {}", path.display()))?;
        Self::from_json(&contents, |name| std::env::var(name).ok())
            .with_context(|| format!("invalid operators file {}", path.display()))
    }

    /// Parse an operators file, resolving each key through `lookup`.
    pub fn from_json(contents: &str, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: OperatorsFile = serde_json::from_str(contents)?;
        let mut operators = BTreeMap::new();
        for entry in file.operators {
            if entry.private_key.is_some() {
                anyhow::bail!(
                    "operator {} embeds a private key; reference an environment variable with privateKeyEnv instead",
                    entry.name
                );
            }
            let key_env = entry
                .private_key_env
                .ok_or_else(|| anyhow!("operator {} is missing privateKeyEnv", entry.name))?;
            let key = lookup(&key_env)
                .ok_or_else(|| anyhow!("operator {}: {key_env} is not set", entry.name))?;
            let signer = load_wallet(&key).with_context(|| format!("operator {}", entry.name))?;
            let address = parse_address(&entry.address)?;
            if signer.address() != address {
                anyhow::bail!(
                    "operator {}: key in {key_env} belongs to {:#x}, not {address:#x}",
                    entry.name,
                    signer.address()
                );
            }
            if operators.contains_key(&entry.name) {
                anyhow::bail!("duplicate operator {}", entry.name);
            }
            operators.insert(
                entry.name.clone(),
                Operator {
                    name: entry.name,
                    address,
                    key_env,
                    signer,
                },
            );
        }
        Ok(Self { operators })
    }

    pub fn get(&self, name: &str) -> Option<&Operator> {
        self.operators.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operator> {
        self.operators.values()
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

/// Every identity a request may act as.
#[derive(Debug, Clone, Default)]
pub struct Signers {
    pub default: Option<PrivateKeySigner>,
    pub default_env: String,
    pub operators: OperatorRegistry,
}

impl Signers {
    pub fn resolve(&self, operator: Option<&str>) -> BridgeResult<&PrivateKeySigner> {
        match operator.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => self
                .operators
                .get(name)
                .map(Operator::signer)
                .ok_or_else(|| BridgeError::UnknownOperator(name.to_string())),
            None => self.default.as_ref().ok_or_else(|| BridgeError::MissingSigner {
                env: self.default_env.clone(),
            }),
        }
    }
}
