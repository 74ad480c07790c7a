use crate::error::BridgeError;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Which of the two connected chains a read or write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainSide {
    Parent,
    Child,
}

impl ChainSide {
    pub fn other(self) -> Self {
        match self {
            Self::Parent => Self::Child,
            Self::Child => Self::Parent,
        }
    }
}

impl fmt::Display for ChainSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => f.write_str("parent"),
            Self::Child => f.write_str("child"),
        }
    }
}

impl FromStr for ChainSide {
    type Err = BridgeError;

    fn from_str(value: &str) -> BridgeResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "parent" | "l1" | "l2" => Ok(Self::Parent),
            "child" | "l3" => Ok(Self::Child),
            other => Err(BridgeError::invalid(format!(
                "invalid chain side {other} (expected parent or child)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdraw,
    Claim,
    Transfer,
    Register,
}

impl Direction {
    pub fn source(self) -> ChainSide {
        match self {
            Self::Deposit | Self::Register => ChainSide::Parent,
            Self::Withdraw | Self::Transfer => ChainSide::Child,
            // a claim executes on the parent a message sent from the child
            Self::Claim => ChainSide::Child,
        }
    }

    pub fn destination(self) -> ChainSide {
        match self {
            Self::Deposit | Self::Claim | Self::Withdraw | Self::Register => {
                self.source().other()
            }
            Self::Transfer => ChainSide::Child,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Deposit => "deposit",
            Self::Withdraw => "withdraw",
            Self::Claim => "claim",
            Self::Transfer => "transfer",
            Self::Register => "register",
        };
        f.write_str(name)
    }
}

/// One user-initiated bridge action, fixed once its transaction is built.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeOperation {
    pub direction: Direction,
    pub source: ChainSide,
    pub destination: ChainSide,
    pub token: Address,
    pub amount: U256,
    pub sender: Address,
    pub beneficiary: Address,
}

impl BridgeOperation {
    pub fn new(
        direction: Direction,
        token: Address,
        amount: U256,
        sender: Address,
        beneficiary: Address,
    ) -> Self {
        Self {
            direction,
            source: direction.source(),
            destination: direction.destination(),
            token,
            amount,
            sender,
            beneficiary,
        }
    }
}

pub fn parse_address(value: &str) -> BridgeResult<Address> {
    Address::from_str(value.trim())
        .map_err(|err| BridgeError::invalid(format!("invalid address {value}: {err}")))
}

pub fn parse_b256(value: &str) -> BridgeResult<B256> {
    B256::from_str(value.trim())
        .map_err(|err| BridgeError::invalid(format!("invalid bytes32 {value}: {err}")))
}

/// Parse a hex quantity as returned by JSON-RPC (`"0x1a"`).
pub fn parse_hex_u64(value: &str) -> BridgeResult<u64> {
    let trimmed = value.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    u64::from_str_radix(digits, 16)
        .map_err(|err| BridgeError::invalid(format!("invalid hex quantity {value}: {err}")))
}

pub fn address_to_hex(value: Address) -> String {
    format!("{value:#x}")
}
