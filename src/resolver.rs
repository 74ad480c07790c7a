//! Token balance and decimals resolution, plus amount conversions.

use crate::bridger::Bridger;
use crate::error::BridgeError;
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{Address, U256};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSnapshot {
    pub side: ChainSide,
    pub token: Address,
    pub account: Address,
    pub decimals: u8,
    pub balance: U256,
}

impl TokenSnapshot {
    /// Fail before anything is submitted when `requested` exceeds the balance.
    pub fn ensure_sufficient(&self, requested: U256) -> BridgeResult<()> {
        if requested > self.balance {
            return Err(BridgeError::InsufficientBalance {
                side: self.side,
                token: self.token,
                account: self.account,
                requested,
                available: self.balance,
                decimals: self.decimals,
            });
        }
        Ok(())
    }

    pub fn format(&self, value: U256) -> String {
        format_units(value, u32::from(self.decimals))
    }
}

pub async fn resolve_token<B: Bridger + ?Sized>(
    bridger: &B,
    side: ChainSide,
    token: Address,
    account: Address,
) -> BridgeResult<TokenSnapshot> {
    if token == Address::ZERO {
        return Err(BridgeError::invalid("token address is missing"));
    }
    let decimals = bridger.decimals(side, token).await?;
    let balance = bridger.balance_of(side, token, account).await?;
    tracing::debug!(%side, %token, %account, decimals, %balance, "resolved token balance");
    Ok(TokenSnapshot {
        side,
        token,
        account,
        decimals,
        balance,
    })
}

/// Parse a human-readable decimal token amount into base units.
///
/// Enforces that fractional digits do not exceed the token decimals.
pub fn parse_amount(amount: &str, decimals: u8) -> BridgeResult<U256> {
    let decimals = u32::from(decimals);
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::invalid("token amount is missing"));
    }
    let mut parts = trimmed.split('.');
    let whole_part = parts.next().unwrap_or("0");
    let fraction_part = parts.next();
    if parts.next().is_some() || !is_digits(whole_part) {
        return Err(BridgeError::invalid(format!("invalid amount {amount}")));
    }

    let whole = if whole_part.is_empty() {
        U256::ZERO
    } else {
        parse_digits(whole_part, amount)?
    };
    let base = pow10(decimals)?;
    let mut value = whole
        .checked_mul(base)
        .ok_or_else(|| BridgeError::invalid("amount overflow"))?;

    if let Some(fraction_part) = fraction_part {
        if !is_digits(fraction_part) {
            return Err(BridgeError::invalid(format!("invalid amount {amount}")));
        }
        if fraction_part.len() > decimals as usize {
            return Err(BridgeError::invalid(format!(
                "amount has too many decimal places (max {decimals})"
            )));
        }
        if !fraction_part.is_empty() {
            let fraction = parse_digits(fraction_part, amount)?;
            let scale = pow10(decimals - fraction_part.len() as u32)?;
            value = fraction
                .checked_mul(scale)
                .and_then(|fraction| value.checked_add(fraction))
                .ok_or_else(|| BridgeError::invalid("amount overflow"))?;
        }
    }

    if value.is_zero() {
        return Err(BridgeError::invalid("amount must be greater than zero"));
    }
    Ok(value)
}

fn is_digits(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_digit())
}

fn parse_digits(value: &str, amount: &str) -> BridgeResult<U256> {
    U256::from_str_radix(value, 10)
        .map_err(|err| BridgeError::invalid(format!("invalid amount {amount}: {err}")))
}

/// Compute 10^exp with overflow protection.
fn pow10(exp: u32) -> BridgeResult<U256> {
    let mut value = U256::from(1u64);
    for _ in 0..exp {
        value = value
            .checked_mul(U256::from(10u64))
            .ok_or_else(|| BridgeError::invalid("amount overflow"))?;
    }
    Ok(value)
}

/// Format a token value with the given decimals.
pub fn format_units(value: U256, decimals: u32) -> String {
    if decimals == 0 {
        return value.to_string();
    }
    let mut digits = value.to_string();
    if digits.len() <= decimals as usize {
        let zeros = "0".repeat(decimals as usize + 1 - digits.len());
        digits = format!("{zeros}{digits}");
    }
    let split = digits.len() - decimals as usize;
    let mut out = format!("{}.{}", &digits[..split], &digits[split..]);
    while out.ends_with('0') {
        out.pop();
    }
    if out.ends_with('.') {
        out.pop();
    }
    out
}
