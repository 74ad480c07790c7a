use crate::abi::{decode_event, encode_approve, Approval};
use crate::bridger::{Bridger, TxPlan};
use crate::error::BridgeError;
use crate::types::{BridgeResult, ChainSide};
use alloy_primitives::{Address, B256, U256};
use alloy_signer_local::PrivateKeySigner;
use serde::{Deserialize, Serialize};

/// How much allowance an approval grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalCeiling {
    #[default]
    Unlimited,
    Exact,
}

impl ApprovalCeiling {
    pub fn amount(self, required: U256) -> U256 {
        match self {
            Self::Unlimited => U256::MAX,
            Self::Exact => required,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ApprovalPolicy {
    pub ceiling: ApprovalCeiling,
    pub auto_approve: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "approval", rename_all = "camelCase")]
pub enum ApprovalOutcome {
    Sufficient,
    #[serde(rename_all = "camelCase")]
    Approved { tx_hash: B256, amount: U256 },
}

/// Make sure `spender` may pull `required` of `token` from the signer.
///
/// An allowance that already covers the amount submits nothing.
pub async fn ensure_allowance<B: Bridger + ?Sized>(
    bridger: &B,
    signer: &PrivateKeySigner,
    side: ChainSide,
    token: Address,
    spender: Address,
    required: U256,
    policy: ApprovalPolicy,
) -> BridgeResult<ApprovalOutcome> {
    let owner = signer.address();
    let allowance = bridger.allowance(side, token, owner, spender).await?;
    if allowance >= required {
        tracing::debug!(%token, %spender, %allowance, "allowance already covers amount");
        return Ok(ApprovalOutcome::Sufficient);
    }
    if !policy.auto_approve {
        return Err(BridgeError::ApprovalRequired {
            token,
            spender,
            allowance,
            required,
        });
    }

    let amount = policy.ceiling.amount(required);
    tracing::info!(%token, %spender, %amount, "submitting approval");
    let receipt = bridger
        .send(side, signer, TxPlan::call(token, encode_approve(spender, amount)))
        .await?;
    if !receipt.success {
        return Err(BridgeError::TransactionReverted {
            tx_hash: receipt.hash,
        });
    }

    let approved = receipt
        .logs
        .iter()
        .filter(|log| log.address == token)
        .filter_map(|log| decode_event::<Approval>(&log.data))
        .any(|event| event.owner == owner && event.spender == spender);
    if !approved {
        return Err(BridgeError::ApprovalLogMissing {
            tx_hash: receipt.hash,
        });
    }
    Ok(ApprovalOutcome::Approved {
        tx_hash: receipt.hash,
        amount,
    })
}
