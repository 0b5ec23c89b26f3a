//! Campaign Processor Handlers
//!
//! Projects the campaign lifecycle contract's events into the per-campaign
//! funding aggregate: cumulative contribution/refund/claim totals, lifecycle
//! status, the admin-override flag, and signed per-token balance movements.

use alloy::primitives::U256;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::aggregates::{campaign_status_name, from_body, write_body, Campaign};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::{insert_audit, token_decimals};
use crate::store::{apply_once, collections, DocumentStore, StoreError};
use crate::units::{add_amounts, format_units, sub_amount_clamped};

/// Funds-operation codes: 1 credits the balance, 2/3/4 debit it.
pub fn funds_operation_name(code: u8) -> &'static str {
    match code {
        1 => "DEPOSIT",
        2 => "WITHDRAW",
        3 => "REFUND",
        4 => "CLAIM",
        _ => "UNKNOWN",
    }
}

/// Which cumulative campaign field a monetary event feeds.
#[derive(Debug, Clone, Copy)]
enum CumulativeField {
    Contributions,
    Refunds,
    Claims,
}

/// Shared cumulative-sum upsert: read the campaign (or synthesize defaults),
/// add the delta to exactly one cumulative field, write back. The three
/// fields are independent; updating one must not perturb the others.
async fn apply_cumulative(
    store: &dyn DocumentStore,
    campaign_id: &str,
    event_key: &str,
    field: CumulativeField,
    amount: U256,
    timestamp: u64,
) -> Result<(), StoreError> {
    apply_once(store, collections::CAMPAIGNS, campaign_id, event_key, |body| {
        let mut campaign: Campaign = from_body(body)?;
        match field {
            CumulativeField::Contributions => {
                campaign.total_contributions = add_amounts(&campaign.total_contributions, amount);
            }
            CumulativeField::Refunds => {
                campaign.total_refunds = add_amounts(&campaign.total_refunds, amount);
            }
            CumulativeField::Claims => {
                campaign.total_claims = add_amounts(&campaign.total_claims, amount);
            }
        }
        campaign.last_operation_at = Some(timestamp);
        write_body(body, &campaign)?;
        Ok(())
    })
    .await?;
    Ok(())
}

/// A contribution was received for a campaign.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub campaign_id: String,
    pub contributor: String,
    pub token: String,
    pub amount: U256,
    pub timestamp: u64,
    pub meta: LogMeta,
}

impl Contribution {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            contributor: decoded.address_string("contributor")?,
            token: decoded.address_string("token")?,
            amount: decoded.uint("amount")?,
            timestamp: decoded.uint_u64("timestamp")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let decimals = token_decimals(store, &self.token).await?;
        insert_audit(
            store,
            collections::CONTRIBUTION_EVENTS,
            "ContributionReceived",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "contributor": self.contributor,
                "token": self.token,
                "amount": self.amount.to_string(),
                "amountFormatted": format_units(self.amount, decimals),
                "timestamp": self.timestamp,
            }),
        )
        .await?;

        apply_cumulative(
            store,
            &self.campaign_id,
            &self.meta.event_key,
            CumulativeField::Contributions,
            self.amount,
            self.timestamp,
        )
        .await
    }
}

/// A contribution was refunded.
#[derive(Debug, Clone)]
pub struct Refund {
    pub campaign_id: String,
    pub contributor: String,
    pub token: String,
    pub amount: U256,
    pub timestamp: u64,
    pub meta: LogMeta,
}

impl Refund {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            contributor: decoded.address_string("contributor")?,
            token: decoded.address_string("token")?,
            amount: decoded.uint("amount")?,
            timestamp: decoded.uint_u64("timestamp")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let decimals = token_decimals(store, &self.token).await?;
        insert_audit(
            store,
            collections::REFUND_EVENTS,
            "RefundIssued",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "contributor": self.contributor,
                "token": self.token,
                "amount": self.amount.to_string(),
                "amountFormatted": format_units(self.amount, decimals),
                "timestamp": self.timestamp,
            }),
        )
        .await?;

        apply_cumulative(
            store,
            &self.campaign_id,
            &self.meta.event_key,
            CumulativeField::Refunds,
            self.amount,
            self.timestamp,
        )
        .await
    }
}

/// Raised funds were claimed by the campaign owner.
#[derive(Debug, Clone)]
pub struct Claim {
    pub campaign_id: String,
    pub recipient: String,
    pub token: String,
    pub amount: U256,
    pub timestamp: u64,
    pub meta: LogMeta,
}

impl Claim {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            recipient: decoded.address_string("recipient")?,
            token: decoded.address_string("token")?,
            amount: decoded.uint("amount")?,
            timestamp: decoded.uint_u64("timestamp")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let decimals = token_decimals(store, &self.token).await?;
        insert_audit(
            store,
            collections::CLAIM_EVENTS,
            "FundsClaimed",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "recipient": self.recipient,
                "token": self.token,
                "amount": self.amount.to_string(),
                "amountFormatted": format_units(self.amount, decimals),
                "timestamp": self.timestamp,
            }),
        )
        .await?;

        apply_cumulative(
            store,
            &self.campaign_id,
            &self.meta.event_key,
            CumulativeField::Claims,
            self.amount,
            self.timestamp,
        )
        .await
    }
}

/// Campaign lifecycle status changed.
#[derive(Debug, Clone)]
pub struct StatusChange {
    pub campaign_id: String,
    pub new_status: u8,
    pub reason: u8,
    pub meta: LogMeta,
}

impl StatusChange {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            new_status: decoded.uint_u8("newStatus")?,
            reason: decoded.uint_u8("reason")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        insert_audit(
            store,
            collections::STATUS_CHANGE_EVENTS,
            "CampaignStatusChanged",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "newStatus": self.new_status,
                "reason": self.reason,
                "statusText": campaign_status_name(self.new_status),
            }),
        )
        .await?;

        let (new_status, reason) = (self.new_status, self.reason);
        apply_once(
            store,
            collections::CAMPAIGNS,
            &self.campaign_id,
            &self.meta.event_key,
            |body| {
                let mut campaign: Campaign = from_body(body)?;
                campaign.status = new_status;
                campaign.status_reason = Some(reason);
                campaign.status_text = campaign_status_name(new_status).to_string();
                write_body(body, &campaign)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}

/// Platform admin override toggled for a campaign.
#[derive(Debug, Clone)]
pub struct AdminOverride {
    pub campaign_id: String,
    pub admin: String,
    pub enabled: bool,
    pub meta: LogMeta,
}

impl AdminOverride {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            admin: decoded.address_string("admin")?,
            enabled: decoded.boolean("enabled")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        insert_audit(
            store,
            collections::ADMIN_OVERRIDE_EVENTS,
            "AdminOverrideSet",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "admin": self.admin,
                "enabled": self.enabled,
            }),
        )
        .await?;

        let (admin, enabled) = (self.admin.clone(), self.enabled);
        apply_once(
            store,
            collections::CAMPAIGNS,
            &self.campaign_id,
            &self.meta.event_key,
            |body| {
                let mut campaign: Campaign = from_body(body)?;
                campaign.override_active = enabled;
                campaign.override_set_by = Some(admin.clone());
                write_body(body, &campaign)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}

/// Coded funds movement against a campaign's per-token balance.
#[derive(Debug, Clone)]
pub struct FundsOperation {
    pub campaign_id: String,
    pub token: String,
    pub op_code: u8,
    pub amount: U256,
    pub meta: LogMeta,
}

impl FundsOperation {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            token: decoded.address_string("token")?,
            op_code: decoded.uint_u8("opCode")?,
            amount: decoded.uint("amount")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let operation = funds_operation_name(self.op_code);
        insert_audit(
            store,
            collections::FUNDS_OPERATION_EVENTS,
            "CampaignFundsOperation",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "token": self.token,
                "opCode": self.op_code,
                "operation": operation,
                "amount": self.amount.to_string(),
            }),
        )
        .await?;

        // Direction is determined purely by the operation code.
        let credit = match self.op_code {
            1 => true,
            2 | 3 | 4 => false,
            other => {
                warn!(
                    campaign_id = %self.campaign_id,
                    op_code = other,
                    "unknown funds operation code, balance untouched"
                );
                return Ok(());
            }
        };

        let (token, amount, campaign_id, timestamp) = (
            self.token.clone(),
            self.amount,
            self.campaign_id.clone(),
            self.meta.block_timestamp,
        );
        apply_once(
            store,
            collections::CAMPAIGNS,
            &self.campaign_id,
            &self.meta.event_key,
            move |body: &mut Map<String, Value>| {
                let mut campaign: Campaign = from_body(body)?;
                let balance = campaign.balances.entry(token.clone()).or_insert_with(|| "0".to_string());
                if credit {
                    *balance = add_amounts(balance, amount);
                } else {
                    let (next, clamped) = sub_amount_clamped(balance, amount);
                    if clamped {
                        warn!(
                            campaign_id = %campaign_id,
                            token = %token,
                            "debit exceeds tracked balance, clamping at zero"
                        );
                    }
                    *balance = next;
                }
                if let Some(ts) = timestamp {
                    campaign.last_operation_at = Some(ts);
                }
                write_body(body, &campaign)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}
