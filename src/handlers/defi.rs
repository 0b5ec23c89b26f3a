//! Lending-Yield Processor Handlers
//!
//! Projects lending-pool deposits/withdrawals into per-campaign yield records
//! and configuration-change events into the singleton lending-integration
//! config. The config handler infers which field changed by matching the
//! event's old value against the current configuration; the heuristic is
//! isolated in [`match_config_field`] so it can be replaced if the upstream
//! event ever grows an explicit field selector.

use alloy::primitives::U256;
use serde_json::json;
use tracing::warn;

use crate::aggregates::{from_body, write_body, CampaignYield, DefiConfig};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::insert_audit;
use crate::store::{apply_once, collections, DocumentStore, StoreError, SINGLETON_ID};
use crate::units::add_amounts;

/// Yield-operation codes: 1 deposit, 2 withdraw.
pub fn yield_operation_name(code: u8) -> &'static str {
    match code {
        1 => "DEPOSITED",
        2 => "WITHDRAWN",
        _ => "UNKNOWN",
    }
}

/// The three candidate fields of the lending-integration config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    LendingPool,
    TokenRegistry,
    FeeManager,
}

fn field_matches(current: &Option<String>, old_value: &str) -> bool {
    current
        .as_deref()
        .map_or(false, |value| value.eq_ignore_ascii_case(old_value))
}

fn field_empty(current: &Option<String>) -> bool {
    current.as_deref().map_or(true, str::is_empty)
}

/// Decide which config field an update targets.
///
/// Compares the event's old value against each field's current value
/// (case-insensitive), first match wins; falls back to the first empty field
/// for initial population. Ambiguous whenever two fields hold the same value;
/// kept behind this function until upstream carries an explicit selector.
pub fn match_config_field(config: &DefiConfig, old_value: &str) -> Option<ConfigField> {
    if field_matches(&config.lending_pool, old_value) {
        return Some(ConfigField::LendingPool);
    }
    if field_matches(&config.token_registry, old_value) {
        return Some(ConfigField::TokenRegistry);
    }
    if field_matches(&config.fee_manager, old_value) {
        return Some(ConfigField::FeeManager);
    }
    if field_empty(&config.lending_pool) {
        return Some(ConfigField::LendingPool);
    }
    if field_empty(&config.token_registry) {
        return Some(ConfigField::TokenRegistry);
    }
    if field_empty(&config.fee_manager) {
        return Some(ConfigField::FeeManager);
    }
    None
}

/// Deposit into or withdrawal from the lending pool for a campaign.
#[derive(Debug, Clone)]
pub struct YieldOperation {
    pub campaign_id: String,
    pub token: String,
    pub op_code: u8,
    pub amount: U256,
    pub meta: LogMeta,
}

impl YieldOperation {
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
        let operation = yield_operation_name(self.op_code);
        insert_audit(
            store,
            collections::DEFI_OPERATION_EVENTS,
            "YieldOperation",
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

        let deposit = match self.op_code {
            1 => true,
            2 => false,
            other => {
                warn!(
                    campaign_id = %self.campaign_id,
                    op_code = other,
                    "unknown yield operation code, record untouched"
                );
                return Ok(());
            }
        };

        let (token, amount, timestamp) =
            (self.token.clone(), self.amount, self.meta.block_timestamp);
        apply_once(
            store,
            collections::CAMPAIGN_YIELD,
            &self.campaign_id,
            &self.meta.event_key,
            |body| {
                let mut record: CampaignYield = from_body(body)?;
                record.token = Some(token.clone());
                if deposit {
                    record.deposit_amount = add_amounts(&record.deposit_amount, amount);
                    record.deposited = true;
                } else {
                    record.withdraw_amount = add_amounts(&record.withdraw_amount, amount);
                    record.withdrawn = true;
                }
                if let Some(ts) = timestamp {
                    record.last_operation_at = Some(ts);
                }
                write_body(body, &record)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}

/// A lending-integration configuration address changed.
#[derive(Debug, Clone)]
pub struct LendingConfigUpdated {
    pub updated_by: String,
    pub old_address: String,
    pub new_address: String,
    pub meta: LogMeta,
}

impl LendingConfigUpdated {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            updated_by: decoded.address_string("updatedBy")?,
            old_address: decoded.address_string("oldAddress")?,
            new_address: decoded.address_string("newAddress")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        insert_audit(
            store,
            collections::DEFI_OPERATION_EVENTS,
            "LendingConfigUpdated",
            &self.meta,
            json!({
                "updatedBy": self.updated_by,
                "oldAddress": self.old_address,
                "newAddress": self.new_address,
                "operation": "CONFIG_UPDATED",
            }),
        )
        .await?;

        let (updated_by, old_address, new_address, timestamp) = (
            self.updated_by.clone(),
            self.old_address.clone(),
            self.new_address.clone(),
            self.meta.block_timestamp,
        );
        apply_once(
            store,
            collections::DEFI_CONFIG,
            SINGLETON_ID,
            &self.meta.event_key,
            |body| {
                let mut config: DefiConfig = from_body(body)?;
                match match_config_field(&config, &old_address) {
                    Some(ConfigField::LendingPool) => {
                        config.lending_pool = Some(new_address.clone());
                    }
                    Some(ConfigField::TokenRegistry) => {
                        config.token_registry = Some(new_address.clone());
                    }
                    Some(ConfigField::FeeManager) => {
                        config.fee_manager = Some(new_address.clone());
                    }
                    None => {
                        warn!(
                            old_address = %old_address,
                            new_address = %new_address,
                            "no config field matches old value, config unchanged"
                        );
                    }
                }
                config.updated_by = Some(updated_by.clone());
                if let Some(ts) = timestamp {
                    config.last_updated_at = Some(ts);
                }
                write_body(body, &config)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}
