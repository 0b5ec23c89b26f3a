//! Per-Kind Projection Handlers
//!
//! One variant per event kind with a uniform contract: build from a decoded
//! event plus log metadata, then `apply` against the document store. Every
//! apply inserts one immutable audit record and performs zero to two
//! idempotent aggregate upserts. One file per upstream processor.

pub mod admin;
pub mod campaign;
pub mod defi;
pub mod factory;
pub mod fees;
pub mod tokens;

use serde_json::{json, Value};
use tracing::debug;

use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::registry::EventKind;
use crate::store::{DocumentStore, StoreError};
use crate::units::DEFAULT_TOKEN_DECIMALS;

/// Sum type over every event kind the pipeline projects.
#[derive(Debug, Clone)]
pub enum ProjectedEvent {
    Contribution(campaign::Contribution),
    Refund(campaign::Refund),
    Claim(campaign::Claim),
    StatusChange(campaign::StatusChange),
    AdminOverride(campaign::AdminOverride),
    FundsOperation(campaign::FundsOperation),
    CampaignCreated(factory::CampaignCreated),
    YieldOperation(defi::YieldOperation),
    LendingConfigUpdated(defi::LendingConfigUpdated),
    FeeConfigUpdated(fees::FeeConfigUpdated),
    TokenRegistryOperation(tokens::TokenRegistryOperation),
    PlatformAdminOperation(admin::PlatformAdminOperation),
    CollectorOperation(admin::CollectorOperation),
}

impl ProjectedEvent {
    /// Build the typed event for a decoded log.
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(match decoded.kind {
            EventKind::ContributionReceived => {
                Self::Contribution(campaign::Contribution::from_decoded(decoded, meta)?)
            }
            EventKind::RefundIssued => Self::Refund(campaign::Refund::from_decoded(decoded, meta)?),
            EventKind::FundsClaimed => Self::Claim(campaign::Claim::from_decoded(decoded, meta)?),
            EventKind::CampaignStatusChanged => {
                Self::StatusChange(campaign::StatusChange::from_decoded(decoded, meta)?)
            }
            EventKind::AdminOverrideSet => {
                Self::AdminOverride(campaign::AdminOverride::from_decoded(decoded, meta)?)
            }
            EventKind::CampaignFundsOperation => {
                Self::FundsOperation(campaign::FundsOperation::from_decoded(decoded, meta)?)
            }
            EventKind::CampaignCreated => {
                Self::CampaignCreated(factory::CampaignCreated::from_decoded(decoded, meta)?)
            }
            EventKind::YieldOperation => {
                Self::YieldOperation(defi::YieldOperation::from_decoded(decoded, meta)?)
            }
            EventKind::LendingConfigUpdated => {
                Self::LendingConfigUpdated(defi::LendingConfigUpdated::from_decoded(decoded, meta)?)
            }
            EventKind::FeeConfigUpdated => {
                Self::FeeConfigUpdated(fees::FeeConfigUpdated::from_decoded(decoded, meta)?)
            }
            EventKind::TokenRegistryOperation => {
                Self::TokenRegistryOperation(tokens::TokenRegistryOperation::from_decoded(
                    decoded, meta,
                )?)
            }
            EventKind::PlatformAdminOperation => {
                Self::PlatformAdminOperation(admin::PlatformAdminOperation::from_decoded(
                    decoded, meta,
                )?)
            }
            EventKind::CollectorOperation => {
                Self::CollectorOperation(admin::CollectorOperation::from_decoded(decoded, meta)?)
            }
        })
    }

    /// Write the audit record and aggregate updates for this event.
    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        match self {
            Self::Contribution(ev) => ev.apply(store).await,
            Self::Refund(ev) => ev.apply(store).await,
            Self::Claim(ev) => ev.apply(store).await,
            Self::StatusChange(ev) => ev.apply(store).await,
            Self::AdminOverride(ev) => ev.apply(store).await,
            Self::FundsOperation(ev) => ev.apply(store).await,
            Self::CampaignCreated(ev) => ev.apply(store).await,
            Self::YieldOperation(ev) => ev.apply(store).await,
            Self::LendingConfigUpdated(ev) => ev.apply(store).await,
            Self::FeeConfigUpdated(ev) => ev.apply(store).await,
            Self::TokenRegistryOperation(ev) => ev.apply(store).await,
            Self::PlatformAdminOperation(ev) => ev.apply(store).await,
            Self::CollectorOperation(ev) => ev.apply(store).await,
        }
    }
}

/// Insert one immutable audit record keyed by the event's idempotency key.
///
/// A duplicate key means the log was redelivered; the existing record wins
/// and the insert is a logged no-op.
pub(crate) async fn insert_audit(
    store: &dyn DocumentStore,
    collection: &str,
    event: &'static str,
    meta: &LogMeta,
    fields: Value,
) -> Result<(), StoreError> {
    let mut doc = json!({
        "eventKey": meta.event_key,
        "event": event,
        "blockNumber": meta.block_number,
        "blockTimestamp": meta.block_timestamp,
        "transactionHash": meta.transaction_hash,
        "contractAddress": meta.contract_address,
        "logIndex": meta.log_index,
        "syntheticKey": meta.synthetic_key,
    });
    if let (Value::Object(doc_map), Value::Object(field_map)) = (&mut doc, fields) {
        doc_map.extend(field_map);
    }

    let created = store.insert(collection, &meta.event_key, doc).await?;
    if !created {
        debug!(collection, event_key = %meta.event_key, "audit record already present, skipping");
    }
    Ok(())
}

/// Look up a token's decimals from the registry aggregate, defaulting to 18
/// when the token has no record.
pub(crate) async fn token_decimals(
    store: &dyn DocumentStore,
    token: &str,
) -> Result<u8, StoreError> {
    let doc = store.get(crate::store::collections::TOKENS, token).await?;
    Ok(doc
        .as_ref()
        .and_then(|d| d.get("decimals"))
        .and_then(Value::as_u64)
        .and_then(|d| u8::try_from(d).ok())
        .unwrap_or(DEFAULT_TOKEN_DECIMALS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{collections, MemoryStore};
    use serde_json::json;

    fn meta() -> LogMeta {
        LogMeta {
            block_number: Some(100),
            block_timestamp: Some(1_700_000_000),
            transaction_hash: Some("0xabc".to_string()),
            contract_address: Some("0xdef".to_string()),
            log_index: 0,
            event_key: "0xabc:0".to_string(),
            synthetic_key: false,
        }
    }

    // ==================== insert_audit tests ====================

    #[tokio::test]
    async fn test_insert_audit_writes_envelope_and_fields() {
        let store = MemoryStore::new();
        insert_audit(
            &store,
            collections::CONTRIBUTION_EVENTS,
            "ContributionReceived",
            &meta(),
            json!({"amount": "1000"}),
        )
        .await
        .unwrap();

        let doc = store.document(collections::CONTRIBUTION_EVENTS, "0xabc:0").unwrap();
        assert_eq!(doc["event"], "ContributionReceived");
        assert_eq!(doc["amount"], "1000");
        assert_eq!(doc["blockNumber"], 100);
        assert_eq!(doc["syntheticKey"], false);
    }

    #[tokio::test]
    async fn test_insert_audit_redelivery_keeps_first_record() {
        let store = MemoryStore::new();
        let m = meta();
        insert_audit(&store, collections::CONTRIBUTION_EVENTS, "ContributionReceived", &m, json!({"amount": "1"}))
            .await
            .unwrap();
        insert_audit(&store, collections::CONTRIBUTION_EVENTS, "ContributionReceived", &m, json!({"amount": "2"}))
            .await
            .unwrap();

        assert_eq!(store.collection_len(collections::CONTRIBUTION_EVENTS), 1);
        let doc = store.document(collections::CONTRIBUTION_EVENTS, "0xabc:0").unwrap();
        assert_eq!(doc["amount"], "1");
    }

    // ==================== token_decimals tests ====================

    #[tokio::test]
    async fn test_token_decimals_defaults_to_eighteen() {
        let store = MemoryStore::new();
        assert_eq!(token_decimals(&store, "0xnotoken").await.unwrap(), 18);
    }

    #[tokio::test]
    async fn test_token_decimals_reads_record() {
        let store = MemoryStore::new();
        store
            .insert(collections::TOKENS, "0xt", json!({"decimals": 6}))
            .await
            .unwrap();
        assert_eq!(token_decimals(&store, "0xt").await.unwrap(), 6);
    }
}
