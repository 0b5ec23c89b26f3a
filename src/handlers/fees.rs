//! Fee Processor Handler
//!
//! Projects fee configuration changes into the singleton fee config. Unlike
//! the lending config, this event names old and new values for both fields
//! explicitly, so the update is a plain replace with no heuristic.

use alloy::primitives::U256;
use serde_json::json;

use crate::aggregates::{from_body, write_body, FeeConfig};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::insert_audit;
use crate::store::{apply_once, collections, DocumentStore, StoreError, SINGLETON_ID};

/// Treasury address and platform fee share changed.
#[derive(Debug, Clone)]
pub struct FeeConfigUpdated {
    pub updated_by: String,
    pub old_treasury: String,
    pub new_treasury: String,
    pub old_share_bps: U256,
    pub new_share_bps: U256,
    pub meta: LogMeta,
}

impl FeeConfigUpdated {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            updated_by: decoded.address_string("updatedBy")?,
            old_treasury: decoded.address_string("oldTreasury")?,
            new_treasury: decoded.address_string("newTreasury")?,
            old_share_bps: decoded.uint("oldShareBps")?,
            new_share_bps: decoded.uint("newShareBps")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        insert_audit(
            store,
            collections::FEE_OPERATION_EVENTS,
            "FeeConfigUpdated",
            &self.meta,
            json!({
                "updatedBy": self.updated_by,
                "oldTreasury": self.old_treasury,
                "newTreasury": self.new_treasury,
                "oldShareBps": self.old_share_bps.to_string(),
                "newShareBps": self.new_share_bps.to_string(),
            }),
        )
        .await?;

        let (updated_by, treasury, share, timestamp) = (
            self.updated_by.clone(),
            self.new_treasury.clone(),
            self.new_share_bps.to_string(),
            self.meta.block_timestamp,
        );
        apply_once(
            store,
            collections::FEE_CONFIG,
            SINGLETON_ID,
            &self.meta.event_key,
            |body| {
                let mut config: FeeConfig = from_body(body)?;
                config.treasury = Some(treasury.clone());
                config.platform_fee_bps = Some(share.clone());
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn meta(key: &str) -> LogMeta {
        LogMeta {
            block_number: Some(1),
            block_timestamp: Some(1_700_000_000),
            transaction_hash: Some("0xabc".to_string()),
            contract_address: None,
            log_index: 0,
            event_key: key.to_string(),
            synthetic_key: false,
        }
    }

    #[tokio::test]
    async fn test_fee_config_replace() {
        let store = MemoryStore::new();
        let ev = FeeConfigUpdated {
            updated_by: "0x1111111111111111111111111111111111111111".to_string(),
            old_treasury: "0x0000000000000000000000000000000000000000".to_string(),
            new_treasury: "0x3333333333333333333333333333333333333333".to_string(),
            old_share_bps: U256::ZERO,
            new_share_bps: U256::from(250u64),
            meta: meta("0xabc:0"),
        };
        ev.apply(&store).await.unwrap();

        let doc = store.document(collections::FEE_CONFIG, SINGLETON_ID).unwrap();
        assert_eq!(doc["treasury"], "0x3333333333333333333333333333333333333333");
        assert_eq!(doc["platformFeeBps"], "250");
        assert_eq!(doc["updatedBy"], "0x1111111111111111111111111111111111111111");
        assert_eq!(store.collection_len(collections::FEE_OPERATION_EVENTS), 1);
    }

    #[tokio::test]
    async fn test_fee_config_redelivery_is_idempotent() {
        let store = MemoryStore::new();
        let first = FeeConfigUpdated {
            updated_by: "0x1111111111111111111111111111111111111111".to_string(),
            old_treasury: "0x0000000000000000000000000000000000000000".to_string(),
            new_treasury: "0x3333333333333333333333333333333333333333".to_string(),
            old_share_bps: U256::ZERO,
            new_share_bps: U256::from(250u64),
            meta: meta("0xabc:0"),
        };
        first.apply(&store).await.unwrap();

        let second = FeeConfigUpdated {
            new_treasury: "0x4444444444444444444444444444444444444444".to_string(),
            new_share_bps: U256::from(300u64),
            meta: meta("0xabc:1"),
            ..first.clone()
        };
        second.apply(&store).await.unwrap();
        // Redelivery of the first event must not roll the config back.
        first.apply(&store).await.unwrap();

        let doc = store.document(collections::FEE_CONFIG, SINGLETON_ID).unwrap();
        assert_eq!(doc["treasury"], "0x4444444444444444444444444444444444444444");
        assert_eq!(doc["platformFeeBps"], "300");
    }
}
