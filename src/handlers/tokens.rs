//! Token Registry Processor Handler
//!
//! Projects token add/remove/update operations into the token registry
//! collection. Removal is a hard delete; re-adding the token recreates its
//! document from scratch.

use alloy::primitives::U256;
use serde_json::json;
use tracing::warn;

use crate::aggregates::{from_body, write_body, TokenRecord};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::insert_audit;
use crate::store::{apply_once, collections, DocumentStore, StoreError};
use crate::units::format_units;

/// Token-registry operation codes: 1 add, 2 remove, 3 update.
pub fn token_operation_name(code: u8) -> &'static str {
    match code {
        1 => "ADDED",
        2 => "REMOVED",
        3 => "UPDATED",
        _ => "UNKNOWN",
    }
}

/// A token was added to, removed from, or updated in the registry.
#[derive(Debug, Clone)]
pub struct TokenRegistryOperation {
    pub token: String,
    pub op_code: u8,
    pub decimals: u8,
    pub min_contribution: U256,
    pub meta: LogMeta,
}

impl TokenRegistryOperation {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            token: decoded.address_string("token")?,
            op_code: decoded.uint_u8("opCode")?,
            decimals: decoded.uint_u8("decimals")?,
            min_contribution: decoded.uint("minContribution")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let operation = token_operation_name(self.op_code);
        insert_audit(
            store,
            collections::TOKEN_REGISTRY_EVENTS,
            "TokenRegistryOperation",
            &self.meta,
            json!({
                "token": self.token,
                "opCode": self.op_code,
                "operation": operation,
                "decimals": self.decimals,
                "minContribution": self.min_contribution.to_string(),
            }),
        )
        .await?;

        match self.op_code {
            2 => {
                store.delete(collections::TOKENS, &self.token).await?;
                Ok(())
            }
            1 | 3 => {
                let (decimals, raw, formatted, timestamp) = (
                    self.decimals,
                    self.min_contribution.to_string(),
                    format_units(self.min_contribution, self.decimals),
                    self.meta.block_timestamp,
                );
                apply_once(
                    store,
                    collections::TOKENS,
                    &self.token,
                    &self.meta.event_key,
                    |body| {
                        let mut record: TokenRecord = from_body(body)?;
                        record.supported = true;
                        record.decimals = decimals;
                        record.min_contribution = raw.clone();
                        record.min_contribution_formatted = formatted.clone();
                        record.last_operation = Some(operation.to_string());
                        if let Some(ts) = timestamp {
                            record.last_updated_at = Some(ts);
                        }
                        write_body(body, &record)?;
                        Ok(())
                    },
                )
                .await?;
                Ok(())
            }
            other => {
                warn!(token = %self.token, op_code = other, "unknown token operation code, registry untouched");
                Ok(())
            }
        }
    }
}
