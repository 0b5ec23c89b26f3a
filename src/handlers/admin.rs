//! Access Control Processor Handlers
//!
//! Projects platform admin roster changes and fee-collector authorization
//! grants. Admin removal is a soft delete so the roster keeps a history of
//! who ever held the role; authorizations flip a flag on the factory or
//! campaign document.

use serde_json::json;
use tracing::warn;

use crate::aggregates::{from_body, write_body, AdminRecord, Authorization};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::insert_audit;
use crate::store::{apply_once, collections, DocumentStore, StoreError};

/// Platform-admin operation codes: 1 add, 2 remove.
pub fn admin_operation_name(code: u8) -> &'static str {
    match code {
        1 => "ADDED",
        2 => "REMOVED",
        _ => "UNKNOWN",
    }
}

/// Collector operation codes spanning both authorization targets.
pub fn collector_operation_name(code: u8) -> &'static str {
    match code {
        1 => "FACTORY_AUTHORIZED",
        2 => "FACTORY_DEAUTHORIZED",
        3 => "CAMPAIGN_AUTHORIZED",
        4 => "CAMPAIGN_DEAUTHORIZED",
        _ => "UNKNOWN",
    }
}

/// An address was added to or removed from the platform admin roster.
#[derive(Debug, Clone)]
pub struct PlatformAdminOperation {
    pub admin: String,
    pub op_code: u8,
    pub meta: LogMeta,
}

impl PlatformAdminOperation {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            admin: decoded.address_string("admin")?,
            op_code: decoded.uint_u8("opCode")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let operation = admin_operation_name(self.op_code);
        insert_audit(
            store,
            collections::ADMIN_OPERATION_EVENTS,
            "PlatformAdminOperation",
            &self.meta,
            json!({
                "admin": self.admin,
                "opCode": self.op_code,
                "operation": operation,
            }),
        )
        .await?;

        let active = match self.op_code {
            1 => true,
            2 => false,
            other => {
                warn!(admin = %self.admin, op_code = other, "unknown admin operation code, roster untouched");
                return Ok(());
            }
        };

        let timestamp = self.meta.block_timestamp;
        apply_once(
            store,
            collections::ADMINS,
            &self.admin,
            &self.meta.event_key,
            |body| {
                let mut record: AdminRecord = from_body(body)?;
                record.active = active;
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
}

/// A factory or campaign address was (de)authorized for fee collection.
#[derive(Debug, Clone)]
pub struct CollectorOperation {
    pub target: String,
    pub op_code: u8,
    pub meta: LogMeta,
}

impl CollectorOperation {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            target: decoded.address_string("target")?,
            op_code: decoded.uint_u8("opCode")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        let operation = collector_operation_name(self.op_code);
        insert_audit(
            store,
            collections::COLLECTOR_OPERATION_EVENTS,
            "CollectorOperation",
            &self.meta,
            json!({
                "target": self.target,
                "opCode": self.op_code,
                "operation": operation,
            }),
        )
        .await?;

        let (collection, authorized) = match self.op_code {
            1 => (collections::FACTORY_AUTHORIZATIONS, true),
            2 => (collections::FACTORY_AUTHORIZATIONS, false),
            3 => (collections::CAMPAIGN_AUTHORIZATIONS, true),
            4 => (collections::CAMPAIGN_AUTHORIZATIONS, false),
            other => {
                warn!(target = %self.target, op_code = other, "unknown collector operation code, authorizations untouched");
                return Ok(());
            }
        };

        let timestamp = self.meta.block_timestamp;
        apply_once(store, collection, &self.target, &self.meta.event_key, |body| {
            let mut record: Authorization = from_body(body)?;
            record.authorized = authorized;
            record.last_operation = Some(operation.to_string());
            if let Some(ts) = timestamp {
                record.last_updated_at = Some(ts);
            }
            write_body(body, &record)?;
            Ok(())
        })
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const ADDR: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";

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

    fn admin_op(key: &str, code: u8) -> PlatformAdminOperation {
        PlatformAdminOperation {
            admin: ADDR.to_string(),
            op_code: code,
            meta: meta(key),
        }
    }

    fn collector_op(key: &str, code: u8) -> CollectorOperation {
        CollectorOperation {
            target: ADDR.to_string(),
            op_code: code,
            meta: meta(key),
        }
    }

    // ==================== operation name tests ====================

    #[test]
    fn test_admin_operation_names() {
        assert_eq!(admin_operation_name(1), "ADDED");
        assert_eq!(admin_operation_name(2), "REMOVED");
        assert_eq!(admin_operation_name(5), "UNKNOWN");
    }

    #[test]
    fn test_collector_operation_names() {
        assert_eq!(collector_operation_name(1), "FACTORY_AUTHORIZED");
        assert_eq!(collector_operation_name(2), "FACTORY_DEAUTHORIZED");
        assert_eq!(collector_operation_name(3), "CAMPAIGN_AUTHORIZED");
        assert_eq!(collector_operation_name(4), "CAMPAIGN_DEAUTHORIZED");
        assert_eq!(collector_operation_name(9), "UNKNOWN");
    }

    // ==================== admin roster tests ====================

    #[tokio::test]
    async fn test_admin_add_then_soft_remove() {
        let store = MemoryStore::new();
        admin_op("0xabc:0", 1).apply(&store).await.unwrap();

        let doc = store.document(collections::ADMINS, ADDR).unwrap();
        assert_eq!(doc["active"], true);
        assert_eq!(doc["lastOperation"], "ADDED");

        admin_op("0xabc:1", 2).apply(&store).await.unwrap();

        // Removal keeps the document, only the flag flips.
        let doc = store.document(collections::ADMINS, ADDR).unwrap();
        assert_eq!(doc["active"], false);
        assert_eq!(doc["lastOperation"], "REMOVED");
        assert_eq!(store.collection_len(collections::ADMIN_OPERATION_EVENTS), 2);
    }

    #[tokio::test]
    async fn test_unknown_admin_code_is_audit_only() {
        let store = MemoryStore::new();
        admin_op("0xabc:0", 9).apply(&store).await.unwrap();

        assert!(store.document(collections::ADMINS, ADDR).is_none());
        assert_eq!(store.collection_len(collections::ADMIN_OPERATION_EVENTS), 1);
    }

    // ==================== authorization tests ====================

    #[tokio::test]
    async fn test_factory_authorization_flips_flag() {
        let store = MemoryStore::new();
        collector_op("0xabc:0", 1).apply(&store).await.unwrap();

        let doc = store.document(collections::FACTORY_AUTHORIZATIONS, ADDR).unwrap();
        assert_eq!(doc["authorized"], true);

        collector_op("0xabc:1", 2).apply(&store).await.unwrap();
        let doc = store.document(collections::FACTORY_AUTHORIZATIONS, ADDR).unwrap();
        assert_eq!(doc["authorized"], false);
    }

    #[tokio::test]
    async fn test_campaign_authorization_uses_own_collection() {
        let store = MemoryStore::new();
        collector_op("0xabc:0", 3).apply(&store).await.unwrap();

        assert!(store.document(collections::CAMPAIGN_AUTHORIZATIONS, ADDR).is_some());
        assert!(store.document(collections::FACTORY_AUTHORIZATIONS, ADDR).is_none());
    }

    #[tokio::test]
    async fn test_redelivered_authorization_counts_once() {
        let store = MemoryStore::new();
        collector_op("0xabc:0", 1).apply(&store).await.unwrap();
        collector_op("0xabc:1", 2).apply(&store).await.unwrap();
        // Redelivery of the grant must not re-authorize.
        collector_op("0xabc:0", 1).apply(&store).await.unwrap();

        let doc = store.document(collections::FACTORY_AUTHORIZATIONS, ADDR).unwrap();
        assert_eq!(doc["authorized"], false);
    }
}
