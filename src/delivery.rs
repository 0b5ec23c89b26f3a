//! Webhook Delivery Envelope
//!
//! serde types for the two delivery shapes the upstream webhook provider
//! emits: per-log deliveries (`event.data.logs`) and full-block deliveries
//! (`event.data.block.logs`). Both shapes normalize to one log list. Each log
//! also yields a stable idempotency key (transaction hash, delivery index,
//! and a fingerprint of the log content) used by every audit insert and
//! aggregate mutation.

use alloy::primitives::keccak256;
use serde::{Deserialize, Serialize};

/// One inbound webhook delivery, stored verbatim by the ingestion endpoint
/// and read exactly once per processing attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDelivery {
    /// Unix timestamp (seconds) when the delivery was received.
    #[serde(default)]
    pub timestamp: Option<u64>,
    pub data: DeliveryData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryData {
    pub event: DeliveryEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryEvent {
    #[serde(default)]
    pub network: Option<String>,
    pub data: EventPayload,
}

/// Inner payload: either a flat log list or a block carrying its own logs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub logs: Option<Vec<RawLog>>,
    #[serde(default)]
    pub block: Option<BlockPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockPayload {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default)]
    pub logs: Option<Vec<RawLog>>,
}

/// One raw on-chain log inside a delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLog {
    /// 0x-prefixed 32-byte topic words; word 0 is the signature hash.
    #[serde(default)]
    pub topics: Vec<String>,
    /// 0x-prefixed concatenated non-indexed data blob.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub block: Option<LogBlock>,
    #[serde(default)]
    pub transaction: Option<LogTransaction>,
    #[serde(default)]
    pub account: Option<LogAccount>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogBlock {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub timestamp: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogTransaction {
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogAccount {
    #[serde(default)]
    pub address: Option<String>,
}

/// Per-log context carried into every handler: chain metadata plus the
/// idempotency key for audit inserts and aggregate mutations.
#[derive(Debug, Clone)]
pub struct LogMeta {
    pub block_number: Option<u64>,
    pub block_timestamp: Option<u64>,
    pub transaction_hash: Option<String>,
    pub contract_address: Option<String>,
    pub log_index: usize,
    pub event_key: String,
    /// True when the key had to be synthesized because the log carried no
    /// transaction hash.
    pub synthetic_key: bool,
}

impl RawDelivery {
    /// Normalized log list: per-log shape wins, then the block shape, then
    /// empty. A missing list is a no-op delivery, not an error.
    pub fn logs(&self) -> &[RawLog] {
        if let Some(logs) = &self.data.event.data.logs {
            return logs;
        }
        if let Some(block) = &self.data.event.data.block {
            if let Some(logs) = &block.logs {
                return logs;
            }
        }
        &[]
    }

    /// Build the handler context for the log at `index`, falling back to the
    /// enclosing block's metadata for full-block deliveries.
    pub fn log_meta(&self, log: &RawLog, index: usize) -> LogMeta {
        let delivery_block = self.data.event.data.block.as_ref();
        let block_number = log
            .block
            .as_ref()
            .and_then(|b| b.number)
            .or_else(|| delivery_block.and_then(|b| b.number));
        let block_timestamp = log
            .block
            .as_ref()
            .and_then(|b| b.timestamp)
            .or_else(|| delivery_block.and_then(|b| b.timestamp));

        let transaction_hash = log
            .transaction
            .as_ref()
            .and_then(|t| t.hash.as_deref())
            .map(|h| h.to_ascii_lowercase());
        let contract_address = log
            .account
            .as_ref()
            .and_then(|a| a.address.as_deref())
            .map(|a| a.to_ascii_lowercase());

        // Idempotency: the key must collide only for true redeliveries of the
        // same log. A transaction can emit several events (per-log deliveries
        // all sit at index 0), so the transaction hash alone is not
        // log-unique; a fingerprint of the log content is folded in.
        let fingerprint = log_fingerprint(log);
        let (event_key, synthetic_key) = match &transaction_hash {
            Some(hash) => (format!("{}:{}:{}", hash, index, fingerprint), false),
            None => (
                format!("ts{}:{}:{}", self.timestamp.unwrap_or(0), index, fingerprint),
                true,
            ),
        };

        LogMeta {
            block_number,
            block_timestamp,
            transaction_hash,
            contract_address,
            log_index: index,
            event_key,
            synthetic_key,
        }
    }
}

/// Short content hash over a log's topics and data, the log-unique component
/// of the idempotency key. Hex casing is normalized so differently cased
/// renderings of the same log fingerprint identically.
fn log_fingerprint(log: &RawLog) -> String {
    let mut preimage = Vec::new();
    for topic in &log.topics {
        preimage.extend_from_slice(topic.to_ascii_lowercase().as_bytes());
        preimage.push(b':');
    }
    if let Some(data) = &log.data {
        preimage.extend_from_slice(data.to_ascii_lowercase().as_bytes());
    }
    hex::encode(&keccak256(&preimage)[..4])
}
