//! Delivery Dispatcher
//!
//! Drives one webhook delivery through lookup, decode, and projection. Errors
//! are contained per log: an unknown signature or a malformed log is counted
//! and skipped without affecting its siblings. Store failures are collected
//! across the whole delivery and surfaced at the end so the worker can retry
//! the delivery; everything already applied stays idempotent on the retry.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::ProjectorConfig;
use crate::decoder::{decode_event, hex_to_bytes, parse_topic};
use crate::delivery::RawDelivery;
use crate::handlers::ProjectedEvent;
use crate::registry::lookup_event;
use crate::store::DocumentStore;

/// Errors that fail a whole delivery (per-log problems are counted, not
/// returned).
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("delivery processing exceeded {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("{failed} of {total} logs failed to persist (first: {first})")]
    StoreFailures {
        failed: usize,
        total: usize,
        first: String,
    },
}

impl DispatchError {
    /// Whether the worker should requeue the delivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::StoreFailures { .. })
    }
}

/// Per-delivery outcome counters, logged by the worker after each delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Logs present in the delivery.
    pub total_logs: usize,
    /// Logs whose signature hash matched a registered event kind.
    pub matched: usize,
    /// Logs decoded, projected, and persisted.
    pub applied: usize,
    /// Logs with an unregistered signature hash.
    pub skipped_unknown: usize,
    /// Logs that failed topic parsing or positional decoding.
    pub failed_decode: usize,
    /// Matched logs whose store writes failed.
    pub store_failures: usize,
}

/// Routes decoded logs to their projection handlers.
pub struct Dispatcher {
    store: Arc<dyn DocumentStore>,
    config: ProjectorConfig,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn DocumentStore>, config: ProjectorConfig) -> Self {
        Self { store, config }
    }

    /// Process one delivery under the configured timeout.
    ///
    /// A delivery with zero logs is a successful no-op. Ordering within the
    /// delivery is preserved; logs are applied sequentially.
    pub async fn process_delivery(
        &self,
        delivery: &RawDelivery,
    ) -> Result<DeliveryReport, DispatchError> {
        let timeout = self.config.delivery_timeout();
        match tokio::time::timeout(timeout, self.process_logs(delivery)).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout {
                timeout_ms: self.config.delivery_timeout_ms,
            }),
        }
    }

    async fn process_logs(&self, delivery: &RawDelivery) -> Result<DeliveryReport, DispatchError> {
        let logs = delivery.logs();
        let mut report = DeliveryReport {
            total_logs: logs.len(),
            ..Default::default()
        };
        let mut first_store_error: Option<String> = None;

        for (index, log) in logs.iter().enumerate() {
            let meta = delivery.log_meta(log, index);

            if log.topics.is_empty() {
                warn!(event_key = %meta.event_key, "log has no topics, skipping");
                report.failed_decode += 1;
                continue;
            }

            let topic0 = match parse_topic(&log.topics[0]) {
                Ok(topic) => topic,
                Err(err) => {
                    warn!(event_key = %meta.event_key, %err, "unparseable signature topic, skipping");
                    report.failed_decode += 1;
                    continue;
                }
            };

            let Some(kind) = lookup_event(&topic0) else {
                debug!(event_key = %meta.event_key, topic0 = %topic0, "unregistered signature, skipping");
                report.skipped_unknown += 1;
                continue;
            };
            report.matched += 1;

            let decoded = match self.decode_log(kind, log) {
                Ok(decoded) => decoded,
                Err(err) => {
                    warn!(
                        event = kind.name(),
                        event_key = %meta.event_key,
                        %err,
                        "log failed to decode, skipping"
                    );
                    report.failed_decode += 1;
                    continue;
                }
            };

            let event = match ProjectedEvent::from_decoded(&decoded, &meta) {
                Ok(event) => event,
                Err(err) => {
                    warn!(
                        event = kind.name(),
                        event_key = %meta.event_key,
                        %err,
                        "decoded log missing expected fields, skipping"
                    );
                    report.failed_decode += 1;
                    continue;
                }
            };

            // Siblings still run when one log's writes fail; the retry relies
            // on every write being idempotent.
            match event.apply(self.store.as_ref()).await {
                Ok(()) => report.applied += 1,
                Err(err) => {
                    error!(
                        event = kind.name(),
                        event_key = %meta.event_key,
                        %err,
                        "projection failed to persist"
                    );
                    report.store_failures += 1;
                    if first_store_error.is_none() {
                        first_store_error = Some(err.to_string());
                    }
                }
            }
        }

        match first_store_error {
            Some(first) => Err(DispatchError::StoreFailures {
                failed: report.store_failures,
                total: report.total_logs,
                first,
            }),
            None => Ok(report),
        }
    }

    fn decode_log(
        &self,
        kind: crate::registry::EventKind,
        log: &crate::delivery::RawLog,
    ) -> Result<crate::decoder::DecodedEvent, crate::decoder::DecodeError> {
        let topics = log
            .topics
            .iter()
            .map(|t| parse_topic(t))
            .collect::<Result<Vec<_>, _>>()?;
        let data = match &log.data {
            Some(hex) => hex_to_bytes(hex)?,
            None => Vec::new(),
        };
        decode_event(kind, &topics, &data)
    }
}
