//! Launchpad Projector Library
//!
//! This crate provides components for consuming queued webhook deliveries of
//! smart-contract logs, decoding them against the registered event catalogue,
//! and projecting them into idempotent read-model documents.

pub mod aggregates;
pub mod config;
pub mod decoder;
pub mod delivery;
pub mod dispatcher;
pub mod handlers;
pub mod redis_store;
pub mod registry;
pub mod store;
pub mod units;

// Re-export commonly used types
pub use config::ProjectorConfig;
pub use decoder::{decode_event, DecodedEvent};
pub use delivery::RawDelivery;
pub use dispatcher::{DeliveryReport, DispatchError, Dispatcher};
pub use redis_store::RedisStore;
pub use registry::{lookup_event, EventKind};
pub use store::{DocumentStore, MemoryStore, StoreError};
