//! Aggregate Documents
//!
//! Materialized projections stored one document per entity. All field names
//! are camelCase and form a stable contract with downstream readers. Unknown
//! fields flow through the flattened `extra` map so a write never drops data
//! another writer put there (merge semantics).

use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

fn zero() -> String {
    "0".to_string()
}

/// Lifecycle status names keyed by the on-chain status code.
pub fn campaign_status_name(code: u8) -> &'static str {
    match code {
        0 => "ACTIVE",
        1 => "SUCCESSFUL",
        2 => "FAILED",
        3 => "CANCELLED",
        _ => "UNKNOWN",
    }
}

fn default_status_text() -> String {
    campaign_status_name(0).to_string()
}

/// Per-campaign funding aggregate, keyed by the 32-byte campaign identifier.
///
/// Created implicitly by whichever handler touches the campaign first; never
/// deleted. The three cumulative fields are independent and monotonically
/// non-decreasing; per-token balances move by signed deltas but are clamped
/// at zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    #[serde(default = "zero")]
    pub total_contributions: String,
    #[serde(default = "zero")]
    pub total_refunds: String,
    #[serde(default = "zero")]
    pub total_claims: String,
    /// Token address -> non-negative decimal balance.
    #[serde(default)]
    pub balances: BTreeMap<String, String>,
    #[serde(default)]
    pub status: u8,
    #[serde(default)]
    pub status_reason: Option<u8>,
    #[serde(default = "default_status_text")]
    pub status_text: String,
    #[serde(default)]
    pub override_active: bool,
    #[serde(default)]
    pub override_set_by: Option<String>,
    #[serde(default)]
    pub creator: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub last_operation_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Campaign {
    fn default() -> Self {
        Self {
            total_contributions: zero(),
            total_refunds: zero(),
            total_claims: zero(),
            balances: BTreeMap::new(),
            status: 0,
            status_reason: None,
            status_text: default_status_text(),
            override_active: false,
            override_set_by: None,
            creator: None,
            contract_address: None,
            goal: None,
            deadline: None,
            last_operation_at: None,
            extra: Map::new(),
        }
    }
}

/// Per-campaign lending-yield record, keyed by campaign identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CampaignYield {
    pub token: Option<String>,
    #[serde(default = "zero")]
    pub deposit_amount: String,
    #[serde(default = "zero")]
    pub withdraw_amount: String,
    pub deposited: bool,
    pub withdrawn: bool,
    pub last_operation_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Manual impl so the in-memory default matches the deserialization default;
// a derived Default would leave the amount strings empty instead of "0".
impl Default for CampaignYield {
    fn default() -> Self {
        Self {
            token: None,
            deposit_amount: zero(),
            withdraw_amount: zero(),
            deposited: false,
            withdrawn: false,
            last_operation_at: None,
            extra: Map::new(),
        }
    }
}

/// Token registry entry, keyed by token address. Removed tokens are deleted
/// outright; re-adding recreates the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenRecord {
    pub supported: bool,
    pub decimals: u8,
    #[serde(default = "zero")]
    pub min_contribution: String,
    #[serde(default = "zero")]
    pub min_contribution_formatted: String,
    pub last_operation: Option<String>,
    pub last_updated_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for TokenRecord {
    fn default() -> Self {
        Self {
            supported: false,
            decimals: 0,
            min_contribution: zero(),
            min_contribution_formatted: zero(),
            last_operation: None,
            last_updated_at: None,
            extra: Map::new(),
        }
    }
}

/// Platform admin roster entry, keyed by admin address. Removal is a soft
/// delete: the flag flips, the document stays.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AdminRecord {
    pub active: bool,
    pub last_operation: Option<String>,
    pub last_updated_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Singleton fee configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeeConfig {
    pub treasury: Option<String>,
    pub platform_fee_bps: Option<String>,
    pub updated_by: Option<String>,
    pub last_updated_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Singleton lending-integration configuration. Which of the three address
/// fields an update targets is inferred by the heuristic in the defi handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefiConfig {
    pub lending_pool: Option<String>,
    pub token_registry: Option<String>,
    pub fee_manager: Option<String>,
    pub updated_by: Option<String>,
    pub last_updated_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authorization flag for a factory or campaign address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Authorization {
    pub authorized: bool,
    pub last_operation: Option<String>,
    pub last_updated_at: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deserialize an aggregate from a document body, synthesizing defaults for
/// a document that does not exist yet (first-touch creation).
pub fn from_body<T: DeserializeOwned>(
    body: &Map<String, Value>,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(Value::Object(body.clone()))
}

/// Serialize an aggregate back into a document body.
pub fn write_body<T: Serialize>(
    body: &mut Map<String, Value>,
    aggregate: &T,
) -> Result<(), serde_json::Error> {
    match serde_json::to_value(aggregate)? {
        Value::Object(map) => {
            *body = map;
            Ok(())
        }
        // Aggregates are always structs; anything else is a caller bug.
        other => {
            debug_assert!(false, "aggregate serialized to non-object: {:?}", other);
            Ok(())
        }
    }
}
