//! Event Signature Registry
//!
//! Maps the keccak256 hash of each event's canonical text signature (topic 0)
//! to an event kind and its decoding schema. Built once at startup; lookup is
//! exact 32-byte match. Unrecognized hashes are not an error; they belong to
//! contracts or versions this pipeline does not understand.

use std::collections::HashMap;
use std::sync::LazyLock;

use alloy::primitives::{keccak256, B256};

use crate::decoder::{EventSchema, Param, ParamType};

/// The event kinds this pipeline projects, across the six upstream processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Campaign processor: a contribution was received.
    ContributionReceived,
    /// Campaign processor: a contribution was refunded.
    RefundIssued,
    /// Campaign processor: raised funds were claimed.
    FundsClaimed,
    /// Campaign processor: campaign lifecycle status changed.
    CampaignStatusChanged,
    /// Campaign processor: platform admin override toggled.
    AdminOverrideSet,
    /// Campaign processor: coded funds movement against a campaign balance.
    CampaignFundsOperation,
    /// Factory processor: a new campaign contract was deployed.
    CampaignCreated,
    /// Lending-yield processor: deposit into / withdrawal from the lending pool.
    YieldOperation,
    /// Lending-yield processor: integration configuration address changed.
    LendingConfigUpdated,
    /// Fee processor: treasury and platform fee share changed.
    FeeConfigUpdated,
    /// Token registry processor: coded token add/remove/update.
    TokenRegistryOperation,
    /// Platform admin processor: coded admin roster mutation.
    PlatformAdminOperation,
    /// Platform admin processor: coded collector authorization mutation.
    CollectorOperation,
}

const CONTRIBUTION_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "contributor", ty: ParamType::Address },
        Param { name: "token", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "amount", ty: ParamType::Uint256 },
        Param { name: "timestamp", ty: ParamType::Uint256 },
    ],
};

const REFUND_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "contributor", ty: ParamType::Address },
        Param { name: "token", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "amount", ty: ParamType::Uint256 },
        Param { name: "timestamp", ty: ParamType::Uint256 },
    ],
};

const CLAIM_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "recipient", ty: ParamType::Address },
        Param { name: "token", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "amount", ty: ParamType::Uint256 },
        Param { name: "timestamp", ty: ParamType::Uint256 },
    ],
};

const STATUS_CHANGE_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "campaignId", ty: ParamType::Bytes32 }],
    data: &[
        Param { name: "newStatus", ty: ParamType::Uint8 },
        Param { name: "reason", ty: ParamType::Uint8 },
    ],
};

const ADMIN_OVERRIDE_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "admin", ty: ParamType::Address },
        Param { name: "enabled", ty: ParamType::Bool },
    ],
    data: &[],
};

const FUNDS_OPERATION_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "token", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "opCode", ty: ParamType::Uint8 },
        Param { name: "amount", ty: ParamType::Uint256 },
    ],
};

const CAMPAIGN_CREATED_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "creator", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "campaignAddress", ty: ParamType::Address },
        Param { name: "goal", ty: ParamType::Uint256 },
        Param { name: "deadline", ty: ParamType::Uint256 },
    ],
};

const YIELD_OPERATION_SCHEMA: EventSchema = EventSchema {
    indexed: &[
        Param { name: "campaignId", ty: ParamType::Bytes32 },
        Param { name: "token", ty: ParamType::Address },
    ],
    data: &[
        Param { name: "opCode", ty: ParamType::Uint8 },
        Param { name: "amount", ty: ParamType::Uint256 },
    ],
};

const LENDING_CONFIG_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "updatedBy", ty: ParamType::Address }],
    data: &[
        Param { name: "oldAddress", ty: ParamType::Address },
        Param { name: "newAddress", ty: ParamType::Address },
    ],
};

const FEE_CONFIG_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "updatedBy", ty: ParamType::Address }],
    data: &[
        Param { name: "oldTreasury", ty: ParamType::Address },
        Param { name: "newTreasury", ty: ParamType::Address },
        Param { name: "oldShareBps", ty: ParamType::Uint256 },
        Param { name: "newShareBps", ty: ParamType::Uint256 },
    ],
};

const TOKEN_REGISTRY_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "token", ty: ParamType::Address }],
    data: &[
        Param { name: "opCode", ty: ParamType::Uint8 },
        Param { name: "decimals", ty: ParamType::Uint8 },
        Param { name: "minContribution", ty: ParamType::Uint256 },
    ],
};

const PLATFORM_ADMIN_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "admin", ty: ParamType::Address }],
    data: &[Param { name: "opCode", ty: ParamType::Uint8 }],
};

const COLLECTOR_SCHEMA: EventSchema = EventSchema {
    indexed: &[Param { name: "target", ty: ParamType::Address }],
    data: &[Param { name: "opCode", ty: ParamType::Uint8 }],
};

impl EventKind {
    /// Every kind the registry knows about.
    pub const ALL: &'static [EventKind] = &[
        EventKind::ContributionReceived,
        EventKind::RefundIssued,
        EventKind::FundsClaimed,
        EventKind::CampaignStatusChanged,
        EventKind::AdminOverrideSet,
        EventKind::CampaignFundsOperation,
        EventKind::CampaignCreated,
        EventKind::YieldOperation,
        EventKind::LendingConfigUpdated,
        EventKind::FeeConfigUpdated,
        EventKind::TokenRegistryOperation,
        EventKind::PlatformAdminOperation,
        EventKind::CollectorOperation,
    ];

    /// Returns the canonical text signature hashed into topic 0.
    ///
    /// The canonical form carries the parameter types in declared order and no
    /// `indexed` markers; indexed positions live in the schema instead.
    pub fn signature(&self) -> &'static str {
        match self {
            EventKind::ContributionReceived => {
                "ContributionReceived(bytes32,address,address,uint256,uint256)"
            }
            EventKind::RefundIssued => "RefundIssued(bytes32,address,address,uint256,uint256)",
            EventKind::FundsClaimed => "FundsClaimed(bytes32,address,address,uint256,uint256)",
            EventKind::CampaignStatusChanged => "CampaignStatusChanged(bytes32,uint8,uint8)",
            EventKind::AdminOverrideSet => "AdminOverrideSet(bytes32,address,bool)",
            EventKind::CampaignFundsOperation => {
                "CampaignFundsOperation(bytes32,address,uint8,uint256)"
            }
            EventKind::CampaignCreated => {
                "CampaignCreated(bytes32,address,address,uint256,uint256)"
            }
            EventKind::YieldOperation => "YieldOperation(bytes32,address,uint8,uint256)",
            EventKind::LendingConfigUpdated => "LendingConfigUpdated(address,address,address)",
            EventKind::FeeConfigUpdated => {
                "FeeConfigUpdated(address,address,address,uint256,uint256)"
            }
            EventKind::TokenRegistryOperation => {
                "TokenRegistryOperation(address,uint8,uint8,uint256)"
            }
            EventKind::PlatformAdminOperation => "PlatformAdminOperation(address,uint8)",
            EventKind::CollectorOperation => "CollectorOperation(address,uint8)",
        }
    }

    /// Returns the bare event name (signature without the parameter list).
    pub fn name(&self) -> &'static str {
        let sig = self.signature();
        match sig.find('(') {
            Some(idx) => &sig[..idx],
            None => sig,
        }
    }

    /// Returns the decoding schema for this kind.
    pub fn schema(&self) -> &'static EventSchema {
        match self {
            EventKind::ContributionReceived => &CONTRIBUTION_SCHEMA,
            EventKind::RefundIssued => &REFUND_SCHEMA,
            EventKind::FundsClaimed => &CLAIM_SCHEMA,
            EventKind::CampaignStatusChanged => &STATUS_CHANGE_SCHEMA,
            EventKind::AdminOverrideSet => &ADMIN_OVERRIDE_SCHEMA,
            EventKind::CampaignFundsOperation => &FUNDS_OPERATION_SCHEMA,
            EventKind::CampaignCreated => &CAMPAIGN_CREATED_SCHEMA,
            EventKind::YieldOperation => &YIELD_OPERATION_SCHEMA,
            EventKind::LendingConfigUpdated => &LENDING_CONFIG_SCHEMA,
            EventKind::FeeConfigUpdated => &FEE_CONFIG_SCHEMA,
            EventKind::TokenRegistryOperation => &TOKEN_REGISTRY_SCHEMA,
            EventKind::PlatformAdminOperation => &PLATFORM_ADMIN_SCHEMA,
            EventKind::CollectorOperation => &COLLECTOR_SCHEMA,
        }
    }

    /// Returns the 32-byte topic-0 hash for this kind.
    pub fn signature_hash(&self) -> B256 {
        keccak256(self.signature().as_bytes())
    }
}

/// Static lookup table from topic-0 hash to event kind.
static EVENT_REGISTRY: LazyLock<HashMap<B256, EventKind>> = LazyLock::new(|| {
    EventKind::ALL
        .iter()
        .map(|kind| (kind.signature_hash(), *kind))
        .collect()
});

/// Look up the event kind for a topic-0 hash.
///
/// Returns `None` for hashes this pipeline does not understand; callers must
/// skip such logs without treating the miss as an error.
pub fn lookup_event(topic0: &B256) -> Option<EventKind> {
    EVENT_REGISTRY.get(topic0).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== lookup_event tests ====================

    #[test]
    fn test_lookup_known_signature() {
        let hash = EventKind::ContributionReceived.signature_hash();
        assert_eq!(lookup_event(&hash), Some(EventKind::ContributionReceived));
    }

    #[test]
    fn test_lookup_unknown_signature_returns_none() {
        let hash = keccak256(b"Transfer(address,address,uint256)");
        assert_eq!(lookup_event(&hash), None);
    }

    #[test]
    fn test_lookup_zero_hash_returns_none() {
        assert_eq!(lookup_event(&B256::ZERO), None);
    }

    #[test]
    fn test_all_kinds_are_registered() {
        for kind in EventKind::ALL {
            assert_eq!(
                lookup_event(&kind.signature_hash()),
                Some(*kind),
                "kind {:?} missing from registry",
                kind
            );
        }
    }

    #[test]
    fn test_registry_has_exactly_thirteen_entries() {
        assert_eq!(EVENT_REGISTRY.len(), 13);
        assert_eq!(EventKind::ALL.len(), 13);
    }

    #[test]
    fn test_signature_hashes_are_distinct() {
        let mut seen = std::collections::HashSet::new();
        for kind in EventKind::ALL {
            assert!(seen.insert(kind.signature_hash()), "hash collision for {:?}", kind);
        }
    }

    // ==================== signature format tests ====================

    #[test]
    fn test_signatures_are_canonical() {
        for kind in EventKind::ALL {
            let sig = kind.signature();
            assert!(!sig.contains(' '), "signature has whitespace: {}", sig);
            assert!(!sig.contains("indexed"), "signature has indexed marker: {}", sig);
            assert!(sig.ends_with(')'), "signature not closed: {}", sig);
        }
    }

    #[test]
    fn test_name_strips_parameter_list() {
        assert_eq!(EventKind::ContributionReceived.name(), "ContributionReceived");
        assert_eq!(EventKind::CollectorOperation.name(), "CollectorOperation");
    }

    #[test]
    fn test_known_topic_hash_value() {
        // keccak256 of the canonical string must match what the contracts emit.
        let expected = keccak256(b"ContributionReceived(bytes32,address,address,uint256,uint256)");
        assert_eq!(EventKind::ContributionReceived.signature_hash(), expected);
    }

    // ==================== schema tests ====================

    #[test]
    fn test_schema_parameter_counts_match_signatures() {
        for kind in EventKind::ALL {
            let sig = kind.signature();
            let params = sig[sig.find('(').unwrap() + 1..sig.len() - 1]
                .split(',')
                .filter(|p| !p.is_empty())
                .count();
            let schema = kind.schema();
            assert_eq!(
                schema.indexed.len() + schema.data.len(),
                params,
                "schema/signature mismatch for {:?}",
                kind
            );
        }
    }

    #[test]
    fn test_indexed_parameter_counts_fit_topic_limit() {
        // Topic 0 is the signature hash; at most 3 indexed parameters remain.
        for kind in EventKind::ALL {
            assert!(kind.schema().indexed.len() <= 3, "too many indexed params for {:?}", kind);
        }
    }

    #[test]
    fn test_admin_override_has_no_data_slots() {
        assert!(EventKind::AdminOverrideSet.schema().data.is_empty());
    }
}
