//! Factory Processor Handler
//!
//! Projects campaign-deployment events from the factory contract into the
//! campaign aggregate's creation/ownership metadata.

use alloy::primitives::U256;
use serde_json::json;

use crate::aggregates::{from_body, write_body, Campaign};
use crate::decoder::{DecodeError, DecodedEvent};
use crate::delivery::LogMeta;
use crate::handlers::insert_audit;
use crate::store::{apply_once, collections, DocumentStore, StoreError};

/// A new campaign contract was deployed by the factory.
#[derive(Debug, Clone)]
pub struct CampaignCreated {
    pub campaign_id: String,
    pub creator: String,
    pub campaign_address: String,
    pub goal: U256,
    pub deadline: U256,
    pub meta: LogMeta,
}

impl CampaignCreated {
    pub fn from_decoded(decoded: &DecodedEvent, meta: &LogMeta) -> Result<Self, DecodeError> {
        Ok(Self {
            campaign_id: decoded.word_string("campaignId")?,
            creator: decoded.address_string("creator")?,
            campaign_address: decoded.address_string("campaignAddress")?,
            goal: decoded.uint("goal")?,
            deadline: decoded.uint("deadline")?,
            meta: meta.clone(),
        })
    }

    pub async fn apply(&self, store: &dyn DocumentStore) -> Result<(), StoreError> {
        insert_audit(
            store,
            collections::FACTORY_OPERATION_EVENTS,
            "CampaignCreated",
            &self.meta,
            json!({
                "campaignId": self.campaign_id,
                "creator": self.creator,
                "campaignAddress": self.campaign_address,
                "goal": self.goal.to_string(),
                "deadline": self.deadline.to_string(),
                "operation": "CAMPAIGN_CREATED",
            }),
        )
        .await?;

        let (creator, address, goal, deadline) = (
            self.creator.clone(),
            self.campaign_address.clone(),
            self.goal.to_string(),
            self.deadline.to_string(),
        );
        apply_once(
            store,
            collections::CAMPAIGNS,
            &self.campaign_id,
            &self.meta.event_key,
            |body| {
                let mut campaign: Campaign = from_body(body)?;
                campaign.creator = Some(creator.clone());
                campaign.contract_address = Some(address.clone());
                campaign.goal = Some(goal.clone());
                campaign.deadline = Some(deadline.clone());
                write_body(body, &campaign)?;
                Ok(())
            },
        )
        .await?;
        Ok(())
    }
}
