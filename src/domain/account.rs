use super::tier::SubscriptionTier;
use super::usage::UsageCounters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Uuid,
    pub external_id: String,
    pub subscription_tier: SubscriptionTier,
    pub usage: UsageCounters,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(external_id: String, tier: SubscriptionTier) -> Self {
        Self::new_at(external_id, tier, Utc::now())
    }

    pub fn new_at(external_id: String, tier: SubscriptionTier, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            external_id,
            subscription_tier: tier,
            usage: UsageCounters::new(now),
            created_at: now,
            updated_at: now,
        }
    }
}
