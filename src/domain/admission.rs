use super::tier::SubscriptionTier;
use super::usage::UsageStats;
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Caller identity as resolved by the session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    User(Uuid),
    Anonymous,
}

impl From<Option<Uuid>> for Caller {
    fn from(user_id: Option<Uuid>) -> Self {
        user_id.map_or(Caller::Anonymous, Caller::User)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefusalReason {
    Unauthorized,
    AccountNotFound,
    DailyLimitReached,
    MonthlyLimitReached,
}

/// What the client needs to render a limit refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusalDetails {
    pub current: i64,
    pub limit: i64,
    pub tier: SubscriptionTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refusal {
    pub reason: RefusalReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<RefusalDetails>,
}

impl Refusal {
    pub fn new(reason: RefusalReason) -> Self {
        Self {
            reason,
            details: None,
        }
    }

    pub fn limit_reached(reason: RefusalReason, stats: &UsageStats, tier: SubscriptionTier) -> Self {
        Self {
            reason,
            details: Some(RefusalDetails {
                current: stats.current,
                limit: stats.limit,
                tier,
            }),
        }
    }
}

/// Proof that a caller passed the quota gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Admission {
    pub user_id: Uuid,
    pub tier: SubscriptionTier,
    pub daily: UsageStats,
    pub monthly: UsageStats,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AdmissionDecision {
    Admitted(Admission),
    Refused(Refusal),
}

impl AdmissionDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, AdmissionDecision::Admitted(_))
    }

    pub fn refusal_reason(&self) -> Option<RefusalReason> {
        match self {
            AdmissionDecision::Admitted(_) => None,
            AdmissionDecision::Refused(refusal) => Some(refusal.reason),
        }
    }
}

/// Decide admission from already-reset stats. Daily is checked before
/// monthly, so it wins when both are exhausted.
pub fn decide(
    user_id: Uuid,
    tier: SubscriptionTier,
    daily: UsageStats,
    monthly: UsageStats,
) -> AdmissionDecision {
    if daily.is_exhausted() {
        return AdmissionDecision::Refused(Refusal::limit_reached(
            RefusalReason::DailyLimitReached,
            &daily,
            tier,
        ));
    }

    if monthly.is_exhausted() {
        return AdmissionDecision::Refused(Refusal::limit_reached(
            RefusalReason::MonthlyLimitReached,
            &monthly,
            tier,
        ));
    }

    AdmissionDecision::Admitted(Admission {
        user_id,
        tier,
        daily,
        monthly,
    })
}
