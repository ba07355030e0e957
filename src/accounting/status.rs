use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::schedule::add_months;

/// Where a campaign is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Raising funds (or awaiting approval to do so)
    #[default]
    Active,
    /// Goal reached, repayments running
    FullyFunded,
    /// Total owed has been repaid
    FullyRepaid,
    /// Deadline passed with money still owed
    Defaulted,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::FullyFunded => "fully_funded",
            CampaignStatus::FullyRepaid => "fully_repaid",
            CampaignStatus::Defaulted => "defaulted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CampaignStatus::FullyRepaid | CampaignStatus::Defaulted)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A status change the store must apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTransition {
    /// Founder defaulted: flag the founder, revoke founder and campaign approval.
    Default,
    /// Fully repaid: revoke campaign approval.
    Close,
}

impl StatusTransition {
    pub fn target(&self) -> CampaignStatus {
        match self {
            StatusTransition::Default => CampaignStatus::Defaulted,
            StatusTransition::Close => CampaignStatus::FullyRepaid,
        }
    }
}

/// Repayment deadline: creation time plus the repayment period in calendar months.
pub fn repayment_deadline(
    created_at: DateTime<Utc>,
    repayment_period: u32,
    tz: &FixedOffset,
) -> Option<DateTime<Utc>> {
    add_months(created_at, repayment_period, tz)
}

/// Decides whether a campaign must default or close. Returns `None` when the
/// campaign already sits in the target state, so reapplying is a no-op.
pub fn evaluate_status(
    status: CampaignStatus,
    is_approved: bool,
    deadline: Option<DateTime<Utc>>,
    remaining: Decimal,
    now: DateTime<Utc>,
) -> Option<StatusTransition> {
    match status {
        CampaignStatus::Defaulted => is_approved.then_some(StatusTransition::Default),
        CampaignStatus::FullyRepaid => is_approved.then_some(StatusTransition::Close),
        CampaignStatus::Active | CampaignStatus::FullyFunded => {
            let overdue = deadline.map_or(false, |deadline| now > deadline);
            if overdue && remaining > Decimal::ZERO {
                Some(StatusTransition::Default)
            } else if remaining <= Decimal::ZERO {
                Some(StatusTransition::Close)
            } else {
                None
            }
        }
    }
}
