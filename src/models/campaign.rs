use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::accounting::money::{MAX_AMOUNT, MAX_INTEREST_RATE, MINOR_UNIT_SCALE};
use crate::accounting::repayment;
use crate::accounting::CampaignStatus;
use crate::errors::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub founder_id: ObjectId,
    pub title: String,
    pub description: String,
    pub goal_amount: Decimal,
    pub current_amount: Decimal,
    pub interest_rate: Decimal, // percent
    pub repayment_period: u32,  // months
    pub is_approved: bool,
    #[serde(default)]
    pub status: CampaignStatus,

    pub funded_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    pub fn new(founder_id: ObjectId, request: CreateCampaign, now: DateTime<Utc>) -> Self {
        Campaign {
            id: ObjectId::new(),
            founder_id,
            title: request.title,
            description: request.description,
            goal_amount: request.goal_amount,
            current_amount: Decimal::ZERO,
            interest_rate: request.interest_rate,
            repayment_period: request.repayment_period,
            is_approved: false,
            status: CampaignStatus::Active,
            funded_at: None,
            disbursed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_goal_reached(&self) -> bool {
        self.current_amount >= self.goal_amount
    }

    pub fn total_repayment(&self) -> Result<Decimal> {
        repayment::calculate_total_repayment(self.goal_amount, self.interest_rate)
    }

    pub fn monthly_repayment_amount(&self) -> Result<Option<Decimal>> {
        Ok(repayment::monthly_repayment_amount(
            self.total_repayment()?,
            self.repayment_period,
        ))
    }

    pub fn funding_progress(&self) -> Decimal {
        repayment::funding_progress(self.current_amount, self.goal_amount)
    }

    /// Approved and still raising money.
    pub fn is_accepting_loans(&self) -> bool {
        self.is_approved && self.status == CampaignStatus::Active
    }

    /// Approved and not yet in a terminal state.
    pub fn is_accepting_repayments(&self) -> bool {
        self.is_approved && !self.status.is_terminal()
    }

    /// Adds a loan to the raised amount. Returns `true` when this loan is the
    /// one that reached the goal; `funded_at` is only ever set once.
    pub fn apply_loan(&mut self, amount: Decimal, now: DateTime<Utc>) -> bool {
        self.current_amount += amount;
        self.updated_at = now;
        if self.is_goal_reached() && self.funded_at.is_none() {
            self.funded_at = Some(now);
            if self.status == CampaignStatus::Active {
                self.status = CampaignStatus::FullyFunded;
            }
            return true;
        }
        false
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCampaign {
    pub founder_id: String,

    #[validate(length(min = 3, max = 255, message = "Title must be between 3 and 255 characters"))]
    pub title: String,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(custom(function = "money_amount"))]
    pub goal_amount: Decimal,

    #[validate(custom(function = "interest_rate"))]
    pub interest_rate: Decimal,

    #[validate(range(min = 1, max = 120, message = "Repayment period must be between 1 and 120 months"))]
    pub repayment_period: u32,
}

#[derive(Debug, Deserialize)]
pub struct CampaignQuery {
    pub search: Option<String>,
    pub lender_id: Option<String>,
}

fn validation_error(code: &'static str, message: String) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// Positive, whole minor units and no more than `MAX_AMOUNT`.
pub(crate) fn money_amount(amount: &Decimal) -> std::result::Result<(), ValidationError> {
    if *amount <= Decimal::ZERO {
        return Err(validation_error("money_amount", "Amount must be greater than 0".to_string()));
    }
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(validation_error(
            "money_amount",
            format!("Amount may have at most {} decimal places", MINOR_UNIT_SCALE),
        ));
    }
    if *amount > MAX_AMOUNT {
        return Err(validation_error(
            "money_amount",
            format!("Amount may not exceed {}", MAX_AMOUNT),
        ));
    }
    Ok(())
}

fn interest_rate(rate: &Decimal) -> std::result::Result<(), ValidationError> {
    if rate.is_sign_negative() {
        return Err(validation_error("interest_rate", "Interest rate cannot be negative".to_string()));
    }
    if rate.normalize().scale() > 2 || *rate > MAX_INTEREST_RATE {
        return Err(validation_error(
            "interest_rate",
            format!("Interest rate must be at most {} with two decimal places", MAX_INTEREST_RATE),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn campaign(goal: i64) -> Campaign {
        let request = CreateCampaign {
            founder_id: ObjectId::new().to_hex(),
            title: "Solar kiosks".to_string(),
            description: "Ten kiosks in Ibadan".to_string(),
            goal_amount: Decimal::new(goal, 0),
            interest_rate: Decimal::new(10, 0),
            repayment_period: 3,
        };
        Campaign::new(ObjectId::new(), request, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
    }

    #[test]
    fn funded_at_is_set_once_when_goal_is_reached() {
        let mut campaign = campaign(1000);
        let first = Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap();

        assert!(!campaign.apply_loan(Decimal::new(600, 0), first));
        assert!(campaign.funded_at.is_none());

        assert!(campaign.apply_loan(Decimal::new(400, 0), first));
        assert_eq!(campaign.funded_at, Some(first));
        assert_eq!(campaign.status, CampaignStatus::FullyFunded);

        assert!(!campaign.apply_loan(Decimal::new(1, 0), later));
        assert_eq!(campaign.funded_at, Some(first));
        assert_eq!(campaign.current_amount, Decimal::new(1001, 0));
    }

    #[test]
    fn derived_amounts_follow_goal_and_rate() {
        let campaign = campaign(1000);
        assert_eq!(campaign.total_repayment().unwrap(), Decimal::new(1100, 0));
        assert_eq!(campaign.monthly_repayment_amount().unwrap(), Some(Decimal::new(36667, 2)));
    }

    #[test]
    fn unapproved_campaign_accepts_nothing() {
        let campaign = campaign(1000);
        assert!(!campaign.is_accepting_loans());
        assert!(!campaign.is_accepting_repayments());
    }

    fn request(goal: Decimal, rate: Decimal) -> CreateCampaign {
        CreateCampaign {
            founder_id: ObjectId::new().to_hex(),
            title: "Solar kiosks".to_string(),
            description: "Ten kiosks".to_string(),
            goal_amount: goal,
            interest_rate: rate,
            repayment_period: 3,
        }
    }

    #[test]
    fn negative_rate_fails_validation() {
        assert!(request(Decimal::new(1000, 0), Decimal::new(-1, 0)).validate().is_err());
    }

    #[test]
    fn oversized_goal_and_rate_fail_validation() {
        assert!(request(Decimal::MAX, Decimal::new(10, 0)).validate().is_err());
        assert!(request(Decimal::from_i128_with_scale(10_i128.pow(27), 0), Decimal::new(10, 0)).validate().is_err());
        assert!(request(Decimal::new(1000, 0), Decimal::new(100_000, 2)).validate().is_err());
        assert!(request(MAX_AMOUNT, MAX_INTEREST_RATE).validate().is_ok());
    }

    #[test]
    fn sub_minor_goal_fails_validation() {
        assert!(request(Decimal::new(10005, 3), Decimal::new(10, 0)).validate().is_err());
        assert!(request(Decimal::new(100500, 4), Decimal::new(10, 0)).validate().is_ok());
    }
}
