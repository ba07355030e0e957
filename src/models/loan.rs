use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::campaign::money_amount;

/// A lender's contribution to a campaign. Never modified after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub campaign_id: ObjectId,
    pub lender_id: ObjectId,
    pub amount: Decimal,
    pub reference: String, // gateway reference, or a generated one for wallet-funded loans
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn new(
        campaign_id: ObjectId,
        lender_id: ObjectId,
        amount: Decimal,
        reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Loan {
            id: ObjectId::new(),
            campaign_id,
            lender_id,
            amount,
            reference: reference.into(),
            created_at: now,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct InitializeLoanPayment {
    pub campaign_id: String,
    pub lender_id: String,

    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(custom(function = "money_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FundFromBalance {
    pub campaign_id: String,
    pub lender_id: String,

    #[validate(custom(function = "money_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct VerifyLoanQuery {
    pub campaign_id: String,
    pub lender_id: String,
}
