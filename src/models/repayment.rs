use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::campaign::money_amount;

/// A founder's payment towards the total owed. One row per gateway reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repayment {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub campaign_id: ObjectId,
    pub amount: Decimal,
    pub reference: String,
    pub is_verified: bool,
    pub is_fully_repaid: bool, // this repayment cleared the balance
    pub created_at: DateTime<Utc>,
}

impl Repayment {
    pub fn verified(
        campaign_id: ObjectId,
        amount: Decimal,
        reference: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Repayment {
            id: ObjectId::new(),
            campaign_id,
            amount,
            reference: reference.into(),
            is_verified: true,
            is_fully_repaid: false,
            created_at: now,
        }
    }
}

/// Result of inserting a repayment keyed by its reference.
#[derive(Debug, Clone)]
pub enum RepaymentInsert {
    Created(Repayment),
    AlreadyExists(Repayment),
}

#[derive(Debug, Deserialize, Validate)]
pub struct InitializeRepayment {
    pub campaign_id: String,

    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(custom(function = "money_amount"))]
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRepaymentQuery {
    pub campaign_id: String,
}
