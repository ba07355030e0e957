use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{AppError, Result};

/// Returned by the gateway when a checkout is opened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
}

/// Outcome of verifying a reference with the gateway. Amounts are in minor units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedPayment {
    pub reference: String,
    pub status: PaymentStatus,
    pub amount_minor: i64,
}

impl VerifiedPayment {
    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Success
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    Loan,
    Repayment,
}

impl fmt::Display for PaymentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentPurpose::Loan => write!(f, "loan"),
            PaymentPurpose::Repayment => write!(f, "repayment"),
        }
    }
}

/// A checkout the platform opened with the gateway. Verification only
/// accepts references recorded here, for the same purpose and campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub reference: String,
    pub purpose: PaymentPurpose,
    pub campaign_id: ObjectId,
    pub payer_id: ObjectId, // lender for loans, founder for repayments
    pub amount_minor: i64,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn new(
        reference: impl Into<String>,
        purpose: PaymentPurpose,
        campaign_id: ObjectId,
        payer_id: ObjectId,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> Self {
        PaymentIntent {
            id: ObjectId::new(),
            reference: reference.into(),
            purpose,
            campaign_id,
            payer_id,
            amount_minor,
            created_at: now,
        }
    }

    pub fn ensure_matches(
        &self,
        purpose: PaymentPurpose,
        campaign_id: &ObjectId,
        payer_id: Option<&ObjectId>,
    ) -> Result<()> {
        if self.purpose != purpose {
            return Err(AppError::invalid_data(format!(
                "Reference {} was opened for a {}, not a {}",
                self.reference, self.purpose, purpose
            )));
        }
        if &self.campaign_id != campaign_id {
            return Err(AppError::invalid_data(format!(
                "Reference {} belongs to a different campaign",
                self.reference
            )));
        }
        if payer_id.is_some_and(|payer| payer != &self.payer_id) {
            return Err(AppError::invalid_data(format!(
                "Reference {} belongs to a different payer",
                self.reference
            )));
        }
        Ok(())
    }

    /// The gateway must report a positive amount equal to the checkout's.
    pub fn ensure_paid_in_full(&self, payment: &VerifiedPayment) -> Result<()> {
        if payment.amount_minor <= 0 {
            return Err(AppError::gateway(format!(
                "Payment {} reported a non-positive amount: {}",
                payment.reference, payment.amount_minor
            )));
        }
        if payment.amount_minor != self.amount_minor {
            return Err(AppError::gateway(format!(
                "Payment {} settled {} minor units, expected {}",
                payment.reference, payment.amount_minor, self.amount_minor
            )));
        }
        Ok(())
    }
}
