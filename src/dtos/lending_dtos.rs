use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use crate::accounting::CampaignStatus;
use crate::database::{DisbursementOutcome, FundingOutcome};
use crate::models::account::{Account, AccountType};
use crate::models::payment::InitializedPayment;
use crate::services::lending_service::{CampaignOverview, RepaymentVerification};

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
    pub is_approved: bool,
    pub has_defaulted: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        AccountResponse {
            id: account.id.to_hex(),
            email: account.email,
            name: account.name,
            account_type: account.account_type,
            balance: account.balance,
            is_approved: account.is_approved,
            has_defaulted: account.has_defaulted,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub success: bool,
    pub message: String,
    pub new_balance: Decimal,
    pub account: AccountResponse,
}

impl From<Account> for WithdrawalResponse {
    fn from(account: Account) -> Self {
        WithdrawalResponse {
            success: true,
            message: "Withdrawal successful".to_string(),
            new_balance: account.balance,
            account: account.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CampaignResponse {
    pub id: String,
    pub founder_id: String,
    pub title: String,
    pub description: String,
    pub goal_amount: Decimal,
    pub current_amount: Decimal,
    pub interest_rate: Decimal,
    pub repayment_period: u32,
    pub is_approved: bool,
    pub status: CampaignStatus,
    pub funded_at: Option<DateTime<Utc>>,
    pub disbursed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub repayment_deadline: Option<DateTime<Utc>>,

    pub total_repayment: Decimal,
    pub repaid_amount: Decimal,
    pub remaining_repayment: Decimal,
    pub repayment_progress: Decimal,
    pub funding_progress: Decimal,
    pub monthly_repayment: Option<Decimal>,
    /// `{}` until the campaign is funded.
    pub monthly_due_info: Value,
    pub has_funded: bool,
}

impl From<CampaignOverview> for CampaignResponse {
    fn from(overview: CampaignOverview) -> Self {
        let CampaignOverview {
            campaign,
            position,
            monthly_repayment,
            monthly_due,
            repayment_deadline,
            has_funded,
        } = overview;

        let monthly_due_info = monthly_due
            .and_then(|info| serde_json::to_value(info).ok())
            .unwrap_or_else(|| Value::Object(Default::default()));

        CampaignResponse {
            id: campaign.id.to_hex(),
            founder_id: campaign.founder_id.to_hex(),
            monthly_repayment,
            funding_progress: campaign.funding_progress().round_dp(2),
            title: campaign.title,
            description: campaign.description,
            goal_amount: campaign.goal_amount,
            current_amount: campaign.current_amount,
            interest_rate: campaign.interest_rate,
            repayment_period: campaign.repayment_period,
            is_approved: campaign.is_approved,
            status: campaign.status,
            funded_at: campaign.funded_at,
            disbursed_at: campaign.disbursed_at,
            created_at: campaign.created_at,
            repayment_deadline,
            total_repayment: position.total_repayment,
            repaid_amount: position.repaid,
            remaining_repayment: position.remaining,
            repayment_progress: position.progress.round_dp(2),
            monthly_due_info,
            has_funded,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentInitResponse {
    pub success: bool,
    pub message: String,
    pub data: InitializedPayment,
}

#[derive(Debug, Serialize)]
pub struct FundingResponse {
    pub success: bool,
    pub message: String,
    pub reference: String,
    pub campaign_id: String,
    pub amount: Decimal,
    pub current_amount: Option<Decimal>,
    pub goal_reached: bool,
}

impl From<FundingOutcome> for FundingResponse {
    fn from(outcome: FundingOutcome) -> Self {
        match outcome {
            FundingOutcome::Recorded {
                campaign,
                loan,
                newly_funded,
            } => FundingResponse {
                success: true,
                message: "Payment verified successfully, loan created".to_string(),
                reference: loan.reference,
                campaign_id: campaign.id.to_hex(),
                amount: loan.amount,
                current_amount: Some(campaign.current_amount),
                goal_reached: newly_funded,
            },
            FundingOutcome::Duplicate(loan) => FundingResponse {
                success: true,
                message: "Payment already verified".to_string(),
                reference: loan.reference,
                campaign_id: loan.campaign_id.to_hex(),
                amount: loan.amount,
                current_amount: None,
                goal_reached: false,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RepaymentResponse {
    pub success: bool,
    pub message: String,
    pub reference: String,
    pub amount: Decimal,
    pub is_fully_repaid: bool,
    pub campaign_status: Option<CampaignStatus>,
    pub disbursed: bool,
}

impl From<RepaymentVerification> for RepaymentResponse {
    fn from(verification: RepaymentVerification) -> Self {
        match verification {
            RepaymentVerification::Verified {
                repayment,
                status,
                disbursement,
            } => RepaymentResponse {
                success: true,
                message: "Repayment verified successfully".to_string(),
                reference: repayment.reference,
                amount: repayment.amount,
                is_fully_repaid: repayment.is_fully_repaid,
                campaign_status: Some(status),
                disbursed: matches!(disbursement, Some(DisbursementOutcome::Completed { .. })),
            },
            RepaymentVerification::AlreadyVerified(repayment) => RepaymentResponse {
                success: true,
                message: "Repayment already verified".to_string(),
                reference: repayment.reference,
                amount: repayment.amount,
                is_fully_repaid: repayment.is_fully_repaid,
                campaign_status: None,
                disbursed: false,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DisbursementResponse {
    pub success: bool,
    pub message: String,
    pub lenders_credited: usize,
    pub total: Decimal,
}

impl From<DisbursementOutcome> for DisbursementResponse {
    fn from(outcome: DisbursementOutcome) -> Self {
        match outcome {
            DisbursementOutcome::Completed { lenders_credited, total } => DisbursementResponse {
                success: true,
                message: "Repayment disbursed to lenders".to_string(),
                lenders_credited,
                total,
            },
            DisbursementOutcome::AlreadyDisbursed => DisbursementResponse {
                success: true,
                message: "Campaign was already disbursed".to_string(),
                lenders_credited: 0,
                total: Decimal::ZERO,
            },
            DisbursementOutcome::NothingToDisburse => DisbursementResponse {
                success: true,
                message: "Campaign has no loans to disburse".to_string(),
                lenders_credited: 0,
                total: Decimal::ZERO,
            },
        }
    }
}
