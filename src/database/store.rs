//! Persistence contract for the lending ledger.
//!
//! Every method that touches more than one document is a single atomic unit
//! in each implementation: either all of its writes land or none do.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;

use crate::accounting::repayment::validate_loan_amount;
use crate::accounting::{LenderShare, StatusTransition};
use crate::errors::{AppError, Result};
use crate::models::account::{Account, AccountType, BalanceHolder};
use crate::models::campaign::Campaign;
use crate::models::loan::Loan;
use crate::models::payment::PaymentIntent;
use crate::models::repayment::{Repayment, RepaymentInsert};

/// Where the money for a loan comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingSource {
    /// Already collected by the payment gateway.
    Gateway,
    /// Debited from the lender's wallet balance.
    Balance,
}

#[derive(Debug, Clone)]
pub enum FundingOutcome {
    Recorded {
        campaign: Campaign,
        loan: Loan,
        newly_funded: bool,
    },
    /// A loan with this reference already exists; nothing was changed.
    Duplicate(Loan),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisbursementOutcome {
    Completed { lenders_credited: usize, total: Decimal },
    AlreadyDisbursed,
    NothingToDisburse,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `DuplicateKey` when the email is taken.
    async fn insert_account(&self, account: &Account) -> Result<()>;

    async fn get_account(&self, id: &ObjectId) -> Result<Option<Account>>;

    async fn set_account_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>>;

    /// Takes `amount` out of the account's balance, or fails with
    /// `InsufficientBalance` and changes nothing.
    async fn debit_account(
        &self,
        id: &ObjectId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Account>;

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<()>;

    async fn get_campaign(&self, id: &ObjectId) -> Result<Option<Campaign>>;

    /// Newest first.
    async fn list_campaigns(&self, approved_only: bool) -> Result<Vec<Campaign>>;

    async fn set_campaign_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>>;

    /// Fails with `DuplicateKey` when the reference is already recorded.
    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> Result<()>;

    async fn get_payment_intent(&self, reference: &str) -> Result<Option<PaymentIntent>>;

    async fn loans_for_campaign(&self, campaign_id: &ObjectId) -> Result<Vec<Loan>>;

    async fn verified_repayments(&self, campaign_id: &ObjectId) -> Result<Vec<Repayment>>;

    /// Inserts the loan, raises the campaign's `current_amount`, sets
    /// `funded_at` and credits the founder with the goal when this loan
    /// reaches it. Loans are unique by reference.
    async fn record_loan(
        &self,
        loan: Loan,
        source: FundingSource,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome>;

    /// Exactly one row per reference; a repeat returns the existing row.
    async fn insert_repayment(&self, repayment: Repayment) -> Result<RepaymentInsert>;

    async fn mark_repayment_cleared(&self, repayment_id: &ObjectId) -> Result<()>;

    /// Applies a default or close. Idempotent.
    async fn apply_status_transition(
        &self,
        campaign_id: &ObjectId,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Campaign>;

    /// Credits every share and stamps `disbursed_at`, or does nothing if the
    /// campaign was already disbursed.
    async fn disburse(
        &self,
        campaign_id: &ObjectId,
        shares: &[LenderShare<ObjectId>],
        now: DateTime<Utc>,
    ) -> Result<DisbursementOutcome>;
}

/// Applies a loan to the campaign and, for wallet funding, to the lender.
/// Returns `true` when the loan reached the goal.
pub(crate) fn settle_loan(
    campaign: &mut Campaign,
    lender: &mut Account,
    loan: &Loan,
    source: FundingSource,
    now: DateTime<Utc>,
) -> Result<bool> {
    if lender.account_type != AccountType::Lender {
        return Err(AppError::Unauthorized(
            "Only lenders can fund campaigns".to_string(),
        ));
    }

    if source == FundingSource::Balance {
        if !campaign.is_accepting_loans() {
            return Err(AppError::CampaignNotApproved);
        }
        validate_loan_amount(loan.amount, campaign.goal_amount, campaign.current_amount)?;
        lender.debit(loan.amount)?;
        lender.updated_at = now;
    }

    Ok(campaign.apply_loan(loan.amount, now))
}

/// Founder and campaign changes for a status transition.
pub(crate) fn apply_transition(
    campaign: &mut Campaign,
    founder: Option<&mut Account>,
    transition: StatusTransition,
    now: DateTime<Utc>,
) {
    if let (StatusTransition::Default, Some(founder)) = (transition, founder) {
        founder.has_defaulted = true;
        founder.is_approved = false;
        founder.updated_at = now;
    }
    campaign.is_approved = false;
    campaign.status = transition.target();
    campaign.updated_at = now;
}
