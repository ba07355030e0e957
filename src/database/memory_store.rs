//! In-memory ledger store.
//!
//! Used for tests and local development. All collections sit behind one
//! lock, so every operation is trivially atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::store::{
    apply_transition, settle_loan, DisbursementOutcome, FundingOutcome, FundingSource, LedgerStore,
};
use crate::accounting::{LenderShare, StatusTransition};
use crate::errors::{AppError, Result};
use crate::models::account::{Account, BalanceHolder};
use crate::models::campaign::Campaign;
use crate::models::loan::Loan;
use crate::models::payment::PaymentIntent;
use crate::models::repayment::{Repayment, RepaymentInsert};

#[derive(Debug, Default)]
struct Collections {
    accounts: HashMap<ObjectId, Account>,
    campaigns: HashMap<ObjectId, Campaign>,
    loans: Vec<Loan>,
    repayments: Vec<Repayment>,
    intents: HashMap<String, PaymentIntent>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn repayment_count(&self) -> usize {
        self.inner.read().await.repayments.len()
    }

    pub async fn loan_count(&self) -> usize {
        self.inner.read().await.loans.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.accounts.values().any(|a| a.email == account.email) {
            return Err(AppError::DuplicateKey);
        }
        inner.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: &ObjectId) -> Result<Option<Account>> {
        Ok(self.inner.read().await.accounts.get(id).cloned())
    }

    async fn set_account_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>> {
        let mut inner = self.inner.write().await;
        Ok(inner.accounts.get_mut(id).map(|account| {
            account.is_approved = approved;
            account.updated_at = now;
            account.clone()
        }))
    }

    async fn debit_account(
        &self,
        id: &ObjectId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut inner = self.inner.write().await;
        let account = inner
            .accounts
            .get_mut(id)
            .ok_or_else(|| AppError::not_found("Account"))?;
        account.debit(amount)?;
        account.updated_at = now;
        Ok(account.clone())
    }

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.inner
            .write()
            .await
            .campaigns
            .insert(campaign.id, campaign.clone());
        Ok(())
    }

    async fn get_campaign(&self, id: &ObjectId) -> Result<Option<Campaign>> {
        Ok(self.inner.read().await.campaigns.get(id).cloned())
    }

    async fn list_campaigns(&self, approved_only: bool) -> Result<Vec<Campaign>> {
        let inner = self.inner.read().await;
        let mut campaigns: Vec<Campaign> = inner
            .campaigns
            .values()
            .filter(|c| !approved_only || c.is_approved)
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(campaigns)
    }

    async fn set_campaign_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let mut inner = self.inner.write().await;
        Ok(inner.campaigns.get_mut(id).map(|campaign| {
            campaign.is_approved = approved;
            campaign.updated_at = now;
            campaign.clone()
        }))
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.intents.contains_key(&intent.reference) {
            return Err(AppError::DuplicateKey);
        }
        inner.intents.insert(intent.reference.clone(), intent.clone());
        Ok(())
    }

    async fn get_payment_intent(&self, reference: &str) -> Result<Option<PaymentIntent>> {
        Ok(self.inner.read().await.intents.get(reference).cloned())
    }

    async fn loans_for_campaign(&self, campaign_id: &ObjectId) -> Result<Vec<Loan>> {
        let inner = self.inner.read().await;
        Ok(inner
            .loans
            .iter()
            .filter(|loan| loan.campaign_id == *campaign_id)
            .cloned()
            .collect())
    }

    async fn verified_repayments(&self, campaign_id: &ObjectId) -> Result<Vec<Repayment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .repayments
            .iter()
            .filter(|r| r.campaign_id == *campaign_id && r.is_verified)
            .cloned()
            .collect())
    }

    async fn record_loan(
        &self,
        loan: Loan,
        source: FundingSource,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        if let Some(existing) = inner.loans.iter().find(|l| l.reference == loan.reference) {
            return Ok(FundingOutcome::Duplicate(existing.clone()));
        }

        // Work on copies and only write back once every check has passed.
        let mut campaign = inner
            .campaigns
            .get(&loan.campaign_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        let mut lender = inner
            .accounts
            .get(&loan.lender_id)
            .cloned()
            .ok_or_else(|| AppError::not_found("Lender account"))?;

        let newly_funded = settle_loan(&mut campaign, &mut lender, &loan, source, now)?;

        if newly_funded {
            let founder = inner
                .accounts
                .get_mut(&campaign.founder_id)
                .ok_or_else(|| AppError::not_found("Founder account"))?;
            founder.credit(campaign.goal_amount);
            founder.updated_at = now;
        }

        inner.accounts.insert(lender.id, lender);
        inner.campaigns.insert(campaign.id, campaign.clone());
        inner.loans.push(loan.clone());

        Ok(FundingOutcome::Recorded {
            campaign,
            loan,
            newly_funded,
        })
    }

    async fn insert_repayment(&self, repayment: Repayment) -> Result<RepaymentInsert> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner
            .repayments
            .iter()
            .find(|r| r.reference == repayment.reference)
        {
            return Ok(RepaymentInsert::AlreadyExists(existing.clone()));
        }
        inner.repayments.push(repayment.clone());
        Ok(RepaymentInsert::Created(repayment))
    }

    async fn mark_repayment_cleared(&self, repayment_id: &ObjectId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let repayment = inner
            .repayments
            .iter_mut()
            .find(|r| r.id == *repayment_id)
            .ok_or_else(|| AppError::not_found("Repayment"))?;
        repayment.is_fully_repaid = true;
        Ok(())
    }

    async fn apply_status_transition(
        &self,
        campaign_id: &ObjectId,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let campaign = inner
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        let founder = inner.accounts.get_mut(&campaign.founder_id);

        apply_transition(campaign, founder, transition, now);
        Ok(campaign.clone())
    }

    async fn disburse(
        &self,
        campaign_id: &ObjectId,
        shares: &[LenderShare<ObjectId>],
        now: DateTime<Utc>,
    ) -> Result<DisbursementOutcome> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;

        let campaign = inner
            .campaigns
            .get_mut(campaign_id)
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        if campaign.disbursed_at.is_some() {
            return Ok(DisbursementOutcome::AlreadyDisbursed);
        }
        if shares.is_empty() {
            return Ok(DisbursementOutcome::NothingToDisburse);
        }
        if let Some(missing) = shares
            .iter()
            .find(|share| !inner.accounts.contains_key(&share.lender_id))
        {
            return Err(AppError::not_found(format!("Lender account {}", missing.lender_id)));
        }

        let mut total = Decimal::ZERO;
        for share in shares {
            if let Some(lender) = inner.accounts.get_mut(&share.lender_id) {
                lender.credit(share.amount);
                lender.updated_at = now;
                total += share.amount;
            }
        }
        campaign.disbursed_at = Some(now);
        campaign.updated_at = now;

        Ok(DisbursementOutcome::Completed {
            lenders_credited: shares.len(),
            total,
        })
    }
}
