//! MongoDB ledger store.
//!
//! Multi-document operations (loan funding, disbursement) run inside a
//! transaction and are retried wholesale on transient transaction errors,
//! so this needs a replica set or sharded cluster.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson, Document};
use mongodb::error::{
    Error as MongoError, ErrorKind, WriteFailure, TRANSIENT_TRANSACTION_ERROR,
    UNKNOWN_TRANSACTION_COMMIT_RESULT,
};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, ClientSession, Collection, Database, IndexModel};
use rust_decimal::Decimal;
use tracing::{info, warn};

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

const DUPLICATE_KEY_CODE: i32 = 11000;
const MAX_TRANSACTION_ATTEMPTS: u32 = 5;

#[derive(Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        MongoStore { client, db }
    }

    fn accounts(&self) -> Collection<Account> {
        self.db.collection("accounts")
    }

    fn campaigns(&self) -> Collection<Campaign> {
        self.db.collection("campaigns")
    }

    fn loans(&self) -> Collection<Loan> {
        self.db.collection("loans")
    }

    fn repayments(&self) -> Collection<Repayment> {
        self.db.collection("repayments")
    }

    fn payment_intents(&self) -> Collection<PaymentIntent> {
        self.db.collection("payment_intents")
    }

    /// Unique references are what make loan and repayment verification
    /// exactly-once.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = IndexOptions::builder().unique(true).build();

        self.accounts()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.loans()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reference": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.repayments()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reference": 1 })
                    .options(unique.clone())
                    .build(),
            )
            .await?;
        self.payment_intents()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "reference": 1 })
                    .options(unique)
                    .build(),
            )
            .await?;
        self.loans()
            .create_index(IndexModel::builder().keys(doc! { "campaign_id": 1 }).build())
            .await?;
        self.repayments()
            .create_index(IndexModel::builder().keys(doc! { "campaign_id": 1 }).build())
            .await?;

        info!("✅ MongoDB indexes ensured");
        Ok(())
    }

    async fn record_loan_in(
        &self,
        session: &mut ClientSession,
        loan: &Loan,
        source: FundingSource,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome> {
        if let Some(existing) = self
            .loans()
            .find_one(doc! { "reference": loan.reference.as_str() })
            .session(&mut *session)
            .await?
        {
            return Ok(FundingOutcome::Duplicate(existing));
        }

        let mut campaign = self
            .campaigns()
            .find_one(doc! { "_id": loan.campaign_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        let mut lender = self
            .accounts()
            .find_one(doc! { "_id": loan.lender_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::not_found("Lender account"))?;

        let newly_funded = settle_loan(&mut campaign, &mut lender, loan, source, now)?;

        self.loans()
            .insert_one(loan)
            .session(&mut *session)
            .await
            .map_err(map_duplicate)?;
        self.campaigns()
            .replace_one(doc! { "_id": campaign.id }, &campaign)
            .session(&mut *session)
            .await?;
        if source == FundingSource::Balance {
            self.accounts()
                .replace_one(doc! { "_id": lender.id }, &lender)
                .session(&mut *session)
                .await?;
        }

        if newly_funded {
            let mut founder = self
                .accounts()
                .find_one(doc! { "_id": campaign.founder_id })
                .session(&mut *session)
                .await?
                .ok_or_else(|| AppError::not_found("Founder account"))?;
            founder.credit(campaign.goal_amount);
            founder.updated_at = now;
            self.accounts()
                .replace_one(doc! { "_id": founder.id }, &founder)
                .session(&mut *session)
                .await?;
        }

        Ok(FundingOutcome::Recorded {
            campaign,
            loan: loan.clone(),
            newly_funded,
        })
    }

    async fn debit_account_in(
        &self,
        session: &mut ClientSession,
        id: &ObjectId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut account = self
            .accounts()
            .find_one(doc! { "_id": *id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))?;
        account.debit(amount)?;
        account.updated_at = now;
        self.accounts()
            .replace_one(doc! { "_id": account.id }, &account)
            .session(&mut *session)
            .await?;
        Ok(account)
    }

    async fn disburse_in(
        &self,
        session: &mut ClientSession,
        campaign_id: &ObjectId,
        shares: &[LenderShare<ObjectId>],
        now: DateTime<Utc>,
    ) -> Result<DisbursementOutcome> {
        let mut campaign = self
            .campaigns()
            .find_one(doc! { "_id": *campaign_id })
            .session(&mut *session)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        if campaign.disbursed_at.is_some() {
            return Ok(DisbursementOutcome::AlreadyDisbursed);
        }
        if shares.is_empty() {
            return Ok(DisbursementOutcome::NothingToDisburse);
        }

        // Stamp the campaign first so a concurrent run conflicts early.
        campaign.disbursed_at = Some(now);
        campaign.updated_at = now;
        self.campaigns()
            .replace_one(doc! { "_id": campaign.id }, &campaign)
            .session(&mut *session)
            .await?;

        let mut total = Decimal::ZERO;
        for share in shares {
            let mut lender = self
                .accounts()
                .find_one(doc! { "_id": share.lender_id })
                .session(&mut *session)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Lender account {}", share.lender_id)))?;
            lender.credit(share.amount);
            lender.updated_at = now;
            self.accounts()
                .replace_one(doc! { "_id": lender.id }, &lender)
                .session(&mut *session)
                .await?;
            total += share.amount;
        }

        Ok(DisbursementOutcome::Completed {
            lenders_credited: shares.len(),
            total,
        })
    }

    async fn set_fields<T>(&self, collection: &Collection<T>, id: &ObjectId, fields: Document) -> Result<Option<T>>
    where
        T: serde::de::DeserializeOwned + Send + Sync,
    {
        Ok(collection
            .find_one_and_update(doc! { "_id": *id }, doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await?)
    }
}

fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::MongoDB(e) => {
            e.contains_label(TRANSIENT_TRANSACTION_ERROR)
                || e.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
        }
        _ => false,
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(ref e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn map_duplicate(err: MongoError) -> AppError {
    if is_duplicate_key(&err) {
        AppError::DuplicateKey
    } else {
        AppError::MongoDB(err)
    }
}

async fn finish<T>(session: &mut ClientSession, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.commit_transaction().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(abort_err) = session.abort_transaction().await {
                warn!("Failed to abort transaction: {}", abort_err);
            }
            Err(err)
        }
    }
}

#[async_trait]
impl LedgerStore for MongoStore {
    async fn insert_account(&self, account: &Account) -> Result<()> {
        self.accounts()
            .insert_one(account)
            .await
            .map_err(map_duplicate)?;
        Ok(())
    }

    async fn get_account(&self, id: &ObjectId) -> Result<Option<Account>> {
        Ok(self.accounts().find_one(doc! { "_id": *id }).await?)
    }

    async fn set_account_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>> {
        let fields = doc! { "is_approved": approved, "updated_at": to_bson(&now)? };
        self.set_fields(&self.accounts(), id, fields).await
    }

    async fn debit_account(
        &self,
        id: &ObjectId,
        amount: Decimal,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            let result = self.debit_account_in(&mut session, id, amount, now).await;
            match finish(&mut session, result).await {
                Err(err) if is_retryable(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("🔁 Debit of account {} conflicted, retrying (attempt {})", id, attempt);
                }
                other => return other,
            }
        }
    }

    async fn insert_campaign(&self, campaign: &Campaign) -> Result<()> {
        self.campaigns().insert_one(campaign).await?;
        Ok(())
    }

    async fn get_campaign(&self, id: &ObjectId) -> Result<Option<Campaign>> {
        Ok(self.campaigns().find_one(doc! { "_id": *id }).await?)
    }

    async fn list_campaigns(&self, approved_only: bool) -> Result<Vec<Campaign>> {
        let filter = if approved_only {
            doc! { "is_approved": true }
        } else {
            doc! {}
        };
        let cursor = self
            .campaigns()
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn set_campaign_approval(
        &self,
        id: &ObjectId,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>> {
        let fields = doc! { "is_approved": approved, "updated_at": to_bson(&now)? };
        self.set_fields(&self.campaigns(), id, fields).await
    }

    async fn insert_payment_intent(&self, intent: &PaymentIntent) -> Result<()> {
        self.payment_intents()
            .insert_one(intent)
            .await
            .map_err(map_duplicate)?;
        Ok(())
    }

    async fn get_payment_intent(&self, reference: &str) -> Result<Option<PaymentIntent>> {
        Ok(self
            .payment_intents()
            .find_one(doc! { "reference": reference })
            .await?)
    }

    async fn loans_for_campaign(&self, campaign_id: &ObjectId) -> Result<Vec<Loan>> {
        let cursor = self
            .loans()
            .find(doc! { "campaign_id": *campaign_id })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn verified_repayments(&self, campaign_id: &ObjectId) -> Result<Vec<Repayment>> {
        let cursor = self
            .repayments()
            .find(doc! { "campaign_id": *campaign_id, "is_verified": true })
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn record_loan(
        &self,
        loan: Loan,
        source: FundingSource,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            let result = self.record_loan_in(&mut session, &loan, source, now).await;
            match finish(&mut session, result).await {
                Err(err) if is_retryable(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("🔁 Loan {} transaction conflict, retrying (attempt {})", loan.reference, attempt);
                }
                Err(AppError::DuplicateKey) => {
                    // Lost an insert race to the same reference.
                    let existing = self
                        .loans()
                        .find_one(doc! { "reference": loan.reference.as_str() })
                        .await?
                        .ok_or(AppError::DuplicateKey)?;
                    return Ok(FundingOutcome::Duplicate(existing));
                }
                other => return other,
            }
        }
    }

    async fn insert_repayment(&self, repayment: Repayment) -> Result<RepaymentInsert> {
        match self.repayments().insert_one(&repayment).await {
            Ok(_) => Ok(RepaymentInsert::Created(repayment)),
            Err(err) if is_duplicate_key(&err) => {
                let existing = self
                    .repayments()
                    .find_one(doc! { "reference": repayment.reference.as_str() })
                    .await?
                    .ok_or(AppError::DuplicateKey)?;
                Ok(RepaymentInsert::AlreadyExists(existing))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn mark_repayment_cleared(&self, repayment_id: &ObjectId) -> Result<()> {
        let result = self
            .repayments()
            .update_one(
                doc! { "_id": *repayment_id },
                doc! { "$set": { "is_fully_repaid": true } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(AppError::not_found("Repayment"));
        }
        Ok(())
    }

    async fn apply_status_transition(
        &self,
        campaign_id: &ObjectId,
        transition: StatusTransition,
        now: DateTime<Utc>,
    ) -> Result<Campaign> {
        let mut campaign = self
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        let mut founder = self.get_account(&campaign.founder_id).await?;

        apply_transition(&mut campaign, founder.as_mut(), transition, now);

        // Plain $set updates: reapplying them changes nothing, so the
        // founder can go first without a transaction.
        if let (StatusTransition::Default, Some(founder)) = (transition, founder.as_ref()) {
            self.set_fields(
                &self.accounts(),
                &founder.id,
                doc! {
                    "has_defaulted": true,
                    "is_approved": false,
                    "updated_at": to_bson(&now)?,
                },
            )
            .await?;
        }

        let fields = doc! {
            "is_approved": false,
            "status": to_bson(&campaign.status)?,
            "updated_at": to_bson(&now)?,
        };
        self.set_fields(&self.campaigns(), campaign_id, fields)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))
    }

    async fn disburse(
        &self,
        campaign_id: &ObjectId,
        shares: &[LenderShare<ObjectId>],
        now: DateTime<Utc>,
    ) -> Result<DisbursementOutcome> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut session = self.client.start_session().await?;
            session.start_transaction().await?;

            let result = self.disburse_in(&mut session, campaign_id, shares, now).await;
            match finish(&mut session, result).await {
                Err(err) if is_retryable(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                    warn!("🔁 Disbursement for campaign {} conflicted, retrying (attempt {})", campaign_id, attempt);
                }
                other => return other,
            }
        }
    }
}
