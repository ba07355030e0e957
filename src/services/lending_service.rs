// services/lending_service.rs
use chrono::{DateTime, FixedOffset, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::accounting::money::{from_minor_units, to_minor_units};
use crate::accounting::repayment::{validate_loan_amount, validate_repayment_amount};
use crate::accounting::schedule::monthly_due_info;
use crate::accounting::status::{evaluate_status, repayment_deadline};
use crate::accounting::{split_disbursement, CampaignStatus, MonthlyDueInfo, RepaymentPosition};
use crate::database::{DisbursementOutcome, FundingOutcome, FundingSource, LedgerStore};
use crate::errors::{AppError, Result};
use crate::models::account::{Account, AccountType, CreateAccount, Withdraw};
use crate::models::campaign::{Campaign, CreateCampaign};
use crate::models::loan::{FundFromBalance, InitializeLoanPayment, Loan};
use crate::models::payment::{InitializedPayment, PaymentIntent, PaymentPurpose, VerifiedPayment};
use crate::models::repayment::{InitializeRepayment, Repayment, RepaymentInsert};
use crate::services::paystack_service::PaymentGateway;

/// A campaign together with everything derived from its loans and repayments.
#[derive(Debug, Clone)]
pub struct CampaignOverview {
    pub campaign: Campaign,
    pub position: RepaymentPosition,
    pub monthly_repayment: Option<Decimal>,
    pub monthly_due: Option<MonthlyDueInfo>,
    pub repayment_deadline: Option<DateTime<Utc>>,
    pub has_funded: bool,
}

#[derive(Debug, Clone)]
pub enum RepaymentVerification {
    Verified {
        repayment: Repayment,
        status: CampaignStatus,
        disbursement: Option<DisbursementOutcome>,
    },
    AlreadyVerified(Repayment),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub campaigns_checked: usize,
    pub transitions_applied: usize,
    pub disbursements_completed: usize,
    pub failures: usize,
}

pub struct LendingService {
    store: Arc<dyn LedgerStore>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    timezone: FixedOffset,
}

impl LendingService {
    pub fn new(store: Arc<dyn LedgerStore>, timezone: FixedOffset) -> Self {
        LendingService {
            store,
            gateway: None,
            timezone,
        }
    }

    pub fn with_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    fn gateway(&self) -> Result<&Arc<dyn PaymentGateway>> {
        self.gateway
            .as_ref()
            .ok_or_else(|| AppError::ServiceUnavailable("Payment gateway is not configured".to_string()))
    }

    // ---------------------------------------------------------------- accounts

    pub async fn create_account(&self, request: CreateAccount, now: DateTime<Utc>) -> Result<Account> {
        request.validate()?;
        let account = Account::new(request, now);
        self.store.insert_account(&account).await?;
        info!("👤 Created {:?} account {}", account.account_type, account.id);
        Ok(account)
    }

    pub async fn get_account(&self, id: &ObjectId) -> Result<Account> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))
    }

    /// Admin approval of a founder. Founders who defaulted stay locked out.
    pub async fn approve_account(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<Account> {
        let account = self.get_account(id).await?;
        if account.has_defaulted {
            return Err(AppError::invalid_data(
                "Account has defaulted on a campaign and cannot be approved",
            ));
        }
        let account = self
            .store
            .set_account_approval(id, true, now)
            .await?
            .ok_or_else(|| AppError::not_found("Account"))?;
        info!("✅ Approved account {}", account.id);
        Ok(account)
    }

    /// Cash-out of a wallet balance. The debit is atomic and never takes the
    /// balance below zero.
    pub async fn withdraw(&self, id: &ObjectId, request: Withdraw, now: DateTime<Utc>) -> Result<Account> {
        request.validate()?;
        let account = self.store.debit_account(id, request.amount, now).await?;
        info!(
            "🏧 Account {} withdrew {} ({} left)",
            account.id, request.amount, account.balance
        );
        Ok(account)
    }

    // --------------------------------------------------------------- campaigns

    pub async fn create_campaign(&self, request: CreateCampaign, now: DateTime<Utc>) -> Result<Campaign> {
        request.validate()?;
        let founder_id = ObjectId::parse_str(&request.founder_id)?;
        let founder = self.get_account(&founder_id).await?;

        if founder.account_type != AccountType::Founder {
            return Err(AppError::Unauthorized(
                "Only founders can create campaigns".to_string(),
            ));
        }
        if !founder.is_accessible() {
            return Err(AppError::Unauthorized(
                "Founder account is not approved".to_string(),
            ));
        }

        let campaign = Campaign::new(founder_id, request, now);
        self.store.insert_campaign(&campaign).await?;
        info!("📣 Campaign {} created by founder {}", campaign.id, founder_id);
        Ok(campaign)
    }

    async fn get_campaign(&self, id: &ObjectId) -> Result<Campaign> {
        self.store
            .get_campaign(id)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))
    }

    pub async fn approve_campaign(&self, id: &ObjectId, now: DateTime<Utc>) -> Result<Campaign> {
        let campaign = self.get_campaign(id).await?;
        if campaign.status.is_terminal() {
            return Err(AppError::invalid_data(format!(
                "Campaign is {} and can no longer be approved",
                campaign.status
            )));
        }
        let campaign = self
            .store
            .set_campaign_approval(id, true, now)
            .await?
            .ok_or_else(|| AppError::not_found("Campaign"))?;
        info!("✅ Approved campaign {}", campaign.id);
        Ok(campaign)
    }

    async fn position(&self, campaign: &Campaign) -> Result<(RepaymentPosition, u32)> {
        let repayments = self.store.verified_repayments(&campaign.id).await?;
        let installments_paid = u32::try_from(repayments.len()).unwrap_or(u32::MAX);
        let position = RepaymentPosition::compute(
            campaign.goal_amount,
            campaign.interest_rate,
            repayments.iter().map(|repayment| repayment.amount),
        )?;
        Ok((position, installments_paid))
    }

    /// Defaults or closes an approved campaign when its state calls for it.
    /// Campaigns that were never approved are left alone.
    pub async fn refresh_status(&self, campaign: Campaign, now: DateTime<Utc>) -> Result<Campaign> {
        if !campaign.is_approved {
            return Ok(campaign);
        }

        let (position, _) = self.position(&campaign).await?;
        let deadline = repayment_deadline(campaign.created_at, campaign.repayment_period, &self.timezone);

        match evaluate_status(campaign.status, campaign.is_approved, deadline, position.remaining, now) {
            Some(transition) => {
                let updated = self
                    .store
                    .apply_status_transition(&campaign.id, transition, now)
                    .await?;
                info!(
                    "🔄 Campaign {} moved from {} to {}",
                    campaign.id, campaign.status, updated.status
                );
                Ok(updated)
            }
            None => Ok(campaign),
        }
    }

    async fn overview(
        &self,
        campaign: Campaign,
        lender_id: Option<&ObjectId>,
        now: DateTime<Utc>,
    ) -> Result<CampaignOverview> {
        let (position, installments_paid) = self.position(&campaign).await?;

        let has_funded = match lender_id {
            Some(lender_id) => self
                .store
                .loans_for_campaign(&campaign.id)
                .await?
                .iter()
                .any(|loan| &loan.lender_id == lender_id),
            None => false,
        };

        let monthly_repayment = campaign.monthly_repayment_amount()?;
        let monthly_due = monthly_due_info(
            campaign.funded_at,
            monthly_repayment,
            installments_paid,
            now,
            &self.timezone,
        );
        let deadline = repayment_deadline(campaign.created_at, campaign.repayment_period, &self.timezone);

        Ok(CampaignOverview {
            campaign,
            position,
            monthly_repayment,
            monthly_due,
            repayment_deadline: deadline,
            has_funded,
        })
    }

    pub async fn campaign_overview(
        &self,
        id: &ObjectId,
        lender_id: Option<&ObjectId>,
        now: DateTime<Utc>,
    ) -> Result<CampaignOverview> {
        let campaign = self.get_campaign(id).await?;
        let campaign = self.refresh_status(campaign, now).await?;
        self.overview(campaign, lender_id, now).await
    }

    /// Approved campaigns, after bringing each one's status up to date.
    pub async fn list_campaigns(
        &self,
        search: Option<&str>,
        lender_id: Option<&ObjectId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<CampaignOverview>> {
        let needle = search
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let mut overviews = Vec::new();
        for campaign in self.store.list_campaigns(true).await? {
            let campaign = self.refresh_status(campaign, now).await?;
            if !campaign.is_approved {
                continue;
            }
            if let Some(needle) = &needle {
                let matches = campaign.title.to_lowercase().contains(needle.as_str())
                    || campaign.description.to_lowercase().contains(needle.as_str());
                if !matches {
                    continue;
                }
            }
            overviews.push(self.overview(campaign, lender_id, now).await?);
        }
        Ok(overviews)
    }

    // ----------------------------------------------------------------- funding

    pub async fn initialize_loan_payment(
        &self,
        request: InitializeLoanPayment,
        now: DateTime<Utc>,
    ) -> Result<InitializedPayment> {
        request.validate()?;
        let gateway = self.gateway()?;

        let campaign_id = ObjectId::parse_str(&request.campaign_id)?;
        let lender_id = ObjectId::parse_str(&request.lender_id)?;

        let campaign = self.get_campaign(&campaign_id).await?;
        if !campaign.is_accepting_loans() {
            return Err(AppError::CampaignNotApproved);
        }
        validate_loan_amount(request.amount, campaign.goal_amount, campaign.current_amount)?;

        let lender = self.get_account(&lender_id).await?;
        if lender.account_type != AccountType::Lender {
            return Err(AppError::Unauthorized(
                "Only lenders can fund campaigns".to_string(),
            ));
        }

        let amount_minor = to_minor_units(request.amount)?;
        let intent = PaymentIntent::new(
            Uuid::new_v4().to_string(),
            PaymentPurpose::Loan,
            campaign_id,
            lender_id,
            amount_minor,
            now,
        );
        self.store.insert_payment_intent(&intent).await?;

        info!(
            "💳 Lender {} initializing loan of {} to campaign {}",
            lender_id, request.amount, campaign_id
        );
        gateway.initialize(&request.email, amount_minor, &intent.reference).await
    }

    /// Verifies `reference` with the gateway, but only for the checkout the
    /// platform opened under it.
    async fn verify_intent(
        &self,
        gateway: &Arc<dyn PaymentGateway>,
        reference: &str,
        purpose: PaymentPurpose,
        campaign_id: &ObjectId,
        payer_id: Option<&ObjectId>,
    ) -> Result<(PaymentIntent, VerifiedPayment)> {
        let intent = self
            .store
            .get_payment_intent(reference)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment reference {}", reference)))?;
        intent.ensure_matches(purpose, campaign_id, payer_id)?;

        let payment = gateway.verify(reference).await?;
        Ok((intent, payment))
    }

    /// Records the loan behind a successful gateway payment. Verifying the
    /// same reference again returns the existing loan.
    pub async fn verify_loan_payment(
        &self,
        reference: &str,
        campaign_id: &ObjectId,
        lender_id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<FundingOutcome> {
        let gateway = self.gateway()?;
        let (intent, payment) = self
            .verify_intent(gateway, reference, PaymentPurpose::Loan, campaign_id, Some(lender_id))
            .await?;
        if !payment.is_successful() {
            warn!("⚠️ Loan payment {} was not successful", reference);
            return Err(AppError::invalid_data("Payment not successful"));
        }
        intent.ensure_paid_in_full(&payment)?;

        let amount = from_minor_units(payment.amount_minor);
        let loan = Loan::new(*campaign_id, *lender_id, amount, reference, now);
        let outcome = self.store.record_loan(loan, FundingSource::Gateway, now).await?;
        log_funding(&outcome);
        Ok(outcome)
    }

    pub async fn fund_from_balance(&self, request: FundFromBalance, now: DateTime<Utc>) -> Result<FundingOutcome> {
        request.validate()?;
        let campaign_id = ObjectId::parse_str(&request.campaign_id)?;
        let lender_id = ObjectId::parse_str(&request.lender_id)?;

        let reference = format!("wallet-{}", Uuid::new_v4());
        let loan = Loan::new(campaign_id, lender_id, request.amount, reference, now);
        let outcome = self.store.record_loan(loan, FundingSource::Balance, now).await?;
        log_funding(&outcome);
        Ok(outcome)
    }

    // -------------------------------------------------------------- repayments

    pub async fn initialize_repayment(
        &self,
        request: InitializeRepayment,
        now: DateTime<Utc>,
    ) -> Result<InitializedPayment> {
        request.validate()?;
        let gateway = self.gateway()?;

        let campaign_id = ObjectId::parse_str(&request.campaign_id)?;
        let campaign = self.get_campaign(&campaign_id).await?;
        if !campaign.is_accepting_repayments() {
            return Err(AppError::CampaignNotApproved);
        }

        let (position, _) = self.position(&campaign).await?;
        validate_repayment_amount(request.amount, position.remaining)?;

        let amount_minor = to_minor_units(request.amount)?;
        let intent = PaymentIntent::new(
            Uuid::new_v4().to_string(),
            PaymentPurpose::Repayment,
            campaign_id,
            campaign.founder_id,
            amount_minor,
            now,
        );
        self.store.insert_payment_intent(&intent).await?;

        info!(
            "💰 Initializing repayment of {} for campaign {} ({} remaining)",
            request.amount, campaign_id, position.remaining
        );
        gateway.initialize(&request.email, amount_minor, &intent.reference).await
    }

    /// Records a verified repayment once per reference, re-evaluates the
    /// campaign status and pays lenders out when nothing is left owing.
    pub async fn verify_repayment(
        &self,
        reference: &str,
        campaign_id: &ObjectId,
        now: DateTime<Utc>,
    ) -> Result<RepaymentVerification> {
        let gateway = self.gateway()?;
        let (intent, payment) = self
            .verify_intent(gateway, reference, PaymentPurpose::Repayment, campaign_id, None)
            .await?;
        if !payment.is_successful() {
            warn!("⚠️ Repayment {} was not successful", reference);
            return Err(AppError::invalid_data("Repayment verification failed"));
        }
        intent.ensure_paid_in_full(&payment)?;

        let campaign = self.get_campaign(campaign_id).await?;
        let amount = from_minor_units(payment.amount_minor);

        let mut repayment = match self
            .store
            .insert_repayment(Repayment::verified(campaign.id, amount, reference, now))
            .await?
        {
            RepaymentInsert::Created(repayment) => repayment,
            RepaymentInsert::AlreadyExists(existing) => {
                info!("ℹ️ Repayment {} already verified", reference);
                return Ok(RepaymentVerification::AlreadyVerified(existing));
            }
        };

        let (position, _) = self.position(&campaign).await?;
        if position.is_fully_repaid() {
            self.store.mark_repayment_cleared(&repayment.id).await?;
            repayment.is_fully_repaid = true;
        }
        info!(
            "✅ Repayment {} of {} recorded for campaign {} ({} remaining)",
            reference, amount, campaign.id, position.remaining
        );

        let campaign = self.refresh_status(campaign, now).await?;

        let disbursement = if position.is_fully_repaid() {
            Some(self.disburse(&campaign.id, now).await?)
        } else {
            None
        };

        Ok(RepaymentVerification::Verified {
            repayment,
            status: campaign.status,
            disbursement,
        })
    }

    // ------------------------------------------------------------ disbursement

    /// Pays the total owed out to lenders in proportion to their loans. Runs
    /// at most once per campaign.
    pub async fn disburse(&self, campaign_id: &ObjectId, now: DateTime<Utc>) -> Result<DisbursementOutcome> {
        let campaign = self.get_campaign(campaign_id).await?;
        if campaign.disbursed_at.is_some() {
            return Ok(DisbursementOutcome::AlreadyDisbursed);
        }

        let (position, _) = self.position(&campaign).await?;
        if !position.is_fully_repaid() {
            return Err(AppError::invalid_data(format!(
                "Campaign is not fully repaid: {} remaining",
                position.remaining
            )));
        }

        let loans = self.store.loans_for_campaign(campaign_id).await?;
        let shares = split_disbursement(
            loans.iter().map(|loan| (loan.lender_id, loan.amount)),
            position.total_repayment,
        );
        if shares.is_empty() {
            warn!("⚠️ Campaign {} has no loans to disburse", campaign_id);
            return Ok(DisbursementOutcome::NothingToDisburse);
        }

        let outcome = self.store.disburse(campaign_id, &shares, now).await?;
        if let DisbursementOutcome::Completed { lenders_credited, total } = &outcome {
            info!(
                "💸 Disbursed {} to {} lender(s) for campaign {}",
                total, lenders_credited, campaign_id
            );
        }
        Ok(outcome)
    }

    /// Periodic pass over every campaign: apply pending status transitions
    /// and pay out fully repaid campaigns that have not been disbursed.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();

        for campaign in self.store.list_campaigns(false).await? {
            report.campaigns_checked += 1;
            let id = campaign.id;
            let before = campaign.status;

            let campaign = match self.refresh_status(campaign, now).await {
                Ok(campaign) => campaign,
                Err(e) => {
                    error!("❌ Status refresh failed for campaign {}: {}", id, e);
                    report.failures += 1;
                    continue;
                }
            };
            if campaign.status != before {
                report.transitions_applied += 1;
            }

            if campaign.disbursed_at.is_some() {
                continue;
            }
            let fully_repaid = match self.position(&campaign).await {
                Ok((position, _)) => position.is_fully_repaid(),
                Err(e) => {
                    error!("❌ Could not load repayments for campaign {}: {}", id, e);
                    report.failures += 1;
                    continue;
                }
            };
            if !fully_repaid {
                continue;
            }

            match self.disburse(&id, now).await {
                Ok(DisbursementOutcome::Completed { .. }) => report.disbursements_completed += 1,
                Ok(_) => {}
                Err(e) => {
                    error!("❌ Disbursement failed for campaign {}: {}", id, e);
                    report.failures += 1;
                }
            }
        }

        Ok(report)
    }
}

fn log_funding(outcome: &FundingOutcome) {
    match outcome {
        FundingOutcome::Recorded {
            campaign,
            loan,
            newly_funded,
        } => {
            info!(
                "🤝 Loan {} of {} recorded for campaign {} ({} / {})",
                loan.reference, loan.amount, campaign.id, campaign.current_amount, campaign.goal_amount
            );
            if *newly_funded {
                info!(
                    "🎯 Campaign {} reached its goal, founder credited {}",
                    campaign.id, campaign.goal_amount
                );
            }
        }
        FundingOutcome::Duplicate(loan) => {
            info!("ℹ️ Loan {} already recorded", loan.reference);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::payment::{PaymentStatus, VerifiedPayment};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::str::FromStr;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct StubGateway {
        payments: Mutex<HashMap<String, VerifiedPayment>>,
    }

    impl StubGateway {
        async fn settle(&self, reference: &str, amount_minor: i64) {
            self.payments.lock().await.insert(
                reference.to_string(),
                VerifiedPayment {
                    reference: reference.to_string(),
                    status: PaymentStatus::Success,
                    amount_minor,
                },
            );
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn initialize(&self, _email: &str, _amount_minor: i64, reference: &str) -> Result<InitializedPayment> {
            Ok(InitializedPayment {
                authorization_url: format!("https://checkout.test/{}", reference),
                reference: reference.to_string(),
            })
        }

        async fn verify(&self, reference: &str) -> Result<VerifiedPayment> {
            self.payments
                .lock()
                .await
                .get(reference)
                .cloned()
                .ok_or_else(|| AppError::gateway("unknown reference"))
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn at(y: i32, m: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, day, 0, 0, 0).unwrap()
    }

    /// Opens a loan checkout and has the gateway settle it.
    async fn paid_loan(
        service: &LendingService,
        gateway: &StubGateway,
        campaign: &Campaign,
        lender: &Account,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> String {
        let opened = service
            .initialize_loan_payment(
                InitializeLoanPayment {
                    campaign_id: campaign.id.to_hex(),
                    lender_id: lender.id.to_hex(),
                    email: lender.email.clone(),
                    amount: from_minor_units(amount_minor),
                },
                now,
            )
            .await
            .unwrap();
        gateway.settle(&opened.reference, amount_minor).await;
        opened.reference
    }

    /// Opens a repayment checkout and has the gateway settle it.
    async fn paid_repayment(
        service: &LendingService,
        gateway: &StubGateway,
        campaign: &Campaign,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> String {
        let opened = service
            .initialize_repayment(
                InitializeRepayment {
                    campaign_id: campaign.id.to_hex(),
                    email: "founder@example.com".to_string(),
                    amount: from_minor_units(amount_minor),
                },
                now,
            )
            .await
            .unwrap();
        gateway.settle(&opened.reference, amount_minor).await;
        opened.reference
    }

    struct Fixture {
        service: LendingService,
        gateway: Arc<StubGateway>,
        founder: Account,
        lender_a: Account,
        lender_b: Account,
        campaign: Campaign,
    }

    async fn funded_fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(StubGateway::default());
        let service = LendingService::new(store, FixedOffset::east_opt(0).unwrap())
            .with_gateway(gateway.clone());
        let start = at(2024, 1, 1);

        let founder = service
            .create_account(
                CreateAccount {
                    email: "founder@example.com".to_string(),
                    name: "Femi".to_string(),
                    account_type: AccountType::Founder,
                },
                start,
            )
            .await
            .unwrap();
        service.approve_account(&founder.id, start).await.unwrap();

        let mut lenders = Vec::new();
        for email in ["a@example.com", "b@example.com"] {
            lenders.push(
                service
                    .create_account(
                        CreateAccount {
                            email: email.to_string(),
                            name: "Lender".to_string(),
                            account_type: AccountType::Lender,
                        },
                        start,
                    )
                    .await
                    .unwrap(),
            );
        }

        let campaign = service
            .create_campaign(
                CreateCampaign {
                    founder_id: founder.id.to_hex(),
                    title: "Cassava mill".to_string(),
                    description: "A mill for the cooperative".to_string(),
                    goal_amount: d("1000"),
                    interest_rate: d("10"),
                    repayment_period: 3,
                },
                start,
            )
            .await
            .unwrap();
        service.approve_campaign(&campaign.id, start).await.unwrap();

        for (lender, amount_minor) in lenders.iter().zip([60000, 40000]) {
            let reference = paid_loan(&service, &gateway, &campaign, lender, amount_minor, start).await;
            service
                .verify_loan_payment(&reference, &campaign.id, &lender.id, start)
                .await
                .unwrap();
        }

        let lender_b = lenders.pop().unwrap();
        let lender_a = lenders.pop().unwrap();
        Fixture {
            service,
            gateway,
            founder,
            lender_a,
            lender_b,
            campaign,
        }
    }

    #[tokio::test]
    async fn reaching_the_goal_funds_and_pays_the_founder() {
        let f = funded_fixture().await;
        let overview = f
            .service
            .campaign_overview(&f.campaign.id, Some(&f.lender_a.id), at(2024, 1, 2))
            .await
            .unwrap();

        assert_eq!(overview.campaign.status, CampaignStatus::FullyFunded);
        assert_eq!(overview.campaign.funded_at, Some(at(2024, 1, 1)));
        assert!(overview.has_funded);
        assert_eq!(overview.position.total_repayment, d("1100"));

        let founder = f.service.get_account(&f.founder.id).await.unwrap();
        assert_eq!(founder.balance, d("1000"));
    }

    #[tokio::test]
    async fn full_repayment_closes_and_disburses() {
        let f = funded_fixture().await;
        let reference = paid_repayment(&f.service, &f.gateway, &f.campaign, 110000, at(2024, 2, 1)).await;

        let result = f
            .service
            .verify_repayment(&reference, &f.campaign.id, at(2024, 2, 1))
            .await
            .unwrap();

        match result {
            RepaymentVerification::Verified {
                repayment,
                status,
                disbursement,
            } => {
                assert!(repayment.is_fully_repaid);
                assert_eq!(status, CampaignStatus::FullyRepaid);
                assert!(matches!(
                    disbursement,
                    Some(DisbursementOutcome::Completed { lenders_credited: 2, .. })
                ));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let a = f.service.get_account(&f.lender_a.id).await.unwrap();
        let b = f.service.get_account(&f.lender_b.id).await.unwrap();
        assert_eq!(a.balance, d("660"));
        assert_eq!(b.balance, d("440"));
    }

    #[tokio::test]
    async fn repayment_beyond_remaining_is_rejected() {
        let f = funded_fixture().await;
        let err = f
            .service
            .initialize_repayment(
                InitializeRepayment {
                    campaign_id: f.campaign.id.to_hex(),
                    email: "founder@example.com".to_string(),
                    amount: d("1100.01"),
                },
                at(2024, 2, 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert!(err.to_string().contains("Amount exceeds remaining repayment"));
    }

    #[tokio::test]
    async fn overdue_campaign_defaults_founder() {
        let f = funded_fixture().await;
        let overview = f
            .service
            .campaign_overview(&f.campaign.id, None, at(2024, 4, 2))
            .await
            .unwrap();

        assert_eq!(overview.campaign.status, CampaignStatus::Defaulted);
        assert!(!overview.campaign.is_approved);
        let founder = f.service.get_account(&f.founder.id).await.unwrap();
        assert!(founder.has_defaulted);
        assert!(!founder.is_approved);

        let listed = f.service.list_campaigns(None, None, at(2024, 4, 2)).await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn sweep_disburses_repaid_campaigns_once() {
        let f = funded_fixture().await;
        let reference = paid_repayment(&f.service, &f.gateway, &f.campaign, 110000, at(2024, 2, 1)).await;
        f.service
            .verify_repayment(&reference, &f.campaign.id, at(2024, 2, 1))
            .await
            .unwrap();

        let report = f.service.sweep(at(2024, 2, 2)).await.unwrap();
        assert_eq!(report.disbursements_completed, 0);
        assert_eq!(report.failures, 0);

        let a = f.service.get_account(&f.lender_a.id).await.unwrap();
        assert_eq!(a.balance, d("660"));
    }

    #[tokio::test]
    async fn payment_routes_need_a_gateway() {
        let service = LendingService::new(Arc::new(MemoryStore::default()), FixedOffset::east_opt(0).unwrap());
        let err = service
            .verify_repayment("rep-1", &ObjectId::new(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn loan_reference_cannot_be_replayed_as_a_repayment() {
        let f = funded_fixture().await;
        let lender_c = f
            .service
            .create_account(
                CreateAccount {
                    email: "c@example.com".to_string(),
                    name: "Lender".to_string(),
                    account_type: AccountType::Lender,
                },
                at(2024, 1, 1),
            )
            .await
            .unwrap();
        // A second, still open campaign to lend into.
        let second = f
            .service
            .create_campaign(
                CreateCampaign {
                    founder_id: f.founder.id.to_hex(),
                    title: "Second mill".to_string(),
                    description: "Another mill".to_string(),
                    goal_amount: d("1000"),
                    interest_rate: d("10"),
                    repayment_period: 3,
                },
                at(2024, 1, 1),
            )
            .await
            .unwrap();
        f.service.approve_campaign(&second.id, at(2024, 1, 1)).await.unwrap();
        let reference = paid_loan(&f.service, &f.gateway, &second, &lender_c, 100000, at(2024, 1, 2)).await;
        f.service
            .verify_loan_payment(&reference, &second.id, &lender_c.id, at(2024, 1, 2))
            .await
            .unwrap();

        let err = f
            .service
            .verify_repayment(&reference, &second.id, at(2024, 1, 3))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let overview = f.service.campaign_overview(&second.id, None, at(2024, 1, 3)).await.unwrap();
        assert_eq!(overview.position.repaid, Decimal::ZERO);
        assert!(overview.campaign.disbursed_at.is_none());
    }

    #[tokio::test]
    async fn references_are_bound_to_their_campaign_and_lender() {
        let f = funded_fixture().await;
        let reference = paid_repayment(&f.service, &f.gateway, &f.campaign, 50000, at(2024, 2, 1)).await;

        let other_campaign = ObjectId::new();
        let err = f
            .service
            .verify_repayment(&reference, &other_campaign, at(2024, 2, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("different campaign"));

        let err = f
            .service
            .verify_loan_payment("never-opened", &f.campaign.id, &f.lender_a.id, at(2024, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn non_positive_settlements_are_rejected() {
        let f = funded_fixture().await;
        let reference = paid_repayment(&f.service, &f.gateway, &f.campaign, 50000, at(2024, 2, 1)).await;
        f.gateway.settle(&reference, 0).await;

        let err = f
            .service
            .verify_repayment(&reference, &f.campaign.id, at(2024, 2, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PaymentGateway(_)));
        assert!(f.service.store.verified_repayments(&f.campaign.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn withdrawal_never_overdraws() {
        let f = funded_fixture().await;
        let err = f
            .service
            .withdraw(&f.founder.id, Withdraw { amount: d("1000.01") }, at(2024, 1, 2))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientBalance { .. }));

        let founder = f
            .service
            .withdraw(&f.founder.id, Withdraw { amount: d("400") }, at(2024, 1, 2))
            .await
            .unwrap();
        assert_eq!(founder.balance, d("600"));
    }
}
