mod helpers;

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::str::FromStr;

use helpers::TestContext;
use lendfund_api::accounting::CampaignStatus;
use lendfund_api::database::LedgerStore;
use lendfund_api::models::account::{AccountType, CreateAccount};
use lendfund_api::models::campaign::CreateCampaign;
use lendfund_api::services::lending_service::RepaymentVerification;
use mongodb::bson::oid::ObjectId;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn at(y: i32, m: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, day, 0, 0, 0).unwrap()
}

struct Seeded {
    founder: ObjectId,
    lender: ObjectId,
    campaign: ObjectId,
}

/// Campaign created and fully funded on 2024-01-01: goal 1000, 10%, 3 months.
async fn funded_on_new_year(ctx: &TestContext) -> Seeded {
    let start = at(2024, 1, 1);
    let lending = &ctx.lending;

    let founder = lending
        .create_account(
            CreateAccount {
                email: "founder@example.com".to_string(),
                name: "Founder".to_string(),
                account_type: AccountType::Founder,
            },
            start,
        )
        .await
        .unwrap();
    lending.approve_account(&founder.id, start).await.unwrap();

    let lender = lending
        .create_account(
            CreateAccount {
                email: "lender@example.com".to_string(),
                name: "Lender".to_string(),
                account_type: AccountType::Lender,
            },
            start,
        )
        .await
        .unwrap();

    let campaign = lending
        .create_campaign(
            CreateCampaign {
                founder_id: founder.id.to_hex(),
                title: "Poultry farm".to_string(),
                description: "Two new coops".to_string(),
                goal_amount: d("1000"),
                interest_rate: d("10"),
                repayment_period: 3,
            },
            start,
        )
        .await
        .unwrap();
    lending.approve_campaign(&campaign.id, start).await.unwrap();

    let reference = ctx.settled_loan(&campaign.id, &lender.id, 100000, start).await;
    lending
        .verify_loan_payment(&reference, &campaign.id, &lender.id, start)
        .await
        .unwrap();

    Seeded {
        founder: founder.id,
        lender: lender.id,
        campaign: campaign.id,
    }
}

#[tokio::test]
async fn monthly_due_info_tracks_installments() {
    let ctx = TestContext::new();
    let seeded = funded_on_new_year(&ctx).await;

    let reference = ctx.settled_repayment(&seeded.campaign, 36667, at(2024, 2, 1)).await;
    ctx.lending
        .verify_repayment(&reference, &seeded.campaign, at(2024, 2, 1))
        .await
        .unwrap();

    let overview = ctx
        .lending
        .campaign_overview(&seeded.campaign, None, at(2024, 3, 15))
        .await
        .unwrap();
    let due = overview.monthly_due.unwrap();
    assert_eq!(due.monthly_repayment, d("366.67"));
    assert_eq!(due.installments_due, 2);
    assert_eq!(due.installments_paid, 1);
    assert!(due.due_this_month);
    assert_eq!(due.amount_due, d("366.67"));
    assert_eq!(due.next_due_date, at(2024, 3, 1));
    assert_eq!(overview.campaign.status, CampaignStatus::FullyFunded);
}

#[tokio::test]
async fn default_is_applied_once_by_the_sweep() {
    let ctx = TestContext::new();
    let seeded = funded_on_new_year(&ctx).await;

    let first = ctx.lending.sweep(at(2024, 4, 2)).await.unwrap();
    assert_eq!(first.transitions_applied, 1);
    assert_eq!(first.failures, 0);

    let founder = ctx.store.get_account(&seeded.founder).await.unwrap().unwrap();
    assert!(founder.has_defaulted);
    assert!(!founder.is_approved);
    let campaign = ctx.store.get_campaign(&seeded.campaign).await.unwrap().unwrap();
    assert_eq!(campaign.status, CampaignStatus::Defaulted);
    assert!(!campaign.is_approved);

    let second = ctx.lending.sweep(at(2024, 4, 3)).await.unwrap();
    assert_eq!(second.transitions_applied, 0);
    let again = ctx.store.get_campaign(&seeded.campaign).await.unwrap().unwrap();
    assert_eq!(again.updated_at, campaign.updated_at);

    // A defaulted campaign cannot be revived.
    assert!(ctx.lending.approve_campaign(&seeded.campaign, at(2024, 4, 4)).await.is_err());
    assert!(ctx.lending.approve_account(&seeded.founder, at(2024, 4, 4)).await.is_err());
}

#[tokio::test]
async fn on_the_deadline_the_campaign_is_not_overdue() {
    let ctx = TestContext::new();
    let seeded = funded_on_new_year(&ctx).await;

    let report = ctx.lending.sweep(at(2024, 4, 1)).await.unwrap();
    assert_eq!(report.transitions_applied, 0);
    let campaign = ctx.store.get_campaign(&seeded.campaign).await.unwrap().unwrap();
    assert_eq!(campaign.status, CampaignStatus::FullyFunded);
}

#[tokio::test]
async fn concurrent_verification_of_one_reference_credits_once() {
    let ctx = TestContext::new();
    let seeded = funded_on_new_year(&ctx).await;
    let now = at(2024, 2, 1);
    let reference = ctx.settled_repayment(&seeded.campaign, 110000, now).await;

    let (a, b) = tokio::join!(
        ctx.lending.verify_repayment(&reference, &seeded.campaign, now),
        ctx.lending.verify_repayment(&reference, &seeded.campaign, now),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let recorded = outcomes
        .iter()
        .filter(|o| matches!(o, RepaymentVerification::Verified { .. }))
        .count();
    assert_eq!(recorded, 1);

    assert_eq!(ctx.store.repayment_count().await, 1);
    let lender = ctx.store.get_account(&seeded.lender).await.unwrap().unwrap();
    assert_eq!(lender.balance, d("1100"));
}

#[tokio::test]
async fn late_full_repayment_still_reaches_lenders() {
    let ctx = TestContext::new();
    let seeded = funded_on_new_year(&ctx).await;
    // Paid at the checkout before the deadline, confirmed only after the default.
    let reference = ctx.settled_repayment(&seeded.campaign, 110000, at(2024, 3, 30)).await;
    ctx.lending.sweep(at(2024, 4, 2)).await.unwrap();

    ctx.lending
        .verify_repayment(&reference, &seeded.campaign, at(2024, 5, 1))
        .await
        .unwrap();

    let campaign = ctx.store.get_campaign(&seeded.campaign).await.unwrap().unwrap();
    assert_eq!(campaign.status, CampaignStatus::Defaulted);
    assert!(campaign.disbursed_at.is_some());
    let lender = ctx.store.get_account(&seeded.lender).await.unwrap().unwrap();
    assert_eq!(lender.balance, d("1100"));
}
