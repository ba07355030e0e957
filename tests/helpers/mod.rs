#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, FixedOffset, Utc};
use mongodb::bson::oid::ObjectId;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

use lendfund_api::build_router;
use lendfund_api::config::AppConfig;
use lendfund_api::database::MemoryStore;
use lendfund_api::errors::{AppError, Result};
use lendfund_api::models::loan::InitializeLoanPayment;
use lendfund_api::models::payment::{InitializedPayment, PaymentStatus, VerifiedPayment};
use lendfund_api::models::repayment::InitializeRepayment;
use lendfund_api::services::lending_service::LendingService;
use lendfund_api::services::paystack_service::PaymentGateway;
use lendfund_api::state::AppState;

/// Gateway double: tests decide how each reference verifies.
#[derive(Default)]
pub struct FakeGateway {
    payments: Mutex<HashMap<String, VerifiedPayment>>,
    pub initialized: Mutex<Vec<(String, i64, String)>>,
    pub verify_calls: Mutex<usize>,
}

impl FakeGateway {
    pub async fn succeed(&self, reference: &str, amount_minor: i64) {
        self.script(reference, PaymentStatus::Success, amount_minor).await;
    }

    pub async fn fail(&self, reference: &str, amount_minor: i64) {
        self.script(reference, PaymentStatus::Failed, amount_minor).await;
    }

    async fn script(&self, reference: &str, status: PaymentStatus, amount_minor: i64) {
        self.payments.lock().await.insert(
            reference.to_string(),
            VerifiedPayment {
                reference: reference.to_string(),
                status,
                amount_minor,
            },
        );
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(&self, email: &str, amount_minor: i64, reference: &str) -> Result<InitializedPayment> {
        self.initialized
            .lock()
            .await
            .push((email.to_string(), amount_minor, reference.to_string()));
        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.test/{}", reference),
            reference: reference.to_string(),
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment> {
        *self.verify_calls.lock().await += 1;
        self.payments
            .lock()
            .await
            .get(reference)
            .cloned()
            .ok_or_else(|| AppError::gateway(format!("Transaction reference not found: {}", reference)))
    }
}

pub struct TestContext {
    pub app: Router,
    pub store: Arc<MemoryStore>,
    pub gateway: Arc<FakeGateway>,
    pub lending: Arc<LendingService>,
}

impl TestContext {
    pub fn new() -> Self {
        Self::build(true)
    }

    pub fn without_gateway() -> Self {
        Self::build(false)
    }

    fn build(with_gateway: bool) -> Self {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(FakeGateway::default());

        let mut lending = LendingService::new(store.clone(), FixedOffset::east_opt(0).unwrap());
        if with_gateway {
            lending = lending.with_gateway(gateway.clone());
        }
        let lending = Arc::new(lending);

        let config = AppConfig::from_lookup(|key| match key {
            "STORAGE_BACKEND" => Some("memory".to_string()),
            _ => None,
        })
        .unwrap();

        let app = build_router(AppState::new(lending.clone(), config));
        TestContext {
            app,
            store,
            gateway,
            lending,
        }
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    pub async fn create_account(&self, email: &str, account_type: &str) -> String {
        let (status, body) = self
            .post(
                "/api/accounts",
                serde_json::json!({ "email": email, "name": "Test User", "account_type": account_type }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    pub async fn approved_founder(&self, email: &str) -> String {
        let id = self.create_account(email, "founder").await;
        let (status, body) = self.post(&format!("/api/accounts/{}/approve", id), Value::Null).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        id
    }

    /// An approved campaign: goal 1000, 10% interest, 3 months.
    pub async fn approved_campaign(&self, founder_id: &str) -> String {
        let (status, body) = self
            .post(
                "/api/campaigns",
                serde_json::json!({
                    "founder_id": founder_id,
                    "title": "Solar kiosks",
                    "description": "Ten solar kiosks for market traders",
                    "goal_amount": "1000",
                    "interest_rate": "10",
                    "repayment_period": 3
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let id = body["id"].as_str().unwrap().to_string();

        let (status, body) = self.post(&format!("/api/campaigns/{}/approve", id), Value::Null).await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        id
    }

    /// Opens a loan checkout over HTTP and returns the gateway reference.
    pub async fn open_loan(&self, campaign_id: &str, lender_id: &str, amount_minor: i64) -> (StatusCode, Value) {
        self.post(
            "/api/payments/initialize",
            json!({
                "campaign_id": campaign_id,
                "lender_id": lender_id,
                "email": "lender@example.com",
                "amount": Decimal::new(amount_minor, 2).to_string()
            }),
        )
        .await
    }

    pub async fn verify_loan(&self, campaign_id: &str, lender_id: &str, reference: &str) -> (StatusCode, Value) {
        self.get(&format!(
            "/api/payments/verify/{}?campaign_id={}&lender_id={}",
            reference, campaign_id, lender_id
        ))
        .await
    }

    /// Opens, pays and verifies a loan. Returns the opening response when
    /// the checkout is refused.
    pub async fn fund(&self, campaign_id: &str, lender_id: &str, amount_minor: i64) -> (StatusCode, Value) {
        let (status, body) = self.open_loan(campaign_id, lender_id, amount_minor).await;
        if status != StatusCode::OK {
            return (status, body);
        }
        let reference = body["data"]["reference"].as_str().unwrap().to_string();
        self.gateway.succeed(&reference, amount_minor).await;
        self.verify_loan(campaign_id, lender_id, &reference).await
    }

    /// Opens a repayment checkout the gateway will settle, returning its reference.
    pub async fn paid_repayment(&self, campaign_id: &str, amount_minor: i64) -> String {
        let (status, body) = self
            .post(
                "/api/repayments/initialize",
                json!({
                    "campaign_id": campaign_id,
                    "email": "founder@example.com",
                    "amount": Decimal::new(amount_minor, 2).to_string()
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        let reference = body["data"]["reference"].as_str().unwrap().to_string();
        self.gateway.succeed(&reference, amount_minor).await;
        reference
    }

    pub async fn verify_repayment(&self, campaign_id: &str, reference: &str) -> (StatusCode, Value) {
        self.get(&format!(
            "/api/repayments/verify/{}?campaign_id={}",
            reference, campaign_id
        ))
        .await
    }

    pub async fn repay(&self, campaign_id: &str, amount_minor: i64) -> (StatusCode, Value) {
        let reference = self.paid_repayment(campaign_id, amount_minor).await;
        self.verify_repayment(campaign_id, &reference).await
    }

    /// Service-level loan checkout, settled by the gateway.
    pub async fn settled_loan(
        &self,
        campaign_id: &ObjectId,
        lender_id: &ObjectId,
        amount_minor: i64,
        now: DateTime<Utc>,
    ) -> String {
        let opened = self
            .lending
            .initialize_loan_payment(
                InitializeLoanPayment {
                    campaign_id: campaign_id.to_hex(),
                    lender_id: lender_id.to_hex(),
                    email: "lender@example.com".to_string(),
                    amount: Decimal::new(amount_minor, 2),
                },
                now,
            )
            .await
            .unwrap();
        self.gateway.succeed(&opened.reference, amount_minor).await;
        opened.reference
    }

    /// Service-level repayment checkout, settled by the gateway.
    pub async fn settled_repayment(&self, campaign_id: &ObjectId, amount_minor: i64, now: DateTime<Utc>) -> String {
        let opened = self
            .lending
            .initialize_repayment(
                InitializeRepayment {
                    campaign_id: campaign_id.to_hex(),
                    email: "founder@example.com".to_string(),
                    amount: Decimal::new(amount_minor, 2),
                },
                now,
            )
            .await
            .unwrap();
        self.gateway.succeed(&opened.reference, amount_minor).await;
        opened.reference
    }
}
