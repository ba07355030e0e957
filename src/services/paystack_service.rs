// services/paystack_service.rs
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::PaystackConfig;
use crate::errors::{AppError, Result};
use crate::models::payment::{InitializedPayment, PaymentStatus, VerifiedPayment};

/// The hosted checkout the platform collects loans and repayments through.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout for `amount_minor` (kobo, cents) under `reference`.
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
    ) -> Result<InitializedPayment>;

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment>;
}

#[derive(Debug, Serialize)]
pub struct InitializeRequest<'a> {
    pub email: &'a str,
    pub amount: i64,
    pub currency: &'a str,
    pub reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct PaystackEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

#[derive(Debug, Deserialize)]
pub struct InitializeData {
    pub authorization_url: String,
    #[serde(default)]
    pub access_code: Option<String>,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyData {
    pub status: String,
    pub amount: i64,
    pub reference: String,
    #[serde(default)]
    pub currency: String,
}

impl VerifyData {
    /// The transaction must be the one asked about, charged in our currency.
    fn ensure_describes(&self, reference: &str, currency: &str) -> Result<()> {
        if self.reference != reference {
            return Err(AppError::gateway(format!(
                "Paystack verified {} when asked for {}",
                self.reference, reference
            )));
        }
        if !self.currency.eq_ignore_ascii_case(currency) {
            return Err(AppError::gateway(format!(
                "Payment {} was made in {:?}, expected {}",
                reference, self.currency, currency
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct PaystackService {
    config: PaystackConfig,
    client: Client,
}

impl PaystackService {
    pub fn new(config: PaystackConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(PaystackService { config, client })
    }

    fn initialize_url(&self) -> String {
        format!("{}/transaction/initialize", self.config.base_url)
    }

    fn verify_url(&self, reference: &str) -> String {
        format!("{}/transaction/verify/{}", self.config.base_url, reference)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(
            header::AUTHORIZATION,
            format!("Bearer {}", self.config.secret_key),
        )
    }

    /// Sends a request, retrying timeouts, connection failures and 5xx
    /// answers with exponential backoff.
    async fn send_with_retry<T, F>(&self, operation: &str, build: F) -> Result<PaystackEnvelope<T>>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt: u32 = 0;
        loop {
            let outcome = build().send().await;

            let retryable = match &outcome {
                Ok(response) => response.status().is_server_error(),
                Err(e) => e.is_timeout() || e.is_connect(),
            };

            if retryable && attempt < self.config.max_retries {
                attempt += 1;
                let delay = backoff(attempt);
                warn!(
                    "⚠️ Paystack {} failed, retrying in {:?} (attempt {}/{})",
                    operation, delay, attempt, self.config.max_retries
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let response = outcome.map_err(|e| {
                error!("❌ Paystack {} request failed: {}", operation, e);
                AppError::gateway(format!("Paystack {} request failed: {}", operation, e))
            })?;

            let status = response.status();
            let body = response.text().await?;

            if status != StatusCode::OK {
                error!("❌ Paystack {} returned {}: {}", operation, status, body);
                return Err(AppError::gateway(format!(
                    "Paystack {} error: {}",
                    operation,
                    extract_message(&body).unwrap_or_else(|| status.to_string())
                )));
            }

            let envelope: PaystackEnvelope<T> = serde_json::from_str(&body).map_err(|e| {
                AppError::gateway(format!("Unexpected Paystack {} response: {}", operation, e))
            })?;

            if !envelope.status {
                return Err(AppError::gateway(format!(
                    "Paystack {} rejected: {}",
                    operation, envelope.message
                )));
            }

            return Ok(envelope);
        }
    }
}

#[async_trait]
impl PaymentGateway for PaystackService {
    async fn initialize(
        &self,
        email: &str,
        amount_minor: i64,
        reference: &str,
    ) -> Result<InitializedPayment> {
        if amount_minor <= 0 {
            return Err(AppError::invalid_data("Amount must be greater than 0"));
        }

        info!("💳 Initializing Paystack payment {} for {} ({} minor units)", reference, email, amount_minor);

        let payload = InitializeRequest {
            email,
            amount: amount_minor,
            currency: &self.config.currency,
            reference,
            callback_url: self.config.callback_url.as_deref(),
        };

        let envelope: PaystackEnvelope<InitializeData> = self
            .send_with_retry("initialize", || {
                self.authorized(self.client.post(self.initialize_url()))
                    .json(&payload)
            })
            .await?;

        let data = envelope
            .data
            .ok_or_else(|| AppError::gateway("Paystack initialize returned no data"))?;

        info!("✅ Paystack checkout opened for {}", data.reference);
        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<VerifiedPayment> {
        info!("🔍 Verifying Paystack payment {}", reference);

        let envelope: PaystackEnvelope<VerifyData> = self
            .send_with_retry("verify", || self.authorized(self.client.get(self.verify_url(reference))))
            .await?;

        let data = envelope
            .data
            .ok_or_else(|| AppError::gateway("Paystack verify returned no data"))?;
        data.ensure_describes(reference, &self.config.currency)?;

        let status = if data.status == "success" {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        };

        info!("📄 Paystack payment {} is {}", data.reference, data.status);
        Ok(VerifiedPayment {
            reference: data.reference,
            status,
            amount_minor: data.amount,
        })
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(250u64.saturating_mul(1u64 << attempt.min(6)))
}

fn extract_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}
