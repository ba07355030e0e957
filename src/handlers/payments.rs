use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::info;

use crate::{
    dtos::lending_dtos::{FundingResponse, PaymentInitResponse},
    errors::Result,
    models::loan::{FundFromBalance, InitializeLoanPayment, VerifyLoanQuery},
    state::AppState,
};

// Open a gateway checkout for a loan
pub async fn initialize_payment(
    State(state): State<AppState>,
    Json(payload): Json<InitializeLoanPayment>,
) -> Result<Json<PaymentInitResponse>> {
    info!(
        "💳 Loan payment requested: {} to campaign {}",
        payload.amount, payload.campaign_id
    );

    let data = state.lending.initialize_loan_payment(payload, Utc::now()).await?;
    Ok(Json(PaymentInitResponse {
        success: true,
        message: "Payment initialized successfully".to_string(),
        data,
    }))
}

// Confirm a gateway payment and record the loan
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<VerifyLoanQuery>,
) -> Result<Json<FundingResponse>> {
    info!("🔍 Verifying loan payment {}", reference);

    let campaign_id = ObjectId::parse_str(&query.campaign_id)?;
    let lender_id = ObjectId::parse_str(&query.lender_id)?;

    let outcome = state
        .lending
        .verify_loan_payment(&reference, &campaign_id, &lender_id, Utc::now())
        .await?;
    Ok(Json(outcome.into()))
}

// Lend from the lender's wallet balance
pub async fn fund_from_balance(
    State(state): State<AppState>,
    Json(payload): Json<FundFromBalance>,
) -> Result<Json<FundingResponse>> {
    info!(
        "👛 Wallet funding: lender {} lends {} to campaign {}",
        payload.lender_id, payload.amount, payload.campaign_id
    );

    let outcome = state.lending.fund_from_balance(payload, Utc::now()).await?;
    let mut response = FundingResponse::from(outcome);
    response.message = "Loan funded from balance".to_string();
    Ok(Json(response))
}
