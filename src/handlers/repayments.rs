use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::info;

use crate::{
    dtos::lending_dtos::{PaymentInitResponse, RepaymentResponse},
    errors::Result,
    models::repayment::{InitializeRepayment, VerifyRepaymentQuery},
    state::AppState,
};

pub async fn initialize_repayment(
    State(state): State<AppState>,
    Json(payload): Json<InitializeRepayment>,
) -> Result<Json<PaymentInitResponse>> {
    info!(
        "💰 Repayment of {} requested for campaign {}",
        payload.amount, payload.campaign_id
    );

    let data = state.lending.initialize_repayment(payload, Utc::now()).await?;
    Ok(Json(PaymentInitResponse {
        success: true,
        message: "Repayment initialized successfully".to_string(),
        data,
    }))
}

// Safe to call repeatedly; a reference is only ever recorded once
pub async fn verify_repayment(
    State(state): State<AppState>,
    Path(reference): Path<String>,
    Query(query): Query<VerifyRepaymentQuery>,
) -> Result<Json<RepaymentResponse>> {
    info!("🔍 Verifying repayment {}", reference);

    let campaign_id = ObjectId::parse_str(&query.campaign_id)?;
    let verification = state
        .lending
        .verify_repayment(&reference, &campaign_id, Utc::now())
        .await?;
    Ok(Json(verification.into()))
}
