use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::info;

use crate::{
    dtos::lending_dtos::{AccountResponse, WithdrawalResponse},
    errors::Result,
    models::account::{CreateAccount, Withdraw},
    state::AppState,
};

// Register a founder or lender
pub async fn create_account(
    State(state): State<AppState>,
    Json(payload): Json<CreateAccount>,
) -> Result<Json<AccountResponse>> {
    info!("👤 Registering {:?} account for {}", payload.account_type, payload.email);

    let account = state.lending.create_account(payload, Utc::now()).await?;
    Ok(Json(account.into()))
}

pub async fn get_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>> {
    let id = ObjectId::parse_str(&id)?;
    let account = state.lending.get_account(&id).await?;
    Ok(Json(account.into()))
}

// Admin approval of a founder account
pub async fn approve_account(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AccountResponse>> {
    info!("🔐 Approving account {}", id);

    let id = ObjectId::parse_str(&id)?;
    let account = state.lending.approve_account(&id, Utc::now()).await?;
    Ok(Json(account.into()))
}

// Cash out part of the wallet balance
pub async fn withdraw(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<Withdraw>,
) -> Result<Json<WithdrawalResponse>> {
    info!("🏧 Withdrawal of {} requested by account {}", payload.amount, id);

    let id = ObjectId::parse_str(&id)?;
    let account = state.lending.withdraw(&id, payload, Utc::now()).await?;
    Ok(Json(account.into()))
}
