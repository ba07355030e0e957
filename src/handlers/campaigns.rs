use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::Utc;
use mongodb::bson::oid::ObjectId;
use tracing::info;

use crate::{
    dtos::lending_dtos::{CampaignResponse, DisbursementResponse},
    errors::Result,
    models::campaign::{CampaignQuery, CreateCampaign},
    state::AppState,
};

fn lender_filter(query: &CampaignQuery) -> Result<Option<ObjectId>> {
    match query.lender_id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => Ok(Some(ObjectId::parse_str(id)?)),
        None => Ok(None),
    }
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(payload): Json<CreateCampaign>,
) -> Result<Json<CampaignResponse>> {
    info!("📣 Creating campaign '{}' for founder {}", payload.title, payload.founder_id);

    let now = Utc::now();
    let campaign = state.lending.create_campaign(payload, now).await?;
    let overview = state.lending.campaign_overview(&campaign.id, None, now).await?;
    Ok(Json(overview.into()))
}

// Approved campaigns only; statuses are refreshed before listing
pub async fn list_campaigns(
    State(state): State<AppState>,
    Query(query): Query<CampaignQuery>,
) -> Result<Json<Vec<CampaignResponse>>> {
    info!("🔍 GET /api/campaigns called, search: {:?}", query.search);

    let lender_id = lender_filter(&query)?;
    let overviews = state
        .lending
        .list_campaigns(query.search.as_deref(), lender_id.as_ref(), Utc::now())
        .await?;

    info!("✅ Returning {} campaign(s)", overviews.len());
    Ok(Json(overviews.into_iter().map(CampaignResponse::from).collect()))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CampaignQuery>,
) -> Result<Json<CampaignResponse>> {
    let id = ObjectId::parse_str(&id)?;
    let lender_id = lender_filter(&query)?;

    let overview = state
        .lending
        .campaign_overview(&id, lender_id.as_ref(), Utc::now())
        .await?;
    Ok(Json(overview.into()))
}

pub async fn approve_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CampaignResponse>> {
    info!("🔐 Approving campaign {}", id);

    let id = ObjectId::parse_str(&id)?;
    let now = Utc::now();
    state.lending.approve_campaign(&id, now).await?;
    let overview = state.lending.campaign_overview(&id, None, now).await?;
    Ok(Json(overview.into()))
}

// Manual trigger for lender payout; the sweep does the same periodically
pub async fn disburse_campaign(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DisbursementResponse>> {
    info!("💸 Disbursement requested for campaign {}", id);

    let id = ObjectId::parse_str(&id)?;
    let outcome = state.lending.disburse(&id, Utc::now()).await?;
    Ok(Json(outcome.into()))
}
