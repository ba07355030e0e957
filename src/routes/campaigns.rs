use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::campaigns::{
    approve_campaign, create_campaign, disburse_campaign, get_campaign, list_campaigns,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // GET /api/campaigns?search=solar - Approved campaigns
        // POST /api/campaigns - Create a campaign (approved founders only)
        .route("/", get(list_campaigns).post(create_campaign))
        // GET /api/campaigns/:id?lender_id=... - Campaign detail with repayment figures
        .route("/:id", get(get_campaign))
        .route("/:id/approve", post(approve_campaign))
        .route("/:id/disburse", post(disburse_campaign))
}
