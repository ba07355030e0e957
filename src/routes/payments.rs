use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::payments::{fund_from_balance, initialize_payment, verify_payment};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize_payment))
        // GET /api/payments/verify/:reference?campaign_id=...&lender_id=...
        .route("/verify/:reference", get(verify_payment))
        .route("/fund-from-balance", post(fund_from_balance))
}
