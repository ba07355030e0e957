use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::repayments::{initialize_repayment, verify_repayment};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/initialize", post(initialize_repayment))
        // GET /api/repayments/verify/:reference?campaign_id=...
        .route("/verify/:reference", get(verify_repayment))
}
