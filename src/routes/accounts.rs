use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::accounts::{approve_account, create_account, get_account, withdraw};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // POST /api/accounts - Register a founder or lender
        .route("/", post(create_account))
        // GET /api/accounts/:id - Account with wallet balance
        .route("/:id", get(get_account))
        // POST /api/accounts/:id/approve - Admin approval of a founder
        .route("/:id/approve", post(approve_account))
        // POST /api/accounts/:id/withdraw - Cash out of the wallet balance
        .route("/:id/withdraw", post(withdraw))
}
