use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::lending_service::LendingService;

#[derive(Clone)]
pub struct AppState {
    pub lending: Arc<LendingService>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(lending: Arc<LendingService>, config: AppConfig) -> Self {
        AppState {
            lending,
            config: Arc::new(config),
        }
    }
}
