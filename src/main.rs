use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use lendfund_api::build_router;
use lendfund_api::config::{AppConfig, StorageBackend};
use lendfund_api::database::connection::get_db_client;
use lendfund_api::database::{LedgerStore, MemoryStore, MongoStore};
use lendfund_api::services::lending_service::LendingService;
use lendfund_api::services::paystack_service::PaystackService;
use lendfund_api::services::sweep::spawn_disbursement_sweep;
use lendfund_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("✅ App config loaded: {}", config.get_config_info());

    let store = initialize_store(&config).await?;
    let lending = Arc::new(initialize_lending(&config, store));

    let sweep = spawn_disbursement_sweep(lending.clone(), config.sweep_interval);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;

    let app = build_router(AppState::new(lending, config));

    tracing::info!("🚀 Server starting on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweep.stop().await;
    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn initialize_store(config: &AppConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.storage_backend {
        StorageBackend::Mongo => {
            let (client, db) = get_db_client(&config.database_url, &config.database_name).await?;
            let store = MongoStore::new(client, db);
            store.ensure_indexes().await.context("failed to create indexes")?;
            tracing::info!("✅ MongoDB ledger store ready");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            tracing::warn!("⚠️ Using in-memory storage, data is lost on restart");
            Ok(Arc::new(MemoryStore::default()))
        }
    }
}

fn initialize_lending(config: &AppConfig, store: Arc<dyn LedgerStore>) -> LendingService {
    let lending = LendingService::new(store, config.business_timezone);

    tracing::info!("🔧 Attempting to initialize Paystack service...");
    let Some(paystack) = config.paystack.clone() else {
        tracing::warn!("PAYSTACK_SECRET_KEY not set, payment routes will answer 503");
        return lending;
    };

    match PaystackService::new(paystack) {
        Ok(service) => {
            tracing::info!("✅ Paystack service initialized and ready");
            lending.with_gateway(Arc::new(service))
        }
        Err(e) => {
            tracing::error!("❌ Failed to initialize Paystack service: {}", e);
            tracing::warn!("Payment routes will be disabled");
            lending
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
