use mongodb::{Client, Database};
use tracing::{info, warn};

use crate::errors::{AppError, Result};

pub async fn get_db_client(database_url: &str, db_name: &str) -> Result<(Client, Database)> {
    let client = Client::with_uri_str(database_url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to MongoDB: {}", e)))?;

    let db = client.database(db_name);

    // Verify the database is reachable by listing collections
    match db.list_collection_names().await {
        Ok(collections) => {
            info!("✅ Connected to database: {}", db_name);
            info!("📂 Collections found: {:?}", collections);

            for expected in ["campaigns", "loans", "repayments", "accounts", "payment_intents"] {
                if !collections.iter().any(|c| c == expected) {
                    warn!("⚠️ '{}' collection not found, it will be created on first write", expected);
                }
            }
        }
        Err(e) => {
            return Err(AppError::configuration(format!(
                "Database '{}' is inaccessible: {}",
                db_name, e
            )));
        }
    }

    Ok((client, db))
}
