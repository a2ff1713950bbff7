use mongodb::{bson::doc, Client, Database};

use crate::config::AppConfig;
use crate::errors::{AppError, Result};

pub async fn get_db_client(config: &AppConfig) -> Result<Database> {
    let client = Client::with_uri_str(&config.database_url)
        .await
        .map_err(|e| AppError::configuration(format!("Failed to connect to MongoDB: {}", e)))?;

    let db = client.database(&config.database_name);

    // Fail fast at startup: an unreachable store is fatal.
    db.run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| AppError::configuration(format!("MongoDB ping failed: {}", e)))?;

    match db.list_collection_names().await {
        Ok(collections) => {
            tracing::info!("✅ Connected to database: {}", config.database_name);
            tracing::info!("📂 Collections found: {:?}", collections);

            if !collections.iter().any(|name| name == "matches") {
                tracing::warn!("⚠️ 'matches' collection not found, it will be created on first write");
            }
        }
        Err(e) => {
            tracing::warn!("❌ Could not list collections in '{}': {}", config.database_name, e);
        }
    }

    Ok(db)
}
