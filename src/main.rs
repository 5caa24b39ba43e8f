use dotenvy::dotenv;
use streamshop::config::{self, AppConfig};
use streamshop::core::settings;
use streamshop::crypto::CredentialCipher;
use streamshop::errors::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = AppConfig::from_env()?;
    let _cipher = CredentialCipher::new(&app_config.encryption_key)?;
    info!("configuration loaded, encryption key validated");

    // 4. Initialize the database
    let db = config::database::create_connection(&app_config.database_url).await?;
    config::database::create_tables(&db).await?;
    info!("database initialized");

    // 5. Ensure the configuration singleton exists
    settings::get_or_create(&db).await?;
    info!("core services ready");

    Ok(())
}
