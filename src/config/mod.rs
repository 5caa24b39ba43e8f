//! Application configuration loaded from the environment.

/// Database connection and table creation
pub mod database;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::errors::{Error, Result};

/// Runtime configuration for the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,
    /// 32-byte AES-256 key for credential encryption at rest
    pub encryption_key: Vec<u8>,
}

impl AppConfig {
    /// Loads configuration from environment variables (`.env` is read by the
    /// caller before this). `DATABASE_URL` falls back to a local SQLite file;
    /// `ENCRYPTION_KEY` is required, base64-encoded, and must decode to
    /// exactly 32 bytes.
    ///
    /// # Errors
    /// Returns a configuration error when the key is missing or malformed.
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://data/streamshop.sqlite".to_string());

        let key_b64 = std::env::var("ENCRYPTION_KEY")
            .map_err(|_| Error::Config("ENCRYPTION_KEY is not set".to_string()))?;
        let encryption_key = BASE64
            .decode(key_b64.trim())
            .map_err(|_| Error::Config("ENCRYPTION_KEY is not valid base64".to_string()))?;
        if encryption_key.len() != 32 {
            return Err(Error::Config(format!(
                "ENCRYPTION_KEY must decode to 32 bytes, got {}",
                encryption_key.len()
            )));
        }

        Ok(Self {
            database_url,
            encryption_key,
        })
    }
}
