use std::env;

/// Application configuration, read once from the environment at startup.
///
/// Constructed in `main` and passed by dependency injection into the
/// components that need it; nothing in the crate reads environment
/// variables after bootstrap.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Bind address for the HTTP server
    pub server_host: String,

    /// Bind port for the HTTP server
    pub server_port: u16,

    /// HS256 secret for bearer-token validation
    pub jwt_secret: String,

    /// Base URL of the reservation-platform feed API
    pub feed_base_url: String,

    /// API key for the reservation feed
    pub feed_api_key: String,

    /// Base URL of the ledger (spreadsheet) API
    pub ledger_base_url: String,

    /// API key for the ledger API
    pub ledger_api_key: String,
}

impl AppConfig {
    /// Loads configuration from the environment.
    ///
    /// `DATABASE_URL` and `JWT_SECRET` are required; server binding and the
    /// upstream endpoints have development defaults.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;

        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow::anyhow!("Invalid SERVER_PORT"))?;

        let feed_base_url = env::var("FEED_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());
        let feed_api_key = env::var("FEED_API_KEY").unwrap_or_default();

        let ledger_base_url = env::var("LEDGER_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8082".to_string());
        let ledger_api_key = env::var("LEDGER_API_KEY").unwrap_or_default();

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            jwt_secret,
            feed_base_url,
            feed_api_key,
            ledger_base_url,
            ledger_api_key,
        })
    }
}
