// Runtime configuration.
// Defaults, then an optional config.toml, then APP_* environment variables.

use anyhow::Result;
use config::{Config, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server_address: String,
    // Base URL of the rental backend, without a trailing slash
    pub backend_url: String,
    pub proxy_url: Option<String>,
    // Cookie carrying the backend-issued access token
    pub session_cookie: String,
    pub session_max_age_secs: u64,
    pub catalog_ttl_secs: u64,
    // Serve the built-in sample fleet instead of calling GET /car
    pub sample_catalog: bool,
    pub request_timeout_secs: u64,
}

impl Settings {
    pub fn new() -> Result<Self> {
        dotenv::dotenv().ok(); // Load .env file if present

        let builder = Config::builder()
            .set_default("server_address", "127.0.0.1:3000")?
            .set_default("backend_url", "http://127.0.0.1:5000/api/v1")?
            .set_default("session_cookie", "accessToken")?
            .set_default("session_max_age_secs", 300)?
            .set_default("catalog_ttl_secs", 60)?
            .set_default("sample_catalog", false)?
            .set_default("request_timeout_secs", 15)?
            .add_source(File::with_name("config").required(false))
            // e.g. APP_BACKEND_URL, APP_SAMPLE_CATALOG
            .add_source(Environment::with_prefix("APP").prefix_separator("_").try_parsing(true));

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.backend_url = settings.backend_url.trim_end_matches('/').to_string();
        Ok(settings)
    }
}

#[cfg(test)]
impl Settings {
    pub fn for_tests(backend_url: &str) -> Self {
        Settings {
            server_address: "127.0.0.1:0".to_string(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            proxy_url: None,
            session_cookie: "accessToken".to_string(),
            session_max_age_secs: 300,
            catalog_ttl_secs: 60,
            sample_catalog: false,
            request_timeout_secs: 5,
        }
    }
}
