use anyhow::{Context, Result};
use axum::{extract::FromRef, Router};
use reqwest::Client;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{backend::BackendClient, catalog::Catalog, config::Settings, session::SessionStore};

// Declare modules
mod auth_middleware;
mod backend;
mod booking;
mod catalog;
mod config;
mod error;
mod models;
mod routes;
mod session;

// Shared application state handed to every handler
#[derive(Clone, FromRef)]
struct AppState {
    settings: Arc<Settings>,
    backend: Arc<BackendClient>,
    catalog: Arc<Catalog>,
    sessions: Arc<SessionStore>,
}

impl AppState {
    fn new(settings: Settings, http_client: Arc<Client>) -> Self {
        let backend = Arc::new(BackendClient::new(http_client, settings.backend_url.clone()));
        let catalog = Arc::new(Catalog::new(
            backend.clone(),
            settings.catalog_ttl_secs,
            settings.sample_catalog,
        ));
        let sessions = Arc::new(SessionStore::new(
            backend.clone(),
            Duration::from_secs(settings.session_max_age_secs),
        ));

        AppState {
            settings: Arc::new(settings),
            backend,
            catalog,
            sessions,
        }
    }
}

fn build_http_client(settings: &Settings) -> Result<Client> {
    let mut builder = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(settings.request_timeout_secs));

    if let Some(proxy_url) = settings.proxy_url.as_deref().filter(|url| !url.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy_url).context("Invalid proxy_url in configuration")?;
        builder = builder.proxy(proxy);
        tracing::info!("Routing backend requests through configured proxy.");
    }

    builder.build().context("Failed to build shared reqwest client")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "car_rental_storefront=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing car rental storefront...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!("Configuration loaded successfully. Backend: {}", s.backend_url);
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    if settings.sample_catalog {
        tracing::warn!("Storefront is serving the built-in sample fleet.");
    }

    let http_client = Arc::new(build_http_client(&settings)?);
    tracing::info!("Shared HTTP client created.");

    let app_state = AppState::new(settings, http_client);

    let app: Router = routes::create_router(app_state.clone())
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = app_state.settings.server_address.parse().with_context(|| {
        format!("Invalid server address format: {}", app_state.settings.server_address)
    })?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

#[cfg(test)]
fn test_state(backend_url: &str) -> AppState {
    AppState::new(Settings::for_tests(backend_url), Arc::new(Client::new()))
}

#[cfg(test)]
fn sample_state() -> AppState {
    let mut settings = Settings::for_tests("http://127.0.0.1:9");
    settings.sample_catalog = true;
    AppState::new(settings, Arc::new(Client::new()))
}
