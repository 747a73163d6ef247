use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cache_headers;
mod client_ip;
mod config;
mod constants;
mod handlers;
mod models;
mod registry;
mod routes;
mod sniff;
mod templates;
mod upload;

use config::Config;
use handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "filedrop=info,tower_http=info".into());
    let subscriber = tracing_subscriber::registry().with(filter);
    if config.json_logs {
        subscriber.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        subscriber.with(tracing_subscriber::fmt::layer()).init();
    }

    config.validate()?;

    tracing::info!("Starting {}...", constants::APP_NAME);
    tracing::info!("Uploads directory: {:?}", config.uploads_dir);
    tracing::info!(
        "Max file size: {} bytes, form memory: {} bytes",
        config.max_file_size,
        config.max_form_memory
    );

    let app_state = AppState {
        uploads_dir: config.uploads_dir.clone(),
        limits: config.limits(),
    };
    let app = routes::app(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on: http://{}", addr);

    // Connect info feeds the client IP resolver when no proxy headers are present
    axum_server::bind(addr)
        .serve(app.into_make_service_with_connect_info::<SocketAddr>())
        .await?;

    Ok(())
}
