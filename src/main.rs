use dotenv::dotenv;
use std::{net::SocketAddr, process::ExitCode, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rusty_warden::{backend::SupabaseClient, config::Config, create_app};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables from .env file
    dotenv().ok();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!("invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let backend = Arc::new(SupabaseClient::from_config(&config));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        project_ref = %config.project_ref,
        secure_cookies = config.secure_cookies,
        dashboard_dir = ?config.dashboard_dir,
        "starting moderation dashboard backend"
    );

    let app = create_app(config, backend);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("failed to bind {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };
    tracing::info!("listening on {}", addr);

    // Run the server with axum
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
