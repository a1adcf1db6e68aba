use api_router::{api_routes_v1, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::utils::config::get_config;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    // Wire the resolve/fetch/generate stack
    let api_state = ApiState::new(&config).await?;

    // Validate the corpus root once at startup. An empty corpus is not
    // fatal: the service still answers generically.
    let provinces = api_state.store.list_provinces().await?;
    if provinces.is_empty() {
        warn!(
            data_dir = %config.data_dir,
            "corpus root holds no province folders, every answer will be generic"
        );
    } else {
        info!(provinces = provinces.len(), "corpus root validated");
    }

    // Create Axum router
    let app = Router::new()
        .nest("/api/v1", api_routes_v1(&api_state))
        .with_state(AppState { api_state });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
