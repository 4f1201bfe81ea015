use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use portal_server::pages;
use portal_server::{AppError, AppState, Settings};
use std::net::TcpListener;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> portal_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Load configuration
    let settings = Settings::new()?;
    info!("Configuration loaded successfully");

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers as usize;

    info!("Starting server at {}:{}", host, port);

    // Initialize application state
    let state = AppState::new(settings).await?;
    let state = web::Data::new(state);

    // Sweep expired sessions in the background. Sessions normally die on
    // sign-out, but abandoned ones would otherwise pile up forever.
    let sweeper_state = state.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(3600)).await;

            match sweeper_state.auth.cleanup_expired_sessions().await {
                Ok(removed) if removed > 0 => {
                    info!("Removed {} expired sessions", removed);
                }
                Ok(_) => {}
                Err(e) => error!("Session sweep failed: {}", e),
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", host, port))?;

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(pages::configure)
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
