//! Timer Manager - countdown timer engine with a local HTTP bridge
//! 
//! This is the main entry point for the timer-manager application.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use timer_manager::{
    config::Config,
    state::AppState,
    api::create_router,
    storage::{load_or_default, LocalStorage},
    tasks::{alert_detector_task, persistence_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("timer_manager={},tower_http=info", config.log_level()))
        .init();

    info!("Starting timer-manager v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: host={}, port={}, data_file={}",
          config.host, config.port, config.data_file.display());

    // Load the saved snapshot once; unreadable state starts empty
    let storage = LocalStorage::new(&config.data_file);
    let initial = load_or_default(&storage);

    let state = Arc::new(AppState::new(config.port, config.host.clone(), storage.clone(), initial));

    tokio::spawn(persistence_task(Arc::clone(&state.store), storage));
    tokio::spawn(alert_detector_task(Arc::clone(&state.store), state.alerts_tx.clone()));

    // Timers saved as running get their countdown back
    state.scheduler.resume_running()?;

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /state                        - Full engine snapshot");
    info!("  GET    /timers, POST /timers         - List or add timers");
    info!("  PATCH  /timers/:id, DELETE /timers/:id");
    info!("  POST   /timers/:id/{{start,pause,reset,complete}}");
    info!("  GET    /categories");
    info!("  POST   /categories/:category/{{start,pause,reset}}");
    info!("  GET    /history                      - Completed timers");
    info!("  GET    /alerts                       - Alert event stream");
    info!("  GET    /theme, PUT /theme");
    info!("  GET    /status, GET /health");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    if let Err(e) = state.shutdown() {
        error!("Failed to save state on shutdown: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
