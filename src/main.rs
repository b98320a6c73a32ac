//! Main entry point for the Image Edit Server

use image_edit_server::{
    api::routes,
    config::Settings,
    engine::ModelEngine,
    queue::{serial::SerialQueueConfig, SerialQueue},
    response::ResponseHandler,
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Pick up .env before anything reads the environment
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    settings.validate()?;

    init_tracing(&settings);

    info!(
        "Starting Image Edit Server on {}:{}",
        settings.server.host, settings.server.port
    );

    // Load the model; fatal unless the degraded mode is explicitly enabled
    let model_config = settings.model.clone();
    let engine = match tokio::task::spawn_blocking(move || ModelEngine::load(&model_config)).await? {
        Ok(engine) => Arc::new(engine),
        Err(e) if settings.model.tolerate_load_failure => {
            warn!(error = %e, "Model failed to load; serving unready, submissions will be rejected");
            Arc::new(ModelEngine::unready(settings.model.id.clone()))
        }
        Err(e) => return Err(e.into()),
    };

    let queue = Arc::new(SerialQueue::with_config(
        engine.clone(),
        SerialQueueConfig {
            max_queue_size: settings.queue.max_queue_size,
        },
    ));
    queue.start().await;

    if let Some(retention_secs) = settings.storage.retention_secs {
        spawn_storage_cleanup(&settings, retention_secs);
    }

    let app_state = Arc::new(AppState {
        settings: Arc::new(RwLock::new(settings.clone())),
        engine,
        queue: queue.clone(),
        responses: ResponseHandler::new(
            settings.storage.base_path.clone(),
            settings.storage.url_prefix.clone(),
        ),
    });

    let app = routes::create_router(app_state).await;

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Resolve every queued caller before the process exits
    queue.stop().await;
    info!("Shutdown complete");

    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.logging.level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if settings.logging.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Periodically delete stored images past their retention age
fn spawn_storage_cleanup(settings: &Settings, retention_secs: u64) {
    let handler = ResponseHandler::new(
        settings.storage.base_path.clone(),
        settings.storage.url_prefix.clone(),
    );

    tokio::spawn(async move {
        let period = Duration::from_secs(retention_secs.clamp(60, 3600));
        let mut interval = tokio::time::interval(period);
        interval.tick().await; // first tick fires immediately
        loop {
            interval.tick().await;
            match handler.cleanup(retention_secs).await {
                Ok(deleted) if deleted > 0 => info!(deleted, "Cleaned up stored images"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Storage cleanup failed"),
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler; park forever and rely on external kill
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutdown signal received");
}
