//! HTTP surface.
//!
//! | Method | Path             | Handler                  |
//! |--------|------------------|--------------------------|
//! | GET    | `/`              | liveness message         |
//! | GET    | `/health`        | `{status, timestamp}`    |
//! | GET    | `/voices`        | voice catalog            |
//! | POST   | `/synthesize`    | `{audio_url, file_id}`   |
//! | GET    | `/audio/:id`     | audio bytes              |
//! | DELETE | `/audio/:id`     | delete confirmation      |

pub mod handlers;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::service::SpeechService;

pub type AppState = Arc<SpeechService>;

/// Build the application router.
///
/// `cors_origins` empty means any origin is allowed.
pub fn router(service: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/voices", get(handlers::voices))
        .route("/synthesize", post(handlers::synthesize))
        .route(
            "/audio/:id",
            get(handlers::get_audio).delete(handlers::delete_audio),
        )
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, "Ignoring invalid CORS origin: {}", e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: TcpListener, app: Router) -> anyhow::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "TTS server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("TTS server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
