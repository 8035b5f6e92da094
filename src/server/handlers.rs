//! HTTP handlers. Each one is a thin mapping onto [`crate::service::SpeechService`].

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;
use crate::service::{ServiceError, SynthesisReceipt, SynthesisRequest};
use crate::tts::VoiceDescriptor;

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthBody {
    pub status: String,
    /// Unix seconds.
    pub timestamp: f64,
}

/// Error body: `{"detail": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Synthesis(_)
            | ServiceError::OutputMissing
            | ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub async fn root() -> Json<MessageBody> {
    Json(MessageBody {
        message: "TTS Server is running".to_string(),
        version: Some(env!("CARGO_PKG_VERSION").to_string()),
    })
}

pub async fn health() -> Json<HealthBody> {
    let now = chrono::Utc::now();
    Json(HealthBody {
        status: "healthy".to_string(),
        timestamp: now.timestamp_millis() as f64 / 1000.0,
    })
}

pub async fn voices(State(service): State<AppState>) -> Json<Vec<VoiceDescriptor>> {
    Json(service.list_voices().await)
}

pub async fn synthesize(
    State(service): State<AppState>,
    Json(req): Json<SynthesisRequest>,
) -> Result<Json<SynthesisReceipt>, ServiceError> {
    info!(
        engine = ?req.engine,
        voice = ?req.voice,
        speed = ?req.speed,
        text_len = req.text.len(),
        "Synthesis requested"
    );
    service.synthesize(req).await.map(Json)
}

pub async fn get_audio(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let (bytes, format) = service.fetch_audio(&id).await?;
    let disposition = format!("attachment; filename=\"speech.{}\"", format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.media_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub async fn delete_audio(
    State(service): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageBody>, ServiceError> {
    service.delete_audio(&id)?;
    Ok(Json(MessageBody {
        message: "Audio file deleted".to_string(),
        version: None,
    }))
}
