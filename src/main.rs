use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use tts_server::config::paths::get_log_dir;
use tts_server::config::{get_config_path, ServerConfig};
use tts_server::server;
use tts_server::service::SpeechService;
use tts_server::store::AudioStore;
use tts_server::tts::{EspeakEngine, GoogleTts, LocalTts, RemoteTts};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tts_server::logger::init(&get_log_dir())?;

    let config = ServerConfig::load();
    info!(config_path = %get_config_path().display(), ?config, "Configuration loaded");

    // Engine init failure is not fatal: local renders fail until restart,
    // the remote engine keeps working.
    let local = match EspeakEngine::new(&config.espeak_bin, config.base_rate_wpm, config.volume) {
        Ok(engine) => LocalTts::new(Box::new(engine), config.base_rate_wpm),
        Err(e) => {
            warn!("Failed to initialize local TTS engine: {}", e);
            LocalTts::unavailable(config.base_rate_wpm)
        }
    };
    let remote = RemoteTts::new(Arc::new(GoogleTts::new(
        &config.remote_endpoint,
        &config.remote_lang,
    )));

    let store = AudioStore::new(config.audio_dir());
    store
        .ensure_dir()
        .with_context(|| format!("Failed to create audio directory {}", store.dir().display()))?;
    info!(dir = %store.dir().display(), "Audio store ready");

    let service = Arc::new(SpeechService::new(local, remote, store, config.retention()));
    if !service.local_available() {
        warn!("Local engine unavailable, only the remote engine can synthesize");
    }
    let report = service.sweep_now().await;
    info!(removed = report.removed, failed = report.failed, "Startup cleanup done");

    let app = server::router(service, &config.cors_origins);
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    server::serve(listener, app).await
}
