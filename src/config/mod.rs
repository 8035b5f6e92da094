//! Configuration reading and data directory paths.

pub mod paths;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::{default_audio_dir, get_data_dir};

/// server_config.json shape. Every field is optional on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory holding `{id}.wav` / `{id}.mp3`. Defaults to `<temp>/tts_audio`.
    pub audio_dir: Option<PathBuf>,
    /// Age after which swept files are removed.
    pub retention_secs: u64,
    /// Local engine words-per-minute at speed 1.0.
    pub base_rate_wpm: u32,
    /// Local engine volume, 0.0..=1.0.
    pub volume: f32,
    pub espeak_bin: String,
    pub remote_endpoint: String,
    pub remote_lang: String,
    /// Allowed CORS origins. Empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            audio_dir: None,
            retention_secs: 3600,
            base_rate_wpm: 200,
            volume: 0.9,
            espeak_bin: "espeak-ng".to_string(),
            remote_endpoint: "https://translate.google.com/translate_tts".to_string(),
            remote_lang: "en".to_string(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Read server_config.json from the data directory, then apply
    /// `TTS_*` / `ESPEAK_BIN` environment overrides.
    pub fn load() -> Self {
        let mut config: ServerConfig = read_json_file(&get_config_path()).unwrap_or_default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a key lookup (the process environment in
    /// production). Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("TTS_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("TTS_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(e) => warn!(value = %port, "Ignoring invalid TTS_PORT: {}", e),
            }
        }
        if let Some(dir) = lookup("TTS_AUDIO_DIR") {
            self.audio_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("TTS_RETENTION_SECS") {
            match secs.parse() {
                Ok(s) => self.retention_secs = s,
                Err(e) => warn!(value = %secs, "Ignoring invalid TTS_RETENTION_SECS: {}", e),
            }
        }
        if let Some(bin) = lookup("ESPEAK_BIN") {
            self.espeak_bin = bin;
        }
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(default_audio_dir)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", addr, e))
    }
}

/// Path to server_config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("server_config.json")
}

/// Generic helper: read a JSON file and deserialize it.
fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}
