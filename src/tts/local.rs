//! Local engine adapter.
//!
//! The underlying engine is stateful and not reentrant: voice and rate are
//! properties set on the one shared instance before each render. The
//! adapter owns that instance behind a mutex so renders from concurrent
//! requests run strictly one after another.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};

use super::{TtsError, VoiceDescriptor};

/// A voice as reported by the engine's own catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineVoice {
    /// Engine-specific handle passed back to `set_voice`.
    pub id: String,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<String>,
}

/// A stateful, blocking synthesis engine.
///
/// Implementations are only ever called with exclusive access.
pub trait LocalEngine: Send {
    /// Enumerate installed voices, in stable catalog order.
    fn voices(&mut self) -> Result<Vec<EngineVoice>, TtsError>;

    /// Select the voice used by subsequent renders.
    fn set_voice(&mut self, voice_id: &str);

    /// Set the speaking rate in words per minute.
    fn set_rate(&mut self, wpm: u32);

    /// Render `text` to a WAV file at `path`, blocking until written.
    fn save_to_file(&mut self, text: &str, path: &Path) -> Result<(), TtsError>;
}

type SharedEngine = Arc<Mutex<Box<dyn LocalEngine>>>;

/// The local engine adapter.
pub struct LocalTts {
    /// `None` when the engine failed to initialize at startup.
    engine: Option<SharedEngine>,
    base_rate: u32,
}

impl LocalTts {
    pub fn new(engine: Box<dyn LocalEngine>, base_rate: u32) -> Self {
        Self {
            engine: Some(Arc::new(Mutex::new(engine))),
            base_rate,
        }
    }

    /// An adapter whose every render fails with [`TtsError::NotReady`].
    pub fn unavailable(base_rate: u32) -> Self {
        Self {
            engine: None,
            base_rate,
        }
    }

    pub fn is_available(&self) -> bool {
        self.engine.is_some()
    }

    /// Words per minute for a speed multiplier.
    pub fn rate_for_speed(&self, speed: f32) -> u32 {
        (self.base_rate as f32 * speed) as u32
    }

    /// List the engine's voices. Failures are logged and yield an empty list.
    pub async fn list_voices(&self) -> Vec<VoiceDescriptor> {
        let Some(engine) = self.engine.clone() else {
            warn!("Local TTS engine not available, no local voices listed");
            return Vec::new();
        };

        let result = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);
            engine.voices()
        })
        .await;

        match result {
            Ok(Ok(voices)) => voices
                .into_iter()
                .enumerate()
                .map(|(i, v)| VoiceDescriptor {
                    id: i.to_string(),
                    name: v.name,
                    gender: v.gender,
                    age: v.age,
                })
                .collect(),
            Ok(Err(e)) => {
                warn!("Error getting local voices: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Voice listing task failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Render `text` to `output` under the engine lock.
    ///
    /// `voice` is a catalog index as a string, or `"default"` to keep the
    /// engine's current voice. A bad index is ignored with a warning.
    pub async fn render(
        &self,
        text: &str,
        voice: &str,
        speed: f32,
        output: &Path,
    ) -> Result<(), TtsError> {
        let engine = self.engine.clone().ok_or(TtsError::NotReady)?;
        let rate = self.rate_for_speed(speed);
        let text = text.to_string();
        let voice = voice.to_string();
        let output: PathBuf = output.to_path_buf();

        tokio::task::spawn_blocking(move || -> Result<(), TtsError> {
            let mut engine = engine.lock().unwrap_or_else(PoisonError::into_inner);

            if voice != "default" {
                select_voice(&mut **engine, &voice);
            }
            engine.set_rate(rate);

            debug!(rate, text_len = text.len(), path = %output.display(), "Local render");
            engine.save_to_file(&text, &output)?;
            info!(path = %output.display(), "Local synthesis complete");
            Ok(())
        })
        .await
        .map_err(|e| TtsError::SynthesisError(format!("render task failed: {}", e)))?
    }
}

/// Apply a catalog-index voice selector. Invalid selectors leave the
/// current voice in place.
fn select_voice(engine: &mut dyn LocalEngine, selector: &str) {
    let index: usize = match selector.trim().parse() {
        Ok(i) => i,
        Err(_) => {
            warn!(voice = %selector, "Invalid voice index");
            return;
        }
    };

    match engine.voices() {
        Ok(voices) => match voices.get(index) {
            Some(v) => engine.set_voice(&v.id),
            None => warn!(voice = %selector, available = voices.len(), "Voice index out of range"),
        },
        Err(e) => warn!("Could not read voice catalog, keeping current voice: {}", e),
    }
}
