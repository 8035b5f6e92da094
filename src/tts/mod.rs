//! Text-to-Speech engine adapters.
//!
//! Two backends render text to an audio file on disk:
//! - Local espeak-ng synthesis (stateful, serialized behind one mutex), WAV output
//! - Google Translate TTS over HTTP (stateless), MP3 output

pub mod espeak;
pub mod google;
pub mod local;
pub mod remote;

use serde::{Deserialize, Serialize};

pub use espeak::EspeakEngine;
pub use google::GoogleTts;
pub use local::{LocalEngine, LocalTts};
pub use remote::{RemoteTts, SpeechFetcher};

// ── Engine selection ────────────────────────────────────────────────

/// Which backend handles a synthesis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Local,
    Remote,
}

impl EngineKind {
    /// Resolve the `engine` request field.
    ///
    /// `"gtts"` / `"remote"` pick the cloud backend. Anything else,
    /// including an absent field, falls back to the local engine.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()).as_deref() {
            Some("gtts") | Some("remote") => Self::Remote,
            _ => Self::Local,
        }
    }
}

// ── Voice catalog ───────────────────────────────────────────────────

/// One entry of the `/voices` listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<String>,
}

/// The single voice the remote engine exposes.
pub fn remote_voice() -> VoiceDescriptor {
    VoiceDescriptor {
        id: "gtts".to_string(),
        name: "Google TTS (English)".to_string(),
        gender: Some("neutral".to_string()),
        age: None,
    }
}

// ── TTS Error ───────────────────────────────────────────────────────

/// Errors that can occur inside an engine adapter.
#[derive(Debug)]
pub enum TtsError {
    /// The engine ran and failed, or produced nothing.
    SynthesisError(String),
    /// Network error talking to the remote service.
    NetworkError(String),
    /// Engine handle was never initialized.
    NotReady,
    /// Filesystem error writing the output file.
    Io(std::io::Error),
}

impl std::fmt::Display for TtsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SynthesisError(msg) => write!(f, "TTS synthesis failed: {}", msg),
            Self::NetworkError(msg) => write!(f, "TTS network error: {}", msg),
            Self::NotReady => write!(f, "TTS engine not available"),
            Self::Io(e) => write!(f, "TTS output error: {}", e),
        }
    }
}

impl std::error::Error for TtsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for TtsError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_from_name() {
        assert_eq!(EngineKind::from_name(Some("gtts")), EngineKind::Remote);
        assert_eq!(EngineKind::from_name(Some("GTTS ")), EngineKind::Remote);
        assert_eq!(EngineKind::from_name(Some("remote")), EngineKind::Remote);
        assert_eq!(EngineKind::from_name(Some("pyttsx3")), EngineKind::Local);
        assert_eq!(EngineKind::from_name(Some("webspeech")), EngineKind::Local);
        assert_eq!(EngineKind::from_name(None), EngineKind::Local);
    }

    #[test]
    fn test_voice_descriptor_omits_empty_fields() {
        let json = serde_json::to_value(remote_voice()).unwrap();
        assert_eq!(json["id"], "gtts");
        assert_eq!(json["gender"], "neutral");
        assert!(json.get("age").is_none());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TtsError::NotReady.to_string(), "TTS engine not available");
        let e = TtsError::SynthesisError("boom".into());
        assert!(e.to_string().contains("boom"));
    }
}
