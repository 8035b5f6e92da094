//! Synthesis request handling.
//!
//! `SpeechService` owns both engine adapters and the audio store and is
//! shared by every HTTP handler. It is the only place engine errors are
//! turned into caller-facing errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::store::{AudioFormat, AudioStore, StoreError, SweepReport};
use crate::tts::{remote_voice, EngineKind, LocalTts, RemoteTts, TtsError, VoiceDescriptor};

// ── Request / response ──────────────────────────────────────────────

/// Body of `POST /synthesize`.
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub speed: Option<f32>,
    #[serde(default)]
    pub engine: Option<String>,
}

impl SynthesisRequest {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            voice: None,
            speed: None,
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: &str) -> Self {
        self.engine = Some(engine.to_string());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisReceipt {
    pub audio_url: String,
    pub file_id: String,
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ServiceError {
    /// Request failed validation.
    Validation(String),
    /// Engine could not produce audio.
    Synthesis(String),
    /// Engine reported success but no file exists.
    OutputMissing,
    /// No asset with the given identifier.
    NotFound,
    /// Filesystem trouble outside the engines.
    Internal(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::Synthesis(msg) => write!(f, "{}", msg),
            Self::OutputMissing => write!(f, "Audio file was not generated"),
            Self::NotFound => write!(f, "Audio file not found"),
            Self::Internal(msg) => write!(f, "Internal server error: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => Self::NotFound,
            StoreError::Io(e) => Self::Internal(e.to_string()),
        }
    }
}

// ── Service ─────────────────────────────────────────────────────────

pub struct SpeechService {
    local: LocalTts,
    remote: RemoteTts,
    store: AudioStore,
    retention: Duration,
}

impl SpeechService {
    pub fn new(local: LocalTts, remote: RemoteTts, store: AudioStore, retention: Duration) -> Self {
        Self {
            local,
            remote,
            store,
            retention,
        }
    }

    pub fn local_available(&self) -> bool {
        self.local.is_available()
    }

    /// Render `req.text` with the selected engine and register the result.
    pub async fn synthesize(
        &self,
        req: SynthesisRequest,
    ) -> Result<SynthesisReceipt, ServiceError> {
        let speed = validate(&req)?;
        let kind = EngineKind::from_name(req.engine.as_deref());
        let file_id = AudioStore::new_id();

        self.store.ensure_dir().map_err(|e| {
            error!(dir = %self.store.dir().display(), "Cannot create audio directory: {}", e);
            ServiceError::Internal(e.to_string())
        })?;

        let (format, result) = match kind {
            EngineKind::Local => {
                let path = self.store.path_for(&file_id, AudioFormat::Wav);
                let voice = req.voice.as_deref().unwrap_or("default");
                (AudioFormat::Wav, self.local.render(&req.text, voice, speed, &path).await)
            }
            EngineKind::Remote => {
                if req.voice.as_deref().is_some_and(|v| v != "default" && v != "gtts") {
                    warn!(voice = ?req.voice, "Remote engine ignores voice selection");
                }
                let path = self.store.path_for(&file_id, AudioFormat::Mp3);
                (AudioFormat::Mp3, self.remote.render(&req.text, &path).await)
            }
        };

        if let Err(e) = result {
            error!(engine = ?kind, file_id = %file_id, "Synthesis error: {}", e);
            self.discard_partial(&file_id, format);
            return Err(synthesis_error(kind, e));
        }

        let path = self.store.path_for(&file_id, format);
        let asset = self.store.put(&file_id, &path).map_err(|e| match e {
            StoreError::NotFound => {
                error!(file_id = %file_id, "Engine reported success but wrote no file");
                ServiceError::OutputMissing
            }
            other => ServiceError::from(other),
        })?;

        self.schedule_sweep();

        info!(file_id = %asset.id, engine = ?kind, ext = format.extension(), "Synthesis complete");
        Ok(SynthesisReceipt {
            audio_url: format!("/audio/{}.{}", asset.id, format.extension()),
            file_id: asset.id,
        })
    }

    /// Remove whatever a failed render left under `file_id`.
    fn discard_partial(&self, file_id: &str, format: AudioFormat) {
        let path = self.store.path_for(file_id, format);
        match std::fs::remove_file(&path) {
            Ok(()) => info!(path = %path.display(), "Removed partial audio file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "Failed to remove partial audio file: {}", e),
        }
    }

    /// Read the stored audio for `id`.
    pub async fn fetch_audio(&self, id: &str) -> Result<(Vec<u8>, AudioFormat), ServiceError> {
        let (path, format) = self.store.get(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok((bytes, format)),
            // deleted between probe and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ServiceError::NotFound),
            Err(e) => {
                error!(path = %path.display(), "Error serving audio: {}", e);
                Err(ServiceError::Internal("Error serving audio file".into()))
            }
        }
    }

    /// Delete every file for `id`.
    pub fn delete_audio(&self, id: &str) -> Result<(), ServiceError> {
        match self.store.delete(id) {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceError::NotFound),
            Err(e) => {
                error!(id, "Error deleting audio: {}", e);
                Err(ServiceError::Internal("Error deleting audio file".into()))
            }
        }
    }

    /// Local catalog followed by the remote engine's single voice.
    pub async fn list_voices(&self) -> Vec<VoiceDescriptor> {
        let mut voices = self.local.list_voices().await;
        voices.push(remote_voice());
        voices
    }

    /// Sweep stale files in the background. The caller never waits.
    pub fn schedule_sweep(&self) -> JoinHandle<SweepReport> {
        let store = self.store.clone();
        let retention = self.retention;
        tokio::task::spawn_blocking(move || store.sweep(retention))
    }

    /// Sweep now and wait for the result.
    pub async fn sweep_now(&self) -> SweepReport {
        match self.schedule_sweep().await {
            Ok(report) => report,
            Err(e) => {
                warn!("Sweep task failed: {}", e);
                SweepReport::default()
            }
        }
    }
}

/// Check the request and resolve the speed multiplier.
fn validate(req: &SynthesisRequest) -> Result<f32, ServiceError> {
    if req.text.trim().is_empty() {
        return Err(ServiceError::Validation("text must not be empty".into()));
    }
    let speed = req.speed.unwrap_or(1.0);
    if !speed.is_finite() || speed <= 0.0 {
        return Err(ServiceError::Validation(format!(
            "speed must be a positive number, got {}",
            speed
        )));
    }
    Ok(speed)
}

fn synthesis_error(kind: EngineKind, e: TtsError) -> ServiceError {
    match (kind, e) {
        (_, TtsError::NotReady) => ServiceError::Synthesis(TtsError::NotReady.to_string()),
        (EngineKind::Remote, e) => ServiceError::Synthesis(format!("gTTS synthesis failed: {}", e)),
        (EngineKind::Local, e) => ServiceError::Synthesis(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::path::Path;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::tts::local::{EngineVoice, LocalEngine};
    use crate::tts::SpeechFetcher;

    /// Writes a tiny WAV and flags any overlapping call.
    struct ExclusiveEngine {
        busy: Arc<AtomicBool>,
        overlaps: Arc<AtomicUsize>,
        write_file: bool,
    }

    impl LocalEngine for ExclusiveEngine {
        fn voices(&mut self) -> Result<Vec<EngineVoice>, TtsError> {
            Ok(vec![EngineVoice {
                id: "en".into(),
                name: "English".into(),
                gender: Some("male".into()),
                age: None,
            }])
        }

        fn set_voice(&mut self, _voice_id: &str) {}

        fn set_rate(&mut self, _wpm: u32) {}

        fn save_to_file(&mut self, _text: &str, path: &Path) -> Result<(), TtsError> {
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(20));
            if self.write_file {
                std::fs::write(path, b"RIFF....WAVE")?;
            }
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Writes a WAV header, then fails the way a crashing engine would.
    struct PartialWriter;

    impl LocalEngine for PartialWriter {
        fn voices(&mut self) -> Result<Vec<EngineVoice>, TtsError> {
            Ok(Vec::new())
        }

        fn set_voice(&mut self, _voice_id: &str) {}

        fn set_rate(&mut self, _wpm: u32) {}

        fn save_to_file(&mut self, _text: &str, path: &Path) -> Result<(), TtsError> {
            std::fs::write(path, b"RIFF")?;
            Err(TtsError::SynthesisError("espeak-ng exited with 1".into()))
        }
    }

    struct FakeFetcher {
        fail: bool,
    }

    impl SpeechFetcher for FakeFetcher {
        fn fetch(
            &self,
            _text: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TtsError>> + Send + '_>> {
            let fail = self.fail;
            Box::pin(async move {
                if fail {
                    Err(TtsError::NetworkError("dns failure".into()))
                } else {
                    Ok(b"ID3fake-mp3".to_vec())
                }
            })
        }

        fn name(&self) -> String {
            "fake".into()
        }
    }

    struct Fixture {
        _tmp: tempfile::TempDir,
        service: Arc<SpeechService>,
        overlaps: Arc<AtomicUsize>,
    }

    fn fixture_with(local_writes: bool, local_available: bool, remote_fails: bool) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let overlaps = Arc::new(AtomicUsize::new(0));
        let local = if local_available {
            LocalTts::new(
                Box::new(ExclusiveEngine {
                    busy: Arc::new(AtomicBool::new(false)),
                    overlaps: overlaps.clone(),
                    write_file: local_writes,
                }),
                200,
            )
        } else {
            LocalTts::unavailable(200)
        };
        let remote = RemoteTts::new(Arc::new(FakeFetcher { fail: remote_fails }));
        let store = AudioStore::new(tmp.path().join("tts_audio"));
        let service = SpeechService::new(local, remote, store, Duration::from_secs(3600));
        Fixture {
            _tmp: tmp,
            service: Arc::new(service),
            overlaps,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(true, true, false)
    }

    #[tokio::test]
    async fn test_local_synthesis_roundtrip() {
        let fx = fixture();
        let receipt = fx
            .service
            .synthesize(SynthesisRequest::new("Hello world"))
            .await
            .unwrap();

        assert_eq!(receipt.audio_url, format!("/audio/{}.wav", receipt.file_id));
        let (bytes, format) = fx.service.fetch_audio(&receipt.file_id).await.unwrap();
        assert_eq!(format, AudioFormat::Wav);
        assert_eq!(bytes, b"RIFF....WAVE");
    }

    #[tokio::test]
    async fn test_remote_synthesis_serves_mpeg() {
        let fx = fixture();
        let receipt = fx
            .service
            .synthesize(SynthesisRequest::new("Hello world").with_engine("gtts"))
            .await
            .unwrap();

        assert!(uuid::Uuid::parse_str(&receipt.file_id).is_ok());
        assert_eq!(receipt.audio_url, format!("/audio/{}.mp3", receipt.file_id));
        let (_, format) = fx.service.fetch_audio(&receipt.file_id).await.unwrap();
        assert_eq!(format.media_type(), "audio/mpeg");
    }

    #[tokio::test]
    async fn test_unknown_engine_falls_back_to_local() {
        let fx = fixture();
        let receipt = fx
            .service
            .synthesize(SynthesisRequest::new("Hi").with_engine("webspeech"))
            .await
            .unwrap();
        assert!(receipt.audio_url.ends_with(".wav"));
    }

    #[tokio::test]
    async fn test_delete_then_fetch_and_delete_again() {
        let fx = fixture();
        let receipt = fx.service.synthesize(SynthesisRequest::new("Bye")).await.unwrap();

        fx.service.delete_audio(&receipt.file_id).unwrap();
        assert!(matches!(
            fx.service.fetch_audio(&receipt.file_id).await,
            Err(ServiceError::NotFound)
        ));
        assert!(matches!(
            fx.service.delete_audio(&receipt.file_id),
            Err(ServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_fetch_never_issued_id() {
        let fx = fixture();
        let id = AudioStore::new_id();
        assert!(matches!(fx.service.fetch_audio(&id).await, Err(ServiceError::NotFound)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_local_renders_are_serialized() {
        let fx = fixture();

        let handles: Vec<_> = (0..5)
            .map(|i| {
                let service = fx.service.clone();
                tokio::spawn(async move {
                    service
                        .synthesize(SynthesisRequest::new(&format!("request {}", i)))
                        .await
                })
            })
            .collect();

        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().unwrap().file_id);
        }

        assert_eq!(fx.overlaps.load(Ordering::SeqCst), 0);
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        for id in &ids {
            assert!(fx.service.fetch_audio(id).await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_output_missing() {
        let fx = fixture_with(false, true, false);
        let err = fx.service.synthesize(SynthesisRequest::new("Hi")).await.unwrap_err();
        assert!(matches!(err, ServiceError::OutputMissing));
    }

    #[tokio::test]
    async fn test_failed_render_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let audio_dir = tmp.path().join("tts_audio");
        let service = SpeechService::new(
            LocalTts::new(Box::new(PartialWriter), 200),
            RemoteTts::new(Arc::new(FakeFetcher { fail: false })),
            AudioStore::new(audio_dir.clone()),
            Duration::from_secs(3600),
        );

        let err = service.synthesize(SynthesisRequest::new("Hi")).await.unwrap_err();
        match err {
            ServiceError::Synthesis(msg) => assert!(msg.contains("exited with 1")),
            other => panic!("unexpected error: {:?}", other),
        }

        let leftover: Vec<_> = std::fs::read_dir(&audio_dir).unwrap().collect();
        assert!(leftover.is_empty(), "left behind: {:?}", leftover);
    }

    #[tokio::test]
    async fn test_engine_unavailable() {
        let fx = fixture_with(true, false, false);
        let err = fx.service.synthesize(SynthesisRequest::new("Hi")).await.unwrap_err();
        match err {
            ServiceError::Synthesis(msg) => assert_eq!(msg, "TTS engine not available"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_cause() {
        let fx = fixture_with(true, true, true);
        let err = fx
            .service
            .synthesize(SynthesisRequest::new("Hi").with_engine("gtts"))
            .await
            .unwrap_err();
        match err {
            ServiceError::Synthesis(msg) => {
                assert!(msg.starts_with("gTTS synthesis failed"));
                assert!(msg.contains("dns failure"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_validation() {
        let fx = fixture();
        let err = fx.service.synthesize(SynthesisRequest::new("   ")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let mut req = SynthesisRequest::new("Hi");
        req.speed = Some(0.0);
        let err = fx.service.synthesize(req).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn test_list_voices_appends_remote() {
        let fx = fixture();
        let voices = fx.service.list_voices().await;
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].id, "0");
        assert_eq!(voices[1].id, "gtts");

        let fx = fixture_with(true, false, false);
        let voices = fx.service.list_voices().await;
        assert_eq!(voices, vec![remote_voice()]);
    }

    #[tokio::test]
    async fn test_sweep_now_on_fresh_files() {
        let fx = fixture();
        fx.service.synthesize(SynthesisRequest::new("keep me")).await.unwrap();
        let report = fx.service.sweep_now().await;
        assert_eq!(report.removed, 0);
    }
}
