//! Remote engine adapter.
//!
//! Stateless: each render is one fetch of MP3 bytes followed by a write to
//! the output path. The network side is behind [`SpeechFetcher`].

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use super::TtsError;

/// Turns text into encoded audio bytes (dyn-compatible).
pub trait SpeechFetcher: Send + Sync {
    fn fetch(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TtsError>> + Send + '_>>;

    /// Display name for logs (e.g. "Google TTS (en)").
    fn name(&self) -> String;
}

/// The remote engine adapter. Voice and speed are not supported.
#[derive(Clone)]
pub struct RemoteTts {
    fetcher: Arc<dyn SpeechFetcher>,
}

impl RemoteTts {
    pub fn new(fetcher: Arc<dyn SpeechFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetch audio for `text` and write it to `output`.
    ///
    /// Bytes go to a `.tmp` sibling first and are renamed into place. On a
    /// failed write or rename the `.tmp` file is removed again.
    pub async fn render(&self, text: &str, output: &Path) -> Result<(), TtsError> {
        let audio = self.fetcher.fetch(text).await?;
        if audio.is_empty() {
            return Err(TtsError::SynthesisError(format!(
                "{} returned no audio",
                self.fetcher.name()
            )));
        }

        let tmp_path = output.with_extension("mp3.tmp");
        if let Err(e) = write_then_rename(&tmp_path, output, &audio).await {
            if let Err(rm) = tokio::fs::remove_file(&tmp_path).await {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %tmp_path.display(), "Failed to remove temp audio file: {}", rm);
                }
            }
            return Err(e.into());
        }

        info!(
            engine = %self.fetcher.name(),
            bytes = audio.len(),
            path = %output.display(),
            "Remote synthesis complete"
        );
        Ok(())
    }
}

async fn write_then_rename(tmp_path: &Path, output: &Path, audio: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(tmp_path).await?;
    file.write_all(audio).await?;
    file.flush().await?;
    drop(file);
    tokio::fs::rename(tmp_path, output).await
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(Result<Vec<u8>, String>);

    impl SpeechFetcher for Canned {
        fn fetch(
            &self,
            _text: &str,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TtsError>> + Send + '_>> {
            let result = self.0.clone().map_err(TtsError::NetworkError);
            Box::pin(async move { result })
        }

        fn name(&self) -> String {
            "canned".into()
        }
    }

    #[tokio::test]
    async fn test_render_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("abc.mp3");
        let tts = RemoteTts::new(Arc::new(Canned(Ok(b"ID3audio".to_vec()))));

        tts.render("Hello", &out).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), b"ID3audio");
        assert!(!dir.path().join("abc.mp3.tmp").exists());
    }

    #[tokio::test]
    async fn test_network_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("abc.mp3");
        let tts = RemoteTts::new(Arc::new(Canned(Err("connection refused".into()))));

        let err = tts.render("Hello", &out).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_empty_audio_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("abc.mp3");
        let tts = RemoteTts::new(Arc::new(Canned(Ok(Vec::new()))));

        assert!(matches!(
            tts.render("Hello", &out).await,
            Err(TtsError::SynthesisError(_))
        ));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // a directory in the way makes the rename fail
        let out = dir.path().join("abc.mp3");
        std::fs::create_dir(&out).unwrap();
        std::fs::write(out.join("blocker"), b"x").unwrap();
        let tts = RemoteTts::new(Arc::new(Canned(Ok(b"ID3audio".to_vec()))));

        assert!(matches!(tts.render("Hello", &out).await, Err(TtsError::Io(_))));
        assert!(!dir.path().join("abc.mp3.tmp").exists());
    }
}
