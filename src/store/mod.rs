//! Directory-backed audio store.
//!
//! Files are named `{id}.{ext}` in one flat directory. The store keeps no
//! index: the filesystem is the source of truth, and lookups probe each
//! recognized extension in turn.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

// ── Audio format ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    /// Probe order for lookups and deletes.
    pub const ALL: [AudioFormat; 2] = [AudioFormat::Wav, AudioFormat::Mp3];

    pub fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.extension() == ext)
    }
}

/// One stored synthesis result.
#[derive(Debug, Clone, Serialize)]
pub struct AudioAsset {
    pub id: String,
    pub format: AudioFormat,
    pub created_at: DateTime<Utc>,
}

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum StoreError {
    /// No file for this identifier.
    NotFound,
    Io(io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "Audio file not found"),
            Self::Io(e) => write!(f, "Audio store I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::NotFound => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::NotFound {
            Self::NotFound
        } else {
            Self::Io(e)
        }
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: usize,
    pub failed: usize,
}

// ── Store ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the store directory if it is missing.
    pub fn ensure_dir(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// A fresh identifier for a new asset.
    pub fn new_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    /// Where an asset with this id and format lives.
    pub fn path_for(&self, id: &str, format: AudioFormat) -> PathBuf {
        self.dir.join(format!("{}.{}", id, format.extension()))
    }

    /// Register a file an engine wrote at `path_for(id, _)`.
    ///
    /// No copy happens; this checks the file is really there and records
    /// its format and creation time.
    pub fn put(&self, id: &str, source: &Path) -> Result<AudioAsset, StoreError> {
        let format = source
            .extension()
            .and_then(|e| e.to_str())
            .and_then(AudioFormat::from_extension)
            .ok_or_else(|| {
                StoreError::Io(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("unrecognized audio file {}", source.display()),
                ))
            })?;

        if source != self.path_for(id, format) {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not the store path for {}", source.display(), id),
            )));
        }

        let meta = std::fs::metadata(source)?;
        if !meta.is_file() {
            return Err(StoreError::NotFound);
        }
        let created_at = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        debug!(id, ext = format.extension(), "Asset registered");
        Ok(AudioAsset {
            id: id.to_string(),
            format,
            created_at,
        })
    }

    /// Find the file for `id`, trying wav before mp3.
    pub fn get(&self, id: &str) -> Result<(PathBuf, AudioFormat), StoreError> {
        let id = normalize_id(id).ok_or(StoreError::NotFound)?;
        AudioFormat::ALL
            .into_iter()
            .map(|format| (self.path_for(id, format), format))
            .find(|(path, _)| path.is_file())
            .ok_or(StoreError::NotFound)
    }

    /// Remove every file for `id`. Returns whether anything was removed.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let Some(id) = normalize_id(id) else {
            return Ok(false);
        };

        let mut deleted = false;
        for format in AudioFormat::ALL {
            match std::fs::remove_file(self.path_for(id, format)) {
                Ok(()) => deleted = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::Io(e)),
            }
        }
        if deleted {
            info!(id, "Audio file deleted");
        }
        Ok(deleted)
    }

    /// Delete `.wav` files whose modification time is older than `max_age`.
    ///
    /// `.mp3` files are left alone. Per-file failures are logged and
    /// counted; they never stop the scan.
    pub fn sweep(&self, max_age: Duration) -> SweepReport {
        self.sweep_at(SystemTime::now(), max_age)
    }

    /// [`sweep`](Self::sweep) against an explicit clock.
    pub fn sweep_at(&self, now: SystemTime, max_age: Duration) -> SweepReport {
        let mut report = SweepReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), "Error during cleanup: {}", e);
                report.failed += 1;
                return report;
            }
        };

        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    warn!("Error during cleanup: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            if path.extension().and_then(|e| e.to_str()) != Some(AudioFormat::Wav.extension()) {
                continue;
            }

            let modified = match std::fs::metadata(&path).and_then(|m| m.modified()) {
                Ok(t) => t,
                Err(e) => {
                    warn!(path = %path.display(), "Cannot stat file during cleanup: {}", e);
                    report.failed += 1;
                    continue;
                }
            };

            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age <= max_age {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "Cleaned up old file");
                    report.removed += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), "Failed to remove old file: {}", e);
                    report.failed += 1;
                }
            }
        }

        report
    }
}

/// Accept `id`, `id.wav` or `id.mp3`; reject anything that could escape
/// the store directory.
pub fn normalize_id(raw: &str) -> Option<&str> {
    let id = AudioFormat::ALL
        .into_iter()
        .find_map(|f| raw.strip_suffix(&format!(".{}", f.extension())))
        .unwrap_or(raw);

    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    valid.then_some(id)
}
