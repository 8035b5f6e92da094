//! espeak-ng local engine, driven through its command-line interface.
//!
//! Each render spawns `espeak-ng -w <file>` with the text on stdin. Voice,
//! rate and amplitude are held on the instance and passed on every call,
//! which gives the same "set property, then save" model the adapter expects.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use super::local::{EngineVoice, LocalEngine};
use super::TtsError;

/// espeak-ng default amplitude is 100 on a 0..=200 scale.
const FULL_AMPLITUDE: f32 = 100.0;

pub struct EspeakEngine {
    bin: PathBuf,
    voice: Option<String>,
    rate: u32,
    amplitude: u32,
    catalog: Option<Vec<EngineVoice>>,
}

impl EspeakEngine {
    /// Probe the binary with `--version` and build an engine.
    ///
    /// `volume` is 0.0..=1.0 and maps onto espeak's amplitude scale.
    pub fn new(bin: &str, rate: u32, volume: f32) -> Result<Self, TtsError> {
        let output = Command::new(bin)
            .arg("--version")
            .output()
            .map_err(|e| TtsError::SynthesisError(format!("{} failed to execute: {}", bin, e)))?;

        if !output.status.success() {
            return Err(TtsError::SynthesisError(format!(
                "{} --version exited with {}",
                bin, output.status
            )));
        }

        info!(
            bin,
            version = %String::from_utf8_lossy(&output.stdout).trim(),
            "espeak-ng engine initialized"
        );

        Ok(Self {
            bin: PathBuf::from(bin),
            voice: None,
            rate,
            amplitude: (volume.clamp(0.0, 2.0) * FULL_AMPLITUDE).round() as u32,
            catalog: None,
        })
    }

    fn load_catalog(&self) -> Result<Vec<EngineVoice>, TtsError> {
        let output = Command::new(&self.bin)
            .arg("--voices")
            .output()
            .map_err(|e| TtsError::SynthesisError(format!("espeak-ng --voices failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::SynthesisError(format!(
                "espeak-ng --voices failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl LocalEngine for EspeakEngine {
    fn voices(&mut self) -> Result<Vec<EngineVoice>, TtsError> {
        if let Some(ref catalog) = self.catalog {
            return Ok(catalog.clone());
        }
        let catalog = self.load_catalog()?;
        debug!(voices = catalog.len(), "espeak-ng voice catalog loaded");
        self.catalog = Some(catalog.clone());
        Ok(catalog)
    }

    fn set_voice(&mut self, voice_id: &str) {
        self.voice = Some(voice_id.to_string());
    }

    fn set_rate(&mut self, wpm: u32) {
        self.rate = wpm;
    }

    fn save_to_file(&mut self, text: &str, path: &Path) -> Result<(), TtsError> {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("-w")
            .arg(path)
            .arg("-s")
            .arg(self.rate.to_string())
            .arg("-a")
            .arg(self.amplitude.to_string());
        if let Some(ref voice) = self.voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| TtsError::SynthesisError(format!("espeak-ng failed to start: {}", e)))?;

        // stdin drops at the end of the match so espeak-ng sees EOF
        let written = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(text.as_bytes()),
            None => Ok(()),
        };

        // reap the child even when the write failed
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TtsError::SynthesisError(format!(
                "espeak-ng exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        written?;

        if !path.exists() {
            return Err(TtsError::SynthesisError(format!(
                "espeak-ng produced no audio file at {}",
                path.display()
            )));
        }
        Ok(())
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  af              --/M      Afrikaans          gmw/af
///  5  en-us           --/M      English_(America)  gmw/en-US            (en 3)
/// ```
///
/// The language column is what `-v` accepts, so it becomes the voice id.
pub fn parse_voice_list(output: &str) -> Vec<EngineVoice> {
    output
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?;
            let language = cols.next()?;
            let age_gender = cols.next()?;
            let name = cols.next()?;

            let (age, gender) = match age_gender.split_once('/') {
                Some((age, gender)) => (age, gender),
                None => ("--", age_gender),
            };

            Some(EngineVoice {
                id: language.to_string(),
                name: name.replace('_', " "),
                gender: match gender {
                    "M" => Some("male".to_string()),
                    "F" => Some("female".to_string()),
                    _ => None,
                },
                age: (age != "--" && !age.is_empty()).then(|| age.to_string()),
            })
        })
        .collect()
}
