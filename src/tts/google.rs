//! Google Translate TTS: free cloud synthesis over HTTP GET.
//!
//! GET `https://translate.google.com/translate_tts?ie=UTF-8&q=...&tl=en&client=tw-ob`
//! Returns MP3 bytes. The endpoint rejects long inputs, so text is split
//! into chunks of at most [`MAX_CHUNK_CHARS`] characters, fetched in order
//! and concatenated (MP3 frames concatenate cleanly).

use std::future::Future;
use std::pin::Pin;

use futures_util::StreamExt;
use tracing::{debug, info};

use super::remote::SpeechFetcher;
use super::TtsError;

pub const MAX_CHUNK_CHARS: usize = 100;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub struct GoogleTts {
    endpoint: String,
    lang: String,
    client: reqwest::Client,
}

impl GoogleTts {
    pub fn new(endpoint: &str, lang: &str) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            lang: lang.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_chunk(
        &self,
        chunk: &str,
        idx: usize,
        total: usize,
    ) -> Result<Vec<u8>, TtsError> {
        let total_s = total.to_string();
        let idx_s = idx.to_string();
        let len_s = chunk.chars().count().to_string();

        let resp = self
            .client
            .get(&self.endpoint)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("ie", "UTF-8"),
                ("q", chunk),
                ("tl", self.lang.as_str()),
                ("total", total_s.as_str()),
                ("idx", idx_s.as_str()),
                ("textlen", len_s.as_str()),
                ("client", "tw-ob"),
                ("ttsspeed", "1"),
            ])
            .send()
            .await
            .map_err(|e| TtsError::NetworkError(format!("Google TTS request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::SynthesisError(format!(
                "Google TTS API error {}: {}",
                status, body
            )));
        }

        let mut audio = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(bytes) = stream.next().await {
            let bytes = bytes.map_err(|e| {
                TtsError::NetworkError(format!("Failed to read Google TTS response: {}", e))
            })?;
            audio.extend_from_slice(&bytes);
        }
        Ok(audio)
    }
}

impl SpeechFetcher for GoogleTts {
    fn fetch(
        &self,
        text: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, TtsError>> + Send + '_>> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        Box::pin(async move {
            if chunks.is_empty() {
                return Err(TtsError::SynthesisError("No text to speak".into()));
            }

            info!(lang = %self.lang, chunks = chunks.len(), "Google TTS request");

            let total = chunks.len();
            let mut audio = Vec::new();
            for (idx, chunk) in chunks.iter().enumerate() {
                let bytes = self.fetch_chunk(chunk, idx, total).await?;
                debug!(idx, bytes = bytes.len(), "Google TTS chunk received");
                audio.extend_from_slice(&bytes);
            }
            Ok(audio)
        })
    }

    fn name(&self) -> String {
        format!("Google TTS ({})", self.lang)
    }
}

/// Split text into chunks of at most `max_chars` characters.
///
/// Cuts after the last punctuation mark in the window, else at the last
/// whitespace, else hard at the limit. Chunks with nothing speakable
/// (only punctuation or whitespace) are dropped.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        let limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());

        let cut = if limit == rest.len() {
            limit
        } else {
            let window = &rest[..limit];
            window
                .rfind(is_break_punctuation)
                .map(|i| i + 1)
                .or_else(|| window.rfind(char::is_whitespace))
                .filter(|&i| i > 0)
                .unwrap_or(limit)
        };

        let chunk = rest[..cut].trim();
        if chunk.chars().any(char::is_alphanumeric) {
            chunks.push(chunk.to_string());
        }
        rest = rest[cut..].trim_start();
    }

    chunks
}

fn is_break_punctuation(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | ';' | ':' | ',' | '\n')
}
