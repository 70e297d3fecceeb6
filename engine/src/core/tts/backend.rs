//! Speech Backends
//!
//! Backend abstraction for text-to-speech services. The default backend
//! talks to the public Google Translate TTS endpoint, which returns MP3.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::voice::Voice;
use crate::core::{CoreError, CoreResult};

/// Longest text the Translate endpoint accepts per request
pub const MAX_REQUEST_CHARS: usize = 100;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Trait for text-to-speech services
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Returns the backend name
    fn name(&self) -> &str;

    /// Synthesizes `text` in `voice` at the backend's natural rate.
    ///
    /// Returns encoded MP3 bytes.
    async fn synthesize(&self, text: &str, voice: Voice) -> CoreResult<Vec<u8>>;
}

// =============================================================================
// Google Translate TTS
// =============================================================================

/// Google Translate text-to-speech over HTTPS
pub struct GoogleTranslateTts {
    /// HTTP client with configured timeout
    client: reqwest::Client,
    /// Base URL override (tests, proxies); `None` uses the voice's regional host
    base_url: Option<String>,
}

impl std::fmt::Debug for GoogleTranslateTts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateTts")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GoogleTranslateTts {
    pub fn new() -> CoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64)")
            .build()
            .map_err(|e| CoreError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: None,
        })
    }

    /// Set custom base URL
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Build the request URL for a voice
    fn endpoint(&self, voice: Voice) -> String {
        match &self.base_url {
            Some(base) => format!("{}/translate_tts", base.trim_end_matches('/')),
            None => format!("https://translate.google.{}/translate_tts", voice.tld()),
        }
    }

    /// Fetch one piece of audio
    async fn fetch_piece(
        &self,
        piece: &str,
        voice: Voice,
        index: usize,
        total: usize,
    ) -> CoreResult<Vec<u8>> {
        let total_str = total.to_string();
        let index_str = index.to_string();
        let len_str = piece.chars().count().to_string();

        let resp = self
            .client
            .get(self.endpoint(voice))
            .query(&[
                ("ie", "UTF-8"),
                ("q", piece),
                ("tl", voice.language()),
                ("total", total_str.as_str()),
                ("idx", index_str.as_str()),
                ("textlen", len_str.as_str()),
                ("client", "tw-ob"),
            ])
            .send()
            .await
            .map_err(|e| CoreError::SynthesisFailed(format!("TTS request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::parse_api_error(status, &body));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CoreError::SynthesisFailed(format!("TTS response read failed: {}", e)))?;

        if bytes.is_empty() {
            return Err(CoreError::SynthesisFailed(format!(
                "TTS returned no audio for piece {}/{}",
                index + 1,
                total
            )));
        }

        Ok(bytes.to_vec())
    }

    /// Parse an error response body
    fn parse_api_error(status: StatusCode, body: &str) -> CoreError {
        let truncated: String = body.chars().take(200).collect();
        CoreError::SynthesisFailed(format!("TTS backend error ({}): {}", status, truncated))
    }
}

#[async_trait]
impl SpeechBackend for GoogleTranslateTts {
    fn name(&self) -> &str {
        "google-translate"
    }

    async fn synthesize(&self, text: &str, voice: Voice) -> CoreResult<Vec<u8>> {
        let pieces = split_for_requests(text, MAX_REQUEST_CHARS);
        if pieces.is_empty() {
            return Err(CoreError::InvalidInput("Nothing to synthesize".to_string()));
        }

        debug!(pieces = pieces.len(), voice = %voice, "Requesting speech");

        // MP3 frames are self-delimiting, so pieces concatenate into one stream
        let mut audio = Vec::new();
        for (index, piece) in pieces.iter().enumerate() {
            let bytes = self.fetch_piece(piece, voice, index, pieces.len()).await?;
            audio.extend_from_slice(&bytes);
        }

        Ok(audio)
    }
}

/// Splits text into request-sized pieces on word boundaries.
///
/// Words longer than `max_chars` are broken by character count.
pub fn split_for_requests(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for slice in chars.chunks(max_chars) {
                pieces.push(slice.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() {
            word_len
        } else {
            current_len + 1 + word_len
        };

        if needed > max_chars {
            pieces.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len = needed;
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}
