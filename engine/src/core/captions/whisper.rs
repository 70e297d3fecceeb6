//! Whisper Word Recognition
//!
//! Provides word-level speech recognition using whisper.cpp via whisper-rs.
//! The engine is conditionally compiled when the `whisper` feature is enabled.
//! Loaded models are kept in a process-wide cache so every segment of a run
//! reuses the same context.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::models::WordTimestamp;

// =============================================================================
// Errors
// =============================================================================

#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    #[error("Failed to load model: {0}")]
    ModelLoadError(String),

    #[error("Failed to read audio: {0}")]
    AudioReadError(String),

    #[error("Transcription failed: {0}")]
    TranscriptionError(String),

    #[error("Whisper feature not enabled. Rebuild with --features whisper")]
    FeatureNotEnabled,
}

pub type WhisperResult<T> = Result<T, WhisperError>;

// =============================================================================
// Model Sizes
// =============================================================================

/// ggml model sizes; larger is slower and more accurate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhisperModel {
    Tiny,
    #[default]
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    pub const ALL: [WhisperModel; 5] = [
        WhisperModel::Tiny,
        WhisperModel::Base,
        WhisperModel::Small,
        WhisperModel::Medium,
        WhisperModel::Large,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }

    /// `ggml-<name>.bin`
    pub fn filename(&self) -> String {
        format!("ggml-{}.bin", self.name())
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = WhisperError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|model| model.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| WhisperError::ModelLoadError(format!("Unknown model size: {}", s)))
    }
}

// =============================================================================
// Recognition Options
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionOptions {
    /// Language code, or "auto" to let the model detect it
    pub language: Option<String>,
    /// Inference threads; 0 leaves the choice to whisper.cpp
    pub threads: u32,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            language: Some("en".to_string()),
            threads: 0,
        }
    }
}

// =============================================================================
// Recognizer Seam
// =============================================================================

/// Produces word-level timestamps from 16kHz mono samples in [-1.0, 1.0].
///
/// Implementations are called from blocking threads.
pub trait WordRecognizer: Send + Sync {
    /// Recognizes every word in `samples`, ordered by start time
    fn recognize(
        &self,
        samples: &[f32],
        options: &TranscriptionOptions,
    ) -> WhisperResult<Vec<WordTimestamp>>;

    /// Model identifier for logs
    fn model_name(&self) -> &str;
}

/// Turns raw recognizer tokens into an ordered word list.
///
/// Whisper emits leading spaces and occasional empty tokens; both are
/// dropped, and start times are forced non-decreasing.
pub fn collect_words(raw: impl IntoIterator<Item = (String, f64, f64)>) -> Vec<WordTimestamp> {
    let mut words: Vec<WordTimestamp> = Vec::new();
    for (text, start, end) in raw {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        let floor = words.last().map(|w| w.start).unwrap_or(0.0);
        words.push(WordTimestamp::new(text, start.max(floor), end));
    }
    words
}

// =============================================================================
// Whisper Engine - Feature-gated Implementation
// =============================================================================

#[cfg(feature = "whisper")]
mod engine_impl {
    use super::*;
    use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

    fn inference_error(e: impl std::fmt::Display) -> WhisperError {
        WhisperError::TranscriptionError(e.to_string())
    }

    /// whisper.cpp context configured for one-word segments
    pub struct WhisperEngine {
        context: WhisperContext,
        model_name: String,
    }

    impl WhisperEngine {
        pub fn new(model_path: &Path) -> WhisperResult<Self> {
            if !model_path.is_file() {
                return Err(WhisperError::ModelNotFound(model_path.display().to_string()));
            }
            let path_str = model_path.to_str().ok_or_else(|| {
                WhisperError::ModelLoadError("Model path is not valid UTF-8".to_string())
            })?;

            let context =
                WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
                    .map_err(|e| WhisperError::ModelLoadError(e.to_string()))?;

            Ok(Self {
                context,
                model_name: model_path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default(),
            })
        }

        fn params<'a>(options: &'a TranscriptionOptions) -> FullParams<'a, 'a> {
            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
            if let Some(lang) = options.language.as_deref().filter(|l| *l != "auto") {
                params.set_language(Some(lang));
            }
            if options.threads > 0 {
                params.set_n_threads(options.threads as i32);
            }
            params.set_translate(false);
            params.set_print_progress(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            // One segment per word
            params.set_token_timestamps(true);
            params.set_split_on_word(true);
            params.set_max_len(1);
            params
        }
    }

    impl WordRecognizer for WhisperEngine {
        fn recognize(
            &self,
            samples: &[f32],
            options: &TranscriptionOptions,
        ) -> WhisperResult<Vec<WordTimestamp>> {
            if samples.is_empty() {
                return Err(WhisperError::AudioReadError("No samples".to_string()));
            }

            let mut state = self.context.create_state().map_err(inference_error)?;
            state
                .full(Self::params(options), samples)
                .map_err(inference_error)?;

            let segments = state.full_n_segments().map_err(inference_error)?;
            let mut raw = Vec::with_capacity(segments.max(0) as usize);
            for i in 0..segments {
                // t0/t1 are centiseconds
                let start = state.full_get_segment_t0(i).map_err(inference_error)? as f64 / 100.0;
                let end = state.full_get_segment_t1(i).map_err(inference_error)? as f64 / 100.0;
                let text = state.full_get_segment_text(i).map_err(inference_error)?;
                raw.push((text, start, end));
            }

            Ok(collect_words(raw))
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}

#[cfg(feature = "whisper")]
pub use engine_impl::WhisperEngine;

#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperEngine;

#[cfg(not(feature = "whisper"))]
impl WhisperEngine {
    pub fn new(_model_path: &Path) -> WhisperResult<Self> {
        Err(WhisperError::FeatureNotEnabled)
    }
}

#[cfg(not(feature = "whisper"))]
impl WordRecognizer for WhisperEngine {
    fn recognize(
        &self,
        _samples: &[f32],
        _options: &TranscriptionOptions,
    ) -> WhisperResult<Vec<WordTimestamp>> {
        Err(WhisperError::FeatureNotEnabled)
    }

    fn model_name(&self) -> &str {
        ""
    }
}

// =============================================================================
// Process-wide Model Cache
// =============================================================================

/// Lazily loaded, process-wide slot for one recognizer.
///
/// The lock is held across the load so concurrent first callers wait for a
/// single load instead of racing. A failed load leaves the slot empty.
pub struct RecognizerCache<R> {
    slot: Mutex<Option<(PathBuf, Arc<R>)>>,
}

impl<R> RecognizerCache<R> {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached recognizer for `model_path`, loading it on first use.
    ///
    /// Asking for a different model path replaces the cached one.
    pub fn get_or_load<F>(&self, model_path: &Path, load: F) -> WhisperResult<Arc<R>>
    where
        F: FnOnce(&Path) -> WhisperResult<R>,
    {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some((path, recognizer)) = slot.as_ref() {
            if path == model_path {
                return Ok(Arc::clone(recognizer));
            }
        }

        let recognizer = Arc::new(load(model_path)?);
        *slot = Some((model_path.to_path_buf(), Arc::clone(&recognizer)));
        Ok(recognizer)
    }

    /// Whether a recognizer is currently loaded
    pub fn is_loaded(&self) -> bool {
        self.slot
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }
}

impl<R> Default for RecognizerCache<R> {
    fn default() -> Self {
        Self::new()
    }
}

static SHARED_ENGINE: RecognizerCache<WhisperEngine> = RecognizerCache::new();

/// Returns the process-wide Whisper engine, loading the model on first use
pub fn shared_recognizer(model_path: &Path) -> WhisperResult<Arc<WhisperEngine>> {
    SHARED_ENGINE.get_or_load(model_path, |path| {
        info!("Loading Whisper model from {}", path.display());
        WhisperEngine::new(path)
    })
}

// =============================================================================
// Model Files
// =============================================================================

/// Whether this build can run recognition
pub fn is_whisper_available() -> bool {
    cfg!(feature = "whisper")
}

/// `<local data dir>/storyreel/models/whisper`
pub fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("storyreel")
        .join("models")
        .join("whisper")
}

/// Resolves the model file: an explicit path wins, else the model's file in
/// the default models directory
pub fn resolve_model_path(model: WhisperModel, explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => default_models_dir().join(model.filename()),
    }
}

// =============================================================================
// Tests
// =============================================================================
