//! Transcription engines and the per-preset engine cache
//!
//! The cache owns one recognition context per preset id, keyed by the
//! preset, loaded lazily on first use and dropped on eviction or backend
//! change. Long recordings are split into fixed chunks that reuse the same
//! handle; each chunk's text is cleaned of whisper noise markers, and the
//! joined result passes a hallucination gate before anything downstream
//! sees it.

pub mod languages;
pub mod whisper;

pub use languages::LangInfo;
pub use whisper::{WhisperEngine, WhisperLoader};

use crate::audio::SAMPLE_RATE;
use crate::config::Preset;
use crate::error::TranscribeError;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Chunk length for long-audio transcription.
pub const CHUNK_SECONDS: usize = 25;
pub const CHUNK_SAMPLES: usize = CHUNK_SECONDS * SAMPLE_RATE as usize;

/// Model files are `ggml-<name>.bin`, the whisper.cpp convention.
const MODEL_PREFIX: &str = "ggml-";
const MODEL_EXT: &str = "bin";

/// An owned recognition context. Implementations serialise their own
/// inference; a handle is safe to share behind an `Arc`.
pub trait SpeechEngine: Send + Sync {
    /// Run speech-to-text on normalised f32 PCM (16 kHz, mono).
    fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
        translate: bool,
    ) -> Result<String, TranscribeError>;

    /// Whether the loaded model understands more than English.
    fn is_multilingual(&self) -> bool;
}

/// Creates engines from model files; the seam the tests mock.
pub trait EngineLoader: Send + Sync {
    fn load(
        &self,
        model_path: &Path,
        backend_id: &str,
    ) -> Result<Arc<dyn SpeechEngine>, TranscribeError>;
}

/// Engine cache keyed by preset id. The map mutex is never held across a
/// model load or an inference call.
pub struct EngineCache {
    loader: Arc<dyn EngineLoader>,
    engines: Mutex<HashMap<String, Arc<dyn SpeechEngine>>>,
}

impl EngineCache {
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engines: Mutex::new(HashMap::new()),
        }
    }

    /// Cached engine for a preset, if one is loaded.
    pub fn get(&self, preset_id: &str) -> Option<Arc<dyn SpeechEngine>> {
        self.engines.lock().unwrap().get(preset_id).cloned()
    }

    /// Return the preset's engine, loading it first when missing.
    pub fn ensure(
        &self,
        preset: &Preset,
        models_dir: &Path,
        backend_id: &str,
    ) -> Result<Arc<dyn SpeechEngine>, TranscribeError> {
        if let Some(engine) = self.get(&preset.id) {
            tracing::debug!("using cached model for preset {:?}", preset.name);
            return Ok(engine);
        }

        let model_path = find_model(models_dir, &preset.model_name)?;
        tracing::info!(
            "loading model for preset {:?}: {:?} (backend: {})",
            preset.name,
            model_path,
            backend_id
        );
        let engine = self.loader.load(&model_path, backend_id)?;

        let mut engines = self.engines.lock().unwrap();
        // A concurrent ensure may have won the race; keep the first one
        let entry = engines
            .entry(preset.id.clone())
            .or_insert_with(|| engine.clone());
        Ok(entry.clone())
    }

    /// Drop the preset's engine, destroying the context. No-op if absent.
    pub fn evict(&self, preset_id: &str) {
        if self.engines.lock().unwrap().remove(preset_id).is_some() {
            tracing::debug!("evicted engine for preset {}", preset_id);
        }
    }

    /// Drop every cached engine (after a backend change).
    pub fn flush_all(&self) {
        let mut engines = self.engines.lock().unwrap();
        let count = engines.len();
        engines.clear();
        if count > 0 {
            tracing::info!("flushed {} cached engine(s)", count);
        }
    }
}

/// Locate the model file: exact `ggml-<name>.bin` first, else the first
/// `.bin` file in the directory.
pub fn find_model(models_dir: &Path, model_name: &str) -> Result<PathBuf, TranscribeError> {
    let exact = models_dir.join(format!("{}{}.{}", MODEL_PREFIX, model_name, MODEL_EXT));
    if exact.is_file() {
        return Ok(exact);
    }

    let missing = || TranscribeError::ModelMissing {
        name: model_name.to_string(),
        dir: models_dir.display().to_string(),
    };

    let entries = std::fs::read_dir(models_dir).map_err(|_| missing())?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().map(|ext| ext == MODEL_EXT).unwrap_or(false))
        .collect();
    candidates.sort();

    candidates.into_iter().next().ok_or_else(missing)
}

/// Transcribe audio of any length with one engine handle.
///
/// Audio up to [`CHUNK_SAMPLES`] goes through in one call; longer input is
/// split into contiguous chunks transcribed sequentially. `on_progress`
/// fires with 1-based `(chunk, total)` before each chunk. Chunk text is
/// cleaned of noise markers; non-empty chunks are joined with single
/// spaces. A chunk that fails inference is logged and skipped.
pub fn transcribe_long(
    engine: &dyn SpeechEngine,
    samples: &[f32],
    language: &str,
    translate: bool,
    on_progress: &mut dyn FnMut(usize, usize),
) -> Result<String, TranscribeError> {
    let total = samples.len().div_ceil(CHUNK_SAMPLES);
    if total <= 1 {
        on_progress(1, 1);
        let text = engine.transcribe(samples, language, translate)?;
        return Ok(clean_output(&text));
    }

    let mut parts: Vec<String> = Vec::with_capacity(total);
    for (index, chunk) in samples.chunks(CHUNK_SAMPLES).enumerate() {
        on_progress(index + 1, total);
        let text = match engine.transcribe(chunk, language, translate) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("chunk {}/{} failed: {}", index + 1, total, e);
                continue;
            }
        };
        let text = clean_output(&text);
        if !text.is_empty() {
            parts.push(text);
        }
    }
    Ok(parts.join(" "))
}

/// Whisper labels non-speech as bracketed markers ([MUSIC], [музыка]) or a
/// few parenthesised annotations. In a push-to-talk tool those are never
/// real dictation, so they are all stripped.
fn noise_marker_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[^\[\]]+\]|\((?i:music|noise|silence|blank.?audio|laughter|applause)\)")
            .expect("noise marker regex")
    })
}

/// Strip noise markers and trim. Keeps all real text.
pub fn clean_output(text: &str) -> String {
    let cleaned = noise_marker_re().replace_all(text, "");
    cleaned.trim().to_string()
}

/// Canned closings whisper produces on silence; matched as substrings of
/// the lower-cased result.
static HALLUCINATION_PHRASES: &[&str] = &[
    // Russian
    "продолжение следует",
    "субтитры сделал",
    "субтитры делал",
    "субтитры создан",
    "спасибо за просмотр",
    "спасибо за внимание",
    "подписывайтесь на канал",
    "до свидания",
    "до новых встреч",
    "благодарю за внимание",
    "редактор субтитров",
    // English
    "thank you",
    "thanks for watching",
    "subscribe",
    "like and subscribe",
    "please subscribe",
    "the end",
    "to be continued",
    "subtitles by",
    "translated by",
];

/// Filler words that only count as hallucinations when they are the whole
/// (cleaned) result.
static HALLUCINATION_EXACT: &[&str] = &["you", "bye"];

/// Characters ignored when deciding whether anything was actually said.
fn strip_filler(lower: &str) -> String {
    lower
        .chars()
        .filter(|c| {
            !matches!(
                c,
                '.' | ',' | '!' | '?' | '-' | '…' | ' ' | '\n' | '\t' | '♪' | '♫' | '🎵' | '*'
            )
        })
        .collect()
}

/// Deterministic gate for whisper hallucinations on silence or very short
/// audio. Applied to the full joined transcription, not per-chunk.
pub fn is_hallucination(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let lower = text.trim().to_lowercase();

    // Pure punctuation / ellipsis / musical notes
    let stripped = strip_filler(&lower);
    if stripped.is_empty() {
        return true;
    }

    if HALLUCINATION_PHRASES.iter().any(|p| lower.contains(p)) {
        return true;
    }
    if HALLUCINATION_EXACT.contains(&stripped.as_str()) {
        return true;
    }

    // One or two junk syllables
    stripped.chars().count() <= 3
}

/// English-only models carry a `.en` suffix in some dash-separated part of
/// the name ("base.en", "small.en-q5_1").
pub fn model_is_english_only(model_name: &str) -> bool {
    model_name.split('-').any(|part| part.ends_with(".en")) || model_name.ends_with(".en")
}

/// Language list for a model. A loaded engine answers authoritatively;
/// otherwise the model name decides.
pub fn languages_for_model(
    model_name: &str,
    engine: Option<&dyn SpeechEngine>,
) -> Vec<LangInfo> {
    let multilingual = match engine {
        Some(engine) => engine.is_multilingual(),
        None => !model_is_english_only(model_name),
    };
    if multilingual {
        languages::multilingual_list()
    } else {
        languages::english_only_list()
    }
}
