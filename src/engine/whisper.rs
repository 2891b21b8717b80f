//! whisper.cpp engine handle
//!
//! Wraps a whisper-rs context as a [`SpeechEngine`]. Contexts are not
//! reentrant, so every handle serialises its own inference behind a mutex;
//! the cache never shares a handle across presets.

use super::{EngineLoader, SpeechEngine};
use crate::backend;
use crate::error::TranscribeError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

pub struct WhisperEngine {
    ctx: WhisperContext,
    /// Recognition contexts are single-flight
    inference: Mutex<()>,
    threads: i32,
}

impl WhisperEngine {
    /// Load a GGML model file. `backend` selects GPU use: everything except
    /// "cpu" runs with GPU offload enabled and lets ggml pick among the
    /// registered backends.
    pub fn load(model_path: &Path, backend_id: &str) -> Result<Self, TranscribeError> {
        // GPU backend libraries next to the binary must be registered
        // before the first context is created.
        backend::load_backends_from_exe_dir();

        let use_gpu = backend_id != "cpu";
        let mut ctx_params = WhisperContextParameters::default();
        ctx_params.use_gpu(use_gpu);
        // flash_attn padding depends on compile-time backend flags; keep off
        ctx_params.flash_attn(false);

        let path_str = model_path
            .to_str()
            .ok_or_else(|| TranscribeError::BackendInitFailed("invalid model path".to_string()))?;

        tracing::info!(
            "loading whisper model {:?} (backend: {}, gpu: {})",
            model_path,
            backend_id,
            use_gpu
        );
        let start = std::time::Instant::now();

        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| TranscribeError::BackendInitFailed(e.to_string()))?;

        tracing::info!("model loaded in {:.2}s", start.elapsed().as_secs_f32());

        Ok(Self {
            ctx,
            inference: Mutex::new(()),
            threads: num_cpus::get().min(8) as i32,
        })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
        translate: bool,
    ) -> Result<String, TranscribeError> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        let _guard = self.inference.lock().unwrap();
        let start = std::time::Instant::now();

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| TranscribeError::TranscribeFailed(e.to_string()))?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        if language.is_empty() || language == "auto" {
            params.set_language(None);
        } else {
            params.set_language(Some(language));
        }
        params.set_translate(translate);
        params.set_n_threads(self.threads);
        params.set_no_context(true);
        params.set_suppress_blank(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, samples)
            .map_err(|e| TranscribeError::TranscribeFailed(e.to_string()))?;

        let mut text = String::new();
        for segment in state.as_iter() {
            text.push_str(
                segment
                    .to_str()
                    .map_err(|e| TranscribeError::TranscribeFailed(e.to_string()))?,
            );
        }

        tracing::debug!(
            "inference done in {:.2}s ({:.1}s of audio)",
            start.elapsed().as_secs_f32(),
            samples.len() as f32 / 16_000.0
        );

        Ok(text)
    }

    fn is_multilingual(&self) -> bool {
        self.ctx.is_multilingual()
    }
}

/// Loader the orchestrator wires into the cache in production.
pub struct WhisperLoader;

impl EngineLoader for WhisperLoader {
    fn load(
        &self,
        model_path: &Path,
        backend_id: &str,
    ) -> Result<Arc<dyn SpeechEngine>, TranscribeError> {
        Ok(Arc::new(WhisperEngine::load(model_path, backend_id)?))
    }
}
