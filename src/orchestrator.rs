//! Preset orchestrator
//!
//! Owns the preset list and the per-preset recording state machine
//! (`idle → recording → processing → idle`), and drives the
//! capture → transcribe → inject pipeline when a chord fires. At most one
//! preset may be recording or processing at any instant; the check and the
//! state write share one critical section.
//!
//! Everything platform-shaped (audio, injection, layout, the key hook, the
//! engine loader, history, the event sink) comes in as a capability handle
//! at construction, so the orchestrator itself is plain logic over threads
//! and mutexes.

use crate::audio::{AudioSource, MIN_SAMPLES, SAMPLE_RATE};
use crate::backend::BackendRegistry;
use crate::config::{self, AppConfig, Preset};
use crate::engine::{self, EngineCache, EngineLoader, LangInfo};
use crate::error::{PresetError, SpeakkeyError};
use crate::events::{CoreEvent, EventSink, RecordState};
use crate::history::HistorySink;
use crate::hotkey::{HotkeyEngine, KeyHook};
use crate::inject::TextInject;
use crate::layout::LayoutProbe;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{mpsc, Arc, Mutex, Weak};
use std::time::Duration;
use uuid::Uuid;

/// Recordings auto-stop after this long.
pub const MAX_RECORD_DURATION: Duration = Duration::from_secs(3 * 60);

/// Hold-mode releases can arrive before the press worker has finished
/// starting the recording; the release handler polls this long for the
/// state to catch up.
const RELEASE_POLL_TRIES: u32 = 20;
const RELEASE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Result envelope returned from `stop_recording`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Empty on success
    pub error: String,
}

impl TranscriptionResult {
    fn failed(error: String) -> Self {
        Self {
            text: String::new(),
            error,
        }
    }
}

/// One row of the `get_states` snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PresetStatus {
    pub id: String,
    pub state: RecordState,
}

/// Everything the orchestrator is built from. `system()` wires the real
/// platform; tests substitute mocks per capability.
pub struct OrchestratorOptions {
    pub config_path: PathBuf,
    pub audio: Box<dyn AudioSource>,
    pub loader: Arc<dyn EngineLoader>,
    pub injector: Arc<dyn TextInject>,
    pub layout: Arc<dyn LayoutProbe>,
    pub history: Arc<dyn HistorySink>,
    pub events: Arc<dyn EventSink>,
    pub hook: Box<dyn KeyHook>,
    pub registry: BackendRegistry,
    pub max_record_duration: Duration,
}

impl OrchestratorOptions {
    /// Production wiring over the OS capabilities.
    pub fn system(config_path: PathBuf) -> Self {
        Self {
            config_path,
            audio: Box::new(crate::audio::CpalCapture::new()),
            loader: Arc::new(crate::engine::WhisperLoader),
            injector: Arc::new(crate::inject::ClipboardInjector::system()),
            layout: Arc::new(crate::layout::SystemLayoutProbe),
            history: Arc::new(crate::history::FileHistory::new()),
            events: Arc::new(crate::events::NullSink),
            hook: Box::new(crate::hotkey::RdevHook::new()),
            registry: BackendRegistry::new(),
            max_record_duration: MAX_RECORD_DURATION,
        }
    }
}

/// Cancel handle for the armed auto-stop timer; dropping the sender wakes
/// the timer thread without firing it.
struct AutoStopTimer {
    _cancel: mpsc::Sender<()>,
}

struct Inner {
    cfg: AppConfig,
    states: HashMap<String, RecordState>,
    last_text: String,
    auto_stop: Option<AutoStopTimer>,
}

pub struct PresetOrchestrator {
    inner: Mutex<Inner>,
    cache: EngineCache,
    audio: Mutex<Box<dyn AudioSource>>,
    injector: Arc<dyn TextInject>,
    layout: Arc<dyn LayoutProbe>,
    history: Arc<dyn HistorySink>,
    events: Arc<dyn EventSink>,
    hotkeys: HotkeyEngine,
    registry: BackendRegistry,
    config_path: PathBuf,
    max_record_duration: Duration,
}

impl PresetOrchestrator {
    pub fn new(options: OrchestratorOptions) -> Arc<Self> {
        let OrchestratorOptions {
            config_path,
            audio,
            loader,
            injector,
            layout,
            history,
            events,
            hook,
            registry,
            max_record_duration,
        } = options;

        let cfg = config::load_from(&config_path);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let press_weak = weak.clone();
            let release_weak = weak.clone();
            let hotkeys = HotkeyEngine::new(
                hook,
                Arc::new(move |preset_id: &str| {
                    if let Some(orch) = press_weak.upgrade() {
                        orch.on_hotkey_press(preset_id);
                    }
                }),
                Arc::new(move |preset_id: &str| {
                    if let Some(orch) = release_weak.upgrade() {
                        orch.on_hotkey_release(preset_id);
                    }
                }),
            );

            Self {
                inner: Mutex::new(Inner {
                    cfg,
                    states: HashMap::new(),
                    last_text: String::new(),
                    auto_stop: None,
                }),
                cache: EngineCache::new(loader),
                audio: Mutex::new(audio),
                injector,
                layout,
                history,
                events,
                hotkeys,
                registry,
                config_path,
                max_record_duration,
            }
        })
    }

    /// Start hotkeys, select the configured microphone, and activate every
    /// enabled preset (register chords, preload keep-loaded models).
    pub fn init(self: &Arc<Self>) -> Result<(), SpeakkeyError> {
        self.hotkeys.start();

        let (mic_id, presets) = {
            let mut guard = self.inner.lock().unwrap();
            let inner = &mut *guard;
            for preset in &inner.cfg.presets {
                inner
                    .states
                    .insert(preset.id.clone(), RecordState::Idle);
            }
            (inner.cfg.microphone_id.clone(), inner.cfg.presets.clone())
        };

        if !mic_id.is_empty() {
            self.audio.lock().unwrap().select_device(&mic_id);
        }

        for preset in presets.iter().filter(|p| p.enabled) {
            self.activate_preset(preset);
        }

        tracing::info!("orchestrator initialized ({} presets)", presets.len());
        Ok(())
    }

    /// Release everything. In-flight inference is not aborted; the process
    /// wrapper budgets ~2 s and then hard-exits.
    pub fn shutdown(&self) {
        self.hotkeys.stop();
        self.inner.lock().unwrap().auto_stop.take();
        self.cache.flush_all();
        self.audio.lock().unwrap().close();
        tracing::info!("orchestrator shut down");
    }

    // --- Hotkey callbacks (run on short-lived worker threads) ---

    fn on_hotkey_press(self: &Arc<Self>, preset_id: &str) {
        let (mode, state) = {
            let inner = self.inner.lock().unwrap();
            let Some(preset) = inner.cfg.find_preset(preset_id) else {
                tracing::warn!("press for unknown preset {}", preset_id);
                return;
            };
            (
                preset.input_mode.clone(),
                inner.states.get(preset_id).copied().unwrap_or(RecordState::Idle),
            )
        };

        tracing::debug!("hotkey press: preset={} mode={}", preset_id, mode);

        match mode.as_str() {
            "toggle" => {
                if state == RecordState::Recording {
                    let _ = self.stop_recording(preset_id);
                } else if let Err(e) = self.start_recording(preset_id) {
                    tracing::warn!("start_recording failed: {}", e);
                }
            }
            _ => {
                // hold
                if let Err(e) = self.start_recording(preset_id) {
                    tracing::warn!("start_recording failed: {}", e);
                }
            }
        }
    }

    fn on_hotkey_release(self: &Arc<Self>, preset_id: &str) {
        let mode = {
            let inner = self.inner.lock().unwrap();
            match inner.cfg.find_preset(preset_id) {
                Some(preset) => preset.input_mode.clone(),
                None => return,
            }
        };
        if mode != "hold" {
            return;
        }

        // The press worker may still be opening the audio device; wait for
        // the state to reach `recording` before stopping.
        let mut state = RecordState::Idle;
        for _ in 0..RELEASE_POLL_TRIES {
            state = self.state_of(preset_id);
            if state == RecordState::Recording {
                break;
            }
            std::thread::sleep(RELEASE_POLL_INTERVAL);
        }

        tracing::debug!("hotkey release: preset={} state={}", preset_id, state);
        if state == RecordState::Recording {
            let _ = self.stop_recording(preset_id);
        }
    }

    // --- Recording pipeline ---

    /// Begin audio capture for a preset. Fails with `Busy` while any
    /// preset is recording or processing.
    pub fn start_recording(self: &Arc<Self>, preset_id: &str) -> Result<(), PresetError> {
        {
            let mut inner = self.inner.lock().unwrap();

            // Global mutual exclusion, and re-entry protection for the
            // same preset, in one critical section with the state write.
            if inner
                .states
                .values()
                .any(|s| matches!(s, RecordState::Recording | RecordState::Processing))
            {
                return Err(PresetError::Busy);
            }
            if inner.cfg.find_preset(preset_id).is_none() {
                return Err(PresetError::NotFound(preset_id.to_string()));
            }

            // State goes to `recording` before the device opens so the
            // release handler can see it while `start` is still blocking.
            inner
                .states
                .insert(preset_id.to_string(), RecordState::Recording);
        }
        self.emit_state(preset_id, RecordState::Recording);

        // Device open may block; never under the orchestrator lock.
        let started = self.audio.lock().unwrap().start();
        if let Err(e) = started {
            self.set_state(preset_id, RecordState::Idle);
            return Err(PresetError::Device(e));
        }

        self.arm_auto_stop(preset_id);
        tracing::info!("recording started for preset {}", preset_id);
        Ok(())
    }

    /// Stop capture and run the transcription pipeline. Returns an empty
    /// result when the preset is not recording (covers toggle re-presses
    /// racing the auto-stop).
    pub fn stop_recording(self: &Arc<Self>, preset_id: &str) -> TranscriptionResult {
        let preset = {
            let mut inner = self.inner.lock().unwrap();
            if inner.states.get(preset_id) != Some(&RecordState::Recording) {
                return TranscriptionResult::default();
            }
            inner.auto_stop.take();
            inner
                .states
                .insert(preset_id.to_string(), RecordState::Processing);
            match inner.cfg.find_preset(preset_id).cloned() {
                Some(preset) => preset,
                None => {
                    inner.states.remove(preset_id);
                    return TranscriptionResult::failed("preset not found".to_string());
                }
            }
        };
        self.emit_state(preset_id, RecordState::Processing);

        let samples = self.audio.lock().unwrap().stop();

        let result = self.run_pipeline(&preset, samples);

        if !preset.keep_model_loaded {
            self.cache.evict(preset_id);
        }
        {
            let mut inner = self.inner.lock().unwrap();
            inner.states.insert(preset_id.to_string(), RecordState::Idle);
            inner.last_text = result.text.clone();
        }
        self.emit_state(preset_id, RecordState::Idle);
        result
    }

    /// Transcribe captured audio and hand the text to the injector and the
    /// history sink. Failures come back in the result envelope; the caller
    /// returns the preset to `idle` either way.
    fn run_pipeline(self: &Arc<Self>, preset: &Preset, samples: Vec<f32>) -> TranscriptionResult {
        // Sub-half-second captures are accidental presses; whisper would
        // only hallucinate on them.
        if samples.len() < MIN_SAMPLES {
            tracing::info!(
                "recording too short ({} samples, need {}), discarding",
                samples.len(),
                MIN_SAMPLES
            );
            return TranscriptionResult::default();
        }
        tracing::info!(
            "recording stopped: {} samples ({:.1}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );

        let (models_dir, backend) = {
            let inner = self.inner.lock().unwrap();
            (
                config::resolve_models_dir(&inner.cfg),
                inner.cfg.backend.clone(),
            )
        };
        let backend = self.registry.active(&backend);

        let engine = match self.cache.ensure(preset, &models_dir, &backend) {
            Ok(engine) => engine,
            Err(e) => return TranscriptionResult::failed(format!("Model load failed: {}", e)),
        };

        let language = self.resolve_language(preset);

        let events = self.events.clone();
        let preset_id = preset.id.clone();
        let mut on_progress = move |current: usize, total: usize| {
            if total <= 1 {
                return;
            }
            tracing::info!("transcribing chunk {}/{}", current, total);
            events.emit(CoreEvent::TranscriptionProgress {
                preset_id: preset_id.clone(),
                current,
                total,
            });
        };

        let text = match engine::transcribe_long(
            engine.as_ref(),
            &samples,
            &language,
            false,
            &mut on_progress,
        ) {
            Ok(text) => text,
            Err(e) => return TranscriptionResult::failed(format!("Transcription failed: {}", e)),
        };

        let text = text.trim().to_string();
        if engine::is_hallucination(&text) {
            tracing::info!("filtered hallucination: {:?}", text);
            return TranscriptionResult::default();
        }

        if !text.is_empty() {
            if let Err(e) = self.injector.inject(&text) {
                tracing::warn!("paste failed: {}", e);
            }
            if preset.keep_history {
                self.history.append(&text, &language);
            }
        }

        TranscriptionResult {
            text,
            error: String::new(),
        }
    }

    /// The preset's language, optionally overridden by the live keyboard
    /// layout when the preset opted in.
    fn resolve_language(&self, preset: &Preset) -> String {
        let mut language = if preset.language.is_empty() {
            "auto".to_string()
        } else {
            preset.language.clone()
        };

        if preset.use_kb_layout {
            if let Some(detected) = self.layout.detect() {
                if crate::engine::languages::is_recognised(&detected) {
                    tracing::debug!("keyboard layout language: {}", detected);
                    language = detected;
                }
            }
        }
        language
    }

    /// Arm the auto-stop timer for an in-flight recording. Skipped when
    /// the recording already ended (instant release).
    fn arm_auto_stop(self: &Arc<Self>, preset_id: &str) {
        let mut inner = self.inner.lock().unwrap();
        if inner.states.get(preset_id) != Some(&RecordState::Recording) {
            return;
        }

        let (cancel_tx, cancel_rx) = mpsc::channel::<()>();
        let weak = Arc::downgrade(self);
        let max = self.max_record_duration;
        let id = preset_id.to_string();

        let spawned = std::thread::Builder::new()
            .name("auto-stop".to_string())
            .spawn(move || {
                if let Err(mpsc::RecvTimeoutError::Timeout) = cancel_rx.recv_timeout(max) {
                    if let Some(orch) = weak.upgrade() {
                        tracing::info!(
                            "auto-stopping preset {} after {:?}",
                            id,
                            max
                        );
                        let _ = orch.stop_recording(&id);
                    }
                }
            });
        if spawned.is_ok() {
            inner.auto_stop = Some(AutoStopTimer { _cancel: cancel_tx });
        }
    }

    // --- Preset CRUD ---

    pub fn list_presets(&self) -> Vec<Preset> {
        self.inner.lock().unwrap().cfg.presets.clone()
    }

    /// Add a preset. The id is always assigned here; empty input mode and
    /// language get their defaults.
    pub fn create_preset(self: &Arc<Self>, mut preset: Preset) -> Preset {
        preset.id = Uuid::new_v4().to_string();
        if preset.input_mode.is_empty() {
            preset.input_mode = "hold".to_string();
        }
        if preset.language.is_empty() {
            preset.language = "auto".to_string();
        }

        {
            let mut inner = self.inner.lock().unwrap();
            inner.cfg.presets.push(preset.clone());
            inner.states.insert(preset.id.clone(), RecordState::Idle);
            self.save_config_locked(&inner.cfg);
        }

        if preset.enabled {
            self.spawn_activation(preset.clone(), None);
        }
        preset
    }

    /// Update a preset in place. Bindings and engines are only touched
    /// when a hotkey-affecting or model-affecting field changed.
    pub fn update_preset(self: &Arc<Self>, preset: Preset) -> Result<(), PresetError> {
        if !preset.hotkey.is_empty() {
            crate::hotkey::parse_chord(&preset.hotkey)?;
        }

        let old = {
            let mut inner = self.inner.lock().unwrap();
            let Some(idx) = inner.cfg.find_preset_index(&preset.id) else {
                return Err(PresetError::NotFound(preset.id.clone()));
            };
            let old = inner.cfg.presets[idx].clone();
            inner.cfg.presets[idx] = preset.clone();
            self.save_config_locked(&inner.cfg);
            old
        };

        let hotkey_changed = old.hotkey != preset.hotkey
            || old.input_mode != preset.input_mode
            || old.enabled != preset.enabled;
        let model_changed =
            old.model_name != preset.model_name || old.keep_model_loaded != preset.keep_model_loaded;

        if hotkey_changed || model_changed {
            let deactivate_first = old.enabled;
            self.spawn_activation(preset, Some(deactivate_first));
        }
        Ok(())
    }

    pub fn delete_preset(self: &Arc<Self>, preset_id: &str) -> Result<(), PresetError> {
        {
            let mut inner = self.inner.lock().unwrap();
            let Some(idx) = inner.cfg.find_preset_index(preset_id) else {
                return Err(PresetError::NotFound(preset_id.to_string()));
            };
            inner.cfg.presets.remove(idx);
            inner.states.remove(preset_id);
            self.save_config_locked(&inner.cfg);
        }

        let orch = self.clone();
        let id = preset_id.to_string();
        std::thread::spawn(move || orch.deactivate_preset(&id));
        Ok(())
    }

    /// Reorder presets to the given id order; `ids` must be a permutation
    /// of the current ids.
    pub fn reorder_presets(&self, ids: &[String]) -> Result<(), PresetError> {
        let mut inner = self.inner.lock().unwrap();

        if ids.len() != inner.cfg.presets.len() {
            return Err(PresetError::ReorderMismatch {
                got: ids.len(),
                have: inner.cfg.presets.len(),
            });
        }

        let mut by_id: HashMap<String, Preset> = inner
            .cfg
            .presets
            .drain(..)
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut reordered = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(preset) => reordered.push(preset),
                None => {
                    // Keep the preset multiset intact before failing
                    let mut restore: Vec<Preset> = by_id.into_values().collect();
                    reordered.append(&mut restore);
                    inner.cfg.presets = reordered;
                    return Err(PresetError::ReorderUnknownId(id.clone()));
                }
            }
        }

        inner.cfg.presets = reordered;
        self.save_config_locked(&inner.cfg);
        Ok(())
    }

    pub fn set_preset_enabled(
        self: &Arc<Self>,
        preset_id: &str,
        enabled: bool,
    ) -> Result<(), PresetError> {
        let preset = {
            let mut inner = self.inner.lock().unwrap();
            let Some(idx) = inner.cfg.find_preset_index(preset_id) else {
                return Err(PresetError::NotFound(preset_id.to_string()));
            };
            inner.cfg.presets[idx].enabled = enabled;
            let preset = inner.cfg.presets[idx].clone();
            self.save_config_locked(&inner.cfg);
            preset
        };

        // Registration and model loading can block for seconds
        if enabled {
            self.spawn_activation(preset, None);
        } else {
            let orch = self.clone();
            let id = preset_id.to_string();
            std::thread::spawn(move || orch.deactivate_preset(&id));
        }
        Ok(())
    }

    // --- Introspection & lifecycle ---

    pub fn get_states(&self) -> Vec<PresetStatus> {
        let inner = self.inner.lock().unwrap();
        inner
            .cfg
            .presets
            .iter()
            .map(|preset| PresetStatus {
                id: preset.id.clone(),
                state: inner
                    .states
                    .get(&preset.id)
                    .copied()
                    .unwrap_or(RecordState::Idle),
            })
            .collect()
    }

    pub fn get_last_text(&self) -> String {
        self.inner.lock().unwrap().last_text.clone()
    }

    /// Interactive chord capture for the preset editor; blocks until the
    /// user acts.
    pub fn capture_hotkey(&self) -> String {
        self.hotkeys.capture()
    }

    pub fn cancel_capture(&self) {
        self.hotkeys.cancel_capture();
    }

    /// Languages a model can recognise. A loaded engine for that model is
    /// authoritative; otherwise the model name decides.
    pub fn get_model_languages(&self, model_name: &str) -> Vec<LangInfo> {
        let engine = {
            let inner = self.inner.lock().unwrap();
            inner
                .cfg
                .presets
                .iter()
                .filter(|p| p.model_name == model_name)
                .find_map(|p| self.cache.get(&p.id))
        };
        engine::languages_for_model(model_name, engine.as_deref())
    }

    /// Drop all cached engines so the next use reloads them (backend or
    /// model settings changed externally).
    pub fn flush_engines(&self) {
        self.cache.flush_all();
    }

    /// Re-read the config file after an external change.
    pub fn reload_config(&self) {
        let cfg = config::load_from(&self.config_path);
        let mut inner = self.inner.lock().unwrap();
        for preset in &cfg.presets {
            inner
                .states
                .entry(preset.id.clone())
                .or_insert(RecordState::Idle);
        }
        tracing::info!("config reloaded (backend={})", cfg.backend);
        inner.cfg = cfg;
    }

    /// Called when the installer collaborator finishes delivering a GPU
    /// backend: flush engines and switch to it, no restart needed.
    pub fn on_backend_installed(&self, backend_id: &str) {
        self.cache.flush_all();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.cfg.backend = backend_id.to_string();
            self.save_config_locked(&inner.cfg);
        }
        tracing::info!("backend hot-switched to {:?}", backend_id);
    }

    // --- Internals ---

    fn state_of(&self, preset_id: &str) -> RecordState {
        self.inner
            .lock()
            .unwrap()
            .states
            .get(preset_id)
            .copied()
            .unwrap_or(RecordState::Idle)
    }

    fn set_state(&self, preset_id: &str, state: RecordState) {
        self.inner
            .lock()
            .unwrap()
            .states
            .insert(preset_id.to_string(), state);
        self.emit_state(preset_id, state);
    }

    /// Event emission happens outside the orchestrator lock; sinks may
    /// call back into us.
    fn emit_state(&self, preset_id: &str, state: RecordState) {
        self.events.emit(CoreEvent::RecordingState {
            preset_id: preset_id.to_string(),
            state,
        });
    }

    fn save_config_locked(&self, cfg: &AppConfig) {
        if let Err(e) = config::save_to(&self.config_path, cfg) {
            tracing::warn!("failed to save config: {}", e);
        }
    }

    /// Register the chord and preload the model for an active preset.
    /// Never called with the orchestrator lock held.
    fn activate_preset(self: &Arc<Self>, preset: &Preset) {
        if !preset.hotkey.is_empty() {
            if let Err(e) = self.hotkeys.register(&preset.id, &preset.hotkey, &preset.input_mode) {
                tracing::warn!("failed to register hotkey for {:?}: {}", preset.name, e);
            }
        }
        if preset.keep_model_loaded {
            let (models_dir, backend) = {
                let inner = self.inner.lock().unwrap();
                (
                    config::resolve_models_dir(&inner.cfg),
                    inner.cfg.backend.clone(),
                )
            };
            let backend = self.registry.active(&backend);
            if let Err(e) = self.cache.ensure(preset, &models_dir, &backend) {
                tracing::warn!("failed to preload model for {:?}: {}", preset.name, e);
            }
        }
    }

    fn deactivate_preset(&self, preset_id: &str) {
        self.hotkeys.unregister(preset_id);
        self.cache.evict(preset_id);
    }

    /// Run (re)activation on a background thread: registration and model
    /// loading can block for seconds.
    fn spawn_activation(self: &Arc<Self>, preset: Preset, deactivate_first: Option<bool>) {
        let orch = self.clone();
        std::thread::spawn(move || {
            if deactivate_first.unwrap_or(false) {
                orch.deactivate_preset(&preset.id);
            }
            if preset.enabled {
                orch.activate_preset(&preset);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TranscribeError;
    use std::path::Path;
    use tempfile::TempDir;

    struct NoopAudio;

    impl AudioSource for NoopAudio {
        fn select_device(&mut self, _id: &str) {}
        fn start(&mut self) -> Result<(), crate::error::AudioError> {
            Ok(())
        }
        fn stop(&mut self) -> Vec<f32> {
            Vec::new()
        }
        fn close(&mut self) {}
    }

    struct NoopInjector;

    impl TextInject for NoopInjector {
        fn inject(&self, _text: &str) -> Result<crate::inject::Injection, crate::error::InjectError> {
            Ok(crate::inject::Injection::Pasted)
        }
    }

    struct NoopLayout;

    impl LayoutProbe for NoopLayout {
        fn detect(&self) -> Option<String> {
            None
        }
    }

    struct NoopHistory;

    impl HistorySink for NoopHistory {
        fn append(&self, _text: &str, _language: &str) {}
    }

    struct NoopLoader;

    impl EngineLoader for NoopLoader {
        fn load(
            &self,
            _model_path: &Path,
            _backend_id: &str,
        ) -> Result<Arc<dyn crate::engine::SpeechEngine>, TranscribeError> {
            Err(TranscribeError::BackendInitFailed("no engine in tests".to_string()))
        }
    }

    struct NoopHook;

    impl KeyHook for NoopHook {
        fn start(&mut self) -> Result<mpsc::Receiver<crate::hotkey::RawKeyEvent>, crate::error::HotkeyError> {
            let (_tx, rx) = mpsc::channel();
            Ok(rx)
        }
        fn stop(&mut self) {}
    }

    fn orchestrator(dir: &TempDir) -> Arc<PresetOrchestrator> {
        let config_path = dir.path().join("config.json");
        let mut cfg = AppConfig::default();
        cfg.models_dir = dir.path().display().to_string();
        config::save_to(&config_path, &cfg).unwrap();

        let orch = PresetOrchestrator::new(OrchestratorOptions {
            config_path,
            audio: Box::new(NoopAudio),
            loader: Arc::new(NoopLoader),
            injector: Arc::new(NoopInjector),
            layout: Arc::new(NoopLayout),
            history: Arc::new(NoopHistory),
            events: Arc::new(crate::events::NullSink),
            hook: Box::new(NoopHook),
            registry: BackendRegistry::at(dir.path().to_path_buf()),
            max_record_duration: MAX_RECORD_DURATION,
        });
        orch.init().unwrap();
        orch
    }

    #[test]
    fn test_create_assigns_id_and_defaults() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);

        let mut preset = Preset::default_preset();
        preset.id = "ignored".to_string();
        preset.input_mode = String::new();
        preset.language = String::new();

        let created = orch.create_preset(preset);
        assert_ne!(created.id, "ignored");
        assert_eq!(created.input_mode, "hold");
        assert_eq!(created.language, "auto");
        assert_eq!(orch.list_presets().len(), 2);
        assert_eq!(orch.get_states().len(), 2);
    }

    #[test]
    fn test_update_unknown_preset() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        let mut preset = Preset::default_preset();
        preset.id = "missing".to_string();
        assert!(matches!(
            orch.update_preset(preset),
            Err(PresetError::NotFound(_))
        ));
    }

    #[test]
    fn test_update_rejects_bad_chord() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        let mut preset = orch.list_presets()[0].clone();
        preset.hotkey = "ctrl+bogus".to_string();
        assert!(matches!(
            orch.update_preset(preset),
            Err(PresetError::Chord(_))
        ));
        // The stored preset is unchanged
        assert_eq!(orch.list_presets()[0].hotkey, "");
    }

    #[test]
    fn test_delete_preset() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        let id = orch.list_presets()[0].id.clone();

        orch.delete_preset(&id).unwrap();
        assert!(orch.list_presets().is_empty());
        assert!(matches!(
            orch.delete_preset(&id),
            Err(PresetError::NotFound(_))
        ));
    }

    #[test]
    fn test_reorder_is_permutation_only() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        for _ in 0..2 {
            orch.create_preset(Preset::default_preset());
        }
        let ids: Vec<String> = orch.list_presets().iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), 3);

        // Rotate
        let rotated = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
        orch.reorder_presets(&rotated).unwrap();
        let after: Vec<String> = orch.list_presets().iter().map(|p| p.id.clone()).collect();
        assert_eq!(after, rotated);

        // Wrong length
        assert!(matches!(
            orch.reorder_presets(&rotated[..2].to_vec()),
            Err(PresetError::ReorderMismatch { .. })
        ));

        // Unknown id; the preset multiset must survive the failure
        let mut bad = rotated.clone();
        bad[0] = "nope".to_string();
        assert!(matches!(
            orch.reorder_presets(&bad),
            Err(PresetError::ReorderUnknownId(_))
        ));
        let mut survived: Vec<String> =
            orch.list_presets().iter().map(|p| p.id.clone()).collect();
        survived.sort();
        let mut expected = rotated.clone();
        expected.sort();
        assert_eq!(survived, expected);
    }

    #[test]
    fn test_start_unknown_preset() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        assert!(matches!(
            orch.start_recording("missing"),
            Err(PresetError::NotFound(_))
        ));
    }

    #[test]
    fn test_stop_when_idle_is_empty() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        let id = orch.list_presets()[0].id.clone();
        assert_eq!(orch.stop_recording(&id), TranscriptionResult::default());
    }

    #[test]
    fn test_busy_while_recording() {
        let dir = TempDir::new().unwrap();
        let orch = orchestrator(&dir);
        let a = orch.list_presets()[0].id.clone();
        let b = orch.create_preset(Preset::default_preset()).id;

        orch.start_recording(&a).unwrap();
        assert!(matches!(orch.start_recording(&b), Err(PresetError::Busy)));
        // The same preset can't re-enter either
        assert!(matches!(orch.start_recording(&a), Err(PresetError::Busy)));

        // Too-short capture: clean return to idle, empty result
        let result = orch.stop_recording(&a);
        assert_eq!(result, TranscriptionResult::default());
        assert_eq!(orch.state_of(&a), RecordState::Idle);

        // Idle again: b may start now
        orch.start_recording(&b).unwrap();
        let _ = orch.stop_recording(&b);
    }
}
