//! Speakkey: push-to-talk voice-to-text
//!
//! Hold (or toggle) a global keyboard chord bound to a *preset*, speak,
//! and the transcription lands in the focused window. Everything runs
//! locally, on Linux, macOS and Windows, from one portable binary.
//!
//! # Architecture
//!
//! ```text
//!        ┌──────────────┐   press/release    ┌────────────────────┐
//!        │ HotkeyEngine │ ─────────────────▶ │ PresetOrchestrator │
//!        │ (global hook │   worker threads   │  idle → recording  │
//!        │  + chords)   │                    │  → processing      │
//!        └──────────────┘                    └────────────────────┘
//!                                               │        │
//!                                 start/stop    │        │ ensure/
//!                                               ▼        ▼ transcribe
//!                                     ┌──────────────┐ ┌─────────────┐
//!                                     │ AudioCapture │ │ EngineCache │
//!                                     │ (cpal, 16k)  │ │ (whisper)   │
//!                                     └──────────────┘ └─────────────┘
//!                                                         │
//!                           clean + hallucination gate    │ text
//!                                                         ▼
//!                                     ┌──────────────────────────────┐
//!                                     │ TextInjector                 │
//!                                     │ save clip → write → paste    │
//!                                     │ keystroke → restore clip     │
//!                                     └──────────────────────────────┘
//!
//!   BackendRegistry ──▶ EngineCache.flush ──▶ orchestrator reload
//!   (CPU built in, GPU backends = ggml libraries next to the binary)
//! ```
//!
//! Platform specifics (audio devices, the key hook, clipboard, paste
//! keystrokes, layout detection, GPU probing) live behind capability
//! traits with one implementation per platform; the orchestrator only
//! sees the traits.

pub mod audio;
pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod hotkey;
pub mod inject;
pub mod layout;
pub mod orchestrator;

pub use config::{AppConfig, Preset};
pub use error::{Result, SpeakkeyError};
pub use orchestrator::{OrchestratorOptions, PresetOrchestrator, TranscriptionResult};
