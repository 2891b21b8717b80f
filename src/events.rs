//! Event stream to the GUI collaborator
//!
//! The orchestrator and engine cache never talk to a window or event bus
//! directly; they emit [`CoreEvent`]s through an [`EventSink`] handle given
//! at construction. The GUI bridge implements the trait; headless runs use
//! [`NullSink`].

use serde::Serialize;

/// Runtime state of a preset, as shown to the GUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    Idle,
    Recording,
    Processing,
}

impl std::fmt::Display for RecordState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordState::Idle => write!(f, "idle"),
            RecordState::Recording => write!(f, "recording"),
            RecordState::Processing => write!(f, "processing"),
        }
    }
}

/// Events emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CoreEvent {
    /// Chunk boundary during long-audio transcription (total > 1 only)
    TranscriptionProgress {
        preset_id: String,
        current: usize,
        total: usize,
    },
    /// Every state transition of a preset
    RecordingState { preset_id: String, state: RecordState },
}

/// Receiver for core events. Implementations must be cheap and non-blocking;
/// they are called from pipeline worker threads.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CoreEvent);
}

/// Sink that drops everything (headless runs, tests that don't care).
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: CoreEvent) {}
}
