//! Error types for speakkey
//!
//! Uses thiserror for ergonomic error definitions. Each subsystem has its
//! own enum; `SpeakkeyError` is the umbrella used at the binary boundary.

use thiserror::Error;

/// Top-level error type for the speakkey application
#[derive(Error, Debug)]
pub enum SpeakkeyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Hotkey error: {0}")]
    Hotkey(#[from] HotkeyError),

    #[error("Audio capture error: {0}")]
    Audio(#[from] AudioError),

    #[error("Transcription error: {0}")]
    Transcribe(#[from] TranscribeError),

    #[error("Text injection error: {0}")]
    Inject(#[from] InjectError),

    #[error("Preset error: {0}")]
    Preset(#[from] PresetError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors related to global hotkeys
#[derive(Error, Debug)]
pub enum HotkeyError {
    #[error("unknown key: {0:?}")]
    UnknownKey(String),

    #[error("empty hotkey string")]
    EmptyChord,

    #[error("global key hook failed: {0}")]
    HookFailed(String),
}

/// Errors related to audio capture
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("audio host initialization failed: {0}")]
    Init(String),

    #[error("audio input device not found: {0:?}")]
    DeviceNotFound(String),

    #[error("audio stream error: {0}")]
    Stream(String),
}

/// Errors related to speech-to-text transcription
#[derive(Error, Debug)]
pub enum TranscribeError {
    #[error("no model found in {dir} (looking for {name})")]
    ModelMissing { name: String, dir: String },

    #[error("whisper initialization failed: {0}")]
    BackendInitFailed(String),

    #[error("transcription failed: {0}")]
    TranscribeFailed(String),
}

/// Errors related to text injection
#[derive(Error, Debug)]
pub enum InjectError {
    #[error("no clipboard tool found (install wl-clipboard or xclip)")]
    NoClipboardTool,

    #[error("clipboard write failed: {0}")]
    ClipboardWrite(String),

    #[error("no key simulation tool found (install ydotool, wtype, or xdotool)")]
    NoKeystrokeTool,

    #[error("paste keystroke failed: {0}")]
    Keystroke(String),
}

/// Errors returned from the preset orchestrator's call surface
#[derive(Error, Debug)]
pub enum PresetError {
    #[error("a preset is already recording or processing")]
    Busy,

    #[error("preset not found: {0}")]
    NotFound(String),

    #[error("audio device error: {0}")]
    Device(#[from] AudioError),

    #[error("invalid hotkey: {0}")]
    Chord(#[from] HotkeyError),

    #[error("id count mismatch: got {got}, have {have}")]
    ReorderMismatch { got: usize, have: usize },

    #[error("unknown preset id in reorder: {0}")]
    ReorderUnknownId(String),
}

/// Result type alias using SpeakkeyError
pub type Result<T> = std::result::Result<T, SpeakkeyError>;
