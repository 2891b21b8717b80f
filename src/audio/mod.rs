//! Audio capture
//!
//! One capability trait ([`AudioSource`]) with a cpal implementation.
//! Recordings are 16 kHz mono f32 PCM, which is what the recognition
//! engine consumes directly.

pub mod cpal_capture;

pub use cpal_capture::CpalCapture;

use crate::error::AudioError;

/// Sample rate every capture is delivered at.
pub const SAMPLE_RATE: u32 = 16_000;

/// Minimum useful recording: 0.5 s at 16 kHz. Shorter captures are
/// accidental presses that whisper hallucinates on; callers discard them
/// before transcription.
pub const MIN_SAMPLES: usize = (SAMPLE_RATE / 2) as usize;

/// A microphone capture session source.
///
/// Start/stop bracket one recording. `start` may block on device open (it
/// is called from worker threads, never the hotkey event loop); the device
/// callback must not block beyond appending to the buffer.
pub trait AudioSource: Send {
    /// Select the capture device for the NEXT session; `""` = OS default.
    /// Never affects a session already in progress.
    fn select_device(&mut self, id: &str);

    /// Open the device and begin accumulating samples. A second `start`
    /// while active is a no-op.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop and return the accumulated 16 kHz mono samples, in capture
    /// order. Returns an empty Vec when not recording.
    fn stop(&mut self) -> Vec<f32>;

    /// Release the OS handle. The source is unusable afterwards.
    fn close(&mut self);
}
