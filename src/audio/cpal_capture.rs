//! cpal-based audio capture
//!
//! Works with PipeWire, PulseAudio, ALSA, CoreAudio and WASAPI through the
//! cpal crate. `cpal::Stream` is not `Send`, so each recording session owns
//! a dedicated thread that builds and holds the stream; `stop()` signals
//! that thread and takes the buffer back.
//!
//! The device callback appends into a mutex-guarded buffer after checking
//! the active flag, and does nothing else.

use super::{AudioSource, SAMPLE_RATE};
use crate::error::AudioError;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

/// Buffer shared between the device callback and the controlling side.
#[derive(Default)]
struct CaptureShared {
    samples: Vec<f32>,
    active: bool,
}

/// cpal-based capture source.
pub struct CpalCapture {
    /// Opaque device id (cpal device name); empty = OS default
    device_id: String,
    shared: Arc<Mutex<CaptureShared>>,
    /// Tells the stream-owning thread to tear down
    stop_tx: Option<mpsc::Sender<()>>,
    session: Option<JoinHandle<()>>,
    closed: bool,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            device_id: String::new(),
            shared: Arc::new(Mutex::new(CaptureShared::default())),
            stop_tx: None,
            session: None,
            closed: false,
        }
    }

    /// Names of all input devices, for the `devices` CLI command and the
    /// settings UI.
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for CpalCapture {
    fn select_device(&mut self, id: &str) {
        self.device_id = id.to_string();
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.closed {
            return Err(AudioError::Init("capture closed".to_string()));
        }
        {
            let mut shared = self.shared.lock().unwrap();
            if shared.active {
                return Ok(());
            }
            shared.samples.clear();
            shared.active = true;
        }

        let result = self.open_session();
        if result.is_err() {
            self.shared.lock().unwrap().active = false;
        }
        result
    }

    fn stop(&mut self) -> Vec<f32> {
        let samples = {
            let mut shared = self.shared.lock().unwrap();
            if !shared.active {
                return Vec::new();
            }
            shared.active = false;
            std::mem::take(&mut shared.samples)
        };

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(session) = self.session.take() {
            let _ = session.join();
        }

        tracing::debug!(
            "capture stopped: {} samples ({:.2}s)",
            samples.len(),
            samples.len() as f32 / SAMPLE_RATE as f32
        );
        samples
    }

    fn close(&mut self) {
        let _ = self.stop();
        self.closed = true;
    }
}

impl CpalCapture {
    /// Resolve the device and hand the stream to its owning thread; waits
    /// for the build/play handshake so device-open failures surface here.
    fn open_session(&mut self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = if self.device_id.is_empty() {
            host.default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default".to_string()))?
        } else {
            find_input_device(&host, &self.device_id)?
        };

        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
        tracing::info!("recording from audio device: {}", device_name);

        let supported = device
            .default_input_config()
            .map_err(|e| AudioError::Init(e.to_string()))?;
        let source_rate = supported.sample_rate().0;
        let source_channels = supported.channels() as usize;
        let sample_format = supported.sample_format();

        tracing::debug!(
            "device config: {} Hz, {} channel(s), format {:?}",
            source_rate,
            source_channels,
            sample_format
        );

        let stream_config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
            buffer_size: cpal::BufferSize::Default,
        };

        let shared = self.shared.clone();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        // start() must fail when the device can't be opened, so the stream
        // build result comes back over a channel before start() returns.
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), AudioError>>();

        let session = std::thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let err_fn = |err| tracing::error!("audio stream error: {}", err);

                let stream_result = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(
                        &device,
                        &stream_config,
                        shared,
                        source_rate,
                        source_channels,
                        err_fn,
                    ),
                    cpal::SampleFormat::I16 => build_stream::<i16>(
                        &device,
                        &stream_config,
                        shared,
                        source_rate,
                        source_channels,
                        err_fn,
                    ),
                    cpal::SampleFormat::U16 => build_stream::<u16>(
                        &device,
                        &stream_config,
                        shared,
                        source_rate,
                        source_channels,
                        err_fn,
                    ),
                    format => Err(AudioError::Init(format!(
                        "unsupported sample format: {:?}",
                        format
                    ))),
                };

                let stream = match stream_result {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(AudioError::Stream(e.to_string())));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Hold the stream until stop() signals; dropping it stops
                // the device callback.
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::Init(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.stop_tx = Some(stop_tx);
                self.session = Some(session);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = session.join();
                Err(e)
            }
            Err(_) => {
                let _ = session.join();
                Err(AudioError::Stream("audio session thread died".to_string()))
            }
        }
    }
}

/// Find an input device by name: exact match first, then case-insensitive,
/// then substring. Users may configure either full device names or short
/// PipeWire/PulseAudio aliases.
fn find_input_device(host: &cpal::Host, device_id: &str) -> Result<cpal::Device, AudioError> {
    let devices: Vec<cpal::Device> = host
        .input_devices()
        .map_err(|e| AudioError::Init(e.to_string()))?
        .collect();

    let wanted_lower = device_id.to_lowercase();

    let matchers: [fn(&str, &str, &str) -> bool; 3] = [
        |name, wanted, _lower| name == wanted,
        |name, _wanted, lower| name.to_lowercase() == lower,
        |name, _wanted, lower| name.to_lowercase().contains(lower),
    ];
    for matcher in matchers {
        for device in &devices {
            if let Ok(name) = device.name() {
                if matcher(&name, device_id, &wanted_lower) {
                    tracing::debug!("matched audio device {:?} for {:?}", name, device_id);
                    return host
                        .input_devices()
                        .map_err(|e| AudioError::Init(e.to_string()))?
                        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                        .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()));
                }
            }
        }
    }

    Err(AudioError::DeviceNotFound(device_id.to_string()))
}

/// Build the input stream for one sample type: convert to f32, mix to
/// mono, resample to 16 kHz, append under the shared mutex.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    shared: Arc<Mutex<CaptureShared>>,
    source_rate: u32,
    source_channels: usize,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, AudioError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mono: Vec<f32> = data
                    .chunks(source_channels)
                    .map(|frame| {
                        let sum: f32 = frame
                            .iter()
                            .map(|&s| <f32 as cpal::FromSample<T>>::from_sample_(s))
                            .sum();
                        sum / source_channels as f32
                    })
                    .collect();

                let resampled = if source_rate != SAMPLE_RATE {
                    resample(&mono, source_rate, SAMPLE_RATE)
                } else {
                    mono
                };

                let mut guard = match shared.lock() {
                    Ok(guard) => guard,
                    Err(_) => return,
                };
                if guard.active {
                    guard.samples.extend_from_slice(&resampled);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Linear interpolation resampling; adequate for speech input.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let src_idx = i as f64 / ratio;
        let idx = src_idx.floor() as usize;
        let frac = (src_idx - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else {
            samples.get(idx).copied().unwrap_or(0.0)
        };
        output.push(sample);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resample_same_rate() {
        let samples = vec![1.0, 2.0, 3.0, 4.0];
        assert_eq!(resample(&samples, 16000, 16000), samples);
    }

    #[test]
    fn test_resample_downsample() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let result = resample(&samples, 48000, 16000);
        assert!(result.len() >= 2 && result.len() <= 4);
    }

    #[test]
    fn test_resample_upsample() {
        let result = resample(&[1.0, 2.0], 8000, 16000);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn test_resample_empty() {
        assert!(resample(&[], 48000, 16000).is_empty());
    }

    #[test]
    fn test_stop_without_start_is_empty() {
        let mut capture = CpalCapture::new();
        assert!(capture.stop().is_empty());
    }
}
