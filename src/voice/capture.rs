//! Microphone capture for push-to-talk recording

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for capture (16kHz mono, what speech APIs expect)
pub const SAMPLE_RATE: u32 = 16000;

/// RMS level below which audio counts as silence
const SILENCE_FLOOR: f32 = 0.01;

/// Records from the default input device into a shared buffer
pub struct AudioCapture {
    device_name: String,
    config: StreamConfig,
    samples: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl AudioCapture {
    /// Open the default input device
    ///
    /// # Errors
    ///
    /// Returns error if no input device supports 16kHz mono capture
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no 16kHz mono input config".to_string()))?;

        let config = supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config();
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, sample_rate = SAMPLE_RATE, "audio capture ready");

        Ok(Self {
            device_name,
            config,
            samples: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        })
    }

    /// Begin recording; a no-op when already recording
    ///
    /// # Errors
    ///
    /// Returns error if the input stream cannot be built
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let sink = Arc::clone(&self.samples);
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device".to_string()))?;

        let stream = device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = sink.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "input stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!(device = %self.device_name, "recording started");
        Ok(())
    }

    /// Stop recording; captured samples stay buffered until taken
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("recording stopped");
        }
    }

    /// Take the recorded utterance, leaving the buffer empty
    #[must_use]
    pub fn take_utterance(&self) -> Vec<f32> {
        self.samples
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default()
    }

    /// Whether recording is in progress
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.stream.is_some()
    }
}

/// RMS energy of a sample window
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Strip leading and trailing silence from an utterance
///
/// Works in 20ms windows against a fixed RMS floor; returns the original
/// slice bounds when everything is silent so the caller can decide what
/// to do with an empty recording.
#[must_use]
pub fn trim_silence(samples: &[f32]) -> &[f32] {
    let window = (SAMPLE_RATE / 50) as usize;
    if samples.len() < window {
        return samples;
    }

    let first = samples
        .chunks(window)
        .position(|w| rms_level(w) > SILENCE_FLOOR);
    let Some(first) = first else {
        return samples;
    };

    let last = samples
        .chunks(window)
        .rposition(|w| rms_level(w) > SILENCE_FLOOR)
        .unwrap_or(first);

    let start = first * window;
    let end = ((last + 1) * window).min(samples.len());
    &samples[start..end]
}

/// Encode f32 samples as 16-bit PCM WAV for the transcription API
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let pcm = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(pcm)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
