//! Voice processing module
//!
//! Push-to-talk capture and speech-to-text. The gateway has no wake
//! word: recording is started and stopped explicitly (CLI key press or a
//! client holding the mic button), then the utterance is transcribed.

mod capture;
mod stt;

pub use capture::{AudioCapture, SAMPLE_RATE, encode_wav, rms_level, trim_silence};
pub use stt::SpeechToText;
