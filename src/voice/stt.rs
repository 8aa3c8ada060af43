//! Speech-to-text via an OpenAI-compatible transcription endpoint

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from the transcription API
#[derive(serde::Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// Transcribes WAV audio to text
pub struct SpeechToText {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl SpeechToText {
    /// Create a new STT client
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(
        base_url: impl Into<String>,
        api_key: SecretString,
        model: impl Into<String>,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Transcribe WAV audio bytes to text
    ///
    /// # Errors
    ///
    /// Distinguishes upstream rate-limit and payment-required failures
    /// from generic transcription errors
    pub async fn transcribe(&self, audio: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription API error");
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => Error::UpstreamRateLimited(
                    "transcription rate limit exceeded".to_string(),
                ),
                StatusCode::PAYMENT_REQUIRED => Error::UpstreamPaymentRequired(
                    "transcription service payment required".to_string(),
                ),
                _ => Error::Stt(format!("transcription API error {status}: {body}")),
            });
        }

        let result: TranscriptionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcription response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = SpeechToText::new(
            "https://api.openai.com/v1",
            SecretString::from(String::new()),
            "whisper-1",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_base_url_normalized() {
        let stt = SpeechToText::new(
            "https://api.openai.com/v1/",
            SecretString::from("sk-test".to_string()),
            "whisper-1",
        )
        .unwrap();
        assert_eq!(stt.base_url, "https://api.openai.com/v1");
    }
}
