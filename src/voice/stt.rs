//! Speech-to-text over hosted transcription APIs
//!
//! The recognizer is a trait so the speech session can be exercised without
//! network access; [`SpeechToText`] is the HTTP implementation (Whisper or
//! Deepgram), configured for Indonesian by default.

use async_trait::async_trait;

use crate::{Error, Result};

/// A finished transcription
#[derive(Debug, Clone)]
pub struct Transcript {
    /// Recognized text
    pub text: String,
    /// Recognizer confidence, 0.0 to 1.0
    pub confidence: f64,
}

/// Transcribes a WAV utterance to text.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Transcribe WAV bytes in the given BCP 47 language.
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    async fn transcribe(&self, wav: &[u8], language: &str) -> Result<Transcript>;
}

#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// STT provider backend
#[derive(Clone, Copy, Debug)]
enum SttProvider {
    Whisper,
    Deepgram,
}

/// HTTP speech-to-text client
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: String,
    model: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a Whisper-backed recognizer.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_whisper(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a Deepgram-backed recognizer.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new_deepgram(api_key: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("Deepgram API key required".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            provider: SttProvider::Deepgram,
        })
    }

    async fn transcribe_whisper(&self, wav: &[u8], language: &str) -> Result<Transcript> {
        tracing::debug!(audio_bytes = wav.len(), language, "Whisper transcription");

        // Whisper takes an ISO 639-1 code, not a full BCP 47 tag
        let short_language = language.split('-').next().unwrap_or(language).to_string();

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("utterance.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", short_language);

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");

        // Whisper reports no per-utterance confidence
        Ok(Transcript {
            text: result.text,
            confidence: 1.0,
        })
    }

    async fn transcribe_deepgram(&self, wav: &[u8], language: &str) -> Result<Transcript> {
        tracing::debug!(audio_bytes = wav.len(), language, "Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&language={language}&punctuate=true",
            self.model
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", "audio/wav")
            .body(wav.to_vec())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await?;
        let alternative = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first());

        let transcript = Transcript {
            text: alternative.map(|a| a.transcript.clone()).unwrap_or_default(),
            confidence: alternative.and_then(|a| a.confidence).unwrap_or(0.0),
        };

        tracing::info!(transcript = %transcript.text, "transcription complete");
        Ok(transcript)
    }
}

#[async_trait]
impl Recognizer for SpeechToText {
    async fn transcribe(&self, wav: &[u8], language: &str) -> Result<Transcript> {
        match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(wav, language).await,
            SttProvider::Deepgram => self.transcribe_deepgram(wav, language).await,
        }
    }
}
