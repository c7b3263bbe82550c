//! Speech session state machine
//!
//! One session owns capture, playback, STT, and TTS, and serializes them
//! through a single [`SessionState`]. Listening and speaking are mutually
//! exclusive by construction: speaking always preempts listening so the
//! gateway never transcribes its own voice output.

use chrono::{DateTime, Utc};

use crate::config::VoiceConfig;
use crate::{Error, Result};

use super::capture::{samples_to_wav, AudioCapture, CaptureSource, SAMPLE_RATE};
use super::playback::{AudioPlayback, PlaybackSink};
use super::stt::Recognizer;
use super::tts::Synthesizer;

/// Minimum RMS energy considered speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum speech length for a valid utterance (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Trailing silence marking the utterance boundary (0.5s)
const SILENCE_SAMPLES: usize = 8000;

/// What the session is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing active
    Idle,
    /// Capturing microphone audio, waiting for an utterance boundary
    Listening,
    /// Utterance captured, transcription or parsing in flight
    Processing,
    /// Synthesized speech is playing
    Speaking,
}

/// A completed speech turn
#[derive(Debug, Clone)]
pub struct VoiceCommand {
    /// Transcribed text
    pub text: String,
    /// Recognizer confidence, 0.0 to 1.0
    pub confidence: f64,
    /// When the utterance completed
    pub timestamp: DateTime<Utc>,
    /// BCP 47 language tag of the recognition
    pub language: String,
}

/// Segments continuous capture into utterances by energy and silence
#[derive(Debug, Default)]
pub struct UtteranceDetector {
    buffer: Vec<f32>,
    silence_counter: usize,
    active: bool,
}

impl UtteranceDetector {
    /// Create an idle detector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed captured samples; returns true when an utterance is complete.
    ///
    /// Speech begins when energy crosses the threshold; the utterance ends
    /// after enough trailing silence, provided enough speech accumulated.
    /// Noise blips shorter than the minimum are discarded.
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let is_speech = rms_energy(samples) > ENERGY_THRESHOLD;

        if !self.active {
            if is_speech {
                self.active = true;
                self.buffer.clear();
                self.buffer.extend_from_slice(samples);
                self.silence_counter = 0;
                tracing::trace!("utterance started");
            }
            return false;
        }

        self.buffer.extend_from_slice(samples);
        if is_speech {
            self.silence_counter = 0;
        } else {
            self.silence_counter += samples.len();
        }

        if self.silence_counter > SILENCE_SAMPLES {
            if self.buffer.len() - self.silence_counter > MIN_SPEECH_SAMPLES {
                tracing::debug!(samples = self.buffer.len(), "utterance complete");
                return true;
            }
            // Too short to be speech
            tracing::trace!("discarding noise blip");
            self.reset();
        }

        false
    }

    /// Take the accumulated utterance, resetting the detector.
    pub fn take_utterance(&mut self) -> Vec<f32> {
        self.active = false;
        self.silence_counter = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Whether speech activity is currently accumulating
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Discard any accumulated audio.
    pub fn reset(&mut self) {
        self.active = false;
        self.silence_counter = 0;
        self.buffer.clear();
    }
}

/// Guard for entering the listening state.
///
/// # Errors
///
/// [`Error::ListeningActive`] when already listening; [`Error::Audio`]
/// when the session is busy processing or speaking
fn ensure_can_listen(state: SessionState) -> Result<()> {
    match state {
        SessionState::Idle => Ok(()),
        SessionState::Listening => Err(Error::ListeningActive),
        SessionState::Processing | SessionState::Speaking => {
            Err(Error::Audio("session busy".to_string()))
        }
    }
}

/// Voice I/O session owning the audio endpoints and speech providers
pub struct SpeechSession {
    state: SessionState,
    capture: Box<dyn CaptureSource>,
    playback: Box<dyn PlaybackSink>,
    recognizer: Box<dyn Recognizer>,
    synthesizer: Box<dyn Synthesizer>,
    detector: UtteranceDetector,
    language: String,
}

impl SpeechSession {
    /// Open audio devices and build the speech providers from config.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] when audio hardware is missing,
    /// [`Error::Config`] when provider keys are absent
    pub fn new(config: &VoiceConfig) -> Result<Self> {
        let capture = AudioCapture::new()?;
        let playback = AudioPlayback::new(config.volume)?;
        let recognizer = config.build_recognizer()?;
        let synthesizer = config.build_synthesizer()?;

        Ok(Self::assemble(
            Box::new(capture),
            Box::new(playback),
            Box::new(recognizer),
            Box::new(synthesizer),
            config.language.clone(),
        ))
    }

    fn assemble(
        capture: Box<dyn CaptureSource>,
        playback: Box<dyn PlaybackSink>,
        recognizer: Box<dyn Recognizer>,
        synthesizer: Box<dyn Synthesizer>,
        language: String,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            capture,
            playback,
            recognizer,
            synthesizer,
            detector: UtteranceDetector::new(),
            language,
        }
    }

    /// Current session state
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Begin a listening session.
    ///
    /// # Errors
    ///
    /// [`Error::ListeningActive`] when already listening; [`Error::Audio`]
    /// when busy or the capture stream fails to start
    pub fn start_listening(&mut self) -> Result<()> {
        ensure_can_listen(self.state)?;
        self.detector.reset();
        self.capture.start()?;
        self.state = SessionState::Listening;
        tracing::info!("listening");
        Ok(())
    }

    /// End the listening session. No-op when not listening.
    pub fn stop_listening(&mut self) {
        if self.state == SessionState::Listening {
            self.capture.stop();
            self.detector.reset();
            self.state = SessionState::Idle;
            tracing::info!("stopped listening");
        }
    }

    /// Drain captured audio and transcribe a completed utterance.
    ///
    /// Returns `Ok(None)` while no utterance boundary has been reached.
    /// On completion the session moves to `Processing` and exactly one
    /// [`VoiceCommand`] is produced for the utterance.
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails; the session returns to idle
    pub async fn poll_utterance(&mut self) -> Result<Option<VoiceCommand>> {
        if self.state != SessionState::Listening {
            return Ok(None);
        }

        let chunk = self.capture.take_buffer();
        if chunk.is_empty() || !self.detector.process(&chunk) {
            return Ok(None);
        }

        // Utterance boundary reached: hand off to STT
        self.state = SessionState::Processing;
        self.capture.stop();
        let samples = self.detector.take_utterance();

        let wav = samples_to_wav(&samples, SAMPLE_RATE)?;
        let transcript = match self.recognizer.transcribe(&wav, &self.language).await {
            Ok(transcript) => transcript,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };

        Ok(Some(VoiceCommand {
            text: transcript.text,
            confidence: transcript.confidence,
            timestamp: Utc::now(),
            language: self.language.clone(),
        }))
    }

    /// Synthesize and play `text`, returning when playback ends.
    ///
    /// Always preempts an active listening session before synthesis starts.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis or playback fails
    pub async fn speak(&mut self, text: &str) -> Result<()> {
        // Never hear our own voice
        self.stop_listening();
        self.state = SessionState::Speaking;

        let result = async {
            let mp3 = self.synthesizer.synthesize(text).await?;
            self.playback.play_mp3(&mp3).await
        }
        .await;

        self.state = SessionState::Idle;
        result
    }
}

/// RMS energy of a sample window
#[allow(clippy::cast_precision_loss)]
fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
