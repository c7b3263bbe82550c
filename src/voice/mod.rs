//! Voice processing: microphone capture, playback, STT, TTS, and the
//! speech session state machine

pub mod capture;
pub mod playback;
pub mod session;
pub mod stt;
pub mod tts;

pub use capture::{samples_to_wav, AudioCapture, CaptureSource, SAMPLE_RATE};
pub use playback::{AudioPlayback, PlaybackSink};
pub use session::{SessionState, SpeechSession, UtteranceDetector, VoiceCommand};
pub use stt::{Recognizer, SpeechToText, Transcript};
pub use tts::{Synthesizer, TextToSpeech};
