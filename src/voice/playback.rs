//! Audio playback to the speakers

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::{Error, Result};

/// Speaker sink the speech session plays confirmations through.
///
/// [`AudioPlayback`] is the hardware implementation; tests substitute a
/// fake. Not `Send`: the cpal stream lives across the await.
#[async_trait(?Send)]
pub trait PlaybackSink {
    /// Decode MP3 bytes and play them, returning when playback ends.
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    async fn play_mp3(&self, mp3: &[u8]) -> Result<()>;
}

/// Sample rate matching common TTS output
const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// samples, cursor, drained flag shared with the output callback
type PlayState = Arc<Mutex<(Vec<f32>, usize, bool)>>;

/// Plays audio on the default output device
pub struct AudioPlayback {
    device: Device,
    config: StreamConfig,
    /// Linear gain applied to every sample, 0.0 to 1.0
    volume: f32,
}

impl AudioPlayback {
    /// Open the default output device.
    ///
    /// # Errors
    ///
    /// [`Error::NotSupported`] when no output device exists,
    /// [`Error::Audio`] when no usable configuration is available
    pub fn new(volume: f32) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::NotSupported("no audio output device".to_string()))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                (c.channels() == 1 || c.channels() == 2)
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no usable output config".to_string()))?;

        let config = supported
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback ready"
        );

        Ok(Self {
            device,
            config,
            volume: volume.clamp(0.0, 1.0),
        })
    }

    /// Decode MP3 bytes and play them, returning when playback ends.
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        let samples = decode_mp3(mp3)?;
        self.play(samples).await
    }

    /// Play f32 samples, returning when playback ends.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built or started
    pub async fn play(&self, mut samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        if (self.volume - 1.0).abs() > f32::EPSILON {
            for sample in &mut samples {
                *sample *= self.volume;
            }
        }

        let channels = self.config.channels as usize;
        let sample_count = samples.len();

        let shared: PlayState = Arc::new(Mutex::new((samples, 0usize, false)));
        let writer_state = Arc::clone(&shared);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let Ok(mut state) = writer_state.lock() else {
                        return;
                    };
                    let (samples, pos, finished) = &mut *state;

                    for frame in data.chunks_mut(channels) {
                        let value = if *pos < samples.len() {
                            let v = samples[*pos];
                            *pos += 1;
                            v
                        } else {
                            *finished = true;
                            0.0
                        };
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "playback stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
        wait_for_drain(&shared, duration_ms).await;

        drop(stream);
        tracing::debug!(samples = sample_count, "playback complete");
        Ok(())
    }
}

/// Wait until the output callback drains the buffer, bounded by the clip
/// duration plus headroom. Sleeps are async so the caller's task keeps
/// servicing its event loop while a clip plays.
async fn wait_for_drain(shared: &PlayState, duration_ms: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(duration_ms + 500);

    loop {
        let finished = shared.lock().map(|state| state.2).unwrap_or(true);
        if finished || tokio::time::Instant::now() > deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    // Let the device flush its last buffer
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[async_trait(?Send)]
impl PlaybackSink for AudioPlayback {
    async fn play_mp3(&self, mp3: &[u8]) -> Result<()> {
        Self::play_mp3(self, mp3).await
    }
}

/// Decode MP3 bytes to mono f32 samples.
fn decode_mp3(mp3: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|pair| {
                        let left = f32::from(pair[0]) / 32768.0;
                        let right = f32::from(pair.get(1).copied().unwrap_or(pair[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}
