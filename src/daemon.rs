//! Daemon - the main gateway service
//!
//! Orchestrates the voice pipeline (capture, STT, command parsing, dispatch,
//! TTS confirmation) and the push channel to the warteg backend.

use std::time::Duration;

use secrecy::SecretString;

use crate::api::ApiClient;
use crate::command::{dispatch, CommandParser, ParsedCommand};
use crate::config::Config;
use crate::push::{Envelope, EnvelopeKind, PushClient, SendOutcome};
use crate::voice::{SpeechSession, VoiceCommand};
use crate::Result;

/// Capture poll cadence (one detector window per tick)
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// The warteg daemon - voice in, commands out, pushes back
pub struct Daemon {
    config: Config,
    api: ApiClient,
    push: PushClient,
    parser: CommandParser,
}

impl Daemon {
    /// Create a daemon with an externally constructed push client.
    ///
    /// The push client is injected so tests and alternate frontends can
    /// share one connection or substitute their own.
    #[must_use]
    pub fn new(config: Config, push: PushClient) -> Self {
        let api = ApiClient::new(
            &config.api.base_url,
            config.api.token.clone().map(SecretString::from),
        );
        let parser = CommandParser::new(&config.ai.live_url, &config.ai.model);

        Self {
            config,
            api,
            push,
            parser,
        }
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the voice session cannot start
    // cpal streams are !Send; the voice loop stays on the main task
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        tracing::info!(
            api = %self.config.api.base_url,
            push = %self.config.push.url,
            voice = self.config.voice.enabled,
            "daemon running"
        );

        self.push.connect();
        let mut alerts = self.push.subscribe(EnvelopeKind::Alert).await?;
        let mut validations = self.push.subscribe(EnvelopeKind::Validation).await?;

        if !self.config.voice.enabled {
            return self.run_headless(&mut alerts, &mut validations).await;
        }

        let mut session = SpeechSession::new(&self.config.voice)?;
        session.start_listening()?;

        let mut poll = tokio::time::interval(POLL_INTERVAL);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    break;
                }
                Some(envelope) = alerts.receiver.recv() => {
                    self.handle_alert(&mut session, &envelope).await;
                }
                Some(envelope) = validations.receiver.recv() => {
                    tracing::info!(data = ?envelope.data, "validation result");
                }
                _ = poll.tick() => {
                    match session.poll_utterance().await {
                        Ok(Some(command)) => {
                            self.handle_command(&mut session, &command).await;
                            self.resume_listening(&mut session);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "transcription failed");
                            self.resume_listening(&mut session);
                        }
                    }
                }
            }
        }

        session.stop_listening();
        self.push.disconnect();
        Ok(())
    }

    /// Push-only mode: log inbound messages until interrupted
    async fn run_headless(
        &self,
        alerts: &mut crate::push::Subscription,
        validations: &mut crate::push::Subscription,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutting down");
                    break;
                }
                Some(envelope) = alerts.receiver.recv() => {
                    tracing::warn!(data = ?envelope.data, "alert received");
                }
                Some(envelope) = validations.receiver.recv() => {
                    tracing::info!(data = ?envelope.data, "validation result");
                }
            }
        }

        self.push.disconnect();
        Ok(())
    }

    /// One full voice turn: parse, dispatch, publish, confirm aloud
    async fn handle_command(&self, session: &mut SpeechSession, command: &VoiceCommand) {
        tracing::info!(
            transcript = %command.text,
            confidence = command.confidence,
            "utterance transcribed"
        );

        let parsed = self.parser.parse_with_fallback(&command.text, &self.api).await;
        tracing::info!(action = %parsed.action(), "command parsed");

        let outcome = dispatch(&self.api, &parsed).await;
        if outcome.delivered {
            self.publish_command(&parsed).await;
        }

        if let Err(e) = session.speak(&outcome.spoken).await {
            tracing::error!(error = %e, "confirmation speech failed");
        }
    }

    /// Spoken alert from the backend preempts listening
    async fn handle_alert(&self, session: &mut SpeechSession, envelope: &Envelope) {
        tracing::warn!(data = ?envelope.data, "alert received");

        let message = envelope
            .data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
            .unwrap_or("Ada peringatan dari sistem.")
            .to_string();

        if let Err(e) = session.speak(&message).await {
            tracing::error!(error = %e, "alert speech failed");
        }
        self.resume_listening(session);
    }

    /// Mirror commands the backend accepted onto the push channel, so
    /// other clients never see stock or sale events that did not land
    async fn publish_command(&self, parsed: &ParsedCommand) {
        let (kind, payload) = match parsed {
            ParsedCommand::UpdateStock(p) => (EnvelopeKind::Stock, serde_json::to_value(p)),
            ParsedCommand::RecordSale(p) => (EnvelopeKind::Sale, serde_json::to_value(p)),
            ParsedCommand::SocialPost(_) | ParsedCommand::Unknown(_) => return,
        };

        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "payload serialization failed");
                return;
            }
        };

        match self.push.send(kind, payload).await {
            Ok(SendOutcome::Sent) => tracing::debug!(kind = ?kind, "push sent"),
            Ok(SendOutcome::Queued) => {
                tracing::debug!(kind = ?kind, "push queued while offline");
            }
            Err(e) => tracing::warn!(error = %e, "push channel unavailable"),
        }
    }

    /// Restart listening after a turn; failure is logged, not fatal
    fn resume_listening(&self, session: &mut SpeechSession) {
        if let Err(e) = session.start_listening() {
            tracing::error!(error = %e, "failed to resume listening");
        }
    }
}
