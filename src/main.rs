use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use secrecy::SecretString;
use warteg_gateway::api::{ApiClient, MenuItem, SalesPeriod};
use warteg_gateway::predict::{self, SalesRecord};
use warteg_gateway::voice::{AudioCapture, AudioPlayback, Synthesizer, SAMPLE_RATE};
use warteg_gateway::{Config, Daemon, PushClient};

/// Warteg - voice-driven management gateway for food stalls
#[derive(Parser)]
#[command(name = "warteg", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (for headless servers without audio hardware)
    #[arg(long, env = "WARTEG_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Predict tomorrow's sales from history
    Predict {
        /// Path to a JSON array of sales records; fetches daily sales from
        /// the backend when omitted
        file: Option<PathBuf>,

        /// Restrict to a single menu item
        #[arg(short, long)]
        item: Option<String>,

        /// Target date (YYYY-MM-DD, defaults to tomorrow)
        #[arg(short, long)]
        date: Option<NaiveDate>,
    },
    /// List the menu from the backend
    Menu,
    /// Add a menu item to the backend
    AddMenu {
        /// Display name
        name: String,
        /// Unit price in rupiah
        price: f64,
        /// Category (e.g. "lauk", "minuman")
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Halo! Ini tes sistem suara warteg.")]
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,warteg_gateway=info",
        1 => "info,warteg_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Predict { file, item, date } => {
                cmd_predict(file.as_deref(), item.as_deref(), date).await
            }
            Command::Menu => cmd_menu().await,
            Command::AddMenu {
                name,
                price,
                category,
            } => cmd_add_menu(name, price, category).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker().await,
            Command::TestTts { text } => test_tts(&text).await,
        };
    }

    tracing::info!(disable_voice = cli.disable_voice, "starting warteg gateway");

    // Load configuration
    let config = Config::load(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    if config.voice.enabled {
        tracing::info!("warteg gateway ready - speak a command");
    } else {
        tracing::info!("warteg gateway ready (push-only mode, voice disabled)");
    }

    // Create and run daemon with its own push client
    let push = PushClient::spawn(config.push_config());
    let daemon = Daemon::new(config, push);

    // Run until interrupted
    daemon.run().await?;

    Ok(())
}

/// Build an API client from the loaded configuration
fn api_client() -> anyhow::Result<ApiClient> {
    let config = Config::load(true)?;
    Ok(ApiClient::new(
        &config.api.base_url,
        config.api.token.map(SecretString::from),
    ))
}

/// Run the prediction engine over local or backend sales history
async fn cmd_predict(
    file: Option<&std::path::Path>,
    item: Option<&str>,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let history: Vec<SalesRecord> = match file {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => api_client()?.sales(SalesPeriod::Daily).await?,
    };

    let target = date.unwrap_or_else(|| {
        chrono::Local::now().date_naive() + chrono::Days::new(1)
    });

    let predictions = match item {
        Some(item) => vec![predict::predict(item, &history, target)],
        None => predict::predict_all(&history, target),
    };

    if predictions.is_empty() {
        println!("No sales history to predict from");
        return Ok(());
    }

    println!("Predictions for {target}:");
    for p in predictions {
        println!(
            "  {:<20} {:>4} porsi  (confidence {:.2}, trend {:?}, avg {:.1})",
            p.menu_item, p.predicted_quantity, p.confidence, p.trend, p.historical_average
        );
    }

    Ok(())
}

/// List the menu from the backend
async fn cmd_menu() -> anyhow::Result<()> {
    let items = api_client()?.menu().await?;
    if items.is_empty() {
        println!("Menu is empty");
        return Ok(());
    }

    for item in items {
        println!(
            "{:<24} Rp{:>10.0}  {}",
            item.name,
            item.price,
            item.category.unwrap_or_default()
        );
    }

    Ok(())
}

/// Add a menu item to the backend
async fn cmd_add_menu(name: String, price: f64, category: Option<String>) -> anyhow::Result<()> {
    let created = api_client()?
        .create_menu_item(&MenuItem {
            id: None,
            name,
            price,
            category,
        })
        .await?;

    println!(
        "Added {} (id {})",
        created.name,
        created.id.as_deref().unwrap_or("-")
    );
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");
    println!("  4. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new(1.0)?;

    // Generate 2 seconds of 440Hz sine wave at 24kHz sample rate
    let sample_rate = 24000_i32;
    let frequency = 440.0_f32;
    let duration_secs = 2.0_f32;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let num_samples = (sample_rate as f32 * duration_secs) as usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    playback.play(samples).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");
    println!("  3. Try: pavucontrol (to check output levels)");

    Ok(())
}

/// Test TTS output with the configured synthesizer
async fn test_tts(text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let config = Config::load(false)?;
    let synthesizer = config.voice.build_synthesizer()?;

    println!("Synthesizing speech...");
    let mp3_data = synthesizer.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3_data.len());

    // Check MP3 header
    if mp3_data.len() > 3 {
        println!(
            "First 4 bytes: {:02x} {:02x} {:02x} {:02x}",
            mp3_data[0], mp3_data[1], mp3_data[2], mp3_data[3]
        );
    }

    println!("Playing audio...");
    let playback = AudioPlayback::new(config.voice.volume)?;
    playback.play_mp3(&mp3_data).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}
