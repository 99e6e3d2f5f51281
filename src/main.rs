use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Receiver;
use reader::integration::{ReaderConfig, SessionDriver};
use reader::playback::{CompletionReporter, PlaybackController, PlaybackEvent, SessionSummary, TokioTime};
use reader::reading::{ScrollEngine, SpeechPlaybackEngine, SpeedReadEngine};
use reader::records::{ReadingHistory, ReadingHistoryItem, StatsRepository};
use reader::settings::{SpeechSettings, StaticSettings};
use reader::speech::{PacedSynthesizer, SharedSynthesizer, SourceText, SpeedTier};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Mode {
    Speed,
    Scroll,
    Speech,
}

/// Read text by speed reading, auto-scroll or text-to-speech
#[derive(Parser, Debug)]
#[command(name = "reader", version, about)]
struct Cli {
    /// Reading mode
    #[arg(short, long, value_enum, default_value = "speed")]
    mode: Mode,

    /// Text file to read (stdin if omitted)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Speed reading rate in words per minute
    #[arg(long)]
    wpm: Option<f64>,

    /// Scroll speed in pixels per second
    #[arg(long)]
    scroll_speed: Option<f64>,

    /// Scrollable height of the content in pixels
    #[arg(long, default_value_t = 2000.0)]
    max_offset: f64,

    /// Speech speed tier, e.g. "slow" or "very fast"
    #[arg(long)]
    tier: Option<SpeedTier>,

    /// Speech voice name
    #[arg(long)]
    voice: Option<String>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print statistics as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Logs go to stderr; stdout is the reading display
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reader=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ReaderConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ReaderConfig::default(),
    };

    let source = SourceText::typed(read_input(cli.input.as_ref())?)?;
    info!("Starting reader in {:?} mode", cli.mode);

    let history = ReadingHistory::new();
    let item = ReadingHistoryItem::new(source.text.clone());
    info!("Reading \"{}\" ({} words)", item.title(), item.word_count);
    history.save(item);

    let stats = StatsRepository::new();
    let reporter = CompletionReporter::new()
        .with_stats(Arc::new(stats.clone()))
        .with_listener(Arc::new(|summary: &SessionSummary| {
            info!(
                "Finished {} words in {:.1}s ({:.0} wpm)",
                summary.word_count,
                summary.duration.as_secs_f64(),
                summary.words_per_minute()
            );
        }));

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build runtime")?;
    let text: Arc<str> = Arc::from(source.text.as_str());
    runtime.block_on(run_mode(&cli, &config, text, reporter))?;

    let snapshot = stats.snapshot();
    if snapshot.sessions_completed == 0 {
        info!("Session ended before the end of the text");
        return Ok(());
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!();
        println!("Words read:   {}", snapshot.total_words_read);
        println!("Time:         {}", snapshot.formatted_total_time());
        println!("Average:      {} wpm", snapshot.average_wpm());
        println!("Streak:       {}", snapshot.streak_text());
    }

    Ok(())
}

/// Build the engine for the selected mode, start it and drive it
async fn run_mode(
    cli: &Cli,
    config: &ReaderConfig,
    text: Arc<str>,
    reporter: CompletionReporter,
) -> Result<()> {
    let time = Arc::new(TokioTime);
    match cli.mode {
        Mode::Speed => {
            let mut engine = SpeedReadEngine::new(config.speed_read.clone(), time, reporter);
            if let Some(wpm) = cli.wpm {
                engine.set_rate(wpm);
            }
            let events = engine.subscribe();
            engine.start(&text)?;
            drive(engine, events, text).await
        }
        Mode::Scroll => {
            let mut engine = ScrollEngine::new(config.scroll.clone(), time, reporter);
            if let Some(speed) = cli.scroll_speed {
                engine.set_rate(speed);
            }
            let events = engine.subscribe();
            engine.start(&text, cli.max_offset)?;
            drive(engine, events, text).await
        }
        Mode::Speech => {
            let settings = StaticSettings::new(SpeechSettings {
                voice: cli
                    .voice
                    .clone()
                    .unwrap_or_else(|| config.speech.default_voice.clone()),
                tier: cli.tier.unwrap_or(config.speech.default_tier),
            });
            let synthesizer = SharedSynthesizer::new(PacedSynthesizer::new());
            let mut engine = SpeechPlaybackEngine::new(
                config.speech.clone(),
                time,
                reporter,
                synthesizer,
                Arc::new(settings),
            );
            let events = engine.subscribe();
            engine.start(&text)?;
            drive(engine, events, text).await
        }
    }
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

/// Run a started engine until it finishes or Ctrl-C
async fn drive<E>(engine: E, events: Receiver<PlaybackEvent>, text: Arc<str>) -> Result<()>
where
    E: PlaybackController + 'static,
{
    let printer = spawn_printer(events, text);
    let (driver, handle) = SessionDriver::new(engine);

    let interrupt = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping");
            let _ = interrupt.shutdown();
        }
    });

    // Teardown drops the event sender, which ends the printer
    let engine = driver.exit_when_stopped(true).run().await;
    drop(engine);

    if printer.join().is_err() {
        warn!("Display thread panicked");
    }
    Ok(())
}

fn spawn_printer(events: Receiver<PlaybackEvent>, text: Arc<str>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdout = std::io::stdout();
        let mut last_line = None;

        for event in events.iter() {
            let mut out = stdout.lock();
            let written = match event {
                PlaybackEvent::Word(word) => {
                    let (before, focus, after) = word.parts();
                    match focus {
                        Some(focus) => writeln!(out, "{}[{}]{}", before, focus, after),
                        None => writeln!(out, "{}", before),
                    }
                }
                PlaybackEvent::Offset(offset) => {
                    // One line per 100px is plenty for a terminal
                    let line = (offset / 100.0) as u64;
                    if last_line != Some(line) {
                        last_line = Some(line);
                        writeln!(out, "scrolled {:.0}px", offset)
                    } else {
                        Ok(())
                    }
                }
                PlaybackEvent::Highlight(Some(range)) => match text.get(range) {
                    Some(spoken) => writeln!(out, "{}", spoken),
                    None => Ok(()),
                },
                PlaybackEvent::Completed(summary) => writeln!(
                    out,
                    "-- done: {} words in {:.1}s",
                    summary.word_count,
                    summary.duration.as_secs_f64()
                ),
                PlaybackEvent::Error(message) => writeln!(out, "error: {}", message),
                PlaybackEvent::Highlight(None) | PlaybackEvent::StateChanged(_) => Ok(()),
            };
            if written.and_then(|_| out.flush()).is_err() {
                break;
            }
        }
    })
}
