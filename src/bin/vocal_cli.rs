use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tokio::sync::broadcast;
use vocal_trainer::analysis::{note_frequency, to_note, AccuracyBand, PitchEstimator};
use vocal_trainer::audio::wav::{read_wav, write_wav};
use vocal_trainer::audio::{generate_reference_tone, SampleBuffer};
use vocal_trainer::config::AppConfig;
use vocal_trainer::engine::{default_backend, EngineHandle, RunReport, StubBackend, StubSinger};
use vocal_trainer::exercise::{catalog, Exercise, ExerciseResults, ExerciseSettings};
use vocal_trainer::session::{
    BreathingEvent, BreathingPhaseMachine, BreathingSummary, SessionOutcome, VocalEvent,
};

/// Exit code for runs stopped with Ctrl-C
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "vocal_cli",
    about = "Offline pitch analysis and exercise simulator for Vocal Trainer"
)]
struct Cli {
    /// JSON config file (defaults to assets/trainer_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log session lifecycle to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Map a frequency to its nearest note, or a note name to its frequency
    Note {
        #[arg(long, conflicts_with = "name", required_unless_present = "name")]
        frequency: Option<f32>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Estimate the pitch track of a WAV file, one JSON line per window
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// Samples per analysis window (defaults to the estimator buffer size)
        #[arg(long)]
        window: Option<usize>,
        /// Samples between window starts (defaults to the window size)
        #[arg(long)]
        hop: Option<usize>,
    },
    /// Write a reference tone for a note to a WAV file
    Tone {
        #[arg(long)]
        note: String,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, default_value_t = 1000)]
        duration_ms: u64,
        #[arg(long, default_value_t = 44100)]
        sample_rate: u32,
    },
    /// List the built-in exercises
    Exercises {
        #[arg(long, value_enum)]
        kind: Option<ExerciseKind>,
        #[arg(long)]
        json: bool,
    },
    /// Run a vocal exercise against a simulated singer and print the results
    Simulate {
        #[arg(long)]
        exercise: String,
        #[arg(long)]
        tempo: Option<u32>,
        /// Pass threshold in percent
        #[arg(long)]
        tolerance: Option<f32>,
        /// Sing every reference note shifted by this many cents
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        cents_offset: f32,
        /// Hold one frequency instead of echoing the reference
        #[arg(long, conflicts_with_all = ["silent", "cents_offset"])]
        frequency: Option<f32>,
        /// Deliver silence
        #[arg(long)]
        silent: bool,
        /// White noise amplitude mixed into every buffer
        #[arg(long, default_value_t = 0.0)]
        noise: f32,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Override the delay between reference tone and listening window
        #[arg(long)]
        settle_ms: Option<u64>,
        /// Override the gap after each scored note
        #[arg(long)]
        gap_ms: Option<u64>,
        /// Print every session event as a JSON line before the results
        #[arg(long)]
        events: bool,
        /// Write the results JSON here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run a breathing drill in real time, printing its events
    Breathe {
        #[arg(long)]
        exercise: String,
        /// Print the full event sequence immediately instead of waiting
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum ExerciseKind {
    Vocal,
    Breathing,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Note { frequency, name } => run_note(frequency, name),
        Commands::Analyze { input, window, hop } => run_analyze(&config, &input, window, hop),
        Commands::Tone {
            note,
            output,
            duration_ms,
            sample_rate,
        } => run_tone(&note, &output, duration_ms, sample_rate),
        Commands::Exercises { kind, json } => run_exercises(kind, json),
        Commands::Simulate {
            exercise,
            tempo,
            tolerance,
            cents_offset,
            frequency,
            silent,
            noise,
            seed,
            settle_ms,
            gap_ms,
            events,
            output,
        } => {
            let singer = match (frequency, silent) {
                (Some(frequency_hz), _) => StubSinger::Fixed { frequency_hz },
                (None, true) => StubSinger::Silent,
                (None, false) => StubSinger::Echo { cents_offset },
            };
            let mut config = config;
            if let Some(settle_ms) = settle_ms {
                config.session.settle_delay_ms = settle_ms;
            }
            if let Some(gap_ms) = gap_ms {
                config.session.note_gap_ms = gap_ms;
            }
            let options = SimulateOptions {
                tempo,
                tolerance,
                singer,
                noise,
                seed,
                print_events: events,
                output,
            };
            runtime()?.block_on(run_simulate(config, &exercise, options))
        }
        Commands::Breathe { exercise, dry_run } => {
            let exercise = find_exercise(&exercise)?;
            if dry_run {
                run_breathe_dry(exercise)
            } else {
                runtime()?.block_on(run_breathe(config, exercise))
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // Also installs the log bridge, so `log` records from the library show up
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .try_init();
}

fn load_config(path: &Path) -> Result<AppConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")
}

fn find_exercise(id: &str) -> Result<&'static Exercise> {
    match catalog::find(id) {
        Some(exercise) => Ok(exercise),
        None => {
            let known: Vec<&str> = catalog::all().iter().map(|e| e.id.as_str()).collect();
            bail!("unknown exercise '{}' (known: {})", id, known.join(", "))
        }
    }
}

#[derive(Serialize)]
struct NoteReport {
    frequency_hz: f32,
    note: String,
    cents: f32,
    band: &'static str,
}

fn run_note(frequency: Option<f32>, name: Option<String>) -> Result<ExitCode> {
    let frequency_hz = match (frequency, name) {
        (Some(frequency_hz), _) => frequency_hz,
        (None, Some(name)) => match note_frequency(&name) {
            Some(frequency_hz) => frequency_hz,
            None => bail!("'{}' is not a note name", name),
        },
        (None, None) => bail!("either --frequency or --name is required"),
    };

    let info = to_note(frequency_hz);
    let is_note = info.is_note();
    let report = NoteReport {
        frequency_hz,
        note: info.name,
        cents: info.cents,
        band: AccuracyBand::from_cents(info.cents).label(),
    };
    println!("{}", serde_json::to_string(&report)?);

    if is_note {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(2))
    }
}

#[derive(Serialize)]
struct AnalysisFrame {
    time_ms: f32,
    frequency_hz: f32,
    confidence: f32,
    note: String,
    cents: f32,
}

fn run_analyze(
    config: &AppConfig,
    input: &Path,
    window: Option<usize>,
    hop: Option<usize>,
) -> Result<ExitCode> {
    let buffer = read_wav(input).with_context(|| format!("loading {}", input.display()))?;
    let window = window.unwrap_or(config.estimator.buffer_size).max(1);
    let hop = hop.unwrap_or(window).max(1);

    let mut estimator = PitchEstimator::with_config(buffer.sample_rate, &config.estimator);
    let mut start = 0;
    while start + window <= buffer.samples.len() {
        let estimate = estimator.estimate(&buffer.samples[start..start + window]);
        let info = to_note(estimate.frequency_hz);
        let frame = AnalysisFrame {
            time_ms: start as f32 * 1000.0 / buffer.sample_rate as f32,
            frequency_hz: estimate.frequency_hz,
            confidence: estimate.confidence,
            note: info.name,
            cents: info.cents,
        };
        println!("{}", serde_json::to_string(&frame)?);
        start += hop;
    }

    Ok(ExitCode::from(0))
}

fn run_tone(note: &str, output: &Path, duration_ms: u64, sample_rate: u32) -> Result<ExitCode> {
    let Some(frequency_hz) = note_frequency(note) else {
        bail!("'{}' is not a note name", note);
    };
    let samples =
        generate_reference_tone(frequency_hz, Duration::from_millis(duration_ms), sample_rate);
    write_wav(output, &SampleBuffer::new(samples, sample_rate))
        .with_context(|| format!("writing {}", output.display()))?;
    eprintln!(
        "Wrote {} ({:.2} Hz, {} ms) to {}",
        note,
        frequency_hz,
        duration_ms,
        output.display()
    );
    Ok(ExitCode::from(0))
}

fn run_exercises(kind: Option<ExerciseKind>, json: bool) -> Result<ExitCode> {
    let exercises: Vec<&Exercise> = match kind {
        Some(ExerciseKind::Vocal) => catalog::vocal().collect(),
        Some(ExerciseKind::Breathing) => catalog::breathing().collect(),
        None => catalog::all().iter().collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&exercises)?);
        return Ok(ExitCode::from(0));
    }

    for exercise in exercises {
        let kind = if exercise.is_vocal() { "vocal" } else { "breathing" };
        println!("{}\t{}\t{}", exercise.id, kind, exercise.name);
    }
    Ok(ExitCode::from(0))
}

struct SimulateOptions {
    tempo: Option<u32>,
    tolerance: Option<f32>,
    singer: StubSinger,
    noise: f32,
    seed: u64,
    print_events: bool,
    output: Option<PathBuf>,
}

async fn run_simulate(
    config: AppConfig,
    exercise_id: &str,
    options: SimulateOptions,
) -> Result<ExitCode> {
    let exercise = find_exercise(exercise_id)?;

    let mut backend = StubBackend::new(options.singer)
        .with_sample_rate(config.estimator.sample_rate)
        .with_buffer_size(config.audio.buffer_size)
        .with_interval(Duration::from_millis(config.audio.stub_interval_ms));
    if options.noise > 0.0 {
        backend = backend.with_noise(options.noise, options.seed);
    }
    let engine = EngineHandle::with_backend(config, Arc::new(backend));

    let mut settings = ExerciseSettings::for_exercise(exercise);
    if let Some(tempo) = options.tempo {
        settings = settings.with_tempo(tempo);
    }
    if let Some(tolerance) = options.tolerance {
        settings = settings.with_tolerance(tolerance);
    }

    let mut events = engine.subscribe_vocal();
    engine
        .start_vocal_exercise(exercise, settings)
        .with_context(|| format!("starting {}", exercise.id))?;

    let report = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => engine.stop_exercise().await,
        _ = forward_vocal_events(&mut events, options.print_events) => engine.wait_for_exercise().await,
    };

    match report.with_context(|| format!("running {}", exercise.id))? {
        RunReport::Vocal(SessionOutcome::Completed(results)) => {
            emit_results(&results, options.output.as_deref())?;
            Ok(ExitCode::from(0))
        }
        RunReport::Vocal(SessionOutcome::Interrupted) => {
            eprintln!("Interrupted; no results were produced");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        other => bail!("unexpected run report {:?}", other),
    }
}

/// Consume vocal events until the run reports completion or an error
async fn forward_vocal_events(events: &mut broadcast::Receiver<VocalEvent>, print: bool) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if print {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(err) => log::warn!("[vocal_cli] Unserializable event: {}", err),
                    }
                }
                if matches!(event, VocalEvent::Completed(_) | VocalEvent::Error { .. }) {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("[vocal_cli] Skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

fn emit_results(results: &ExerciseResults, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    if let Some(path) = output {
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

async fn run_breathe(config: AppConfig, exercise: &Exercise) -> Result<ExitCode> {
    let backend = default_backend(&config);
    let engine = EngineHandle::with_backend(config, backend);
    let mut events = engine.subscribe_breathing();
    engine
        .start_breathing_exercise(exercise)
        .with_context(|| format!("starting {}", exercise.id))?;

    let report = tokio::select! {
        biased;
        _ = tokio::signal::ctrl_c() => engine.stop_exercise().await,
        _ = forward_breathing_events(&mut events) => engine.wait_for_exercise().await,
    };

    match report.with_context(|| format!("running {}", exercise.id))? {
        RunReport::Breathing(SessionOutcome::Completed(summary)) => {
            print_summary(&summary)?;
            Ok(ExitCode::from(0))
        }
        RunReport::Breathing(SessionOutcome::Interrupted) => {
            eprintln!("Interrupted");
            Ok(ExitCode::from(EXIT_INTERRUPTED))
        }
        other => bail!("unexpected run report {:?}", other),
    }
}

async fn forward_breathing_events(events: &mut broadcast::Receiver<BreathingEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
                if event == BreathingEvent::Completed {
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Step the phase machine without waiting and print every event
fn run_breathe_dry(exercise: &Exercise) -> Result<ExitCode> {
    let mut machine = BreathingPhaseMachine::from_exercise(exercise)
        .with_context(|| format!("preparing {}", exercise.id))?;

    let mut events = machine.start();
    while !machine.is_complete() {
        events.extend(machine.tick());
    }
    for event in &events {
        println!("{}", serde_json::to_string(event)?);
    }

    print_summary(&BreathingSummary {
        exercise_id: exercise.id.clone(),
        rounds_completed: machine.rounds_completed(),
        duration_secs: machine.elapsed_secs(),
    })?;
    Ok(ExitCode::from(0))
}

fn print_summary(summary: &BreathingSummary) -> Result<()> {
    println!("{}", serde_json::to_string(summary)?);
    Ok(())
}
