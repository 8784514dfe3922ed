//! blockbeat: check, schedule, play, and format block-structured music programs.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use blockbeat::config::EngineConfig;
use blockbeat::dsl::Dsl;
use blockbeat::engine::{Engine, RunReport, RunState};
use blockbeat::event::{play_timeline, playback, PlaybackOutcome, ScheduledEvent, Timeline};

/// Block-structured music DSL toolkit
#[derive(Parser, Debug)]
#[command(name = "blockbeat")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Parse, validate, and schedule block-structured music programs", long_about = None)]
struct Args {
    /// Config file (defaults to ~/.blockbeat/config.yaml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the starting tempo
    #[arg(long, global = true, value_name = "BPM")]
    bpm: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report parse warnings and validation errors
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the computed event schedule
    Schedule {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Play the schedule on the console in real time (Ctrl-C stops)
    Play {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the program in canonical form
    Fmt {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Rewrite the file in place
        #[arg(short, long)]
        write: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Yaml,
}

/// YAML view of a finished run.
#[derive(Serialize)]
struct ScheduleDump<'a> {
    state: RunState,
    duration: f64,
    events: &'a [ScheduledEvent],
    warnings: &'a [String],
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load().unwrap_or_default(),
    };
    if let Some(bpm) = args.bpm {
        config.default_bpm = bpm;
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    match args.command {
        Commands::Check { file } => check(&file),
        Commands::Schedule { file, format } => schedule(&file, config, format),
        Commands::Play { file } => play(&file, config),
        Commands::Fmt { file, write } => format(&file, write),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn check(path: &Path) -> Result<()> {
    let source = read_source(path)?;
    let program = Dsl::parse(&source);
    let report = blockbeat::dsl::validator::validate_program(&program);

    for warning in &program.warnings {
        println!("warning: {warning}");
    }
    for error in &report.errors {
        println!("error: {error}");
    }

    if report.valid {
        println!(
            "{}: ok ({} block(s), {} custom sample(s))",
            path.display(),
            program.blocks.len(),
            program.custom_samples.len()
        );
        Ok(())
    } else {
        eprintln!("{}: {} error(s)", path.display(), report.errors.len());
        std::process::exit(1);
    }
}

/// Parse and execute `path` against a fresh recording backend.
fn run_to_timeline(path: &Path, config: EngineConfig) -> Result<(RunReport, Timeline)> {
    let source = read_source(path)?;
    let mut engine = Engine::with_backend(config, Timeline::new());
    engine.parse(&source);
    let report = engine.execute()?;
    let timeline = engine
        .take_backend()
        .context("recording backend disappeared during the run")?;
    Ok((report, timeline))
}

fn schedule(path: &Path, config: EngineConfig, format: OutputFormat) -> Result<()> {
    let (report, timeline) = run_to_timeline(path, config)?;

    match format {
        OutputFormat::Table => {
            println!("{:>10}  {:>8}  event", "start", "length");
            for event in timeline.events() {
                println!("{event}");
            }
            for (block, effect) in timeline.effects() {
                println!("effect {effect} on [{block}]");
            }
            println!(
                "{} event(s), {:.3}s, {} warning(s)",
                report.dispatched,
                report.duration,
                report.warnings.len()
            );
        }
        OutputFormat::Yaml => {
            let dump = ScheduleDump {
                state: report.state,
                duration: report.duration,
                events: timeline.events(),
                warnings: &report.warnings,
            };
            print!("{}", serde_yaml::to_string(&dump)?);
        }
    }
    Ok(())
}

fn play(path: &Path, config: EngineConfig) -> Result<()> {
    let (report, mut timeline) = run_to_timeline(path, config)?;
    println!(
        "playing {} event(s) over {:.1}s (Ctrl-C to stop)...",
        report.dispatched,
        timeline.span()
    );

    let stop = blockbeat::engine::StopHandle::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop()).context("failed to install Ctrl-C handler")?;

    let mut stdout = io::stdout();
    match play_timeline(&mut timeline, &stop, &mut stdout, playback::DEFAULT_TICK)? {
        PlaybackOutcome::Finished => println!("done."),
        PlaybackOutcome::Stopped => println!("stopped."),
    }
    Ok(())
}

fn format(path: &Path, write: bool) -> Result<()> {
    let source = read_source(path)?;
    let formatted = Dsl::format(&Dsl::parse(&source));
    if write {
        fs::write(path, formatted).with_context(|| format!("failed to write {}", path.display()))?;
    } else {
        print!("{formatted}");
    }
    Ok(())
}
