//! TalkCast CLI - turn speaker-tagged dialogue into one audio file.
//!
//! ```text
//! talkcast generate dialogue.txt -o episode.mp3 --voice SARAH=en-us+f2
//! talkcast preview --voice en-us+f4 "Does this voice suit Sarah?"
//! echo "[A] Hi [B] Hello" | talkcast speakers -
//! ```

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use talkcast_core::{
    CastConfig, CastWorker, Dialogue, DialoguePipeline, EngineKind, ExportFormat, GenerateRequest,
    GenerationReport, PipelineEvent, SynthesisMode, VoiceSelector, WorkerEvent,
};

#[derive(Parser)]
#[command(name = "talkcast")]
#[command(about = "Turn speaker-tagged dialogue into a narrated audio file")]
#[command(version)]
struct Cli {
    /// Config file (TOML, YAML or JSON); defaults to $TALKCAST_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); overrides RUST_LOG
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Speech engine (auto, tone, espeak)
    #[arg(long, global = true)]
    engine: Option<EngineKind>,

    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesize a dialogue into one audio file
    Generate {
        /// Dialogue file, or "-" for stdin
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Output file name or path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fixed voice for a speaker, as SPEAKER=VOICE (repeatable)
        #[arg(long = "voice", value_parser = parse_override)]
        voices: Vec<(String, VoiceSelector)>,

        /// Silence between turns in milliseconds
        #[arg(long)]
        pause_ms: Option<u32>,

        /// Output format (mp3, wav)
        #[arg(long)]
        format: Option<ExportFormat>,

        /// Synthesize up to N turns at once
        #[arg(long)]
        concurrent: Option<usize>,
    },
    /// Speak one line with a single voice to audition it
    Preview {
        /// Voice to use, as listed by `talkcast voices`
        #[arg(long)]
        voice: VoiceSelector,

        /// Text to speak; markers are not parsed
        text: String,

        /// Output file name or path
        #[arg(short, long, default_value = "preview")]
        output: PathBuf,
    },
    /// List the speakers in a dialogue
    Speakers {
        /// Dialogue file, or "-" for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// Show the parsed turns of a dialogue
    Parse {
        /// Dialogue file, or "-" for stdin
        #[arg(default_value = "-")]
        input: PathBuf,
    },
    /// List the voices of the configured engine
    Voices,
}

fn parse_override(value: &str) -> Result<(String, VoiceSelector), String> {
    match value.split_once('=') {
        Some((speaker, voice)) if !speaker.trim().is_empty() && !voice.trim().is_empty() => {
            Ok((speaker.trim().to_string(), VoiceSelector::new(voice.trim())))
        }
        _ => Err(format!("expected SPEAKER=VOICE, got '{}'", value)),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CastConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(kind) = cli.engine {
        config.engine.kind = kind;
    }

    init_logging(&cli, &config)?;

    match &cli.command {
        Commands::Generate {
            input,
            output,
            voices,
            pause_ms,
            format,
            concurrent,
        } => {
            if let Some(max_tasks) = concurrent {
                config.engine.mode = SynthesisMode::Concurrent {
                    max_tasks: (*max_tasks).max(1),
                };
            }

            let mut request = GenerateRequest::new(read_input(input)?);
            request.output = output.clone();
            request.pause_ms = *pause_ms;
            request.format = *format;
            request.overrides = voices.iter().cloned().collect();

            let report = run_generate(&config, request)?;
            print_report(&report, cli.json)?;
        }
        Commands::Preview { voice, text, output } => {
            let pipeline = DialoguePipeline::from_config(&config)?;
            let report = pipeline.preview(text, voice, output)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("Output:   {}", report.output_file.display());
                println!("Voice:    {}", report.voice);
                println!("Duration: {:.1}s ({} bytes)", report.duration_secs, report.file_size_bytes);
            }
        }
        Commands::Speakers { input } => {
            let dialogue = Dialogue::parse(&read_input(input)?);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&dialogue.speaker_stats())?);
            } else {
                for stats in dialogue.speaker_stats() {
                    println!(
                        "{}\t{} turns\t{} chars",
                        stats.name, stats.turn_count, stats.total_characters
                    );
                }
                println!(
                    "\n{} speakers, {} turns, ~{:.1}s at {} wpm",
                    dialogue.speakers.len(),
                    dialogue.turn_count(),
                    dialogue.estimated_duration_secs(config.engine.rate),
                    config.engine.rate
                );
            }
        }
        Commands::Parse { input } => {
            let dialogue = Dialogue::parse(&read_input(input)?);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&dialogue)?);
            } else {
                for (index, turn) in dialogue.turns.iter().enumerate() {
                    println!("{:>3} [{}] {}", index, turn.speaker, turn.text);
                }
            }
        }
        Commands::Voices => {
            let pipeline = DialoguePipeline::from_config(&config)?;
            let catalog = pipeline.voices();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&catalog)?);
            } else {
                println!("Engine: {}", pipeline.engine_name());
                for (line, voice) in catalog.describe().iter().zip(catalog.voices()) {
                    match voice.gender {
                        Some(gender) => println!("  {} [{}]", line, gender),
                        None => println!("  {}", line),
                    }
                }
            }
        }
    }

    Ok(())
}

fn init_logging(cli: &Cli, config: &CastConfig) -> anyhow::Result<()> {
    let mut builder = match &cli.log_level {
        Some(level) => {
            let filter: log::LevelFilter = level
                .parse()
                .with_context(|| format!("Invalid log level '{}'", level))?;
            let mut builder = env_logger::Builder::new();
            builder.filter_level(filter);
            builder
        }
        None => {
            let mut builder = env_logger::Builder::new();
            builder.filter_level(config.log_level_filter());
            if let Ok(filters) = std::env::var("RUST_LOG") {
                builder.parse_filters(&filters);
            }
            builder
        }
    };

    builder.format_timestamp_millis().init();
    Ok(())
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read dialogue from stdin")?;
        Ok(text)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))
    }
}

fn run_generate(config: &CastConfig, request: GenerateRequest) -> anyhow::Result<GenerationReport> {
    let pipeline = Arc::new(DialoguePipeline::from_config(config)?);
    let mut worker = CastWorker::spawn(pipeline);

    let job = worker.generate(request).context("Worker is not running")?;
    if let Some(cancel) = worker.cancel_flag(job) {
        ctrlc::set_handler(move || {
            eprintln!("\nCancelling...");
            cancel.cancel();
        })
        .context("Failed to install Ctrl-C handler")?;
    }

    loop {
        let Some(event) = worker.next_event(Duration::from_millis(200)) else {
            if !worker.is_running() {
                bail!("Worker stopped unexpectedly");
            }
            continue;
        };

        match event {
            WorkerEvent::Progress { event, .. } => print_progress(&event),
            WorkerEvent::Finished { job_id, report } if job_id == job => return Ok(report),
            WorkerEvent::Failed { job_id, message } if job_id == job => bail!(message),
            WorkerEvent::Cancelled { job_id } if job_id == job => bail!("Generation cancelled"),
            other => log::debug!("Ignoring worker event {:?}", other),
        }
    }
}

fn print_progress(event: &PipelineEvent) {
    match event {
        PipelineEvent::Parsed { turn_count, speakers } => {
            eprintln!("Parsed {} turns, speakers: {}", turn_count, speakers.join(", "));
        }
        PipelineEvent::TurnCompleted {
            index,
            total,
            speaker,
            failed,
        } => {
            let status = if *failed { "failed, using silence" } else { "ok" };
            eprintln!("  [{}/{}] {}: {}", index + 1, total, speaker, status);
        }
        PipelineEvent::Mixed { duration_secs, .. } => eprintln!("Mixed {:.1}s of audio", duration_secs),
        PipelineEvent::Exported { output_file, .. } => eprintln!("Wrote {}", output_file.display()),
    }
}

fn print_report(report: &GenerationReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Output:   {}", report.output_file.display());
    println!("Speakers: {}", report.speakers.join(", "));
    for assignment in &report.voices {
        println!("  {} -> {}", assignment.speaker, assignment.voice);
    }
    println!("Duration: {:.1}s ({} bytes)", report.duration_secs, report.file_size_bytes);
    println!("Result:   {}", report.summary());

    for failure in &report.failures {
        eprintln!("warning: {}", failure);
    }
    Ok(())
}
