use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use demo_machine::capture::FailureReport;
use demo_machine::pipeline::{self, NarrationArgs, RunError, RunOptions};
use demo_machine::playback::chrome::ChromeConfig;
use demo_machine::spec::{SyncMode, load_spec, narrated_steps, total_steps};

#[derive(Parser)]
#[command(name = "demo-machine", version, about = "Narrated product demos from a declarative spec")]
struct Cli {
    /// Debug-level logging (RUST_LOG still wins).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a spec in Chrome and write events, timeline and narration.
    Run(RunArgs),
    /// Load and validate a spec without running it.
    Validate { spec: PathBuf },
    /// Rebuild a timeline from a saved event log.
    Timeline {
        events: PathBuf,
        #[arg(long)]
        spec: PathBuf,
        /// Defaults to timeline.json next to the event log.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
struct RunArgs {
    spec: PathBuf,

    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Path to the Chrome executable.
    #[arg(long)]
    chrome: Option<PathBuf>,

    /// DevTools websocket URL of a Chrome to attach to.
    #[arg(long)]
    attach: Option<String>,

    /// Synthesize and mix narration audio.
    #[arg(long)]
    narration: bool,

    #[arg(long)]
    tts_provider: Option<String>,

    #[arg(long)]
    tts_voice: Option<String>,

    /// manual | auto-sync | warn-only
    #[arg(long)]
    narration_sync: Option<SyncMode>,

    /// Extra lead-in added to every narration clip, in ms.
    #[arg(long, allow_negative_numbers = true)]
    narration_buffer: Option<i64>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Validate { spec } => {
            let demo = load_spec(&spec)?;
            let narrated = narrated_steps(&demo.chapters).count();
            println!(
                "{}: \"{}\" is valid ({} chapters, {} steps, {} narrated)",
                spec.display(),
                demo.meta.title,
                demo.chapters.len(),
                total_steps(&demo.chapters),
                narrated
            );
            Ok(())
        }
        Command::Timeline {
            events,
            spec,
            output,
        } => {
            let output = output.unwrap_or_else(|| {
                events
                    .parent()
                    .map(|dir| dir.join("timeline.json"))
                    .unwrap_or_else(|| PathBuf::from("timeline.json"))
            });
            pipeline::rebuild_timeline(&events, &spec, &output)?;
            Ok(())
        }
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let options = RunOptions {
        spec_path: args.spec,
        output_dir: args.output,
        chrome: ChromeConfig {
            headed: args.headed,
            chrome_path: args.chrome,
            attach: args.attach,
            ..Default::default()
        },
        narration: NarrationArgs {
            narration: args.narration,
            tts_provider: args.tts_provider,
            tts_voice: args.tts_voice,
            sync: args.narration_sync,
            buffer_ms: args.narration_buffer,
        },
    };

    match pipeline::run(options).await {
        Ok(outcome) => {
            info!(
                events = outcome.playback.events.len(),
                duration_ms = outcome.timeline.total_duration_ms,
                narration = ?outcome.narration.as_ref().map(|n| n.audio_path.display().to_string()),
                "done"
            );
            Ok(())
        }
        Err(RunError::StepFailed { error, artifacts }) => {
            error!(
                report = ?artifacts.report,
                screenshot = ?artifacts.screenshot,
                dom = ?artifacts.dom,
                "{error}"
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&FailureReport::from(error.as_ref()))?
            );
            std::process::exit(1);
        }
        Err(RunError::Other(e)) => Err(e),
    }
}
