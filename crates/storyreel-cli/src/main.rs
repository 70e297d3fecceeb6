//! StoryReel command line interface.
//!
//! Thin driver over the engine: loads configuration, reads a story record
//! and prints what was rendered.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use storyreel_lib::core::narration::DurationBudget;
use storyreel_lib::core::pipeline::{list_background_videos, GenerateRequest, Orchestrator};
use storyreel_lib::core::settings::{PipelineConfig, CONFIG_FILE};
use storyreel_lib::core::tts::Voice;
use storyreel_lib::Story;

static LOG_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "storyreel", version, about = "Narrated vertical videos with synced subtitles")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// Also write daily-rotated logs into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a story into one or more videos
    Generate(GenerateArgs),

    /// Estimate narration length and part count without rendering
    Estimate(StoryArgs),

    /// List available background videos
    Backgrounds,

    /// Write the default configuration file
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct StoryArgs {
    /// JSON story record with `title` and `full_body`
    #[arg(long, conflicts_with_all = ["title", "body_file"])]
    story: Option<PathBuf>,

    /// Story title (used with --body-file)
    #[arg(long, requires = "body_file")]
    title: Option<String>,

    /// Plain text or markdown story body
    #[arg(long)]
    body_file: Option<PathBuf>,

    /// Duration mode: 1 = under 2 min, 2 = under 3 min, 3 = 5 min parts
    #[arg(short, long, default_value = "1")]
    mode: String,

    /// Custom budget in seconds (overrides --mode)
    #[arg(long)]
    max_seconds: Option<f64>,

    /// Split overflow into parts instead of truncating (with --max-seconds)
    #[arg(long, requires = "max_seconds")]
    split: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    story: StoryArgs,

    /// Voice key (1-5) or name (us, uk, au, in, ca)
    #[arg(long, default_value = "us", value_parser = parse_voice)]
    voice: Voice,

    /// Background file name inside the background directory, or a path
    #[arg(short, long)]
    background: PathBuf,

    /// Output file stem instead of the title slug
    #[arg(short, long)]
    output_name: Option<String>,

    /// Print the per-part report as JSON
    #[arg(long)]
    json: bool,
}

fn parse_voice(value: &str) -> std::result::Result<Voice, String> {
    value.parse::<Voice>().map_err(|e| e.to_string())
}

impl StoryArgs {
    fn load_story(&self) -> Result<Story> {
        if let Some(path) = &self.story {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read story file {}", path.display()))?;
            return serde_json::from_str(&content)
                .with_context(|| format!("Invalid story record in {}", path.display()));
        }

        let Some(body_file) = &self.body_file else {
            bail!("Provide --story <FILE> or --title with --body-file");
        };
        let body = std::fs::read_to_string(body_file)
            .with_context(|| format!("Failed to read {}", body_file.display()))?;
        Ok(Story::new(self.title.clone().unwrap_or_default(), body))
    }

    fn story_or_bail(&self) -> Result<Story> {
        let story = self.load_story()?;
        if story.narration_text().split_whitespace().next().is_none() {
            bail!("Story is empty");
        }
        Ok(story)
    }

    fn budget(&self) -> Result<DurationBudget> {
        if let Some(max_seconds) = self.max_seconds {
            if !max_seconds.is_finite() || max_seconds <= 0.0 {
                bail!("--max-seconds must be positive");
            }
            return Ok(if self.split {
                DurationBudget::split(max_seconds)
            } else {
                DurationBudget::truncate(max_seconds)
            });
        }
        DurationBudget::preset(&self.mode)
            .with_context(|| format!("Unknown duration mode '{}' (expected 1, 2 or 3)", self.mode))
    }
}

fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    use tracing_subscriber::prelude::*;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cfg!(debug_assertions));

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log dir {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(dir, "storyreel.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let _ = LOG_GUARD.set(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    PipelineConfig::load_or_default(path)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

async fn run_generate(config: PipelineConfig, args: &GenerateArgs) -> Result<()> {
    let story = args.story.load_story()?;
    let budget = args.story.budget()?;

    let mut request = GenerateRequest::new(story, args.voice, &args.background, budget);
    if let Some(name) = &args.output_name {
        request = request.with_output_name(name);
    }

    info!(voice = %args.voice, "Generating with {}", args.voice.label());
    let orchestrator = Orchestrator::from_config(config).context("Pipeline setup failed")?;
    let report = orchestrator.run(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for path in report.paths() {
            println!("{}", path.display());
        }
    }

    if report.succeeded() == 0 {
        bail!("No videos were rendered");
    }
    if report.is_partial() {
        warn!(
            "{} of {} parts rendered",
            report.succeeded(),
            report.requested()
        );
    }
    Ok(())
}

fn run_estimate(config: &PipelineConfig, args: &StoryArgs) -> Result<()> {
    let story = args.story_or_bail()?;
    let budget = args.budget()?;
    let text = story.narration_text();

    let seconds = storyreel_lib::estimate_duration(config, &text);
    let parts = storyreel_lib::core::narration::estimate_part_count(
        &text,
        budget,
        config.speaking_rate(),
    );
    println!(
        "{:.1}s ({:.1} min), {} word(s), {} part(s)",
        seconds,
        seconds / 60.0,
        text.split_whitespace().count(),
        parts
    );
    Ok(())
}

fn run_backgrounds(config: &PipelineConfig) -> Result<()> {
    let dir = &config.paths.background_dir;
    let videos = list_background_videos(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    if videos.is_empty() {
        println!("No background videos in {}", dir.display());
    }
    for (i, video) in videos.iter().enumerate() {
        let name = video
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        println!("{:>3}. {}", i + 1, name);
    }
    Ok(())
}

fn run_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    PipelineConfig::default()
        .save(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_deref())?;

    match &cli.command {
        Commands::InitConfig { force } => run_init_config(&cli.config, *force),
        Commands::Generate(args) => run_generate(load_config(&cli.config)?, args).await,
        Commands::Estimate(args) => run_estimate(&load_config(&cli.config)?, args),
        Commands::Backgrounds => run_backgrounds(&load_config(&cli.config)?),
    }
}
