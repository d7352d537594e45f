//! DoorSense Agent CLI
//!
//! Door open/close detection from a 6-axis IMU.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use doorsense_agent::{
    config::{Config, PublishConfig},
    core::Label,
    dataset::{build_feature_set, write_feature_csv, TrainingWriter},
    labeler::{FixedLabeler, PromptLabeler},
    pipeline::{Pipeline, SegmentClassifier},
    publish::{build_publisher, AsyncPublisher, EventPublisher, PublisherOptions},
    runner::{Pacing, RunSummary, Runner, RunnerError, RunnerOptions},
    source::{Channel, SampleSource, SourceSpec},
    stats::{create_shared_stats_with_persistence, SharedPipelineStats, StatsSnapshot},
    InferenceContext, VERSION,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "doorsense")]
#[command(version = VERSION)]
#[command(about = "Door open/close detection from a 6-axis IMU", long_about = None)]
struct Cli {
    /// Sample source: `sim` or `replay:<path.csv>`
    #[arg(long, global = true, default_value = "sim")]
    source: String,

    /// Seed for the simulated source
    #[arg(long, global = true, default_value_t = 7)]
    seed: u64,

    /// Do not sleep between ticks; timestamps advance by one period per reading
    #[arg(long, global = true)]
    no_pacing: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and classify door movements, publishing each result
    Run,

    /// Record labeled movement segments for training
    Collect {
        /// Training CSV to append to
        #[arg(long, short)]
        output: PathBuf,

        /// Label every segment with this value instead of prompting
        #[arg(long, value_enum)]
        label: Option<FixedLabel>,
    },

    /// Rebuild feature vectors from a training CSV
    Features {
        /// Training CSV written by `collect`
        input: PathBuf,

        /// Feature CSV to write
        #[arg(long, short)]
        output: PathBuf,

        /// Fixed segment length before feature extraction
        #[arg(long)]
        target_size: Option<usize>,
    },

    /// Run one calibration burst and print the thresholds
    Calibrate,

    /// Pause detection in a running agent
    Pause,

    /// Resume detection in a running agent
    Resume,

    /// Ask a running agent to recalibrate
    Recalibrate,

    /// Show current status and statistics
    Status,

    /// Show configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum FixedLabel {
    Open,
    Closed,
}

impl From<FixedLabel> for Label {
    fn from(label: FixedLabel) -> Self {
        match label {
            FixedLabel::Open => Label::Open,
            FixedLabel::Closed => Label::Closed,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(Config::config_path);

    match &cli.command {
        Commands::Run => cmd_run(&cli, &config_path),
        Commands::Collect { output, label } => cmd_collect(&cli, &config_path, output, *label),
        Commands::Features {
            input,
            output,
            target_size,
        } => cmd_features(&config_path, input, output, *target_size),
        Commands::Calibrate => cmd_calibrate(&cli, &config_path),
        Commands::Pause => cmd_set_paused(&config_path, true),
        Commands::Resume => cmd_set_paused(&config_path, false),
        Commands::Recalibrate => cmd_recalibrate(&config_path),
        Commands::Status => cmd_status(&config_path),
        Commands::Config => cmd_config(&config_path),
    }
}

fn load_config(path: &Path) -> Result<Config> {
    let config =
        Config::load_from(path).with_context(|| format!("loading config from {path:?}"))?;
    if let Err(e) = config.ensure_directories() {
        tracing::warn!("Could not create data directory: {e}");
    }
    Ok(config)
}

/// Build a runner over the selected source, stopping on Ctrl+C.
fn build_runner(
    cli: &Cli,
    config: &Config,
    config_path: &Path,
    stats: SharedPipelineStats,
) -> Result<Runner<Box<dyn SampleSource + Send>>> {
    let spec = SourceSpec::parse(&cli.source)?;
    let source = spec
        .open(cli.seed)
        .with_context(|| format!("opening source '{}'", cli.source))?;

    let mut options =
        RunnerOptions::from_config(config).with_control_path(config_path.to_path_buf());
    if cli.no_pacing {
        options = options.with_pacing(Pacing::Virtual {
            start: chrono::Utc::now(),
        });
    }

    let runner = Runner::new(source, Pipeline::from_config(config), stats, options);
    ctrlc_handler(runner.running_flag())?;
    Ok(runner)
}

fn cmd_run(cli: &Cli, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    println!("DoorSense Agent v{VERSION}");
    println!();

    let inference = InferenceContext::load(&config.models).context("loading classifier")?;
    let timezone: chrono_tz::Tz = config
        .publish
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid timezone '{}': {e}", config.publish.timezone))?;
    let mut classifier =
        SegmentClassifier::new(inference, config.resampling.target_size, timezone);

    let stats = create_shared_stats_with_persistence(config.stats_path());
    let mut runner = build_runner(cli, &config, config_path, stats.clone())?;
    let sink = open_sink(&config.publish)?;
    let mut publisher =
        AsyncPublisher::spawn(sink, PublisherOptions::from(&config.publish), stats.clone())
            .context("starting publish worker")?;

    println!("  Source: {}", cli.source);
    println!("  Topic: {}", config.publish.topic);
    println!("  Client ID: {}", config.publish.client_id);
    println!("  Tick period: {} ms", config.sampling.tick_period.as_millis());
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let result = runner.predict(&mut classifier, &publisher);
    publisher.shutdown();
    finish(result, &stats)
}

fn open_sink(publish: &PublishConfig) -> Result<Box<dyn EventPublisher>> {
    #[cfg(feature = "gateway")]
    if let doorsense_agent::config::SinkConfig::Http { url, token } = &publish.sink {
        use doorsense_agent::publish::http::{BlockingHttpPublisher, HttpSinkConfig};

        let client = BlockingHttpPublisher::new(HttpSinkConfig::new(
            url.clone(),
            token.clone(),
            publish.client_id.clone(),
        ))?;
        match client.health() {
            Ok(true) => println!("  Gateway connection: OK"),
            Ok(false) => eprintln!("Warning: Gateway health check failed"),
            Err(e) => eprintln!("Warning: Could not connect to gateway: {e}"),
        }
        return Ok(Box::new(client));
    }
    Ok(build_publisher(publish)?)
}

fn finish(
    result: Result<RunSummary, RunnerError>,
    stats: &SharedPipelineStats,
) -> Result<()> {
    if let Err(e) = stats.save() {
        eprintln!("Warning: Could not save stats: {e}");
    }
    let summary = result?;

    println!();
    println!(
        "Stopped after {} ticks ({:?}), {} segment(s)",
        summary.ticks, summary.stop, summary.segments
    );
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_collect(
    cli: &Cli,
    config_path: &Path,
    output: &Path,
    label: Option<FixedLabel>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mut writer =
        TrainingWriter::append(output).with_context(|| format!("opening {output:?}"))?;
    let stats = create_shared_stats_with_persistence(config.stats_path());
    let mut runner = build_runner(cli, &config, config_path, stats.clone())?;

    println!("Collecting training data into {output:?}");
    println!("Press Ctrl+C to stop");
    println!();

    let result = match label {
        Some(fixed) => runner.collect(&mut FixedLabeler(fixed.into()), &mut writer),
        None => runner.collect(&mut PromptLabeler::stdio(), &mut writer),
    };

    println!("Wrote {} row(s)", writer.rows_written());
    finish(result, &stats)
}

fn cmd_features(
    config_path: &Path,
    input: &Path,
    output: &Path,
    target_size: Option<usize>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let target = target_size.unwrap_or(config.resampling.target_size);
    if target == 0 {
        bail!("--target-size must be positive");
    }

    let features = build_feature_set(input, target)
        .with_context(|| format!("building features from {input:?}"))?;
    write_feature_csv(output, &features).with_context(|| format!("writing {output:?}"))?;

    let open = features.iter().filter(|f| f.label == Label::Open).count();
    println!(
        "Wrote {} feature vector(s) to {:?} ({} open, {} closed)",
        features.len(),
        output,
        open,
        features.len() - open
    );
    Ok(())
}

fn cmd_calibrate(cli: &Cli, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let stats = create_shared_stats_with_persistence(config.stats_path());
    let mut runner = build_runner(cli, &config, config_path, stats)?;
    let calibration = runner.calibrate()?;

    println!("Calibration ({} samples)", calibration.sample_count);
    println!();
    println!("{:<8}{:>12}{:>12}{:>12}", "channel", "mean", "std", "threshold");
    for channel in Channel::ALL {
        let i = channel.index();
        println!(
            "{:<8}{:>12.5}{:>12.5}{:>12.5}",
            channel.name(),
            calibration.mean[i],
            calibration.std[i],
            calibration.threshold.get(channel)
        );
    }
    Ok(())
}

fn cmd_set_paused(config_path: &Path, paused: bool) -> Result<()> {
    let mut config = Config::load_from(config_path)?;
    config.paused = paused;
    config.save_to(config_path).context("saving config")?;
    if paused {
        println!("Detection paused. Use 'doorsense resume' to continue.");
    } else {
        println!("Detection resumed.");
    }
    Ok(())
}

fn cmd_recalibrate(config_path: &Path) -> Result<()> {
    let mut config = Config::load_from(config_path)?;
    config.calibration_epoch = config.calibration_epoch.wrapping_add(1);
    config.save_to(config_path).context("saving config")?;
    println!(
        "Recalibration requested (epoch {}). A running agent recalibrates once no segment is open.",
        config.calibration_epoch
    );
    Ok(())
}

fn cmd_status(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)?;

    println!("DoorSense Agent Status");
    println!("======================");
    println!();
    println!("Configuration:");
    println!("  Paused: {}", config.paused);
    println!("  Calibration epoch: {}", config.calibration_epoch);
    println!("  Tick period: {} ms", config.sampling.tick_period.as_millis());
    println!("  Sink: {:?}", config.publish.sink);
    for (name, path) in [
        ("Scaler", &config.models.scaler),
        ("Reducer", &config.models.reducer),
        ("Model", &config.models.model),
    ] {
        let state = if path.exists() { "found" } else { "missing" };
        println!("  {name}: {path:?} ({state})");
    }
    println!();

    match StatsSnapshot::read_persisted(&config.stats_path()) {
        Ok(Some((snapshot, updated))) => {
            println!("Cumulative statistics (updated {updated}):");
            println!("{}", snapshot.summary());
        }
        Ok(None) => println!("No previous session data found."),
        Err(e) => eprintln!("Warning: Could not read stats: {e}"),
    }
    Ok(())
}

fn cmd_config(config_path: &Path) -> Result<()> {
    let config = Config::load_from(config_path)?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {config_path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")
}
