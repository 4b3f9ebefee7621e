// Metrologist CLI binary

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use metrologist::config::generate;
use metrologist::stats::{MetricStatistics, Statistics};
use metrologist::tools;
use metrologist::{
    Configuration, EngineCommand, FramerateMode, MeasureOptions, Metrologist, Progress, Reallocation,
    StatisticsReport, StatusKind, Topic,
};

#[derive(Parser)]
#[command(name = "metrologist")]
#[command(about = "Metrologist - video quality measurement through an external scoring engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scoring engine over a job
    Measure {
        /// Job file
        job: PathBuf,
        /// Engine executable or script (defaults to the resolved engine)
        #[arg(short, long)]
        engine: Option<PathBuf>,
        /// Discard filled scores when a sequence has to grow
        #[arg(long)]
        reset: bool,
    },

    /// Show statistics of a stored job
    Stats {
        /// Job file
        job: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show frame counts and measured framerate
    Progress {
        /// Job file
        job: PathBuf,
        /// Average per-scene framerates instead of pooling all arrivals
        #[arg(long)]
        per_scene: bool,
    },

    /// Check a job file
    Validate {
        /// Job file
        job: PathBuf,
    },

    /// Write a random job
    Generate {
        /// Seed for a reproducible job
        #[arg(long)]
        seed: Option<u64>,
        /// Output path (prints to stdout when omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure { job, engine, reset } => cmd_measure(job, engine, reset),
        Commands::Stats { job, json } => cmd_stats(job, json),
        Commands::Progress { job, per_scene } => cmd_progress(job, per_scene),
        Commands::Validate { job } => cmd_validate(job),
        Commands::Generate { seed, out } => cmd_generate(seed, out),
    }
}

fn load_job(path: &Path) -> Result<Configuration> {
    let config = Configuration::load(path)?;
    config
        .validate()
        .with_context(|| format!("Job file {} is not valid", path.display()))?;
    Ok(config)
}

fn cmd_measure(job: PathBuf, engine: Option<PathBuf>, reset: bool) -> Result<()> {
    let config = load_job(&job)?;
    let total = config.total_frames();

    let options = MeasureOptions {
        reallocation: if reset { Reallocation::Reset } else { Reallocation::Preserve },
    };
    let mut metrologist = Metrologist::new(config).with_options(options);
    if let Some(path) = engine {
        metrologist = metrologist.with_engine(EngineCommand::for_path(path));
    }

    let mut scored = 0usize;
    metrologist.on(Topic::Kind(StatusKind::Scoring), move |status| {
        scored += 1;
        if let Some(arrival) = status.arrival() {
            log::debug!(
                "[{}/{}] scene {} {} {} frame {}",
                scored,
                total,
                arrival.scene,
                arrival.distorted_id,
                arrival.metric,
                arrival.frame
            );
        }
    });

    println!("Measuring {} with {}", job.display(), metrologist.engine());
    metrologist.measure()?;

    println!();
    println!("Job file: {}", metrologist.config_path().display());
    print_progress(metrologist.config(), metrologist.last_status().map(|s| s.kind()), FramerateMode::Pooled);

    if !metrologist.violations().is_empty() {
        println!();
        println!("Engine reported {} score(s) outside the job:", metrologist.violations().len());
        for violation in metrologist.violations() {
            println!("  {}", violation);
        }
    }

    println!();
    print_statistics(&metrologist.statistics());
    Ok(())
}

fn cmd_stats(job: PathBuf, json: bool) -> Result<()> {
    let config = Configuration::load(&job)?;
    let report = metrologist::stats::calculate(&config);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_statistics(&report);
    }
    Ok(())
}

fn cmd_progress(job: PathBuf, per_scene: bool) -> Result<()> {
    let config = Configuration::load(&job)?;
    let mode = if per_scene { FramerateMode::PerSceneAverage } else { FramerateMode::Pooled };
    print_progress(&config, None, mode);
    Ok(())
}

fn cmd_validate(job: PathBuf) -> Result<()> {
    let config = load_job(&job)?;

    println!("{} is valid", job.display());
    println!("  Reference:   {}", config.reference.path.display());
    println!("  Distorted:   {}", config.distorted.len());
    for (id, input) in &config.distorted {
        println!("    {:<16} {}", id, input.path.display());
    }
    let metrics: Vec<&str> = config.metrics.keys().map(|m| m.as_str()).collect();
    println!("  Metrics:     {}", metrics.join(", "));
    println!("  Scenes:      {}", config.scenes.len());
    println!("  Frames:      {}", config.total_frames());
    println!("  Job file:    {}", config.config_path().display());
    println!(
        "  Engine:      {} ({})",
        EngineCommand::resolve(),
        if tools::is_engine_available() { "found" } else { "not found" }
    );
    Ok(())
}

fn cmd_generate(seed: Option<u64>, out: Option<PathBuf>) -> Result<()> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let config = generate::random_configuration(&mut rng);

    match out {
        Some(path) => {
            config.save(&path)?;
            println!(
                "Wrote job with {} scene(s), {} variant(s), {} metric(s) to {}",
                config.scenes.len(),
                config.distorted.len(),
                config.metrics.len(),
                path.display()
            );
        }
        None => println!("{}", config.to_json_pretty()?),
    }
    Ok(())
}

fn print_progress(config: &Configuration, status: Option<StatusKind>, mode: FramerateMode) {
    let progress = Progress::from_config(config, status.unwrap_or(StatusKind::Idle));

    if let Some(status) = status {
        println!("Status:      {}", status);
    }
    println!("Frames:      {} completed, {} remaining", progress.completed, progress.remaining);
    println!(
        "Scores:      {} / {} ({:.1}%)",
        progress.filled_slots, progress.total_slots, progress.percent
    );
    match metrologist::stats::framerate::estimate(config, None, mode) {
        Some(fps) => println!("Framerate:   {:.2} fps", fps),
        None => println!("Framerate:   -"),
    }
}

fn print_statistics(report: &StatisticsReport) {
    if report.is_empty() {
        println!("No distorted inputs.");
        return;
    }

    println!(
        "{:<16}  {:<12}  {:>6}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}  {:>10}",
        "Distorted", "Metric", "Frames", "Mean", "Std", "Min", "Median", "P5", "P1"
    );
    println!("{}", "-".repeat(106));

    for (id, metrics) in report {
        for (metric, stats) in metrics {
            println!("{:<16}  {:<12}  {}", id, metric.as_str(), format_row(stats.overall.as_ref()));
            if stats.scenes.len() > 1 {
                print_scene_rows(stats);
            }
        }
    }
}

fn print_scene_rows(stats: &MetricStatistics) {
    for (index, scene) in stats.scenes.iter().enumerate() {
        println!("{:<16}  {:<12}  {}", "", format!("  scene {}", index), format_row(scene.as_ref()));
    }
}

fn format_row(stats: Option<&Statistics>) -> String {
    match stats {
        Some(s) => format!(
            "{:>6}  {:>10.4}  {:>10.4}  {:>10.4}  {:>10.4}  {:>10.4}  {:>10.4}",
            s.count, s.average, s.standard_deviation, s.minimum, s.median, s.percentile_5, s.percentile_1
        ),
        None => format!("{:>6}  {:>10}", 0, "-"),
    }
}
