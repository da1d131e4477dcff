//! Binary entrypoint for the wallpaper rotator.
//!
//! Each invocation performs one rotation and exits; schedule it with cron or a
//! systemd timer.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{ArgAction, Args, Parser, Subcommand};
use humantime::parse_rfc3339;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{error, info, warn};

use wallpaper_rotator::config::{self, Configuration};
use wallpaper_rotator::images::list_images;
use wallpaper_rotator::logging;
use wallpaper_rotator::platform::command::{CommandRunner, default_runner};
use wallpaper_rotator::platform::display::{
    DisplayServer, DryRunSetter, detect_display_server, list_outputs, setter_for,
};
use wallpaper_rotator::rotation::{MonitorOutcome, Rotation, RunReport, WallpaperSetter};

#[derive(Debug, Parser)]
#[command(
    name = "wallpaper-rotator",
    version,
    about = "Rotate desktop wallpapers by weekday, time of day and monitor"
)]
struct Cli {
    /// Path to YAML config (default: $XDG_CONFIG_HOME/wallpaperchanger/config.yaml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pick and apply a new wallpaper on every monitor (default)
    Run(RunArgs),
    /// Write a commented starter configuration
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Check the configuration and report what each directory contains
    Validate,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    /// Print the selection without changing wallpapers or saving state
    #[arg(long)]
    dry_run: bool,
    /// Number of monitors, skipping detection
    #[arg(long, value_name = "N")]
    monitors: Option<usize>,
    /// Deterministic RNG seed for random selection
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Pretend the current time is this RFC 3339 instant
    #[arg(long, value_name = "RFC3339")]
    now: Option<String>,
}

fn main() -> Result<ExitCode> {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();
    let config_path = config.unwrap_or_else(config::default_config_path);

    if let Some(Command::InitConfig { force }) = command {
        logging::init(verbose, None);
        config::write_default(&config_path, force)?;
        println!("wrote default configuration to {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    if matches!(command, None | Some(Command::Run(_))) && !config_path.exists() {
        logging::init(verbose, None);
        return first_run(&config_path);
    }

    let loaded = config::load(&config_path);
    logging::init(verbose, loaded.as_ref().ok().map(|cfg| &cfg.logging));
    let cfg = loaded
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    info!(path = %config_path.display(), "loaded configuration");

    match command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::Run(args) => run(&cfg, args),
        Command::Validate => Ok(validate(&cfg)),
        Command::InitConfig { .. } => Ok(ExitCode::SUCCESS),
    }
}

/// No configuration yet: write the starter file and explain what to do next
/// instead of rotating.
fn first_run(path: &Path) -> Result<ExitCode> {
    if config::create_if_missing(path)? {
        info!(path = %path.display(), "created starter configuration");
    }
    println!("created a starter configuration at {}", path.display());
    println!("next steps:");
    println!("  1. edit the directories in it to point at your wallpaper folders");
    println!("  2. check it with `wallpaper-rotator validate`");
    println!("  3. run `wallpaper-rotator` again to change the wallpaper");
    Ok(ExitCode::SUCCESS)
}

fn run(cfg: &Configuration, args: RunArgs) -> Result<ExitCode> {
    let now: DateTime<Local> = match args.now.as_deref() {
        Some(ts) => parse_rfc3339(ts).context("failed to parse --now")?.into(),
        None => Local::now(),
    };
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let runner = default_runner();
    let server = detect_display_server();
    let needs_outputs = server == DisplayServer::Wayland && !args.dry_run;
    let outputs = if args.monitors.is_none() || needs_outputs {
        detect_outputs(server, &runner)
    } else {
        Vec::new()
    };
    let monitor_count = args.monitors.unwrap_or(outputs.len()).max(1);

    let mut rotation = Rotation::new(cfg, rng);
    let report = if args.dry_run {
        let mut setter = DryRunSetter::default();
        let report = rotation
            .without_persistence()
            .run(now, monitor_count, &mut setter)?;
        println!("# planned wallpapers at {}:", now.format("%Y-%m-%d %H:%M"));
        for (monitor, path) in &setter.planned {
            println!("  {monitor:>10}: {}", path.display());
        }
        report
    } else {
        let mut setter: Box<dyn WallpaperSetter> =
            setter_for(server, outputs, monitor_count, runner)?;
        rotation.run(now, monitor_count, &mut setter)?
    };

    Ok(exit_code(&report))
}

fn detect_outputs(server: DisplayServer, runner: &CommandRunner) -> Vec<String> {
    match list_outputs(server, runner) {
        Ok(outputs) => outputs,
        Err(err) => {
            warn!(error = %format!("{err:#}"), "monitor detection failed; assuming one monitor");
            Vec::new()
        }
    }
}

fn exit_code(report: &RunReport) -> ExitCode {
    for entry in &report.monitors {
        if let MonitorOutcome::Failed(err) = &entry.outcome {
            warn!(monitor = %entry.monitor, error = %err, "monitor not updated");
        }
    }
    if report.succeeded() {
        ExitCode::SUCCESS
    } else {
        error!("no wallpaper could be applied");
        ExitCode::FAILURE
    }
}

fn validate(cfg: &Configuration) -> ExitCode {
    let schedule = &cfg.schedule;
    let days: Vec<String> = schedule
        .holiday_days()
        .iter()
        .map(ToString::to_string)
        .collect();
    println!("# schedule");
    println!("  holiday days: {}", days.join(", "));
    println!(
        "  day window:   {} - {}",
        schedule.day_start_time().format("%H:%M"),
        schedule.night_start_time().format("%H:%M")
    );

    println!("\n# directories");
    let mut existing = 0usize;
    for (label, path) in cfg.directories.configured() {
        if path.is_dir() {
            existing += 1;
            let count = list_images(path, &cfg.images.extensions).len();
            println!("  {label:<28} {} ({count} images)", path.display());
        } else {
            println!("  {label:<28} {} (missing)", path.display());
        }
    }
    println!("  extensions: {}", cfg.images.extensions.join(" "));

    let tracking = &cfg.state_tracking;
    println!("\n# state tracking");
    println!("  enabled:      {}", tracking.enabled);
    println!("  state file:   {}", tracking.state_file.display());
    println!("  auto cleanup: {}", tracking.auto_cleanup);
    println!("  max history:  {}", tracking.max_history);

    let logging = &cfg.logging;
    println!("\n# logging");
    println!("  level:        {}", logging.level);
    match &logging.log_dir {
        Some(dir) => println!(
            "  log dir:      {} ({:?}, keep {})",
            dir.display(),
            logging.rotation,
            logging.max_files
        ),
        None => println!("  log dir:      disabled"),
    }

    if existing == 0 {
        error!("none of the configured wallpaper directories exist");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
