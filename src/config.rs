use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

pub use config_model::{
    DayContext, DirectoryConfig, MonitorDirs, MonitorKey, ScheduleConfig, TimeBasedDirs,
};

const APP_DIR: &str = "wallpaperchanger";

/// Complete, validated application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    pub schedule: ScheduleConfig,
    pub directories: DirectoryConfig,
    pub images: ImageSettings,
    pub state_tracking: StateTrackingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ImageSettings {
    /// Allowed suffixes. Normalized to lowercase with a leading dot on validation.
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct StateTrackingConfig {
    pub enabled: bool,
    pub state_file: PathBuf,
    /// Drop records of monitors that are no longer configured.
    pub auto_cleanup: bool,
    /// Number of recent wallpapers remembered per monitor.
    pub max_history: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for rolling log files; `null` logs to stderr only.
    pub log_dir: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Log files kept in `log-dir`, the active one included.
    pub max_files: usize,
}

/// How often a new log file is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

impl Default for ImageSettings {
    fn default() -> Self {
        Self {
            extensions: [".png", ".jpg", ".jpeg"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

impl Default for StateTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            state_file: default_state_file(),
            auto_cleanup: false,
            max_history: Self::DEFAULT_MAX_HISTORY,
        }
    }
}

impl StateTrackingConfig {
    pub const DEFAULT_MAX_HISTORY: usize = 10;
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: Some(default_log_dir()),
            rotation: LogRotation::default(),
            max_files: Self::DEFAULT_MAX_FILES,
        }
    }
}

impl LoggingConfig {
    pub const DEFAULT_MAX_FILES: usize = 3;
}

impl Configuration {
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        Self::from_yaml_str(&data)
            .with_context(|| format!("failed to parse config at {}", path.display()))
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        // An empty document means "all defaults", which serde_yaml reports as null.
        if input.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(input)?)
    }

    /// Expand `~` in every path, normalize extensions, and reject unusable values.
    pub fn validated(mut self) -> Result<Self> {
        self.schedule.validate()?;

        for path in self.directories.paths_mut() {
            *path = expand_home(path);
        }
        self.state_tracking.state_file = expand_home(&self.state_tracking.state_file);
        if let Some(dir) = self.logging.log_dir.as_mut() {
            *dir = expand_home(dir);
        }
        ensure!(
            !self.directories.is_empty(),
            "no valid wallpaper directories configured; at least one directory is required"
        );

        ensure!(
            !self.images.extensions.is_empty(),
            "images.extensions must list at least one extension"
        );
        let mut normalized = Vec::with_capacity(self.images.extensions.len());
        for ext in &self.images.extensions {
            let Some(ext) = normalize_extension(ext) else {
                bail!("images.extensions must not contain blank entries");
            };
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        self.images.extensions = normalized;

        ensure!(
            self.state_tracking.max_history >= 1,
            "state-tracking.max-history must be at least 1"
        );
        ensure!(
            self.state_tracking.state_file.file_name().is_some(),
            "state-tracking.state-file must name a file"
        );

        ensure!(
            !self.logging.level.trim().is_empty(),
            "logging.level must not be blank"
        );
        EnvFilter::try_new(self.logging.level.trim()).with_context(|| {
            format!("logging.level '{}' is not a valid filter", self.logging.level)
        })?;
        ensure!(
            self.logging.max_files >= 1,
            "logging.max-files must be at least 1"
        );

        Ok(self)
    }
}

/// Read, parse and validate the configuration at `path`.
pub fn load(path: &Path) -> Result<Configuration> {
    Configuration::from_yaml_file(path)?
        .validated()
        .with_context(|| format!("invalid configuration in {}", path.display()))
}

/// `.JPG`, `jpg`, and ` .jpg ` all become `.jpg`.
pub fn normalize_extension(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!(".{}", trimmed.to_ascii_lowercase()))
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("config.yaml")
}

fn default_state_file() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("state.json")
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("logs")
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Write the commented starter configuration. Refuses to clobber an existing
/// file unless `force` is set.
pub fn write_default(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "configuration file {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config dir at {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_TEMPLATE)
        .with_context(|| format!("failed to write {}", path.display()))
}

/// Write the starter configuration when nothing exists at `path` yet.
/// Returns whether a file was created.
pub fn create_if_missing(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    write_default(path, false)?;
    Ok(true)
}

pub const DEFAULT_TEMPLATE: &str = r#"# Wallpaper rotator configuration.
# Edit the directories below to point at your wallpaper folders.

schedule:
  # Days that use the holiday wallpapers (comma-separated string or list).
  holiday-days: [Sunday]
  # 24-hour HH:MM. Light wallpapers from day-start until night-start.
  # If night-start is earlier than day-start the day window wraps past midnight.
  day-start-time: "08:00"
  night-start-time: "18:00"

directories:
  # The most specific configured tier wins, per monitor:
  #   1. time-based (workday/holiday x light/dark)
  #   2. workday / holiday
  #   3. primary / left with an optional holiday-override
  time-based:
    workday-light:
      primary: ~/Pictures/Wallpapers/workday/primary/light
      left: ~/Pictures/Wallpapers/workday/left/light
    workday-dark:
      primary: ~/Pictures/Wallpapers/workday/primary/dark
      left: ~/Pictures/Wallpapers/workday/left/dark
    holiday-light:
      primary: ~/Pictures/Wallpapers/holiday/light
    holiday-dark:
      primary: ~/Pictures/Wallpapers/holiday/dark

  # workday:
  #   primary: ~/Pictures/Wallpapers/workday/primary
  #   left: ~/Pictures/Wallpapers/workday/left
  # holiday:
  #   primary: ~/Pictures/Wallpapers/holiday/primary

  # primary: ~/Pictures/Wallpapers/primary
  # left: ~/Pictures/Wallpapers/left
  # holiday-override: ~/Pictures/Wallpapers/sunday

images:
  extensions: [".png", ".jpg", ".jpeg"]

state-tracking:
  # Cycle through each directory in order instead of picking at random.
  enabled: true
  # state-file: ~/.local/share/wallpaperchanger/state.json
  auto-cleanup: false
  max-history: 10

logging:
  # Used when RUST_LOG is unset; -v and -vv raise it to debug and trace.
  level: info
  # Rolling log files next to stderr output; set to null to disable.
  # log-dir: ~/.local/share/wallpaperchanger/logs
  # hourly, daily or never.
  rotation: daily
  max-files: 3
"#;
