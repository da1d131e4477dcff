use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ApplyError;
use crate::platform::command::{CommandRunner, Invocation};
use crate::resolver::MonitorId;
use crate::rotation::WallpaperSetter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServer {
    X11,
    Wayland,
    Unknown,
}

impl DisplayServer {
    pub fn from_session_type(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "x11" => Self::X11,
            "wayland" => Self::Wayland,
            _ => Self::Unknown,
        }
    }
}

/// Read `XDG_SESSION_TYPE`.
pub fn detect_display_server() -> DisplayServer {
    let server = env::var("XDG_SESSION_TYPE")
        .map(|value| DisplayServer::from_session_type(&value))
        .unwrap_or(DisplayServer::Unknown);
    debug!(?server, "detected display server");
    server
}

/// Names of the active outputs, in the order the display server reports them.
pub fn list_outputs(server: DisplayServer, runner: &CommandRunner) -> Result<Vec<String>> {
    let invocation = match server {
        DisplayServer::X11 => Invocation::new("xrandr", ["--listmonitors"]),
        DisplayServer::Wayland => Invocation::new("swaymsg", ["-t", "get_outputs", "--raw"]),
        DisplayServer::Unknown => bail!("cannot list monitors: unknown display server"),
    };
    let output = runner(&invocation).with_context(|| format!("failed to run `{invocation}`"))?;
    if !output.success {
        bail!("`{invocation}` failed: {}", output.failure_reason());
    }
    let outputs = match server {
        DisplayServer::X11 => parse_xrandr_monitors(&output.stdout),
        _ => parse_sway_outputs(&output.stdout)?,
    };
    info!(?server, outputs = ?outputs, "detected monitors");
    Ok(outputs)
}

/// Parse `xrandr --listmonitors`:
///
/// ```text
/// Monitors: 2
///  0: +*DP-1 2560/597x1440/336+0+0  DP-1
///  1: +HDMI-1 1920/527x1080/296+2560+0  HDMI-1
/// ```
fn parse_xrandr_monitors(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| {
            line.split_once(':')
                .is_some_and(|(index, _)| index.chars().all(|c| c.is_ascii_digit()))
        })
        .filter_map(|line| line.split_whitespace().last())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
struct SwayOutput {
    name: String,
    #[serde(default)]
    active: bool,
}

fn parse_sway_outputs(stdout: &str) -> Result<Vec<String>> {
    let outputs: Vec<SwayOutput> =
        serde_json::from_str(stdout).context("failed to parse swaymsg output list")?;
    Ok(outputs
        .into_iter()
        .filter(|output| output.active)
        .map(|output| output.name)
        .collect())
}

/// Pick the backend for `server`. `outputs` maps monitor slots to output names
/// and is only needed on Wayland; `screens` is the monitor count feh paints.
pub fn setter_for(
    server: DisplayServer,
    outputs: Vec<String>,
    screens: usize,
    runner: CommandRunner,
) -> Result<Box<dyn WallpaperSetter>> {
    match server {
        DisplayServer::X11 => Ok(Box::new(FehSetter::new(runner, screens))),
        DisplayServer::Wayland => Ok(Box::new(SwaybgSetter::new(outputs, runner))),
        DisplayServer::Unknown => Err(anyhow!(
            "unsupported display server (XDG_SESSION_TYPE is not x11 or wayland); use --dry-run"
        )),
    }
}

fn ensure_image(path: &Path) -> Result<(), ApplyError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ApplyError::MissingImage(path.to_path_buf()))
    }
}

/// X11 backend. `feh` paints every screen in one call and assigns images by
/// position, so `apply` stages each path at its monitor's slot and `commit`
/// paints them all.
pub struct FehSetter {
    runner: CommandRunner,
    staged: Vec<Option<PathBuf>>,
}

impl FehSetter {
    pub fn new(runner: CommandRunner, screens: usize) -> Self {
        Self {
            runner,
            staged: vec![None; screens.max(1)],
        }
    }
}

impl WallpaperSetter for FehSetter {
    fn apply(&mut self, monitor: &MonitorId, path: &Path) -> Result<(), ApplyError> {
        let index = monitor
            .slot_index()
            .ok_or_else(|| ApplyError::UnknownMonitor(monitor.clone()))?;
        ensure_image(path)?;
        debug!(%monitor, index, path = %path.display(), "staged wallpaper for feh");
        if index >= self.staged.len() {
            self.staged.resize(index + 1, None);
        }
        self.staged[index] = Some(path.to_path_buf());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ApplyError> {
        let screens = self.staged.len();
        let staged = std::mem::replace(&mut self.staged, vec![None; screens]);
        let paths = fill_unstaged_screens(&staged);
        if paths.is_empty() {
            return Ok(());
        }
        let mut args = vec!["--bg-fill".to_string()];
        args.extend(paths.iter().map(|path| path.to_string_lossy().into_owned()));
        run_checked(&self.runner, &Invocation::new("feh", args))
    }
}

/// One path per screen. A screen nothing was staged for repeats the nearest
/// staged image, lower slots first, so later screens keep their position.
/// Empty when nothing was staged at all.
fn fill_unstaged_screens(staged: &[Option<PathBuf>]) -> Vec<&Path> {
    if staged.iter().all(Option::is_none) {
        return Vec::new();
    }
    (0..staged.len())
        .filter_map(|index| {
            staged[..=index]
                .iter()
                .rev()
                .chain(&staged[index + 1..])
                .find_map(Option::as_deref)
        })
        .collect()
}

/// Wayland backend: one `swaybg` per output, replacing any running instance.
pub struct SwaybgSetter {
    runner: CommandRunner,
    outputs: Vec<(MonitorId, String)>,
    cleared: bool,
}

impl SwaybgSetter {
    pub fn new(outputs: Vec<String>, runner: CommandRunner) -> Self {
        let outputs = outputs
            .into_iter()
            .enumerate()
            .map(|(index, name)| (MonitorId::for_slot(index), name))
            .collect();
        Self {
            runner,
            outputs,
            cleared: false,
        }
    }

    fn output_for(&self, monitor: &MonitorId) -> Option<&str> {
        self.outputs
            .iter()
            .find(|(id, _)| id == monitor)
            .map(|(_, name)| name.as_str())
    }

    fn clear_running(&mut self) {
        if self.cleared {
            return;
        }
        self.cleared = true;
        // pkill exits non-zero when nothing matched.
        match (self.runner)(&Invocation::new("pkill", ["swaybg"])) {
            Ok(output) if output.success => debug!("stopped running swaybg"),
            Ok(_) => debug!("no running swaybg to stop"),
            Err(err) => warn!(error = %err, "failed to stop running swaybg"),
        }
    }
}

impl WallpaperSetter for SwaybgSetter {
    fn apply(&mut self, monitor: &MonitorId, path: &Path) -> Result<(), ApplyError> {
        ensure_image(path)?;
        let output = self
            .output_for(monitor)
            .map(str::to_string)
            .ok_or_else(|| ApplyError::UnknownMonitor(monitor.clone()))?;
        self.clear_running();
        let invocation = Invocation::new(
            "swaybg",
            [
                "-o".to_string(),
                output,
                "-i".to_string(),
                path.to_string_lossy().into_owned(),
                "-m".to_string(),
                "fill".to_string(),
            ],
        )
        .detached();
        run_checked(&self.runner, &invocation)
    }
}

fn run_checked(runner: &CommandRunner, invocation: &Invocation) -> Result<(), ApplyError> {
    debug!(command = %invocation, "running wallpaper command");
    match runner(invocation) {
        Ok(output) if output.success => Ok(()),
        Ok(output) => Err(ApplyError::Command {
            command: invocation.to_string(),
            reason: output.failure_reason(),
        }),
        Err(err) => Err(ApplyError::Command {
            command: invocation.to_string(),
            reason: format!("{err:#}"),
        }),
    }
}

/// Logs what would be painted and touches nothing.
#[derive(Debug, Default)]
pub struct DryRunSetter {
    pub planned: Vec<(MonitorId, PathBuf)>,
}

impl WallpaperSetter for DryRunSetter {
    fn apply(&mut self, monitor: &MonitorId, path: &Path) -> Result<(), ApplyError> {
        info!(%monitor, path = %path.display(), "dry run: would set wallpaper");
        self.planned.push((monitor.clone(), path.to_path_buf()));
        Ok(())
    }
}
