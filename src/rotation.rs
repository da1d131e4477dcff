//! One wallpaper rotation, start to finish.
//!
//! Rules:
//! - Resolution failures abort the run before anything is applied.
//! - Every other failure is confined to its monitor and recorded in the report.
//! - Rotation records advance only for monitors whose wallpaper was applied.
//! - A failed state save is a warning; the wallpapers stay applied.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use rand::Rng;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::error::{ApplyError, ConfigurationError, MonitorError};
use crate::images::list_images;
use crate::resolver::{MonitorId, Tier, resolve};
use crate::selector::Selector;
use crate::state::{self, RotationRecord, StateDocument};

/// Paints wallpapers on monitors.
pub trait WallpaperSetter {
    fn apply(&mut self, monitor: &MonitorId, path: &Path) -> Result<(), ApplyError>;

    /// Called once after every monitor was offered to `apply`. Backends that
    /// paint all monitors with a single command do their work here.
    fn commit(&mut self) -> Result<(), ApplyError> {
        Ok(())
    }
}

impl<S: WallpaperSetter + ?Sized> WallpaperSetter for Box<S> {
    fn apply(&mut self, monitor: &MonitorId, path: &Path) -> Result<(), ApplyError> {
        (**self).apply(monitor, path)
    }

    fn commit(&mut self) -> Result<(), ApplyError> {
        (**self).commit()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    Applied,
    Failed(MonitorError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    pub monitor: MonitorId,
    pub directory: PathBuf,
    pub tier: Tier,
    pub candidates: usize,
    pub chosen: Option<PathBuf>,
    pub outcome: MonitorOutcome,
}

impl MonitorReport {
    pub fn applied(&self) -> bool {
        matches!(self.outcome, MonitorOutcome::Applied)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub monitors: Vec<MonitorReport>,
    pub warnings: Vec<String>,
    pub state_saved: bool,
}

impl RunReport {
    /// At least one monitor got a new wallpaper.
    pub fn succeeded(&self) -> bool {
        self.monitors.iter().any(MonitorReport::applied)
    }

    pub fn applied_count(&self) -> usize {
        self.monitors.iter().filter(|m| m.applied()).count()
    }

    pub fn monitor(&self, id: &MonitorId) -> Option<&MonitorReport> {
        self.monitors.iter().find(|m| &m.monitor == id)
    }
}

pub struct Rotation<'a, R> {
    config: &'a Configuration,
    rng: R,
    persist_state: bool,
}

impl<'a, R: Rng> Rotation<'a, R> {
    pub fn new(config: &'a Configuration, rng: R) -> Self {
        Self {
            config,
            rng,
            persist_state: true,
        }
    }

    /// Read state but never write it (dry runs).
    pub fn without_persistence(mut self) -> Self {
        self.persist_state = false;
        self
    }

    /// Resolve, select and apply a wallpaper for `monitor_count` monitors.
    ///
    /// # Errors
    /// Only [`ConfigurationError`] aborts the run; per-monitor failures are in
    /// the returned report.
    pub fn run(
        &mut self,
        now: DateTime<Local>,
        monitor_count: usize,
        setter: &mut dyn WallpaperSetter,
    ) -> Result<RunReport, ConfigurationError> {
        let slots = resolve(self.config, now.naive_local(), monitor_count)?;
        let mut report = RunReport::default();

        for slot in &slots {
            if !slot.directory.is_dir() {
                let message = format!(
                    "wallpaper directory {} for monitor {} does not exist",
                    slot.directory.display(),
                    slot.monitor
                );
                warn!(
                    monitor = %slot.monitor,
                    directory = %slot.directory.display(),
                    "wallpaper directory does not exist"
                );
                report.warnings.push(message);
            }
        }

        let tracking = &self.config.state_tracking;
        let document = if tracking.enabled {
            state::load(&tracking.state_file)
        } else {
            StateDocument::default()
        };

        let now_utc = now.with_timezone(&Utc);
        let mut selector = Selector::new(&mut self.rng, tracking.enabled, tracking.max_history);
        let mut pending: Vec<(MonitorId, RotationRecord)> = Vec::new();

        for slot in &slots {
            let candidates = list_images(&slot.directory, &self.config.images.extensions);
            let mut entry = MonitorReport {
                monitor: slot.monitor.clone(),
                directory: slot.directory.clone(),
                tier: slot.tier,
                candidates: candidates.len(),
                chosen: None,
                outcome: MonitorOutcome::Applied,
            };

            let prior = document.record(&slot.monitor);
            match selector.select(&slot.monitor, &candidates, prior, now_utc) {
                Err(err) => {
                    warn!(
                        monitor = %slot.monitor,
                        directory = %slot.directory.display(),
                        "no wallpapers found; skipping monitor"
                    );
                    entry.outcome = MonitorOutcome::Failed(err.into());
                }
                Ok(selection) => {
                    entry.chosen = Some(selection.path.clone());
                    match setter.apply(&slot.monitor, &selection.path) {
                        Ok(()) => pending.push((slot.monitor.clone(), selection.record)),
                        Err(err) => {
                            warn!(
                                monitor = %slot.monitor,
                                path = %selection.path.display(),
                                error = %err,
                                "failed to apply wallpaper"
                            );
                            entry.outcome = MonitorOutcome::Failed(err.into());
                        }
                    }
                }
            }
            report.monitors.push(entry);
        }

        if let Err(err) = setter.commit() {
            warn!(error = %err, "failed to apply staged wallpapers");
            for entry in report.monitors.iter_mut().filter(|m| m.applied()) {
                entry.outcome = MonitorOutcome::Failed(MonitorError::Apply(err.clone()));
            }
            pending.clear();
        }

        for entry in report.monitors.iter().filter(|m| m.applied()) {
            if let Some(path) = &entry.chosen {
                info!(monitor = %entry.monitor, path = %path.display(), "wallpaper applied");
            }
        }

        if tracking.enabled {
            let known: Vec<MonitorId> = slots.iter().map(|s| s.monitor.clone()).collect();
            report.state_saved = self.persist(document, pending, &known, &mut report.warnings);
        }

        info!(
            applied = report.applied_count(),
            monitors = report.monitors.len(),
            "rotation finished"
        );
        Ok(report)
    }

    fn persist(
        &self,
        mut document: StateDocument,
        pending: Vec<(MonitorId, RotationRecord)>,
        known: &[MonitorId],
        warnings: &mut Vec<String>,
    ) -> bool {
        let tracking = &self.config.state_tracking;
        for (monitor, record) in pending {
            document.insert(monitor, record);
        }
        if tracking.auto_cleanup {
            document = state::prune(document, known, tracking.max_history);
        }
        if !self.persist_state {
            info!("dry run; rotation state not saved");
            return false;
        }
        match state::save(&tracking.state_file, &document) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    path = %tracking.state_file.display(),
                    error = %err,
                    "failed to save rotation state"
                );
                warnings.push(format!("failed to save rotation state: {err}"));
                false
            }
        }
    }
}
