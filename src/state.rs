//! Persistent per-monitor rotation state.
//!
//! The document is plain JSON:
//!
//! ```json
//! { "version": 1,
//!   "monitors": { "primary": { "last_image": "...", "history": ["..."], "updated_at": "..." } } }
//! ```
//!
//! Writes go through a synced temp file in the target directory followed by a
//! rename, so readers only ever see a complete document. A document that fails
//! to parse is moved aside and replaced by an empty one.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::resolver::MonitorId;

pub const CURRENT_VERSION: u32 = 1;

/// What the rotation remembers about one monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RotationRecord {
    pub last_image: PathBuf,
    /// Recently applied wallpapers, oldest first.
    #[serde(default)]
    pub history: Vec<PathBuf>,
    pub updated_at: DateTime<Utc>,
    /// Fields written by other versions; kept so a round-trip does not drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl RotationRecord {
    /// Record for `chosen` following `prior`, keeping at most `max_history` entries.
    pub fn advanced(
        prior: Option<&RotationRecord>,
        chosen: &Path,
        now: DateTime<Utc>,
        max_history: usize,
    ) -> Self {
        let mut history = prior.map(|r| r.history.clone()).unwrap_or_default();
        history.push(chosen.to_path_buf());
        truncate_history(&mut history, max_history);
        Self {
            last_image: chosen.to_path_buf(),
            history,
            updated_at: now,
            extra: prior.map(|r| r.extra.clone()).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    pub version: u32,
    #[serde(default)]
    pub monitors: BTreeMap<MonitorId, RotationRecord>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            monitors: BTreeMap::new(),
            extra: BTreeMap::new(),
        }
    }
}

impl StateDocument {
    pub fn record(&self, monitor: &MonitorId) -> Option<&RotationRecord> {
        self.monitors.get(monitor)
    }

    pub fn insert(&mut self, monitor: MonitorId, record: RotationRecord) {
        self.monitors.insert(monitor, record);
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

#[derive(Debug, Error)]
enum LoadIssue {
    #[error("state file is unreadable: {0}")]
    Unreadable(#[source] io::Error),

    #[error("state file is corrupt: {0}")]
    Corrupt(#[source] serde_json::Error),
}

/// Load the state document at `path`.
///
/// Never fails: a missing or unreadable file yields an empty document, and a
/// corrupt file is renamed to `<stem>.corrupted.<timestamp>` before an empty
/// document is returned.
pub fn load(path: &Path) -> StateDocument {
    match read_document(path) {
        Ok(Some(document)) => {
            if document.version > CURRENT_VERSION {
                warn!(
                    path = %path.display(),
                    version = document.version,
                    supported = CURRENT_VERSION,
                    "state file written by a newer version; reading known fields only"
                );
            }
            info!(
                path = %path.display(),
                monitors = document.monitors.len(),
                "loaded rotation state"
            );
            document
        }
        Ok(None) => {
            info!(path = %path.display(), "no state file yet; starting fresh");
            StateDocument::default()
        }
        Err(issue @ LoadIssue::Unreadable(_)) => {
            warn!(path = %path.display(), error = %issue, "ignoring state file");
            StateDocument::default()
        }
        Err(issue @ LoadIssue::Corrupt(_)) => {
            warn!(path = %path.display(), error = %issue, "resetting rotation state");
            match quarantine(path) {
                Ok(moved) => warn!(
                    quarantine = %moved.display(),
                    "moved corrupt state file aside"
                ),
                Err(err) => warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to move corrupt state file aside"
                ),
            }
            StateDocument::default()
        }
    }
}

fn read_document(path: &Path) -> Result<Option<StateDocument>, LoadIssue> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(LoadIssue::Unreadable(err)),
    };
    serde_json::from_slice(&data)
        .map(Some)
        .map_err(LoadIssue::Corrupt)
}

/// `state.json` becomes `state.corrupted.<stamp>`, with a counter on collision.
fn quarantine(path: &Path) -> io::Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let mut candidate = path.with_extension(format!("corrupted.{stamp}"));
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = path.with_extension(format!("corrupted.{stamp}.{counter}"));
    }
    fs::rename(path, &candidate)?;
    Ok(candidate)
}

/// Atomically replace the state file at `path` with `document`.
///
/// # Errors
/// Any failure leaves the previous file untouched and is returned as a
/// [`PersistenceError`]; callers log it and carry on.
pub fn save(path: &Path, document: &StateDocument) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|source| PersistenceError::CreateDir {
        path: dir.clone(),
        source,
    })?;

    let mut json = serde_json::to_vec_pretty(document)?;
    json.push(b'\n');

    let tmp_path = temp_path(path);
    let result = write_synced(&tmp_path, &json).and_then(|()| {
        fs::rename(&tmp_path, path).map_err(|source| PersistenceError::Rename {
            from: tmp_path.clone(),
            to: path.to_path_buf(),
            source,
        })
    });
    if result.is_err() && tmp_path.exists() {
        fs::remove_file(&tmp_path).ok();
    }
    result?;

    debug!(
        path = %path.display(),
        bytes = json.len(),
        monitors = document.monitors.len(),
        "saved rotation state"
    );
    Ok(())
}

fn write_synced(tmp_path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let to_error = |source| PersistenceError::Write {
        path: tmp_path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(tmp_path)
        .map_err(to_error)?;
    file.write_all(bytes).map_err(to_error)?;
    file.sync_all().map_err(to_error)
}

fn temp_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state.json".to_string());
    let pid = std::process::id();
    let mut candidate = target.with_file_name(format!(".{name}.{pid}.tmp"));
    let mut counter = 0u32;
    while candidate.exists() {
        counter += 1;
        candidate = target.with_file_name(format!(".{name}.{pid}.tmp{counter}"));
    }
    candidate
}

/// Drop records for monitors not in `known` and cap every history at `max_history`.
pub fn prune(mut document: StateDocument, known: &[MonitorId], max_history: usize) -> StateDocument {
    let before = document.monitors.len();
    document.monitors.retain(|monitor, _| known.contains(monitor));
    let removed = before - document.monitors.len();
    if removed > 0 {
        info!(removed, "pruned rotation records of unconfigured monitors");
    }
    for record in document.monitors.values_mut() {
        truncate_history(&mut record.history, max_history);
    }
    document
}

fn truncate_history(history: &mut Vec<PathBuf>, max_history: usize) {
    if history.len() > max_history {
        let excess = history.len() - max_history;
        history.drain(..excess);
    }
}
