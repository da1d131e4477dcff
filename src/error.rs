use std::path::PathBuf;

use thiserror::Error;

use crate::resolver::MonitorId;

/// No tier of the directory configuration produced a directory. Fatal for the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("no valid wallpaper directories configured")]
    NoDirectories,
}

/// The monitor's candidate set was empty.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("no wallpaper candidates for monitor {monitor}")]
pub struct NoCandidatesError {
    pub monitor: MonitorId,
}

/// The external tool that paints a wallpaper failed for one monitor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("no display output is mapped to monitor {0}")]
    UnknownMonitor(MonitorId),

    #[error("wallpaper file {} does not exist", .0.display())]
    MissingImage(PathBuf),

    #[error("`{command}` failed: {reason}")]
    Command { command: String, reason: String },
}

/// Per-monitor failure recorded in the run report.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MonitorError {
    #[error(transparent)]
    NoCandidates(#[from] NoCandidatesError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}

/// Writing the state document failed. Reported as a warning only.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to create state directory {}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialise state document")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write temporary state file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to move {} over {}", from.display(), to.display())]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
