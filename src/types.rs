//! Core types for pricelist-sync

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Columns of a price-list export, in the order they are written
///
/// item name, conversion factor, unit, cost price, sale price
pub const EXPORT_COLUMNS: [&str; 5] = ["namaitem", "konversi", "satuan", "hargapokok", "hargajual"];

/// A backup object in the remote artifact store
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupArtifact {
    /// File name (e.g. "POS_20250102.i5bu")
    pub name: String,
    /// Display path used to request a download link
    pub path: String,
    /// Server-side last-modified timestamp
    pub modified: DateTime<Utc>,
}

/// Sort artifacts newest first
///
/// Artifacts sharing a timestamp are ordered by name ascending, so the
/// selection of "latest" is deterministic.
pub fn sort_newest_first(artifacts: &mut [BackupArtifact]) {
    artifacts.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.name.cmp(&b.name))
    });
}

/// Wall-clock stamp shared by the backup and export files of one run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunStamp(DateTime<Local>);

impl RunStamp {
    /// Stamp for the current local time
    pub fn now() -> Self {
        Self(Local::now())
    }

    /// Stamp for an explicit instant
    pub fn at(at: DateTime<Local>) -> Self {
        Self(at)
    }

    /// File name of the downloaded backup: `backup_<ddMMyyyy-HHmm>.<ext>`
    pub fn backup_file_name(&self, extension: &str) -> String {
        format!("backup_{}.{}", self, extension.trim_start_matches('.'))
    }

    /// File name of the export: `<ddMMyyyy-HHmm>.csv`
    pub fn export_file_name(&self) -> String {
        format!("{}.csv", self)
    }
}

impl std::fmt::Display for RunStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%d%m%Y-%H%M"))
    }
}

/// Pipeline state
///
/// Runs advance linearly from `Idle` to `Succeeded`. `Failed` is reachable
/// from every non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not started
    Idle,
    /// Fetching the newest backup from the artifact store
    Downloading,
    /// Checking the downloaded backup
    ArtifactValidating,
    /// Dropping, recreating and restoring the database
    Restoring,
    /// Running the price-list query and writing the staged export
    Exporting,
    /// Checking the staged export and publishing it
    ExportValidating,
    /// Pruning old exports
    CleaningUp,
    /// All stages completed
    Succeeded,
    /// A stage failed; remaining stages were not run
    Failed,
}

impl PipelineState {
    /// The state that follows this one on success, `None` for terminal states
    pub fn next(self) -> Option<Self> {
        use PipelineState::*;
        match self {
            Idle => Some(Downloading),
            Downloading => Some(ArtifactValidating),
            ArtifactValidating => Some(Restoring),
            Restoring => Some(Exporting),
            Exporting => Some(ExportValidating),
            ExportValidating => Some(CleaningUp),
            CleaningUp => Some(Succeeded),
            Succeeded | Failed => None,
        }
    }

    /// Whether the run has ended in this state
    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Succeeded | PipelineState::Failed)
    }

    /// Lowercase name used in logs
    pub fn as_str(self) -> &'static str {
        use PipelineState::*;
        match self {
            Idle => "idle",
            Downloading => "downloading",
            ArtifactValidating => "artifact_validating",
            Restoring => "restoring",
            Exporting => "exporting",
            ExportValidating => "export_validating",
            CleaningUp => "cleaning_up",
            Succeeded => "succeeded",
            Failed => "failed",
        }
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted during a pipeline run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The pipeline entered a new state
    StateChanged {
        /// State being left
        from: PipelineState,
        /// State being entered
        to: PipelineState,
    },

    /// Latest backup was downloaded
    Downloaded {
        /// The remote artifact
        artifact: BackupArtifact,
        /// Local destination
        path: PathBuf,
    },

    /// A restore phase exited non-zero with a tolerated diagnostic
    RestoreWarning {
        /// The restore phase (dropdb, createdb, pg_restore)
        phase: String,
        /// Diagnostic output of the tool
        diagnostic: String,
    },

    /// Export validated with null cells in required columns
    NullCellsFound {
        /// Export file
        path: PathBuf,
        /// Column name and number of empty cells
        counts: Vec<(String, usize)>,
    },

    /// Export passed validation and is visible to the frontend
    Published {
        /// Published export path
        path: PathBuf,
        /// Number of data rows
        rows: usize,
    },

    /// Retention pass finished
    CleanedUp {
        /// Number of exports kept
        kept: usize,
        /// Number of exports removed
        removed: usize,
    },

    /// The run failed
    Failed {
        /// State in which the failure happened
        stage: PipelineState,
        /// Error message
        error: String,
    },
}
