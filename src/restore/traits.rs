//! Traits and types for database restore

use async_trait::async_trait;
use std::path::Path;

/// One step of the restore sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    /// Drop the target database if it exists
    Drop,
    /// Create an empty target database
    Create,
    /// Load the backup into the target database
    Restore,
}

impl RestorePhase {
    /// All phases in execution order
    pub const ORDER: [RestorePhase; 3] = [RestorePhase::Drop, RestorePhase::Create, RestorePhase::Restore];

    /// Name of the client tool that runs this phase
    pub fn tool(self) -> &'static str {
        match self {
            RestorePhase::Drop => "dropdb",
            RestorePhase::Create => "createdb",
            RestorePhase::Restore => "pg_restore",
        }
    }
}

impl std::fmt::Display for RestorePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool())
    }
}

/// A phase that exited non-zero with a tolerated diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseWarning {
    /// The phase that produced the diagnostic
    pub phase: RestorePhase,
    /// Exit status of the tool, if it exited normally
    pub status: Option<i32>,
    /// The tool's diagnostic output
    pub diagnostic: String,
}

/// Result of a completed restore
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    /// Phases that completed, in order
    pub completed: Vec<RestorePhase>,
    warnings: Vec<PhaseWarning>,
}

impl RestoreReport {
    /// Record a completed phase, with its tolerated diagnostic if any
    pub fn record(&mut self, phase: RestorePhase, warning: Option<PhaseWarning>) {
        self.completed.push(phase);
        if let Some(warning) = warning {
            self.warnings.push(warning);
        }
    }

    /// Tolerated diagnostics, in phase order
    pub fn warnings(&self) -> &[PhaseWarning] {
        &self.warnings
    }

    /// Whether every phase exited cleanly
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Trait for recreating the target database from a backup
///
/// There is no rollback: a failed phase leaves the database in whatever state
/// the tool left it, and the next run starts again from `dropdb`.
#[async_trait]
pub trait DatabaseRestorer: Send + Sync {
    /// Check that the database server accepts connections
    ///
    /// Never fails; `false` means no phase must run.
    async fn ensure_running(&self) -> bool;

    /// Drop, recreate and restore the target database from `backup`
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::DatabaseError::RestoreFailed`] for the first
    /// phase exiting non-zero with a diagnostic that is not tolerated. Later
    /// phases are not run.
    async fn restore(&self, backup: &Path) -> crate::Result<RestoreReport>;

    /// Name of this implementation (for logging)
    fn name(&self) -> &'static str;
}
