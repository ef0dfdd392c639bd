//! Sync pipeline
//!
//! One run fetches the newest backup and turns it into a published price list:
//! 1. Download - fetch the latest backup from the artifact store
//! 2. Validate artifact - liveness check on the downloaded file
//! 3. Restore - probe the server, then drop, recreate and restore the database
//! 4. Export - run the price-list query into the staging directory
//! 5. Validate export - structural check, then publish by renaming out of staging
//! 6. Cleanup - prune old exports
//!
//! Stages run strictly in order. The first failing stage ends the run; nothing
//! is retried or rolled back, and later stages never run.

use crate::config::Config;
use crate::error::{DatabaseError, Error, Result, ValidationError};
use crate::export::{ExportGenerator, PgExporter};
use crate::restore::{DatabaseRestorer, PgRestorer, PhaseWarning};
use crate::retention::{CleanupReport, RetentionManager};
use crate::store::{ArtifactStore, DropboxStore};
use crate::types::{BackupArtifact, Event, PipelineState, RunStamp};
use crate::validate::{validate_artifact, validate_export};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

mod publish;

use publish::{clear_staging, publish_export};

/// Capacity of the event channel created by [`SyncPipeline::from_config`]
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Summary of a successful run
#[must_use]
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Stamp naming this run's backup and export
    pub stamp: RunStamp,
    /// The backup that was restored
    pub artifact: BackupArtifact,
    /// Local copy of the backup
    pub backup_path: PathBuf,
    /// Published export
    pub export_path: PathBuf,
    /// Data rows in the export
    pub rows: usize,
    /// Tolerated restore diagnostics
    pub restore_warnings: Vec<PhaseWarning>,
    /// Required columns with empty cells
    pub null_counts: Vec<(String, usize)>,
    /// Outcome of the retention pass
    pub cleanup: CleanupReport,
}

/// A failed run: the stage it failed in and why
#[derive(Debug, thiserror::Error)]
#[error("sync failed while {stage}: {error}")]
pub struct SyncFailure {
    /// State the pipeline was in when the error occurred
    pub stage: PipelineState,
    /// The underlying error
    #[source]
    pub error: Error,
}

/// Tracks the current state and broadcasts transitions
struct StateTracker<'a> {
    state: PipelineState,
    event_tx: &'a broadcast::Sender<Event>,
}

impl<'a> StateTracker<'a> {
    fn new(event_tx: &'a broadcast::Sender<Event>) -> Self {
        Self {
            state: PipelineState::Idle,
            event_tx,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.state.next() {
            self.transition(next);
        }
    }

    fn fail(&mut self, error: &Error) -> PipelineState {
        let stage = self.state;
        self.transition(PipelineState::Failed);
        self.event_tx
            .send(Event::Failed {
                stage,
                error: error.to_string(),
            })
            .ok();
        stage
    }

    fn transition(&mut self, to: PipelineState) {
        let from = self.state;
        info!(%from, %to, "pipeline state changed");
        self.state = to;
        self.event_tx.send(Event::StateChanged { from, to }).ok();
    }
}

/// Sync pipeline executor
pub struct SyncPipeline {
    /// Event channel for emitting pipeline events
    event_tx: broadcast::Sender<Event>,
    config: Arc<Config>,
    store: Arc<dyn ArtifactStore>,
    restorer: Arc<dyn DatabaseRestorer>,
    exporter: Arc<dyn ExportGenerator>,
    retention: RetentionManager,
}

impl SyncPipeline {
    /// Create a pipeline from explicit stage implementations
    pub fn new(
        event_tx: broadcast::Sender<Event>,
        config: Arc<Config>,
        store: Arc<dyn ArtifactStore>,
        restorer: Arc<dyn DatabaseRestorer>,
        exporter: Arc<dyn ExportGenerator>,
    ) -> Self {
        let retention = RetentionManager::new(&config.paths.exports_dir, config.max_csv_files);
        Self {
            event_tx,
            config,
            store,
            restorer,
            exporter,
            retention,
        }
    }

    /// Create a pipeline backed by Dropbox and PostgreSQL
    ///
    /// Validates the configuration and resolves the PostgreSQL client tools.
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        let store = DropboxStore::new(config.store.clone())?;
        let restorer = PgRestorer::new(config.database.clone())?;
        let exporter = PgExporter::new(config.database.clone());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self::new(
            event_tx,
            Arc::new(config),
            Arc::new(store),
            Arc::new(restorer),
            Arc::new(exporter),
        ))
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Run the pipeline once, stamped with the current local time
    pub async fn run(&self) -> std::result::Result<SyncReport, SyncFailure> {
        self.run_at(RunStamp::now()).await
    }

    /// Run the pipeline once with an explicit stamp
    pub async fn run_at(&self, stamp: RunStamp) -> std::result::Result<SyncReport, SyncFailure> {
        info!(
            %stamp,
            store = self.store.name(),
            restorer = self.restorer.name(),
            exporter = self.exporter.name(),
            "starting sync run"
        );

        let mut tracker = StateTracker::new(&self.event_tx);
        match self.run_stages(stamp, &mut tracker).await {
            Ok(report) => {
                tracker.advance();
                info!(
                    %stamp,
                    export = ?report.export_path,
                    rows = report.rows,
                    warnings = report.restore_warnings.len(),
                    "sync run succeeded"
                );
                Ok(report)
            }
            Err(error) => {
                let stage = tracker.fail(&error);
                error!(
                    %stage,
                    code = error.error_code(),
                    error = %error,
                    "sync run failed"
                );
                Err(SyncFailure { stage, error })
            }
        }
    }

    async fn run_stages(&self, stamp: RunStamp, tracker: &mut StateTracker<'_>) -> Result<SyncReport> {
        let paths = &self.config.paths;

        tracker.advance();
        let backup_path = paths
            .backups_dir
            .join(stamp.backup_file_name(&self.config.store.backup_extension));
        let local = self.store.download_latest(&backup_path).await?;
        self.event_tx
            .send(Event::Downloaded {
                artifact: local.artifact.clone(),
                path: local.path.clone(),
            })
            .ok();

        tracker.advance();
        validate_artifact(&local.path).await?;

        tracker.advance();
        if !self.restorer.ensure_running().await {
            return Err(DatabaseError::Unreachable {
                host: self.config.database.host.clone(),
                port: self.config.database.port,
            }
            .into());
        }
        let restore = self.restorer.restore(&local.path).await?;
        for warning in restore.warnings() {
            self.event_tx
                .send(Event::RestoreWarning {
                    phase: warning.phase.to_string(),
                    diagnostic: warning.diagnostic.clone(),
                })
                .ok();
        }

        tracker.advance();
        clear_staging(&paths.staging_dir()).await?;
        let staged = paths.staging_dir().join(stamp.export_file_name());
        let export = self.exporter.export_to_csv(&staged).await?;

        tracker.advance();
        let validation = validate_export(&export.path).await;
        if !validation.is_valid {
            return Err(ValidationError::ExportRejected {
                path: export.path,
                reason: validation.reason.unwrap_or_default(),
            }
            .into());
        }
        if !validation.null_counts.is_empty() {
            self.event_tx
                .send(Event::NullCellsFound {
                    path: export.path.clone(),
                    counts: validation.null_counts.clone(),
                })
                .ok();
        }
        let export_path = publish_export(&export.path, &paths.exports_dir).await?;
        self.event_tx
            .send(Event::Published {
                path: export_path.clone(),
                rows: validation.rows,
            })
            .ok();

        tracker.advance();
        let cleanup = self.retention.cleanup(None).await?;
        self.event_tx
            .send(Event::CleanedUp {
                kept: cleanup.kept.len(),
                removed: cleanup.removed.len(),
            })
            .ok();

        Ok(SyncReport {
            stamp,
            artifact: local.artifact,
            backup_path: local.path,
            export_path,
            rows: validation.rows,
            restore_warnings: restore.warnings().to_vec(),
            null_counts: validation.null_counts,
            cleanup,
        })
    }
}
