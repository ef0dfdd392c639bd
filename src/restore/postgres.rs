//! Restore through the PostgreSQL client tools

use super::benign::BenignDiagnostics;
use super::traits::{DatabaseRestorer, PhaseWarning, RestorePhase, RestoreReport};
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// Resolved locations of the client binaries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgTools {
    /// `dropdb` binary
    pub dropdb: PathBuf,
    /// `createdb` binary
    pub createdb: PathBuf,
    /// `pg_restore` binary
    pub pg_restore: PathBuf,
}

impl PgTools {
    /// Resolve each tool from its configured path, falling back to `PATH`
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ToolNotFound`] naming the first tool that has
    /// no configured path and cannot be found (or `PATH` search is disabled).
    pub fn resolve(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self {
            dropdb: resolve_tool("dropdb", config.dropdb_path.as_ref(), config.search_path)?,
            createdb: resolve_tool("createdb", config.createdb_path.as_ref(), config.search_path)?,
            pg_restore: resolve_tool(
                "pg_restore",
                config.pg_restore_path.as_ref(),
                config.search_path,
            )?,
        })
    }

    fn binary(&self, phase: RestorePhase) -> &Path {
        match phase {
            RestorePhase::Drop => &self.dropdb,
            RestorePhase::Create => &self.createdb,
            RestorePhase::Restore => &self.pg_restore,
        }
    }
}

fn resolve_tool(name: &str, configured: Option<&PathBuf>, search_path: bool) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.clone());
    }
    if search_path && let Ok(path) = which::which(name) {
        debug!(tool = name, path = ?path, "found tool in PATH");
        return Ok(path);
    }
    Err(DatabaseError::ToolNotFound(name.to_string()).into())
}

/// Database restorer using `dropdb`, `createdb` and `pg_restore`
///
/// Connection parameters are passed as arguments and the password through the
/// `PGPASSWORD` environment variable, so no tool ever prompts.
///
/// # Examples
///
/// ```no_run
/// use pricelist_sync::config::DatabaseConfig;
/// use pricelist_sync::restore::{DatabaseRestorer, PgRestorer};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let restorer = PgRestorer::new(DatabaseConfig {
///     name: "i5bu".into(),
///     password: "secret".into(),
///     ..Default::default()
/// })?;
/// let report = restorer.restore(Path::new("backup_02012025-0705.i5bu")).await?;
/// # Ok(())
/// # }
/// ```
pub struct PgRestorer {
    config: DatabaseConfig,
    tools: PgTools,
    benign: BenignDiagnostics,
}

impl PgRestorer {
    /// Create a restorer, resolving the tools and compiling the benign patterns
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let tools = PgTools::resolve(&config)?;
        let benign = BenignDiagnostics::from_patterns(&config.benign_restore_patterns)?;
        Ok(Self::with_tools(config, tools, benign))
    }

    /// Create a restorer with already-resolved tools
    pub fn with_tools(config: DatabaseConfig, tools: PgTools, benign: BenignDiagnostics) -> Self {
        Self {
            config,
            tools,
            benign,
        }
    }

    fn command(&self, phase: RestorePhase, backup: &Path) -> Command {
        let mut cmd = Command::new(self.tools.binary(phase));
        cmd.arg("-h")
            .arg(&self.config.host)
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg("-U")
            .arg(&self.config.user)
            .arg("--no-password")
            .env("PGPASSWORD", &self.config.password)
            .stdin(Stdio::null());

        match phase {
            RestorePhase::Drop => {
                cmd.arg(format!("--maintenance-db={}", self.config.maintenance_db))
                    .arg("--if-exists")
                    .arg(&self.config.name);
            }
            RestorePhase::Create => {
                cmd.arg(format!("--maintenance-db={}", self.config.maintenance_db))
                    .arg(&self.config.name);
            }
            RestorePhase::Restore => {
                cmd.arg("-d")
                    .arg(&self.config.name)
                    .arg("--no-owner")
                    .arg("--no-privileges")
                    .arg("--disable-triggers")
                    .arg(backup);
            }
        }
        cmd
    }

    /// Run one phase; `Ok(Some(_))` carries a tolerated diagnostic
    async fn run_phase(&self, phase: RestorePhase, backup: &Path) -> Result<Option<PhaseWarning>> {
        debug!(%phase, database = %self.config.name, "running restore phase");

        let output = self
            .command(phase, backup)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DatabaseError::ToolNotFound(phase.tool().to_string()),
                _ => DatabaseError::ToolLaunchFailed {
                    tool: phase.tool().to_string(),
                    reason: e.to_string(),
                },
            })?;

        if output.status.success() {
            info!(%phase, database = %self.config.name, "restore phase completed");
            return Ok(None);
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let diagnostic = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };

        if self.benign.is_benign(&diagnostic) {
            warn!(
                %phase,
                status = ?output.status.code(),
                diagnostic = %diagnostic,
                "restore phase reported ignored errors, continuing"
            );
            return Ok(Some(PhaseWarning {
                phase,
                status: output.status.code(),
                diagnostic,
            }));
        }

        error!(
            %phase,
            status = ?output.status.code(),
            diagnostic = %diagnostic,
            "restore phase failed"
        );
        Err(DatabaseError::RestoreFailed {
            phase: phase.tool().to_string(),
            status: output.status.code().unwrap_or(-1),
            stderr: diagnostic,
        }
        .into())
    }
}

#[async_trait]
impl DatabaseRestorer for PgRestorer {
    async fn ensure_running(&self) -> bool {
        crate::db::probe(&self.config).await
    }

    async fn restore(&self, backup: &Path) -> Result<RestoreReport> {
        info!(database = %self.config.name, backup = ?backup, "restoring database");

        let mut report = RestoreReport::default();
        for phase in RestorePhase::ORDER {
            let warning = self.run_phase(phase, backup).await?;
            report.record(phase, warning);
        }

        info!(
            database = %self.config.name,
            warnings = report.warnings().len(),
            "database restore completed"
        );
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "pg-client-tools"
    }
}
