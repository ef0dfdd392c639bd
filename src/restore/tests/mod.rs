//! Restore tests against shell-script stand-ins for the PostgreSQL tools

#![allow(clippy::unwrap_used, clippy::expect_used)]
#![cfg(unix)]

use super::*;
use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Error};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

const CALL_LOG: &str = "calls.log";

/// Write an executable script that logs its invocation, prints `stderr` and exits with `code`
fn fake_tool(dir: &Path, name: &str, stderr: &str, code: i32) -> PathBuf {
    let path = dir.join(name);
    let log = dir.join(CALL_LOG);
    let script = format!(
        "#!/bin/sh\necho \"{name} PGPASSWORD=$PGPASSWORD $*\" >> '{log}'\nprintf '%s\\n' '{stderr}' >&2\nexit {code}\n",
        log = log.display(),
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn calls(dir: &Path) -> Vec<String> {
    std::fs::read_to_string(dir.join(CALL_LOG))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn db_config() -> DatabaseConfig {
    DatabaseConfig {
        host: "db.local".into(),
        port: 5433,
        name: "i5bu".into(),
        user: "pos".into(),
        password: "s3cret".into(),
        search_path: false,
        ..Default::default()
    }
}

struct Fixture {
    dir: TempDir,
    backup: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let backup = dir.path().join("backup_02012025-0705.i5bu");
        std::fs::write(&backup, b"PGDMP").unwrap();
        Self { dir, backup }
    }

    /// Restorer whose tools exit with the given `(stderr, code)` per phase
    fn restorer(&self, phases: [(&str, i32); 3], config: DatabaseConfig) -> PgRestorer {
        let dir = self.dir.path();
        let tools = PgTools {
            dropdb: fake_tool(dir, "dropdb", phases[0].0, phases[0].1),
            createdb: fake_tool(dir, "createdb", phases[1].0, phases[1].1),
            pg_restore: fake_tool(dir, "pg_restore", phases[2].0, phases[2].1),
        };
        let benign = BenignDiagnostics::from_patterns(&config.benign_restore_patterns).unwrap();
        PgRestorer::with_tools(config, tools, benign)
    }

    fn calls(&self) -> Vec<String> {
        calls(self.dir.path())
    }
}

#[tokio::test]
async fn restore_runs_phases_in_order() {
    let fx = Fixture::new();
    let restorer = fx.restorer([("", 0), ("", 0), ("", 0)], db_config());

    let report = restorer.restore(&fx.backup).await.unwrap();
    assert!(report.is_clean());
    assert_eq!(report.completed, RestorePhase::ORDER.to_vec());

    let calls = fx.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].starts_with("dropdb "));
    assert!(calls[1].starts_with("createdb "));
    assert!(calls[2].starts_with("pg_restore "));
}

#[tokio::test]
async fn restore_passes_connection_parameters_and_password() {
    let fx = Fixture::new();
    let restorer = fx.restorer([("", 0), ("", 0), ("", 0)], db_config());
    let report = restorer.restore(&fx.backup).await.unwrap();
    assert_eq!(report.completed.len(), 3);

    let calls = fx.calls();
    for call in &calls {
        assert!(call.contains("PGPASSWORD=s3cret"), "{call}");
        assert!(call.contains("-h db.local -p 5433 -U pos"), "{call}");
    }
    assert!(calls[0].contains("--if-exists"));
    assert!(calls[0].ends_with(" i5bu"));
    assert!(calls[1].ends_with(" i5bu"));
    assert!(calls[2].contains("-d i5bu --no-owner --no-privileges --disable-triggers"));
    assert!(calls[2].ends_with(&fx.backup.display().to_string()));
}

#[tokio::test]
async fn ignored_errors_on_restore_continue_with_warning() {
    let fx = Fixture::new();
    let restorer = fx.restorer(
        [
            ("", 0),
            ("", 0),
            ("pg_restore: warning: errors ignored on restore: 2", 1),
        ],
        db_config(),
    );

    let report = restorer.restore(&fx.backup).await.unwrap();
    assert!(!report.is_clean());
    assert_eq!(report.completed.len(), 3);

    let warning = &report.warnings()[0];
    assert_eq!(warning.phase, RestorePhase::Restore);
    assert_eq!(warning.status, Some(1));
    assert!(warning.diagnostic.contains("errors ignored on restore"));
}

#[tokio::test]
async fn fatal_phase_stops_the_sequence() {
    let fx = Fixture::new();
    let restorer = fx.restorer(
        [
            ("", 0),
            ("createdb: error: permission denied to create database", 1),
            ("", 0),
        ],
        db_config(),
    );

    match restorer.restore(&fx.backup).await {
        Err(Error::Database(DatabaseError::RestoreFailed {
            phase,
            status,
            stderr,
        })) => {
            assert_eq!(phase, "createdb");
            assert_eq!(status, 1);
            assert!(stderr.contains("permission denied"));
        }
        other => panic!("expected RestoreFailed, got {other:?}"),
    }

    let calls = fx.calls();
    assert_eq!(calls.len(), 2, "pg_restore must not run after a fatal phase");
}

#[tokio::test]
async fn fatal_pg_restore_is_an_error() {
    let fx = Fixture::new();
    let restorer = fx.restorer(
        [
            ("", 0),
            ("", 0),
            ("pg_restore: error: input file does not appear to be a valid archive", 1),
        ],
        db_config(),
    );

    let err = restorer.restore(&fx.backup).await.unwrap_err();
    assert_eq!(err.error_code(), "restore_failed");
}

#[tokio::test]
async fn configured_patterns_replace_the_default() {
    let fx = Fixture::new();
    let config = DatabaseConfig {
        benign_restore_patterns: vec!["already exists".into()],
        ..db_config()
    };
    let restorer = fx.restorer(
        [
            ("", 0),
            ("createdb: error: database \"i5bu\" already exists", 1),
            ("pg_restore: warning: errors ignored on restore: 1", 1),
        ],
        config,
    );

    let err = restorer.restore(&fx.backup).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Database(DatabaseError::RestoreFailed { ref phase, .. }) if phase == "pg_restore"
    ));
}

#[tokio::test]
async fn configured_tool_that_does_not_exist_is_a_database_error() {
    let fx = Fixture::new();
    let missing = fx.dir.path().join("no-such-dir");
    let tools = PgTools {
        dropdb: missing.join("dropdb"),
        createdb: missing.join("createdb"),
        pg_restore: missing.join("pg_restore"),
    };
    let restorer = PgRestorer::with_tools(db_config(), tools, BenignDiagnostics::default());

    let err = restorer.restore(&fx.backup).await.unwrap_err();
    assert_eq!(err.error_code(), "tool_not_found");
    match err {
        Error::Database(DatabaseError::ToolNotFound(tool)) => assert_eq!(tool, "dropdb"),
        other => panic!("expected ToolNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn tool_that_cannot_be_started_names_the_tool() {
    let fx = Fixture::new();
    let dir = fx.dir.path();
    let not_executable = dir.join("pg_restore");
    std::fs::write(&not_executable, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&not_executable, std::fs::Permissions::from_mode(0o644)).unwrap();
    let tools = PgTools {
        dropdb: fake_tool(dir, "dropdb", "", 0),
        createdb: fake_tool(dir, "createdb", "", 0),
        pg_restore: not_executable,
    };
    let restorer = PgRestorer::with_tools(db_config(), tools, BenignDiagnostics::default());

    match restorer.restore(&fx.backup).await {
        Err(Error::Database(DatabaseError::ToolLaunchFailed { tool, .. })) => {
            assert_eq!(tool, "pg_restore");
        }
        other => panic!("expected ToolLaunchFailed, got {other:?}"),
    }
    assert_eq!(fx.calls().len(), 2);
}

#[test]
fn resolve_prefers_configured_paths() {
    let config = DatabaseConfig {
        dropdb_path: Some("/opt/pg/bin/dropdb".into()),
        createdb_path: Some("/opt/pg/bin/createdb".into()),
        pg_restore_path: Some("/opt/pg/bin/pg_restore".into()),
        ..db_config()
    };
    let tools = PgTools::resolve(&config).unwrap();
    assert_eq!(tools.pg_restore, PathBuf::from("/opt/pg/bin/pg_restore"));
}

#[test]
fn resolve_without_path_search_names_missing_tool() {
    let config = DatabaseConfig {
        dropdb_path: Some("/opt/pg/bin/dropdb".into()),
        ..db_config()
    };
    match PgTools::resolve(&config) {
        Err(Error::Database(DatabaseError::ToolNotFound(tool))) => assert_eq!(tool, "createdb"),
        other => panic!("expected ToolNotFound, got {other:?}"),
    }
}

#[test]
fn restorer_rejects_invalid_patterns() {
    let config = DatabaseConfig {
        dropdb_path: Some("/bin/true".into()),
        createdb_path: Some("/bin/true".into()),
        pg_restore_path: Some("/bin/true".into()),
        benign_restore_patterns: vec!["[".into()],
        ..db_config()
    };
    assert!(matches!(
        PgRestorer::new(config),
        Err(Error::Config { .. })
    ));
}

#[tokio::test]
async fn ensure_running_is_false_when_server_is_down() {
    let fx = Fixture::new();
    let config = DatabaseConfig {
        host: "127.0.0.1".into(),
        port: 1,
        connect_timeout: Duration::from_secs(2),
        ..db_config()
    };
    let restorer = fx.restorer([("", 0), ("", 0), ("", 0)], config);

    assert!(!restorer.ensure_running().await);
    assert!(fx.calls().is_empty());
}
