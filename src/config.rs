//! Configuration types for pricelist-sync

use crate::error::{Error, Result};
use crate::restore::BenignDiagnostics;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Name of the hidden subdirectory of the export directory holding unvalidated exports
pub const STAGING_DIR_NAME: &str = ".staging";

/// Remote artifact store (Dropbox) settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// OAuth2 application key
    #[serde(default)]
    pub app_key: String,

    /// OAuth2 application secret
    #[serde(default)]
    pub app_secret: String,

    /// Long-lived refresh token exchanged for a bearer token on every call
    #[serde(default)]
    pub refresh_token: String,

    /// Remote folder holding the backup artifacts (default: "/IPOS")
    #[serde(default = "default_folder_path")]
    pub folder_path: String,

    /// File extension identifying backup artifacts, without the dot (default: "i5bu")
    #[serde(default = "default_backup_extension")]
    pub backup_extension: String,

    /// Base URL of the store API (default: "https://api.dropboxapi.com")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Timeout for token, listing and link calls (default: 30s)
    #[serde(with = "duration_serde", default = "default_metadata_timeout")]
    pub metadata_timeout: Duration,

    /// Timeout for the bulk artifact download (default: 300s)
    #[serde(with = "duration_serde", default = "default_download_timeout")]
    pub download_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            app_key: String::new(),
            app_secret: String::new(),
            refresh_token: String::new(),
            folder_path: default_folder_path(),
            backup_extension: default_backup_extension(),
            api_url: default_api_url(),
            metadata_timeout: default_metadata_timeout(),
            download_timeout: default_download_timeout(),
        }
    }
}

/// PostgreSQL connection and restore tooling settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Server hostname (default: "localhost")
    #[serde(default = "default_db_host")]
    pub host: String,

    /// Server port (default: 5432)
    #[serde(default = "default_db_port")]
    pub port: u16,

    /// Target database that is dropped and restored on every run (default: "i5bu")
    #[serde(default = "default_db_name")]
    pub name: String,

    /// Role used for probing, restoring and querying (default: "postgres")
    #[serde(default = "default_db_user")]
    pub user: String,

    /// Password for `user` (default: "postgres")
    #[serde(default = "default_db_password")]
    pub password: String,

    /// Database used for the readiness probe, which must exist before the target does
    #[serde(default = "default_maintenance_db")]
    pub maintenance_db: String,

    /// Readiness probe timeout (default: 5s)
    #[serde(with = "duration_serde", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Path to dropdb executable (auto-detected if None)
    #[serde(default)]
    pub dropdb_path: Option<PathBuf>,

    /// Path to createdb executable (auto-detected if None)
    #[serde(default)]
    pub createdb_path: Option<PathBuf>,

    /// Path to pg_restore executable (auto-detected if None)
    #[serde(default)]
    pub pg_restore_path: Option<PathBuf>,

    /// Whether to search PATH for the tools if explicit paths are not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Regular expressions matching restore diagnostics that are tolerated on non-zero exit
    ///
    /// Matched case-insensitively against the tool's stderr. The default
    /// recognizes pg_restore's "errors ignored on restore" summary.
    #[serde(default = "default_benign_restore_patterns")]
    pub benign_restore_patterns: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            name: default_db_name(),
            user: default_db_user(),
            password: default_db_password(),
            maintenance_db: default_maintenance_db(),
            connect_timeout: default_connect_timeout(),
            dropdb_path: None,
            createdb_path: None,
            pg_restore_path: None,
            search_path: true,
            benign_restore_patterns: default_benign_restore_patterns(),
        }
    }
}

/// Local storage locations
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where downloaded backups are kept (default: "./data/backups")
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,

    /// Where published exports live and the frontend reads from (default: "./data/exports")
    #[serde(default = "default_exports_dir")]
    pub exports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            backups_dir: default_backups_dir(),
            exports_dir: default_exports_dir(),
        }
    }
}

impl PathsConfig {
    /// Build paths rooted at a single data directory (`<data_dir>/backups`, `<data_dir>/exports`)
    pub fn under(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            backups_dir: data_dir.join("backups"),
            exports_dir: data_dir.join("exports"),
        }
    }

    /// Directory holding exports that have not passed validation yet
    pub fn staging_dir(&self) -> PathBuf {
        self.exports_dir.join(STAGING_DIR_NAME)
    }
}

/// Main configuration for the sync pipeline
///
/// Fields are organized into logical sub-configs:
/// - [`store`](StoreConfig): remote artifact store credentials and timeouts
/// - [`database`](DatabaseConfig): connection descriptor and restore tooling
/// - [`paths`](PathsConfig): local backup and export directories
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Remote artifact store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Local directories
    #[serde(default)]
    pub paths: PathsConfig,

    /// Number of exports kept by the retention manager (default: 5)
    #[serde(default = "default_max_csv_files")]
    pub max_csv_files: usize,

    /// Maximum matches returned by a catalog lookup (default: 10)
    #[serde(default = "default_search_results_limit")]
    pub search_results_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            database: DatabaseConfig::default(),
            paths: PathsConfig::default(),
            max_csv_files: default_max_csv_files(),
            search_results_limit: default_search_results_limit(),
        }
    }
}

impl Config {
    /// Check required settings before any stage runs
    ///
    /// Returns [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        let required = [
            (&self.store.app_key, "DROPBOX_APP_KEY"),
            (&self.store.app_secret, "DROPBOX_APP_SECRET"),
            (&self.store.refresh_token, "DROPBOX_REFRESH_TOKEN"),
            (&self.store.folder_path, "DROPBOX_FOLDER_PATH"),
            (&self.database.host, "DB_HOST"),
            (&self.database.name, "DB_NAME"),
            (&self.database.user, "DB_USER"),
        ];
        for (value, key) in required {
            if value.trim().is_empty() {
                return Err(Error::config(format!("{key} must be set"), key));
            }
        }

        if self.store.backup_extension.trim_start_matches('.').is_empty() {
            return Err(Error::config(
                "backup extension must not be empty",
                "backup_extension",
            ));
        }

        if url::Url::parse(&self.store.api_url).is_err() {
            return Err(Error::config(
                format!("invalid store API URL: {}", self.store.api_url),
                "api_url",
            ));
        }

        if self.database.port == 0 {
            return Err(Error::config("DB_PORT must be non-zero", "DB_PORT"));
        }

        if self.database.name == self.database.maintenance_db {
            return Err(Error::config(
                "DB_NAME must differ from the maintenance database, which is never dropped",
                "DB_NAME",
            ));
        }

        if self.max_csv_files == 0 {
            return Err(Error::config(
                "MAX_CSV_FILES must be at least 1",
                "MAX_CSV_FILES",
            ));
        }

        if self.search_results_limit == 0 {
            return Err(Error::config(
                "SEARCH_RESULTS_LIMIT must be at least 1",
                "SEARCH_RESULTS_LIMIT",
            ));
        }

        if self.paths.backups_dir == self.paths.exports_dir {
            return Err(Error::config(
                "backup and export directories must differ",
                "DATA_DIR",
            ));
        }

        BenignDiagnostics::from_patterns(&self.database.benign_restore_patterns)?;

        Ok(())
    }
}

fn default_folder_path() -> String {
    "/IPOS".to_string()
}

fn default_backup_extension() -> String {
    "i5bu".to_string()
}

fn default_api_url() -> String {
    "https://api.dropboxapi.com".to_string()
}

fn default_metadata_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_download_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_db_host() -> String {
    "localhost".to_string()
}

fn default_db_port() -> u16 {
    5432
}

fn default_db_name() -> String {
    "i5bu".to_string()
}

fn default_db_user() -> String {
    "postgres".to_string()
}

fn default_db_password() -> String {
    "postgres".to_string()
}

fn default_maintenance_db() -> String {
    "postgres".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_true() -> bool {
    true
}

fn default_benign_restore_patterns() -> Vec<String> {
    vec!["errors ignored on restore".to_string()]
}

fn default_backups_dir() -> PathBuf {
    PathBuf::from("./data/backups")
}

fn default_exports_dir() -> PathBuf {
    PathBuf::from("./data/exports")
}

fn default_max_csv_files() -> usize {
    5
}

fn default_search_results_limit() -> usize {
    10
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
