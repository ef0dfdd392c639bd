//! Command-line interface.
//!
//! Every setting can be given as an argument or through the environment
//! (a `.env` file in the working directory is loaded first):
//!
//! ```bash
//! DROPBOX_APP_KEY=... DROPBOX_APP_SECRET=... DROPBOX_REFRESH_TOKEN=... \
//!     pricelist-sync sync
//!
//! pricelist-sync lookup gula pasir
//! pricelist-sync cleanup --keep 3
//! ```

use std::path::PathBuf;
use std::process;

use clap::{Args, Parser, Subcommand};
use pricelist_sync::Config;
use pricelist_sync::catalog::PriceRow;
use pricelist_sync::config::{DatabaseConfig, PathsConfig, StoreConfig};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "pricelist-sync")]
#[command(about = "Sync the point-of-sale price list from nightly database backups")]
#[command(version)]
pub struct Cli {
    /// Remote artifact store credentials.
    #[clap(flatten)]
    pub store: StoreArgs,

    /// Database connection.
    #[clap(flatten)]
    pub database: DatabaseArgs,

    /// Directory holding `backups/` and `exports/`.
    #[arg(long, env = "DATA_DIR", default_value = "./data", global = true)]
    pub data_dir: PathBuf,

    /// Number of exports kept after each run.
    #[arg(long, env = "MAX_CSV_FILES", default_value_t = 5, global = true)]
    pub max_csv_files: usize,

    /// Maximum matches printed by `lookup`.
    #[arg(long, env = "SEARCH_RESULTS_LIMIT", default_value_t = 10, global = true)]
    pub search_results_limit: usize,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the sync pipeline once.
    Sync,

    /// Search the latest published export by item name.
    Lookup {
        /// Keyword (several words are joined with spaces).
        #[arg(required = true, num_args = 1..)]
        keyword: Vec<String>,
    },

    /// Prune old exports without running the pipeline.
    Cleanup {
        /// Number of exports to keep (default: MAX_CSV_FILES).
        #[arg(long)]
        keep: Option<usize>,
    },
}

/// Dropbox credentials and folder.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Dropbox app key.
    #[arg(long, env = "DROPBOX_APP_KEY", default_value = "", hide_env_values = true, global = true)]
    pub dropbox_app_key: String,

    /// Dropbox app secret.
    #[arg(long, env = "DROPBOX_APP_SECRET", default_value = "", hide_env_values = true, global = true)]
    pub dropbox_app_secret: String,

    /// Long-lived Dropbox refresh token.
    #[arg(long, env = "DROPBOX_REFRESH_TOKEN", default_value = "", hide_env_values = true, global = true)]
    pub dropbox_refresh_token: String,

    /// Dropbox folder holding the backups.
    #[arg(long, env = "DROPBOX_FOLDER_PATH", default_value = "/IPOS", global = true)]
    pub dropbox_folder_path: String,
}

/// PostgreSQL connection.
#[derive(Debug, Clone, Args)]
pub struct DatabaseArgs {
    /// Database host.
    #[arg(long, env = "DB_HOST", default_value = "localhost", global = true)]
    pub db_host: String,

    /// Database port.
    #[arg(long, env = "DB_PORT", default_value_t = 5432, global = true)]
    pub db_port: u16,

    /// Database restored from the backup (dropped on every run).
    #[arg(long, env = "DB_NAME", default_value = "i5bu", global = true)]
    pub db_name: String,

    /// Database user.
    #[arg(long, env = "DB_USER", default_value = "postgres", global = true)]
    pub db_user: String,

    /// Database password.
    #[arg(long, env = "DB_PASSWORD", default_value = "postgres", hide_env_values = true, global = true)]
    pub db_password: String,
}

impl Cli {
    /// Loads `.env` and parses arguments.
    ///
    /// `.env` must be loaded before clap runs so its values act as `env` defaults.
    pub fn init() -> Self {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
        Self::parse()
    }

    /// Initializes tracing with environment-based filtering.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Logs build information at debug level.
    pub fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            "build information"
        );
    }

    /// Builds the library configuration.
    pub fn to_config(&self) -> Config {
        Config {
            store: StoreConfig {
                app_key: self.store.dropbox_app_key.clone(),
                app_secret: self.store.dropbox_app_secret.clone(),
                refresh_token: self.store.dropbox_refresh_token.clone(),
                folder_path: self.store.dropbox_folder_path.clone(),
                ..Default::default()
            },
            database: DatabaseConfig {
                host: self.database.db_host.clone(),
                port: self.database.db_port,
                name: self.database.db_name.clone(),
                user: self.database.db_user.clone(),
                password: self.database.db_password.clone(),
                ..Default::default()
            },
            paths: PathsConfig::under(&self.data_dir),
            max_csv_files: self.max_csv_files,
            search_results_limit: self.search_results_limit,
        }
    }

    /// Number of exports a `cleanup` run keeps: `--keep`, else `MAX_CSV_FILES`.
    pub fn retention_keep(&self, keep: Option<usize>) -> anyhow::Result<usize> {
        match keep {
            Some(0) => anyhow::bail!("--keep must be at least 1"),
            Some(keep) => Ok(keep),
            None if self.max_csv_files == 0 => anyhow::bail!("MAX_CSV_FILES must be at least 1"),
            None => Ok(self.max_csv_files),
        }
    }

    /// Logs configuration (no secrets).
    pub fn log_config(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            folder = %self.store.dropbox_folder_path,
            db_host = %self.database.db_host,
            db_port = self.database.db_port,
            db_name = %self.database.db_name,
            data_dir = ?self.data_dir,
            max_csv_files = self.max_csv_files,
            "configuration"
        );
    }
}

/// One lookup result line.
pub fn format_row(row: &PriceRow) -> String {
    format!(
        "{} | {} x {} | pokok {} | jual {}",
        row.namaitem,
        row.konversi,
        row.satuan,
        format_rupiah(row.hargapokok),
        format_rupiah(row.hargajual),
    )
}

/// Formats a price as whole rupiah with thousands separators, `-` when absent.
pub fn format_rupiah(amount: Option<f64>) -> String {
    let Some(amount) = amount else {
        return "-".to_string();
    };
    let rounded = amount.round();
    let digits = format!("{:.0}", rounded.abs());

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if rounded < 0.0 {
        format!("-Rp{grouped}")
    } else {
        format!("Rp{grouped}")
    }
}
