use crate::services::{session::DEFAULT_LIST_TIMEOUT, transfer_service::DEFAULT_UPLOAD_CONCURRENCY};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_SETTINGS_PATH: &str = "./data/settings.json";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub settings_path: PathBuf,
    /// Overrides the stored `parUrl` for this run only.
    pub par_url: Option<String>,
    pub upload_concurrency: usize,
    pub request_timeout: Duration,
    pub list_timeout: Duration,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Browse and manage a bucket through a pre-authenticated request URL")]
pub struct Args {
    /// Settings file (overrides PAR_MANAGER_SETTINGS)
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Capability URL for this run (overrides PAR_MANAGER_URL and the stored one)
    #[arg(long, global = true)]
    pub par_url: Option<String>,

    /// Uploads in flight at once (overrides PAR_MANAGER_UPLOAD_CONCURRENCY)
    #[arg(long, global = true)]
    pub upload_concurrency: Option<usize>,

    /// Per-request timeout in seconds (overrides PAR_MANAGER_REQUEST_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub request_timeout_secs: Option<u64>,

    /// How long to wait for a listing in seconds (overrides PAR_MANAGER_LIST_TIMEOUT_SECS)
    #[arg(long, global = true)]
    pub list_timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List a folder
    Ls {
        /// Folder to list (defaults to the last one used)
        path: Option<String>,
        /// Include soft-deleted files
        #[arg(long)]
        show_deleted: bool,
    },
    /// Upload local files
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Destination folder (defaults to the last one used)
        #[arg(long)]
        to: Option<String>,
    },
    /// Download an object by key
    Download {
        key: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Create a folder placeholder
    Mkdir {
        name: String,
        /// Parent folder (defaults to the last one used)
        #[arg(long = "in")]
        parent: Option<String>,
    },
    /// Soft-delete an object
    Rm {
        key: String,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Undo a soft delete
    Restore { key: String },
    /// Fetch a remote URL and upload it
    Import {
        url: String,
        #[arg(long)]
        to: Option<String>,
    },
    /// Print every known folder
    Folders,
    /// Read or change stored settings
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Check settings and connectivity
    Check,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Store a new capability URL
    SetUrl { url: String },
    /// Print the stored settings
    Show,
}

fn env_number<T>(name: &str, value: Result<String, env::VarError>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        Self::merge(args, |name| env::var(name))
    }

    /// Merge `args` over whatever `lookup` reports for each variable.
    pub fn merge<F>(args: Args, lookup: F) -> Result<(Self, Command)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_settings = lookup("PAR_MANAGER_SETTINGS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_PATH));
        let env_url = lookup("PAR_MANAGER_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());
        let env_concurrency = env_number(
            "PAR_MANAGER_UPLOAD_CONCURRENCY",
            lookup("PAR_MANAGER_UPLOAD_CONCURRENCY"),
            DEFAULT_UPLOAD_CONCURRENCY,
        )?;
        let env_request_timeout = env_number(
            "PAR_MANAGER_REQUEST_TIMEOUT_SECS",
            lookup("PAR_MANAGER_REQUEST_TIMEOUT_SECS"),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?;
        let env_list_timeout = env_number(
            "PAR_MANAGER_LIST_TIMEOUT_SECS",
            lookup("PAR_MANAGER_LIST_TIMEOUT_SECS"),
            DEFAULT_LIST_TIMEOUT.as_secs(),
        )?;

        // --- Merge ---
        let cfg = Self {
            settings_path: args.settings.unwrap_or(env_settings),
            par_url: args.par_url.or(env_url),
            upload_concurrency: args.upload_concurrency.unwrap_or(env_concurrency).max(1),
            request_timeout: Duration::from_secs(
                args.request_timeout_secs.unwrap_or(env_request_timeout),
            ),
            list_timeout: Duration::from_secs(args.list_timeout_secs.unwrap_or(env_list_timeout)),
        };

        Ok((cfg, args.command))
    }
}
