//! # CLI Module
//!
//! Command-line interface for CaseClerk.
//!
//! Commands:
//! - `serve`: run the HTTP API
//! - `init`: create a snapshot (seeded with demo data unless `--empty`)
//! - `status`: record counts per collection
//! - `export`: write a snapshot as JSON or binary
//! - `import`: replace a snapshot with a JSON export
//!
//! Snapshots live either in a single file (`file` backend, binary format
//! from `caseclerk_core::formats`) or in a redb database (`redb` backend).

use caseclerk_core::credentials::PasswordHasher;
use caseclerk_core::formats::{
    decode_database, decode_snapshot, encode_database, encode_snapshot, snapshot_from_json,
    snapshot_to_json,
};
use caseclerk_core::seed::seed_demo_data;
use caseclerk_core::storage::RedbStore;
use caseclerk_core::{CoreError, Database, DatabaseCounts};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::api::config::{DEV_JWT_SECRET, RateLimitConfig, ServerConfig};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown backend '{0}' (expected 'file' or 'redb')")]
    UnknownBackend(String),

    #[error("unknown format '{0}' (expected 'json' or 'snapshot')")]
    UnknownFormat(String),

    #[error("{} already exists (use --force to overwrite)", .0.display())]
    AlreadyExists(PathBuf),

    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("server error: {0}")]
    Server(String),
}

pub type CliResult<T> = Result<T, CliError>;

// =============================================================================
// ARGUMENTS
// =============================================================================

#[derive(Debug, Parser)]
#[command(name = "caseclerk", version, about = "Legal practice management server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve(ServeArgs),

    /// Create a new snapshot.
    Init {
        db: PathBuf,
        #[arg(long, default_value = "file")]
        backend: String,
        /// Overwrite an existing snapshot.
        #[arg(long)]
        force: bool,
        /// Skip the demo data.
        #[arg(long)]
        empty: bool,
    },

    /// Show record counts.
    Status {
        db: PathBuf,
        #[arg(long, default_value = "file")]
        backend: String,
        #[arg(long)]
        json: bool,
    },

    /// Export a snapshot.
    Export {
        db: PathBuf,
        output: PathBuf,
        #[arg(long, default_value = "file")]
        backend: String,
        /// `json` or `snapshot`.
        #[arg(long, default_value = "json")]
        format: String,
    },

    /// Replace a snapshot with a JSON export.
    Import {
        db: PathBuf,
        input: PathBuf,
        #[arg(long, default_value = "file")]
        backend: String,
    },
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    #[arg(long, env = "CASECLERK_HOST", default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    pub host: IpAddr,

    #[arg(long, env = "CASECLERK_PORT", default_value_t = 8080)]
    pub port: u16,

    /// HS256 signing secret, at least 16 bytes.
    #[arg(long, env = "CASECLERK_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    #[arg(long, env = "CASECLERK_ACCESS_TTL_SECS", default_value_t = 3600)]
    pub access_ttl_secs: u64,

    #[arg(long, env = "CASECLERK_REFRESH_TTL_SECS", default_value_t = 7 * 24 * 3600)]
    pub refresh_ttl_secs: u64,

    /// Snapshot loaded at startup and saved on shutdown.
    #[arg(long, env = "CASECLERK_DB")]
    pub db: Option<PathBuf>,

    #[arg(long, env = "CASECLERK_BACKEND", default_value = "file")]
    pub backend: String,

    /// Start without demo data.
    #[arg(long)]
    pub no_seed: bool,

    #[arg(long, env = "CASECLERK_CORS_ORIGIN", default_value = "http://localhost:3000")]
    pub cors_origin: String,

    /// Simulated latency of AI endpoints.
    #[arg(long, env = "CASECLERK_AI_LATENCY_MS", default_value_t = 800)]
    pub ai_latency_ms: u64,

    #[arg(long, env = "CASECLERK_RATE_LIMIT_REQUESTS", default_value_t = 100)]
    pub rate_limit_requests: u32,

    #[arg(long, env = "CASECLERK_RATE_LIMIT_WINDOW_SECS", default_value_t = 900)]
    pub rate_limit_window_secs: u64,

    #[arg(long, env = "CASECLERK_AUTH_RATE_LIMIT_REQUESTS", default_value_t = 10)]
    pub auth_rate_limit_requests: u32,
}

impl ServeArgs {
    pub fn into_config(self) -> CliResult<ServerConfig> {
        let snapshot = match self.db {
            Some(path) => Some((path, Backend::parse(&self.backend)?)),
            None => None,
        };
        let config = ServerConfig {
            host: self.host,
            port: self.port,
            jwt_secret: self.jwt_secret.unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            access_ttl: Duration::from_secs(self.access_ttl_secs),
            refresh_ttl: Duration::from_secs(self.refresh_ttl_secs),
            snapshot,
            seed: !self.no_seed,
            cors_origin: self.cors_origin,
            ai_latency: Duration::from_millis(self.ai_latency_ms),
            rate_limit: RateLimitConfig {
                requests: self.rate_limit_requests,
                window: Duration::from_secs(self.rate_limit_window_secs),
                auth_requests: self.auth_rate_limit_requests,
            },
            fast_password_hashing: false,
        };
        config.validate().map_err(CliError::Config)?;
        Ok(config)
    }
}

// =============================================================================
// BACKENDS
// =============================================================================

/// Where a snapshot is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    File,
    Redb,
}

impl Backend {
    pub fn parse(raw: &str) -> CliResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "redb" => Ok(Self::Redb),
            other => Err(CliError::UnknownBackend(other.to_string())),
        }
    }
}

/// Loads a snapshot, or returns an empty database when none exists yet.
pub fn load_or_create_database(path: &Path, backend: Backend) -> CliResult<Database> {
    if !path.exists() {
        tracing::info!(path = %path.display(), "no snapshot found, starting empty");
        return Ok(Database::new());
    }
    load_database(path, backend)
}

pub fn load_database(path: &Path, backend: Backend) -> CliResult<Database> {
    if !path.exists() {
        return Err(CliError::Missing(path.to_path_buf()));
    }
    let db = match backend {
        Backend::File => decode_database(&std::fs::read(path)?)?,
        Backend::Redb => RedbStore::open(path)?.load_database()?,
    };
    tracing::debug!(path = %path.display(), counts = ?db.counts(), "snapshot loaded");
    Ok(db)
}

pub fn save_database(path: &Path, backend: Backend, db: &Database) -> CliResult<()> {
    match backend {
        Backend::File => write_atomically(path, &encode_database(db)?)?,
        Backend::Redb => RedbStore::open(path)?.save_database(db)?,
    }
    tracing::debug!(path = %path.display(), "snapshot saved");
    Ok(())
}

/// Writes to a sibling temp file first so a crash never leaves half a snapshot.
fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}

// =============================================================================
// COMMANDS
// =============================================================================

pub fn cmd_init(db_path: &Path, backend: &str, force: bool, empty: bool) -> CliResult<()> {
    let backend = Backend::parse(backend)?;
    if db_path.exists() {
        if !force {
            return Err(CliError::AlreadyExists(db_path.to_path_buf()));
        }
        std::fs::remove_file(db_path)?;
    }
    let mut db = Database::new();
    if !empty {
        seed_demo_data(&mut db, &PasswordHasher::default(), Utc::now())?;
    }
    save_database(db_path, backend, &db)?;
    println!(
        "Initialized {} ({} cases, {} users)",
        db_path.display(),
        db.counts().cases,
        db.counts().users
    );
    Ok(())
}

pub fn cmd_status(db_path: &Path, backend: &str, json: bool) -> CliResult<DatabaseCounts> {
    let db = load_database(db_path, Backend::parse(backend)?)?;
    let counts = db.counts();
    if json {
        let out = serde_json::to_string_pretty(&counts).map_err(CoreError::from)?;
        println!("{}", out);
    } else {
        println!("Snapshot: {}", db_path.display());
        println!("  cases:           {}", counts.cases);
        println!("  documents:       {}", counts.documents);
        println!("  call logs:       {}", counts.call_logs);
        println!("  calendar events: {}", counts.calendar_events);
        println!("  users:           {}", counts.users);
    }
    Ok(counts)
}

pub fn cmd_export(db_path: &Path, backend: &str, output: &Path, format: &str) -> CliResult<()> {
    let db = load_database(db_path, Backend::parse(backend)?)?;
    let snapshot = db.snapshot();
    let bytes = match format.trim().to_ascii_lowercase().as_str() {
        "json" => snapshot_to_json(&snapshot)?.into_bytes(),
        "snapshot" | "binary" => encode_snapshot(&snapshot)?,
        other => return Err(CliError::UnknownFormat(other.to_string())),
    };
    std::fs::write(output, bytes)?;
    println!("Exported {} to {}", db_path.display(), output.display());
    Ok(())
}

/// Accepts a JSON export or a binary snapshot, detected by content.
pub fn cmd_import(db_path: &Path, backend: &str, input: &Path) -> CliResult<DatabaseCounts> {
    let backend = Backend::parse(backend)?;
    let bytes = std::fs::read(input)?;
    let snapshot = if bytes.starts_with(caseclerk_core::formats::SNAPSHOT_MAGIC) {
        decode_snapshot(&bytes)?
    } else {
        let text = String::from_utf8(bytes)
            .map_err(|_| CoreError::Format("import file is neither JSON nor a snapshot".into()))?;
        snapshot_from_json(&text)?
    };
    let db = Database::from_snapshot(snapshot)?;
    save_database(db_path, backend, &db)?;
    let counts = db.counts();
    println!(
        "Imported {} into {} ({} cases)",
        input.display(),
        db_path.display(),
        counts.cases
    );
    Ok(counts)
}

pub async fn cmd_serve(args: ServeArgs) -> CliResult<()> {
    let config = args.into_config()?;
    crate::api::serve(config)
        .await
        .map_err(|e| CliError::Server(e.to_string()))
}

/// Dispatches a parsed command line.
pub async fn run(cli: Cli) -> CliResult<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Init {
            db,
            backend,
            force,
            empty,
        } => cmd_init(&db, &backend, force, empty),
        Command::Status { db, backend, json } => cmd_status(&db, &backend, json).map(|_| ()),
        Command::Export {
            db,
            output,
            backend,
            format,
        } => cmd_export(&db, &backend, &output, &format),
        Command::Import { db, input, backend } => {
            cmd_import(&db, &backend, &input).map(|_| ())
        }
    }
}
