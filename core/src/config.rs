//! Environment-driven configuration for both binaries.
//!
//! Every setting is read through a lookup function so the parsing can be
//! tested without touching the process environment. [`load_dotenv`] should
//! run first so a local `.env` file can supply values.

use crate::error::ConfigError;
use log::LevelFilter;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_ROW_COUNT: u64 = 1_000_000;
pub const DEFAULT_BUCKET_SIZE: u64 = 100_000;
pub const DEFAULT_PROGRESS_EVERY: u64 = 1_000;
pub const DEFAULT_DEADLINE_SECS: u64 = 300;
pub const DEFAULT_POOL_SIZE: u32 = 16;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 33070;
const DEFAULT_DB_USER: &str = "root";
const DEFAULT_DB_NAME: &str = "large_table";
const DEFAULT_DB_CHARSET: &str = "utf8mb4";
const DEFAULT_DB_TIME_ZONE: &str = "+00:00";
const DEFAULT_SQLITE_PATH: &str = "large_table.db";

/// Load `.env` from the working directory or its parents, if present.
///
/// Values already set in the environment win over the file.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// Lookup backed by the real process environment.
pub fn env_lookup(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn lookup_trimmed<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup_trimmed(lookup, key) {
        None => Ok(default),
        Some(raw) => raw.parse::<T>().map_err(|err| ConfigError::Invalid {
            key,
            value: raw,
            reason: err.to_string(),
        }),
    }
}

fn non_zero(key: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn parse_log_level(value: &str) -> Option<LevelFilter> {
    match value.to_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

/// Where the logger writes and how much.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub file: Option<String>,
}

impl LogSettings {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let level = lookup_trimmed(&lookup, "TABLE_LOG_LEVEL")
            .as_deref()
            .and_then(parse_log_level)
            .unwrap_or(LevelFilter::Info);
        let file = lookup_trimmed(&lookup, "TABLE_LOG_FILE")
            .filter(|value| !value.eq_ignore_ascii_case("none"));
        Self { level, file }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }
}

/// Connection parameters for a MySQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlTarget {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub charset: String,
    /// Session time zone applied when the server converts `DATETIME` values.
    pub time_zone: String,
}

impl Default for MySqlTarget {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            user: DEFAULT_DB_USER.to_string(),
            password: String::new(),
            database: DEFAULT_DB_NAME.to_string(),
            charset: DEFAULT_DB_CHARSET.to_string(),
            time_zone: DEFAULT_DB_TIME_ZONE.to_string(),
        }
    }
}

// Hand-written so the password never ends up in a log line.
impl fmt::Debug for MySqlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlTarget")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("time_zone", &self.time_zone)
            .finish()
    }
}

impl fmt::Display for MySqlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { ":***" };
        write!(
            f,
            "mysql://{}{}@{}:{}/{}?charset={}&time_zone={}",
            self.user, password, self.host, self.port, self.database, self.charset, self.time_zone
        )
    }
}

/// Which storage backend to open and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    MySql(MySqlTarget),
    /// A SQLite file, or `:memory:` for a private in-memory database.
    Sqlite { path: String },
    /// Process-local store with no persistence.
    Memory,
}

impl ConnectionTarget {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = lookup_trimmed(lookup, "TABLE_DB_BACKEND")
            .unwrap_or_else(|| "mysql".to_string())
            .to_lowercase();

        match backend.as_str() {
            "mysql" => {
                let defaults = MySqlTarget::default();
                Ok(Self::MySql(MySqlTarget {
                    host: lookup_trimmed(lookup, "TABLE_DB_HOST").unwrap_or(defaults.host),
                    port: parse_or(lookup, "TABLE_DB_PORT", defaults.port)?,
                    user: lookup_trimmed(lookup, "TABLE_DB_USER").unwrap_or(defaults.user),
                    // Passwords may legitimately carry surrounding spaces.
                    password: lookup("TABLE_DB_PASSWORD").unwrap_or(defaults.password),
                    database: lookup_trimmed(lookup, "TABLE_DB_NAME").unwrap_or(defaults.database),
                    charset: lookup_trimmed(lookup, "TABLE_DB_CHARSET").unwrap_or(defaults.charset),
                    time_zone: lookup_trimmed(lookup, "TABLE_DB_TIME_ZONE")
                        .unwrap_or(defaults.time_zone),
                }))
            }
            "sqlite" => Ok(Self::Sqlite {
                path: lookup_trimmed(lookup, "TABLE_SQLITE_PATH")
                    .unwrap_or_else(|| DEFAULT_SQLITE_PATH.to_string()),
            }),
            "memory" => Ok(Self::Memory),
            _ => Err(ConfigError::Invalid {
                key: "TABLE_DB_BACKEND",
                value: backend,
                reason: "expected one of mysql, sqlite, memory".to_string(),
            }),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MySql(target) => fmt::Display::fmt(target, f),
            Self::Sqlite { path } => write!(f, "sqlite://{path}"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Connection pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_POOL_SIZE,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolSettings {
    pub fn from_lookup<F>(lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_connections = parse_or(lookup, "TABLE_POOL_SIZE", DEFAULT_POOL_SIZE)?;
        non_zero("TABLE_POOL_SIZE", u64::from(max_connections))?;
        let acquire_secs = parse_or(
            lookup,
            "TABLE_ACQUIRE_TIMEOUT_SECS",
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;
        Ok(Self {
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_secs),
        })
    }
}

/// Settings for the fetch benchmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    /// `N`: rows expected in the table, and the bulk-fetch limit.
    pub row_count: u64,
    /// `B`: ids per partition.
    pub bucket_size: u64,
    /// Upper bound on the concurrent fetch's merge phase.
    pub deadline: Duration,
    /// How many times the full strategy sequence is repeated.
    pub rounds: u32,
    pub target: ConnectionTarget,
    pub pool: PoolSettings,
}

impl FetchConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let row_count = parse_or(&lookup, "TABLE_ROW_COUNT", DEFAULT_ROW_COUNT)?;
        let bucket_size = non_zero(
            "TABLE_BUCKET_SIZE",
            parse_or(&lookup, "TABLE_BUCKET_SIZE", DEFAULT_BUCKET_SIZE)?,
        )?;
        let deadline_secs = parse_or(&lookup, "TABLE_FETCH_DEADLINE_SECS", DEFAULT_DEADLINE_SECS)?;
        let rounds = parse_or(&lookup, "TABLE_BENCH_ROUNDS", 1u32)?;
        non_zero("TABLE_BENCH_ROUNDS", u64::from(rounds))?;

        Ok(Self {
            row_count,
            bucket_size,
            deadline: Duration::from_secs(deadline_secs),
            rounds,
            target: ConnectionTarget::from_lookup(&lookup)?,
            pool: PoolSettings::from_lookup(&lookup)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}

/// Settings for the table populator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateConfig {
    /// Number of placeholder rows to insert.
    pub row_count: u64,
    /// Print a progress line every this many rows; 0 disables progress.
    pub progress_every: u64,
    pub target: ConnectionTarget,
    pub pool: PoolSettings,
}

impl PopulateConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            row_count: parse_or(&lookup, "TABLE_ROW_COUNT", DEFAULT_ROW_COUNT)?,
            progress_every: parse_or(&lookup, "TABLE_PROGRESS_EVERY", DEFAULT_PROGRESS_EVERY)?,
            target: ConnectionTarget::from_lookup(&lookup)?,
            pool: PoolSettings::from_lookup(&lookup)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}
