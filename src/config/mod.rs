//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, ContentOverrides, ImportArgs, ServeArgs, ServeOverrides};

use std::{fmt, net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::DEFAULT_THEME;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "archive";
const ENV_PREFIX: &str = "ARCHIVE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 12600;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CONTENT_DIRECTORY: &str = "posts";
const DEFAULT_DATABASE_REFRESH_SECS: u64 = 10;
const DEFAULT_LOCAL_REFRESH_SECS: u64 = 5;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_LIVE_CHANNEL_CAPACITY: u32 = 16;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub database: DatabaseSettings,
    pub live: LiveSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentBackend {
    Postgres,
    Filesystem,
    Memory,
}

impl ContentBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Filesystem => "filesystem",
            Self::Memory => "memory",
        }
    }

    fn default_refresh_secs(self) -> u64 {
        match self {
            Self::Postgres => DEFAULT_DATABASE_REFRESH_SECS,
            Self::Filesystem | Self::Memory => DEFAULT_LOCAL_REFRESH_SECS,
        }
    }
}

impl FromStr for ContentBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "database" => Ok(Self::Postgres),
            "filesystem" | "fs" => Ok(Self::Filesystem),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "unknown backend `{other}` (expected postgres, filesystem or memory)"
            )),
        }
    }
}

impl fmt::Display for ContentBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub backend: ContentBackend,
    pub directory: PathBuf,
    pub refresh_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct LiveSettings {
    pub channel_capacity: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub default_theme: String,
    pub warm_on_start: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Import(args)) => raw.apply_content_overrides(&args.content),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    database: RawDatabaseSettings,
    live: RawLiveSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(seconds) = overrides.refresh_interval_seconds {
            self.content.refresh_interval_seconds = Some(seconds);
        }
        if let Some(capacity) = overrides.live_channel_capacity {
            self.live.channel_capacity = Some(capacity);
        }
        if let Some(theme) = overrides.render_default_theme.as_ref() {
            self.render.default_theme = Some(theme.clone());
        }
        if let Some(warm) = overrides.render_warm_on_start {
            self.render.warm_on_start = Some(warm);
        }

        self.apply_content_overrides(&overrides.content);
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(backend) = overrides.backend.as_ref() {
            self.content.backend = Some(backend.clone());
        }
        if let Some(directory) = overrides.directory.as_ref() {
            self.content.directory = Some(directory.clone());
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            database,
            live,
            render,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let content = build_content_settings(content, &database)?;
        let live = build_live_settings(live)?;
        let render = build_render_settings(render)?;

        Ok(Self {
            server,
            logging,
            content,
            database,
            live,
            render,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.host", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(
    content: RawContentSettings,
    database: &DatabaseSettings,
) -> Result<ContentSettings, LoadError> {
    let backend = match content.backend {
        Some(value) => ContentBackend::from_str(&value)
            .map_err(|reason| LoadError::invalid("content.backend", reason))?,
        None => ContentBackend::Filesystem,
    };

    if backend == ContentBackend::Postgres && database.url.is_none() {
        return Err(LoadError::invalid(
            "database.url",
            "required when content.backend is postgres (set ARCHIVE__DATABASE__URL or --database-url)",
        ));
    }

    let directory = content
        .directory
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIRECTORY));

    let refresh_secs = content
        .refresh_interval_seconds
        .unwrap_or_else(|| backend.default_refresh_secs());
    if refresh_secs == 0 {
        return Err(LoadError::invalid(
            "content.refresh_interval_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ContentSettings {
        backend,
        directory,
        refresh_interval: Duration::from_secs(refresh_secs),
    })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_live_settings(live: RawLiveSettings) -> Result<LiveSettings, LoadError> {
    let channel_capacity = non_zero_u32(
        live.channel_capacity
            .unwrap_or(DEFAULT_LIVE_CHANNEL_CAPACITY)
            .into(),
        "live.channel_capacity",
    )?;
    Ok(LiveSettings { channel_capacity })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let default_theme = match render.default_theme {
        Some(theme) if theme.trim().is_empty() => {
            return Err(LoadError::invalid(
                "render.default_theme",
                "must not be empty",
            ));
        }
        Some(theme) => theme.trim().to_string(),
        None => DEFAULT_THEME.to_string(),
    };

    Ok(RenderSettings {
        default_theme,
        warm_on_start: render.warm_on_start.unwrap_or(false),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    backend: Option<String>,
    directory: Option<PathBuf>,
    refresh_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLiveSettings {
    channel_capacity: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    default_theme: Option<String>,
    warm_on_start: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
