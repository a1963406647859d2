use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the archive binary.
#[derive(Debug, Parser)]
#[command(name = "the-archive", version, about = "Markdown archive server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "ARCHIVE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve posts over HTTP and keep the snapshot in sync with the store.
    Serve(Box<ServeArgs>),
    /// Copy a directory of markdown files into the configured store.
    Import(ImportArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the content backend (postgres|filesystem|memory).
    #[arg(long = "content-backend", value_name = "BACKEND")]
    pub backend: Option<String>,

    /// Override the directory read by the filesystem backend.
    #[arg(long = "content-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub directory: Option<PathBuf>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override how often the store is polled for changes.
    #[arg(long = "content-refresh-interval-seconds", value_name = "SECONDS")]
    pub refresh_interval_seconds: Option<u64>,

    /// Override the per-subscriber live channel buffer.
    #[arg(long = "live-channel-capacity", value_name = "COUNT")]
    pub live_channel_capacity: Option<u32>,

    /// Override the syntax theme used when a request names none.
    #[arg(long = "render-default-theme", value_name = "THEME")]
    pub render_default_theme: Option<String>,

    /// Pre-render every post once the first snapshot is loaded.
    #[arg(
        long = "render-warm-on-start",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub render_warm_on_start: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Owner recorded on every imported post.
    #[arg(long = "owner", value_name = "ID")]
    pub owner: String,

    /// Directory whose `*.md` files are imported (not recursive).
    #[arg(id = "import_directory", value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub directory: PathBuf,
}
