use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};

/// Command-line arguments for the verso binary.
#[derive(Debug, Parser)]
#[command(name = "verso", version, about = "Version-controlled content server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "VERSO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve the site over HTTP.
    Serve(Box<ServeArgs>),
    /// Load content, templates and every database once, then exit.
    Check(CheckArgs),
    /// Print a password in the credential database format.
    #[command(name = "encode-password")]
    EncodePassword(EncodePasswordArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverride {
    /// Override the content working copy directory.
    #[arg(long = "content-directory", value_name = "PATH")]
    pub content_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverride,

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

    /// Override the site mode (author|publish).
    #[arg(long = "site-mode", value_name = "MODE")]
    pub site_mode: Option<String>,

    /// Override the timeout applied to version control commands.
    #[arg(long = "vcs-timeout-seconds", value_name = "SECONDS")]
    pub vcs_timeout_seconds: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub content: ContentOverride,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PasswordScheme {
    /// Salted SHA-256 digest.
    Sha256,
    /// Reversible base64 encoding understood by older databases.
    Base64,
}

#[derive(Debug, Args, Clone)]
pub struct EncodePasswordArgs {
    /// Storage scheme for the encoded password.
    #[arg(long, value_enum, default_value_t = PasswordScheme::Sha256)]
    pub scheme: PasswordScheme,

    /// Cleartext password; read from standard input when omitted.
    #[arg(value_name = "PASSWORD")]
    pub password: Option<String>,
}
