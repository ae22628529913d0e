//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{
    CheckArgs, CliArgs, Command, ContentOverride, EncodePasswordArgs, PasswordScheme, ServeArgs,
    ServeOverrides,
};

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "verso";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CONTENT_DIR: &str = "content";
const DEFAULT_PAGES_DIR: &str = "pages";
const DEFAULT_TEMPLATES_DIR: &str = "templates";
const DEFAULT_ASSETS_PREFIX: &str = "/assets";
const DEFAULT_GENERIC_TYPES: &[&str] = &["page"];
const DEFAULT_PUBLIC_KEY_PATH: &str = "config/key.pub";
const DEFAULT_PRIVATE_KEY_PATH: &str = "config/key.pem";
const DEFAULT_USER_DB_PATH: &str = "content/config/users.json";
const DEFAULT_ACL_DB_PATH: &str = "content/config/acl.json";
const DEFAULT_CACHE_POLICY_PATH: &str = "content/config/cache.json";
const DEFAULT_VCS_PROGRAM: &str = "git";
const DEFAULT_VCS_TIMEOUT_SECS: u64 = 120;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub content: ContentSettings,
    pub security: SecuritySettings,
    pub cache: CacheSettings,
    pub vcs: VcsSettings,
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

/// How the site is run.
///
/// Authoring renders every request from disk and caches nothing; publishing
/// keeps templates in memory and caches rendered pages until the next checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteMode {
    Author,
    Publish,
}

impl SiteMode {
    pub fn is_author(self) -> bool {
        matches!(self, SiteMode::Author)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SiteMode::Author => "author",
            SiteMode::Publish => "publish",
        }
    }
}

impl FromStr for SiteMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "author" => Ok(SiteMode::Author),
            "publish" => Ok(SiteMode::Publish),
            other => Err(format!("unknown site mode `{other}`, expected author or publish")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub mode: SiteMode,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    /// Root of the working copy.
    pub directory: PathBuf,
    /// Page files, resolved against `directory`.
    pub pages_dir: PathBuf,
    /// Templates, resolved against `directory`.
    pub templates_dir: PathBuf,
    /// URL prefix under which files in `directory` are served verbatim.
    pub assets_prefix: String,
    /// Content types decoded as untyped JSON payloads.
    pub generic_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    pub public_key_path: PathBuf,
    pub private_key_path: PathBuf,
    pub user_db_path: PathBuf,
    pub acl_db_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Whitelist/blacklist file. `None` caches nothing even when publishing.
    pub policy_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct VcsSettings {
    pub program: PathBuf,
    pub timeout: Duration,
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

    builder = builder.add_source(Environment::with_prefix("VERSO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Check(args)) => raw.apply_content_override(&args.content),
        Some(Command::EncodePassword(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    content: RawContentSettings,
    security: RawSecuritySettings,
    cache: RawCacheSettings,
    vcs: RawVcsSettings,
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
        if let Some(mode) = overrides.site_mode.as_ref() {
            self.site.mode = Some(mode.clone());
        }
        if let Some(seconds) = overrides.vcs_timeout_seconds {
            self.vcs.timeout_seconds = Some(seconds);
        }

        self.apply_content_override(&overrides.content);
    }

    fn apply_content_override(&mut self, overrides: &ContentOverride) {
        if let Some(directory) = overrides.content_directory.as_ref() {
            self.content.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            content,
            security,
            cache,
            vcs,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let site = build_site_settings(site)?;
        let content = build_content_settings(content)?;
        let security = build_security_settings(security)?;
        let cache = build_cache_settings(cache);
        let vcs = build_vcs_settings(vcs)?;

        Ok(Self {
            server,
            logging,
            site,
            content,
            security,
            cache,
            vcs,
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
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

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

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let mode = match site.mode {
        Some(mode) => SiteMode::from_str(&mode).map_err(|reason| LoadError::invalid("site.mode", reason))?,
        None => SiteMode::Author,
    };
    Ok(SiteSettings { mode })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let directory = content
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "content.directory",
            "path must not be empty",
        ));
    }

    let pages_dir = directory.join(
        content
            .pages_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_PAGES_DIR)),
    );
    let templates_dir = directory.join(
        content
            .templates_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATES_DIR)),
    );

    let assets_prefix = content
        .assets_prefix
        .unwrap_or_else(|| DEFAULT_ASSETS_PREFIX.to_string());
    let assets_prefix = format!("/{}", assets_prefix.trim_matches('/'));
    if assets_prefix == "/" {
        return Err(LoadError::invalid(
            "content.assets_prefix",
            "prefix must name a path below the site root",
        ));
    }

    let generic_types = content.generic_types.unwrap_or_else(|| {
        DEFAULT_GENERIC_TYPES
            .iter()
            .map(|tag| tag.to_string())
            .collect()
    });
    if generic_types.iter().any(|tag| tag.trim().is_empty()) {
        return Err(LoadError::invalid(
            "content.generic_types",
            "content type tags must not be empty",
        ));
    }

    Ok(ContentSettings {
        directory,
        pages_dir,
        templates_dir,
        assets_prefix,
        generic_types,
    })
}

fn build_security_settings(security: RawSecuritySettings) -> Result<SecuritySettings, LoadError> {
    let required = |value: Option<PathBuf>, default: &str, key: &'static str| {
        let path = value.unwrap_or_else(|| PathBuf::from(default));
        if path.as_os_str().is_empty() {
            return Err(LoadError::invalid(key, "path must not be empty"));
        }
        Ok(path)
    };

    Ok(SecuritySettings {
        public_key_path: required(
            security.public_key_path,
            DEFAULT_PUBLIC_KEY_PATH,
            "security.public_key_path",
        )?,
        private_key_path: required(
            security.private_key_path,
            DEFAULT_PRIVATE_KEY_PATH,
            "security.private_key_path",
        )?,
        user_db_path: required(
            security.user_db_path,
            DEFAULT_USER_DB_PATH,
            "security.user_db_path",
        )?,
        acl_db_path: required(
            security.acl_db_path,
            DEFAULT_ACL_DB_PATH,
            "security.acl_db_path",
        )?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    let policy_path = match cache.policy_path {
        Some(path) if path.as_os_str().is_empty() => None,
        Some(path) => Some(path),
        None => Some(PathBuf::from(DEFAULT_CACHE_POLICY_PATH)),
    };
    CacheSettings { policy_path }
}

fn build_vcs_settings(vcs: RawVcsSettings) -> Result<VcsSettings, LoadError> {
    let program = vcs
        .program
        .unwrap_or_else(|| PathBuf::from(DEFAULT_VCS_PROGRAM));
    if program.as_os_str().is_empty() {
        return Err(LoadError::invalid("vcs.program", "path must not be empty"));
    }

    let timeout_secs = vcs.timeout_seconds.unwrap_or(DEFAULT_VCS_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "vcs.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(VcsSettings {
        program,
        timeout: Duration::from_secs(timeout_secs),
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
struct RawSiteSettings {
    mode: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    directory: Option<PathBuf>,
    pages_dir: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    assets_prefix: Option<String>,
    generic_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSecuritySettings {
    public_key_path: Option<PathBuf>,
    private_key_path: Option<PathBuf>,
    user_db_path: Option<PathBuf>,
    acl_db_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    policy_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawVcsSettings {
    program: Option<PathBuf>,
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
