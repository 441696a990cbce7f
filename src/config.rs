use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";
pub const DEFAULT_MEDIA_ROOT: &str = "media";
pub const DEFAULT_MEDIA_URL: &str = "/media/";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 10;
pub const DEFAULT_SESSION_HOURS: u64 = 24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Runtime settings of the web server
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the server listens on
    pub bind_addr: SocketAddr,

    /// Directory uploads are stored under
    pub media_root: PathBuf,

    /// URL prefix stored files are served under
    pub media_url: String,

    /// Request body limit for uploads, in bytes
    pub max_upload_bytes: usize,

    /// How long a session keeps its file reference
    pub session_ttl: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            media_url: DEFAULT_MEDIA_URL.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_HOURS * 60 * 60),
        }
    }
}

impl Config {
    /// Read the configuration from `DASHBOARD_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from any key lookup; unset keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(bind) = lookup("DASHBOARD_BIND") {
            config.bind_addr = parse_bind(&bind)?;
        }
        if let Some(root) = lookup("DASHBOARD_MEDIA_ROOT") {
            config.media_root = PathBuf::from(root);
        }
        if let Some(url) = lookup("DASHBOARD_MEDIA_URL") {
            config.media_url = normalize_url_prefix(&url);
        }
        if let Some(mb) = lookup("DASHBOARD_MAX_UPLOAD_MB") {
            let mb: usize = mb.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DASHBOARD_MAX_UPLOAD_MB",
                value: mb.clone(),
            })?;
            config.max_upload_bytes = mb * 1024 * 1024;
        }
        if let Some(hours) = lookup("DASHBOARD_SESSION_HOURS") {
            let hours: u64 = hours.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "DASHBOARD_SESSION_HOURS",
                value: hours.clone(),
            })?;
            config.session_ttl = Duration::from_secs(hours * 60 * 60);
        }

        Ok(config)
    }

    /// Apply command line overrides: the first positional argument is the bind address
    pub fn with_args(mut self, args: &[String]) -> Result<Self, ConfigError> {
        if let Some(bind) = args.get(1) {
            self.bind_addr = parse_bind(bind)?;
        }
        Ok(self)
    }
}

fn parse_bind(raw: &str) -> Result<SocketAddr, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        key: "DASHBOARD_BIND",
        value: raw.to_string(),
    })
}

/// Route prefixes must start and end with a slash
fn normalize_url_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
