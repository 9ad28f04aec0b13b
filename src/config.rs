use std::path::PathBuf;
use std::time::Duration;

use crate::path::{normalize, NavigationPath};

/// client configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// base url of the storage api
    pub api_url: String,
    /// directory shown at startup
    pub start_path: NavigationPath,
    /// how long a completed upload stays visible
    pub upload_grace: Duration,
    /// minimum time between two progress notifications of one upload
    pub progress_interval: Duration,
    /// connect timeout for api requests (transfers themselves never time out)
    pub connect_timeout: Duration,
    /// where downloads are written
    pub download_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8080".to_string(),
            start_path: NavigationPath::root(),
            upload_grace: Duration::from_millis(2000),
            progress_interval: Duration::from_millis(200),
            connect_timeout: Duration::from_secs(10),
            download_dir: PathBuf::from("."),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_url = std::env::var("FILES_API_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| {
                tracing::debug!("No FILES_API_URL set, using {}", defaults.api_url);
                defaults.api_url.clone()
            });

        Self {
            api_url,
            start_path: std::env::var("START_PATH")
                .map(normalize)
                .unwrap_or(defaults.start_path),
            upload_grace: env_parse("UPLOAD_GRACE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.upload_grace),
            progress_interval: env_parse("PROGRESS_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.progress_interval),
            connect_timeout: env_parse("CONNECT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect_timeout),
            download_dir: std::env::var("DOWNLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.download_dir),
        }
    }
}
