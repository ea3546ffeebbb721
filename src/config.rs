use crate::tracker::{DEFAULT_CENTER, DEFAULT_PATH_CAPACITY, DEFAULT_ZOOM, TrackerSettings};
use crate::types::LatLng;

#[derive(Debug, serde::Deserialize)]
pub struct ApplicationConfig {
    pub backend: BackendConfig,
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

impl ApplicationConfig {
    pub fn construct_from_path(
        path: &std::path::Path,
    ) -> Result<ApplicationConfig, errors::ApplicationConfigError> {
        let string =
            std::fs::read_to_string(path).map_err(|error| errors::ApplicationConfigError::Io {
                source: error,
                path: path.to_path_buf(),
            })?;

        toml::from_str(&string).map_err(|error| errors::ApplicationConfigError::Parse {
            source: error,
            path: path.to_path_buf(),
        })
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    30
}

/// Line-delimited JSON relay the realtime feed connects to.
#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
pub struct RealtimeConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub handshake: Option<String>,
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub default_latitude: f64,
    pub default_longitude: f64,
    pub default_zoom: u8,
    pub path_capacity: usize,
    pub path_window_seconds: Option<u32>,
    pub poll_interval_millis: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            default_latitude: DEFAULT_CENTER.lat,
            default_longitude: DEFAULT_CENTER.lng,
            default_zoom: DEFAULT_ZOOM,
            path_capacity: DEFAULT_PATH_CAPACITY,
            path_window_seconds: None,
            poll_interval_millis: 100,
        }
    }
}

impl TrackerConfig {
    #[must_use]
    pub fn settings(&self) -> TrackerSettings {
        TrackerSettings {
            default_center: LatLng::new(self.default_latitude, self.default_longitude),
            default_zoom: self.default_zoom,
            path_capacity: self.path_capacity,
            path_window: self
                .path_window_seconds
                .map(|seconds| chrono::TimeDelta::seconds(i64::from(seconds))),
        }
    }

    #[must_use]
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_interval_millis)
    }
}

#[derive(Debug, PartialEq, Clone, serde::Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    /// Base URL clicked push notifications resolve against.
    pub scope: String,
    pub device_id_file: std::path::PathBuf,
    pub app_version: Option<String>,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        NotificationsConfig {
            enabled: false,
            scope: String::from("/"),
            device_id_file: std::path::PathBuf::from("device_id"),
            app_version: None,
        }
    }
}

pub mod errors {

    #[derive(Debug)]
    pub enum ApplicationConfigError {
        Parse {
            source: toml::de::Error,
            path: std::path::PathBuf,
        },
        Io {
            source: std::io::Error,
            path: std::path::PathBuf,
        },
    }
    impl std::fmt::Display for ApplicationConfigError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                ApplicationConfigError::Io {
                    source: error,
                    path,
                } => {
                    write!(
                        f,
                        "Failed to read config file '{}': {}",
                        path.display(),
                        error
                    )
                }
                ApplicationConfigError::Parse {
                    source: error,
                    path,
                } => {
                    write!(
                        f,
                        "Failed to parse config file '{}': {}",
                        path.display(),
                        error
                    )
                }
            }
        }
    }
    impl std::error::Error for ApplicationConfigError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            match self {
                ApplicationConfigError::Io { source: error, .. } => Some(error),
                ApplicationConfigError::Parse { source: error, .. } => Some(error),
            }
        }
    }
}
