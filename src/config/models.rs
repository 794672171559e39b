use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// High-level app configuration; deserializable from TOML.
#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_base_url")]
    pub base_url: String,
    #[serde(default = "crate::config::defaults::default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_page_fetch_timeout_secs")]
    pub page_fetch_timeout_secs: u64,
    #[serde(default = "crate::config::defaults::default_expected_locale")]
    pub expected_locale: String,
    #[serde(default = "crate::config::defaults::default_max_source_bytes")]
    pub max_source_bytes: u64,
    #[serde(default = "crate::config::defaults::default_min_page_interval_ms")]
    pub min_page_interval_ms: u64,
    #[serde(default = "crate::config::defaults::default_deferred_retry_ms")]
    pub deferred_retry_ms: u64,
    #[serde(default = "crate::config::defaults::default_magnifier_zoom")]
    pub magnifier_zoom: f32,
    #[serde(default = "crate::config::defaults::default_magnifier_lens_px")]
    pub magnifier_lens_px: u32,
    #[serde(default = "crate::config::defaults::default_data_dir")]
    pub data_dir: String,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            base_url: crate::config::defaults::default_base_url(),
            request_timeout_secs: crate::config::defaults::default_request_timeout_secs(),
            page_fetch_timeout_secs: crate::config::defaults::default_page_fetch_timeout_secs(),
            expected_locale: crate::config::defaults::default_expected_locale(),
            max_source_bytes: crate::config::defaults::default_max_source_bytes(),
            min_page_interval_ms: crate::config::defaults::default_min_page_interval_ms(),
            deferred_retry_ms: crate::config::defaults::default_deferred_retry_ms(),
            magnifier_zoom: crate::config::defaults::default_magnifier_zoom(),
            magnifier_lens_px: crate::config::defaults::default_magnifier_lens_px(),
            data_dir: crate::config::defaults::default_data_dir(),
            log_level: crate::config::defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn page_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.page_fetch_timeout_secs.max(1))
    }

    pub fn min_page_interval(&self) -> Duration {
        Duration::from_millis(self.min_page_interval_ms)
    }

    pub fn deferred_retry_delay(&self) -> Duration {
        Duration::from_millis(self.deferred_retry_ms.max(1))
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    #[default]
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
