use super::defaults;
use super::models::{AppConfig, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, serde::Serialize, Default)]
pub(super) struct ConfigTables {
    #[serde(default)]
    service: ServiceConfig,
    #[serde(default)]
    ingestion: IngestionConfig,
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            base_url: tables.service.base_url,
            request_timeout_secs: tables.service.request_timeout_secs,
            page_fetch_timeout_secs: tables.ingestion.page_fetch_timeout_secs,
            expected_locale: tables.ingestion.expected_locale,
            max_source_bytes: tables.ingestion.max_source_bytes,
            min_page_interval_ms: tables.playback.min_page_interval_ms,
            deferred_retry_ms: tables.playback.deferred_retry_ms,
            magnifier_zoom: tables.playback.magnifier_zoom,
            magnifier_lens_px: tables.playback.magnifier_lens_px,
            data_dir: tables.storage.data_dir,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            service: ServiceConfig {
                base_url: config.base_url.clone(),
                request_timeout_secs: config.request_timeout_secs,
            },
            ingestion: IngestionConfig {
                page_fetch_timeout_secs: config.page_fetch_timeout_secs,
                expected_locale: config.expected_locale.clone(),
                max_source_bytes: config.max_source_bytes,
            },
            playback: PlaybackConfig {
                min_page_interval_ms: config.min_page_interval_ms,
                deferred_retry_ms: config.deferred_retry_ms,
                magnifier_zoom: config.magnifier_zoom,
                magnifier_lens_px: config.magnifier_lens_px,
            },
            storage: StorageConfig {
                data_dir: config.data_dir.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ServiceConfig {
    #[serde(default = "defaults::default_base_url")]
    base_url: String,
    #[serde(default = "defaults::default_request_timeout_secs")]
    request_timeout_secs: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::default_base_url(),
            request_timeout_secs: defaults::default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct IngestionConfig {
    #[serde(default = "defaults::default_page_fetch_timeout_secs")]
    page_fetch_timeout_secs: u64,
    #[serde(default = "defaults::default_expected_locale")]
    expected_locale: String,
    #[serde(default = "defaults::default_max_source_bytes")]
    max_source_bytes: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            page_fetch_timeout_secs: defaults::default_page_fetch_timeout_secs(),
            expected_locale: defaults::default_expected_locale(),
            max_source_bytes: defaults::default_max_source_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_min_page_interval_ms")]
    min_page_interval_ms: u64,
    #[serde(default = "defaults::default_deferred_retry_ms")]
    deferred_retry_ms: u64,
    #[serde(default = "defaults::default_magnifier_zoom")]
    magnifier_zoom: f32,
    #[serde(default = "defaults::default_magnifier_lens_px")]
    magnifier_lens_px: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            min_page_interval_ms: defaults::default_min_page_interval_ms(),
            deferred_retry_ms: defaults::default_deferred_retry_ms(),
            magnifier_zoom: defaults::default_magnifier_zoom(),
            magnifier_lens_px: defaults::default_magnifier_lens_px(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_data_dir")]
    data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: defaults::default_data_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: defaults::default_log_level(),
        }
    }
}
