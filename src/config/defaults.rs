pub(crate) fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

pub(crate) fn default_request_timeout_secs() -> u64 {
    120
}

pub(crate) fn default_page_fetch_timeout_secs() -> u64 {
    60
}

pub(crate) fn default_expected_locale() -> String {
    "pt".to_string()
}

pub(crate) fn default_max_source_bytes() -> u64 {
    50 * 1024 * 1024
}

pub(crate) fn default_min_page_interval_ms() -> u64 {
    900
}

pub(crate) fn default_deferred_retry_ms() -> u64 {
    300
}

pub(crate) fn default_magnifier_zoom() -> f32 {
    2.0
}

pub(crate) fn default_magnifier_lens_px() -> u32 {
    160
}

pub(crate) fn default_data_dir() -> String {
    ".pagecast".to_string()
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}
