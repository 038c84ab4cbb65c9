use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use super::avatar::DEFAULT_AVATAR_GENERATOR_URL;

const CONFIG_FILE_NAME: &str = "roster_config.json";

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_AUTH_SCHEME: &str = "Bearer";
const DEFAULT_MESSAGE_POLL_MS: u64 = 5_000;
const DEFAULT_NOTIFICATION_POLL_MS: u64 = 15_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
// Floor for every interval so a bad config can't hammer the API.
const MIN_POLL_MS: u64 = 50;

/// `<data_dir>/roster_config.json`; every field optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub(crate) api_base_url: Option<String>,
    /// Origin that serves `/media/...`; defaults to the API origin.
    pub(crate) media_base_url: Option<String>,
    pub(crate) avatar_generator_url: Option<String>,
    pub(crate) auth_scheme: Option<String>,
    pub(crate) message_poll_interval_ms: Option<u64>,
    pub(crate) notification_poll_interval_ms: Option<u64>,
    pub(crate) request_timeout_ms: Option<u64>,
    pub(crate) merge_optimistic_messages: Option<bool>,
    /// Offline mode: pollers and write bookkeeping still run, but no request leaves the process.
    pub(crate) disable_network: Option<bool>,
}

impl AppConfig {
    pub(crate) fn api_base_url(&self) -> String {
        non_empty(self.api_base_url.as_deref())
            .unwrap_or(DEFAULT_API_BASE_URL)
            .trim_end_matches('/')
            .to_string()
    }

    pub(crate) fn media_base_url(&self) -> String {
        if let Some(url) = non_empty(self.media_base_url.as_deref()) {
            return url.trim_end_matches('/').to_string();
        }
        let api = self.api_base_url();
        match url::Url::parse(&api) {
            Ok(u) => u.origin().ascii_serialization(),
            Err(_) => api,
        }
    }

    pub(crate) fn avatar_generator_url(&self) -> String {
        non_empty(self.avatar_generator_url.as_deref())
            .unwrap_or(DEFAULT_AVATAR_GENERATOR_URL)
            .to_string()
    }

    pub(crate) fn auth_scheme(&self) -> String {
        non_empty(self.auth_scheme.as_deref())
            .unwrap_or(DEFAULT_AUTH_SCHEME)
            .to_string()
    }

    pub(crate) fn message_poll_interval(&self) -> Duration {
        interval(self.message_poll_interval_ms, DEFAULT_MESSAGE_POLL_MS)
    }

    pub(crate) fn notification_poll_interval(&self) -> Duration {
        interval(self.notification_poll_interval_ms, DEFAULT_NOTIFICATION_POLL_MS)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_millis(
            self.request_timeout_ms
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS)
                .max(1),
        )
    }

    pub(crate) fn merge_optimistic_messages(&self) -> bool {
        self.merge_optimistic_messages.unwrap_or(false)
    }

    pub(crate) fn network_enabled(&self) -> bool {
        !self.disable_network.unwrap_or(false)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_value("ROSTER_API_URL") {
            self.api_base_url = Some(v);
        }
        if let Some(v) = env_value("ROSTER_MEDIA_URL") {
            self.media_base_url = Some(v);
        }
        if let Some(v) = env_value("ROSTER_AUTH_SCHEME") {
            self.auth_scheme = Some(v);
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|v| !v.is_empty())
}

fn interval(ms: Option<u64>, default_ms: u64) -> Duration {
    Duration::from_millis(ms.unwrap_or(default_ms).max(MIN_POLL_MS))
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn read_config_file(path: &Path) -> anyhow::Result<Option<AppConfig>> {
    let data = match std::fs::read_to_string(path) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
    };
    let cfg = serde_json::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(cfg))
}

pub(crate) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join(CONFIG_FILE_NAME);
    let mut cfg = match read_config_file(&path) {
        Ok(Some(cfg)) => cfg,
        Ok(None) => AppConfig::default(),
        Err(e) => {
            tracing::warn!(err = %format!("{e:#}"), "invalid config, using defaults");
            AppConfig::default()
        }
    };
    cfg.apply_env_overrides();
    cfg
}
