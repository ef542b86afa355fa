use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PanelConfig {
    pub default_ws_url: Option<String>,
    pub default_api_base: Option<String>,
    pub targets_json: Option<String>,
    pub log_filter: String,
    pub connect_timeout: Option<Duration>,
    pub http_timeout: Option<Duration>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid PANEL_CONNECT_TIMEOUT_MS: {0}")]
    InvalidConnectTimeout(String),
    #[error("invalid PANEL_HTTP_TIMEOUT_MS: {0}")]
    InvalidHttpTimeout(String),
}

impl PanelConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let connect_timeout = parse_timeout_ms(non_blank("PANEL_CONNECT_TIMEOUT_MS"))
            .map_err(ConfigError::InvalidConnectTimeout)?;
        let http_timeout = parse_timeout_ms(non_blank("PANEL_HTTP_TIMEOUT_MS"))
            .map_err(ConfigError::InvalidHttpTimeout)?;

        Ok(Self {
            default_ws_url: non_blank("PANEL_DEFAULT_WS"),
            default_api_base: non_blank("PANEL_DEFAULT_API_BASE"),
            targets_json: non_blank("PANEL_TARGETS_JSON"),
            log_filter: non_blank("PANEL_LOG_FILTER")
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            connect_timeout,
            http_timeout,
        })
    }
}

fn parse_timeout_ms(raw: Option<String>) -> Result<Option<Duration>, String> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(raw),
        Ok(millis) => Ok(Some(Duration::from_millis(millis))),
    }
}
