use std::{env, net::SocketAddr, num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::clients::TrendApiConfig;
use crate::pipeline::fetch::BucketLimits;
use crate::pipeline::orchestrator::PipelineSettings;
use crate::util::retry::RetryConfig;

#[cfg(test)]
pub(crate) static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    trend_api_base_url: String,
    trend_api_connect_timeout: Duration,
    keyword_fetch_timeout: Duration,
    fact_fetch_timeout: Duration,
    keyword_fetch_concurrency: NonZeroUsize,
    fact_fetch_concurrency: NonZeroUsize,
    fact_fetch_max_attempts: NonZeroUsize,
    fact_fetch_backoff: Duration,
    major_keyword_limit: usize,
    minor_keyword_limit: usize,
    narrative_base_url: Option<String>,
    narrative_connect_timeout: Duration,
    narrative_timeout: Duration,
    progress_reports_enabled: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から Digest Worker の設定値を読み込み、検証する。
    ///
    /// # Errors
    /// `TREND_API_BASE_URL` が未設定、もしくは各種値のパースに失敗した場合は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let trend_api_base_url = env_var("TREND_API_BASE_URL")?;
        let http_bind = parse_socket_addr("DIGEST_WORKER_HTTP_BIND", "0.0.0.0:9010")?;

        // trend API timeouts
        let trend_api_connect_timeout = parse_duration_ms("TREND_API_CONNECT_TIMEOUT_MS", 3000)?;
        let keyword_fetch_timeout = parse_duration_secs("KEYWORD_FETCH_TIMEOUT_SECS", 45)?;
        let fact_fetch_timeout = parse_duration_secs("FACT_FETCH_TIMEOUT_SECS", 60)?;

        // fan-out and retry settings
        let keyword_fetch_concurrency = parse_non_zero_usize("KEYWORD_FETCH_CONCURRENCY", 10)?;
        let fact_fetch_concurrency = parse_non_zero_usize("FACT_FETCH_CONCURRENCY", 5)?;
        let fact_fetch_max_attempts = parse_non_zero_usize("FACT_FETCH_MAX_ATTEMPTS", 3)?;
        let fact_fetch_backoff = parse_duration_ms("FACT_FETCH_BACKOFF_MS", 2000)?;

        let major_keyword_limit = parse_usize("MAJOR_KEYWORD_LIMIT", 3)?;
        let minor_keyword_limit = parse_usize("MINOR_KEYWORD_LIMIT", 2)?;

        // narrative service is optional; without it only assembly endpoints work
        let narrative_base_url = env::var("NARRATIVE_BASE_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let narrative_connect_timeout = parse_duration_ms("NARRATIVE_CONNECT_TIMEOUT_MS", 3000)?;
        let narrative_timeout = parse_duration_secs("NARRATIVE_TIMEOUT_SECS", 300)?;

        let progress_reports_enabled = parse_bool("PROGRESS_REPORTS_ENABLED", true)?;

        Ok(Self {
            http_bind,
            trend_api_base_url,
            trend_api_connect_timeout,
            keyword_fetch_timeout,
            fact_fetch_timeout,
            keyword_fetch_concurrency,
            fact_fetch_concurrency,
            fact_fetch_max_attempts,
            fact_fetch_backoff,
            major_keyword_limit,
            minor_keyword_limit,
            narrative_base_url,
            narrative_connect_timeout,
            narrative_timeout,
            progress_reports_enabled,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn trend_api_base_url(&self) -> &str {
        &self.trend_api_base_url
    }

    #[must_use]
    pub fn trend_api_connect_timeout(&self) -> Duration {
        self.trend_api_connect_timeout
    }

    #[must_use]
    pub fn keyword_fetch_timeout(&self) -> Duration {
        self.keyword_fetch_timeout
    }

    #[must_use]
    pub fn fact_fetch_timeout(&self) -> Duration {
        self.fact_fetch_timeout
    }

    #[must_use]
    pub fn keyword_fetch_concurrency(&self) -> NonZeroUsize {
        self.keyword_fetch_concurrency
    }

    #[must_use]
    pub fn fact_fetch_concurrency(&self) -> NonZeroUsize {
        self.fact_fetch_concurrency
    }

    #[must_use]
    pub fn fact_fetch_max_attempts(&self) -> NonZeroUsize {
        self.fact_fetch_max_attempts
    }

    #[must_use]
    pub fn fact_fetch_backoff(&self) -> Duration {
        self.fact_fetch_backoff
    }

    #[must_use]
    pub fn major_keyword_limit(&self) -> usize {
        self.major_keyword_limit
    }

    #[must_use]
    pub fn minor_keyword_limit(&self) -> usize {
        self.minor_keyword_limit
    }

    #[must_use]
    pub fn narrative_base_url(&self) -> Option<&str> {
        self.narrative_base_url.as_deref()
    }

    #[must_use]
    pub fn narrative_connect_timeout(&self) -> Duration {
        self.narrative_connect_timeout
    }

    #[must_use]
    pub fn narrative_timeout(&self) -> Duration {
        self.narrative_timeout
    }

    #[must_use]
    pub fn progress_reports_enabled(&self) -> bool {
        self.progress_reports_enabled
    }

    /// trend API クライアント用の設定を組み立てる。
    #[must_use]
    pub fn trend_api(&self) -> TrendApiConfig {
        TrendApiConfig {
            base_url: self.trend_api_base_url.clone(),
            connect_timeout: self.trend_api_connect_timeout,
            keyword_timeout: self.keyword_fetch_timeout,
            facts_timeout: self.fact_fetch_timeout,
        }
    }

    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            keyword_concurrency: self.keyword_fetch_concurrency,
            fact_concurrency: self.fact_fetch_concurrency,
            fact_retry: RetryConfig::new(self.fact_fetch_max_attempts.get(), self.fact_fetch_backoff),
            limits: BucketLimits {
                major: self.major_keyword_limit,
                minor: self.minor_keyword_limit,
            },
        }
    }
}

fn env_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());

    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let parsed = parse_usize(name, default)?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_duration_secs(name: &'static str, default_secs: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_secs)?;
    Ok(Duration::from_secs(value))
}

fn parse_duration_ms(name: &'static str, default_ms: u64) -> Result<Duration, ConfigError> {
    let value = parse_u64(name, default_ms)?;
    Ok(Duration::from_millis(value))
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.trim().parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("invalid boolean value: {raw}"),
        }),
    }
}
