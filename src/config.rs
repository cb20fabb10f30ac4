use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::resilience::{CircuitBreakerConfig, RetryPolicy};

/// 設定読み込みのエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 値をパースできない
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// 在庫台帳の実装
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    Postgres,
    Memory,
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(LedgerBackend::Postgres),
            "memory" => Ok(LedgerBackend::Memory),
            other => Err(format!("unknown ledger backend '{other}' (expected postgres or memory)")),
        }
    }
}

/// 価格サービス連携の設定
#[derive(Debug, Clone, PartialEq)]
pub struct PricingClientConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: CircuitBreakerConfig,
}

/// 貸出サービスの設定
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: u16,
    pub hostname: String,
    pub ledger_backend: LedgerBackend,
    pub database_url: String,
    pub database_max_connections: u32,
    /// 未設定の場合はロック取得を無期限に待つ
    pub lock_timeout: Option<Duration>,
    pub pricing: PricingClientConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 任意のキー参照関数から設定を組み立てる
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let retry_defaults = RetryPolicy::default();

        Ok(Self {
            port: load(&lookup, "PORT", "8081")?,
            hostname: load(&lookup, "HOSTNAME", "local")?,
            ledger_backend: load(&lookup, "LEDGER_BACKEND", "postgres")?,
            database_url: load(&lookup, "DATABASE_URL", "postgres://localhost/library")?,
            database_max_connections: load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            lock_timeout: load_optional::<u64, _>(&lookup, "LEDGER_LOCK_TIMEOUT_MS")?
                .map(Duration::from_millis),
            pricing: PricingClientConfig {
                base_url: load(&lookup, "PRICING_BASE_URL", "http://localhost:8082")?,
                connect_timeout: load_millis(&lookup, "PRICING_CONNECT_TIMEOUT_MS", "1000")?,
                read_timeout: load_millis(&lookup, "PRICING_READ_TIMEOUT_MS", "2000")?,
                retry: RetryPolicy {
                    max_retries: load(&lookup, "PRICING_RETRY_MAX_RETRIES", "2")?,
                    initial_delay: load_millis(&lookup, "PRICING_RETRY_INITIAL_DELAY_MS", "200")?,
                    ..retry_defaults
                },
                breaker: CircuitBreakerConfig {
                    failure_threshold: load(&lookup, "PRICING_BREAKER_FAILURE_THRESHOLD", "5")?,
                    open_duration: load_millis(&lookup, "PRICING_BREAKER_OPEN_MS", "10000")?,
                    success_threshold: load(&lookup, "PRICING_BREAKER_SUCCESS_THRESHOLD", "2")?,
                },
            },
        })
    }
}

/// 価格サービス（シミュレータ）の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingServiceConfig {
    pub port: u16,
    /// ランダム失敗の確率（0〜100）
    pub random_failure_percent: u8,
}

impl PricingServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let random_failure_percent: u8 = load(&lookup, "PRICING_RANDOM_FAILURE_PERCENT", "30")?;
        if random_failure_percent > 100 {
            return Err(ConfigError::Invalid {
                key: "PRICING_RANDOM_FAILURE_PERCENT".to_string(),
                value: random_failure_percent.to_string(),
                reason: "must be between 0 and 100".to_string(),
            });
        }

        Ok(Self {
            port: load(&lookup, "PRICING_PORT", "8082")?,
            random_failure_percent,
        })
    }
}

fn load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    parse(key, raw)
}

fn load_optional<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => parse(key, raw).map(Some),
        None => {
            info!("{key} not set");
            Ok(None)
        }
    }
}

fn load_millis<F>(lookup: &F, key: &str, default: &str) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    load::<u64, _>(lookup, key, default).map(Duration::from_millis)
}

fn parse<T>(key: &str, raw: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}
