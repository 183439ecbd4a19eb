use crate::services::prompt::DEFAULT_HISTORY_WINDOW;
use crate::services::providers::gemini::GEMINI_API_BASE;
use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;

const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_SESSION_TTL_HOURS: i64 = 24;
/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct FinbotConfig {
    pub common: core_config::Config,
    pub provider: ProviderConfig,
    pub chat: ChatConfig,
    pub session: SessionConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Absent key is not a startup failure; the UI shows a fatal banner instead.
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub base_url: String,
    /// Probe the key once at startup.
    pub verify_credentials: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    Mock,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(ProviderKind::Gemini),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Number of recent turns carried into each prompt.
    pub history_window: usize,
    pub follow_ups: bool,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
}

impl FinbotConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let history_window: usize = parse_env(
            "FINBOT_HISTORY_WINDOW",
            &get_env(
                "FINBOT_HISTORY_WINDOW",
                Some(&DEFAULT_HISTORY_WINDOW.to_string()),
                is_prod,
            )?,
        )?;
        if history_window == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "FINBOT_HISTORY_WINDOW must be at least 1"
            )));
        }

        Ok(FinbotConfig {
            common: common_config,
            provider: ProviderConfig {
                kind: parse_env(
                    "FINBOT_PROVIDER",
                    &get_env("FINBOT_PROVIDER", Some("gemini"), is_prod)?,
                )?,
                api_key: optional_env("GOOGLE_API_KEY").map(Secret::new),
                model: get_env("GENAI_TEXT_MODEL", Some(DEFAULT_TEXT_MODEL), is_prod)?,
                base_url: get_env("GENAI_API_BASE", Some(GEMINI_API_BASE), is_prod)?,
                verify_credentials: parse_bool(
                    "FINBOT_VERIFY_CREDENTIALS",
                    &get_env("FINBOT_VERIFY_CREDENTIALS", Some("true"), is_prod)?,
                )?,
            },
            chat: ChatConfig {
                history_window,
                follow_ups: parse_bool(
                    "FINBOT_FOLLOW_UPS",
                    &get_env("FINBOT_FOLLOW_UPS", Some("false"), is_prod)?,
                )?,
                temperature: optional_env("FINBOT_TEMPERATURE")
                    .map(|v| parse_env("FINBOT_TEMPERATURE", &v))
                    .transpose()?,
                max_output_tokens: optional_env("FINBOT_MAX_OUTPUT_TOKENS")
                    .map(|v| parse_env("FINBOT_MAX_OUTPUT_TOKENS", &v))
                    .transpose()?,
            },
            session: SessionConfig {
                ttl_hours: parse_session_ttl(&get_env(
                    "FINBOT_SESSION_TTL_HOURS",
                    Some(&DEFAULT_SESSION_TTL_HOURS.to_string()),
                    is_prod,
                )?)?,
            },
            observability: ObservabilityConfig {
                log_level: get_env("LOG_LEVEL", Some("info"), false)?,
                otlp_endpoint: optional_env("OTLP_ENDPOINT"),
            },
        })
    }
}

/// Read a required variable. In production every variable must be set
/// explicitly; elsewhere `default` is used when present.
fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

/// Read a variable that may be absent; blank counts as absent.
fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e))
    })
}

fn parse_session_ttl(value: &str) -> Result<i64, AppError> {
    let hours: i64 = parse_env("FINBOT_SESSION_TTL_HOURS", value)?;
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "FINBOT_SESSION_TTL_HOURS must be between 1 and {}, got {}",
            MAX_SESSION_TTL_HOURS,
            hours
        )));
    }
    Ok(hours)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, AppError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} must be a boolean, got '{}'",
            key,
            value
        ))),
    }
}
