//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub output_root: PathBuf,
    pub cors_origin: String,

    // --- Provider credentials (all optional) ---
    pub openai_api_key: Option<String>,
    pub huggingface_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    pub video_api_url: Option<String>,
    pub video_api_key: Option<String>,

    // --- Models ---
    pub text_model: String,
    pub image_model: String,
    pub hf_image_model: String,
    pub tts_model: String,
    pub tts_voice: String,

    // --- Timeouts and pacing ---
    pub provider_timeout: Duration,
    pub video_timeout: Duration,
    pub text_timeout: Duration,
    pub store_timeout: Duration,
    pub lesson_delay: Duration,
    pub lesson_concurrency: usize,
    pub max_concurrent_provider_calls: usize,
    pub min_call_spacing: Duration,

    // --- Cleanup sweep ---
    pub asset_max_age: Duration,
    pub cleanup_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        // --- Server and Database Settings ---
        let bind_address = vars.parsed("BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>().ok())?;
        let database_url = vars.required("DATABASE_URL")?;

        let log_level_str = vars.string_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let output_root = PathBuf::from(vars.string_or("OUTPUT_ROOT", "./generated"));
        let cors_origin = vars.string_or("CORS_ORIGIN", "http://localhost:3000");

        // --- Provider credentials ---
        let openai_api_key = vars.optional("OPENAI_API_KEY");
        let huggingface_api_key = vars.optional("HUGGINGFACE_API_KEY");
        let elevenlabs_api_key = vars.optional("ELEVENLABS_API_KEY");
        let elevenlabs_voice_id = vars.optional("ELEVENLABS_VOICE_ID");
        let video_api_url = vars.optional("VIDEO_API_URL");
        let video_api_key = vars.optional("VIDEO_API_KEY");

        // --- Models ---
        let text_model = vars.string_or("TEXT_MODEL", "gpt-4o-mini");
        let image_model = vars.string_or("IMAGE_MODEL", "dall-e-3");
        let hf_image_model = vars.string_or("HF_IMAGE_MODEL", "stabilityai/stable-diffusion-xl-base-1.0");
        let tts_model = vars.string_or("TTS_MODEL", "tts-1");
        let tts_voice = vars.string_or("TTS_VOICE", "alloy");

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            output_root,
            cors_origin,
            openai_api_key,
            huggingface_api_key,
            elevenlabs_api_key,
            elevenlabs_voice_id,
            video_api_url,
            video_api_key,
            text_model,
            image_model,
            hf_image_model,
            tts_model,
            tts_voice,
            provider_timeout: Duration::from_secs(vars.parsed("PROVIDER_TIMEOUT_SECS", Some(60))?),
            video_timeout: Duration::from_secs(vars.parsed("VIDEO_TIMEOUT_SECS", Some(180))?),
            text_timeout: Duration::from_secs(vars.parsed("TEXT_TIMEOUT_SECS", Some(90))?),
            store_timeout: Duration::from_secs(vars.parsed("STORE_TIMEOUT_SECS", Some(10))?),
            lesson_delay: Duration::from_millis(vars.parsed("LESSON_DELAY_MS", Some(1000))?),
            lesson_concurrency: vars.parsed("LESSON_CONCURRENCY", Some(1))?,
            max_concurrent_provider_calls: vars.parsed("MAX_CONCURRENT_PROVIDER_CALLS", Some(2))?,
            min_call_spacing: Duration::from_millis(vars.parsed("MIN_CALL_SPACING_MS", Some(0))?),
            asset_max_age: vars.seconds_from_units("ASSET_MAX_AGE_HOURS", 168, 3600)?,
            cleanup_interval: vars.seconds_from_units("CLEANUP_INTERVAL_MINS", 60, 60)?,
        })
    }
}

/// Typed access to a key/value source.
struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Blank values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
    }

    fn string_or(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, key: &str, default: Option<T>) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(key) {
            Some(raw) => raw
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
            None => default.ok_or_else(|| ConfigError::MissingVar(key.to_string())),
        }
    }

    /// A duration given in whole units of `unit_secs` seconds (hours, minutes).
    fn seconds_from_units(&self, key: &str, default: u64, unit_secs: u64) -> Result<Duration, ConfigError> {
        self.parsed::<u64>(key, Some(default))?
            .checked_mul(unit_secs)
            .map(Duration::from_secs)
            .ok_or_else(|| ConfigError::InvalidValue(key.to_string(), "value is too large".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults_apply_when_only_database_is_set() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/enablement")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.output_root, PathBuf::from("./generated"));
        assert_eq!(config.text_model, "gpt-4o-mini");
        assert_eq!(config.provider_timeout, Duration::from_secs(60));
        assert_eq!(config.video_timeout, Duration::from_secs(180));
        assert_eq!(config.lesson_delay, Duration::from_millis(1000));
        assert_eq!(config.lesson_concurrency, 1);
        assert_eq!(config.max_concurrent_provider_calls, 2);
        assert_eq!(config.asset_max_age, Duration::from_secs(168 * 3600));
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        let err = config_from(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref key) if key == "DATABASE_URL"));
    }

    #[test]
    fn test_invalid_numbers_name_the_variable() {
        let err = config_from(&[("DATABASE_URL", "postgres://x"), ("LESSON_DELAY_MS", "soon")])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "LESSON_DELAY_MS"));
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let config = config_from(&[
            ("DATABASE_URL", "postgres://x"),
            ("OPENAI_API_KEY", "   "),
            ("HUGGINGFACE_API_KEY", "hf_token"),
        ])
        .unwrap();
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.huggingface_api_key.as_deref(), Some("hf_token"));
    }

    #[test]
    fn test_invalid_log_level_is_rejected() {
        let err = config_from(&[("DATABASE_URL", "postgres://x"), ("RUST_LOG", "chatty")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "RUST_LOG"));
    }

    #[test]
    fn test_oversized_age_is_rejected_instead_of_overflowing() {
        let huge = u64::MAX.to_string();
        let err = config_from(&[("DATABASE_URL", "postgres://x"), ("ASSET_MAX_AGE_HOURS", huge.as_str())]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "ASSET_MAX_AGE_HOURS"));

        let config = config_from(&[("DATABASE_URL", "postgres://x"), ("CLEANUP_INTERVAL_MINS", "5")]).unwrap();
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
    }
}
