//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use tracing::Level;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8077";
pub const DEFAULT_RECORDER_COMMAND: &str = "arecord -q -f S16_LE -r 16000 -c 1 -t raw";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub log_level: Level,
    pub default_model: String,
    pub tts_enabled: bool,
    pub auto_play_tts: bool,
    pub tts_voice: String,
    /// Program (plus leading arguments) that plays an MPEG file given as its last argument.
    pub player_command: Option<Vec<String>>,
    /// Program (plus arguments) that writes raw 16-bit mono PCM to stdout.
    pub recorder_command: Vec<String>,
    pub record_sample_rate: u32,
    /// Program (plus arguments) that prints one recognized phrase per line.
    pub recognizer_command: Option<Vec<String>>,
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

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Backend ---
        let backend_url = lookup("BACKEND_URL")
            .or_else(|| lookup("VITE_BACKEND_URL"))
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        if !backend_url.starts_with("http://") && !backend_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "BACKEND_URL".to_string(),
                format!("'{}' is not an http(s) URL", backend_url),
            ));
        }
        let backend_url = backend_url.trim_end_matches('/').to_string();

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Session Defaults ---
        let default_model =
            lookup("DEFAULT_MODEL").unwrap_or_else(|| nexus_core::catalog::DEFAULT_MODEL.to_string());
        let tts_enabled = parse_flag(&lookup, "TTS_ENABLED", true)?;
        let auto_play_tts = parse_flag(&lookup, "AUTO_PLAY_TTS", false)?;
        let tts_voice = lookup("TTS_VOICE").unwrap_or_else(|| "default".to_string());

        // --- Audio Devices ---
        let player_command = lookup("PLAYER_COMMAND")
            .map(|cmd| split_command(&cmd))
            .filter(|parts| !parts.is_empty());

        let recorder_command = split_command(
            &lookup("RECORDER_COMMAND").unwrap_or_else(|| DEFAULT_RECORDER_COMMAND.to_string()),
        );
        if recorder_command.is_empty() {
            return Err(ConfigError::InvalidValue(
                "RECORDER_COMMAND".to_string(),
                "the command is empty".to_string(),
            ));
        }

        let record_sample_rate = match lookup("RECORD_SAMPLE_RATE") {
            Some(raw) => raw.parse::<u32>().map_err(|e| {
                ConfigError::InvalidValue("RECORD_SAMPLE_RATE".to_string(), e.to_string())
            })?,
            None => 16_000,
        };

        let recognizer_command = lookup("RECOGNIZER_COMMAND")
            .map(|cmd| split_command(&cmd))
            .filter(|parts| !parts.is_empty());

        Ok(Self {
            backend_url,
            log_level,
            default_model,
            tts_enabled,
            auto_play_tts,
            tts_voice,
            player_command,
            recorder_command,
            record_sample_rate,
            recognizer_command,
        })
    }
}

fn parse_flag<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a boolean", raw),
            )),
        },
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
