use crate::error::Result as TtsResult;
use crate::types::{Endpoint, RequestDefaults};
use secrecy::{ExposeSecret, SecretBox};
use std::env;
use thiserror::Error;
use tts_protocol::AppInfo;

pub const DEFAULT_HOST: &str = "wss://openspeech.bytedance.com";
pub const DEFAULT_CLUSTER: &str = "volcano_tts";
pub const DEFAULT_VOICE: &str = "BV001_streaming";
pub const DEFAULT_ENCODING: &str = "mp3";
pub const DEFAULT_WORD_LIMIT: usize = 1024;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Credentials and synthesis settings for the TTS service
#[derive(Debug)]
pub struct TtsConfig {
    pub app_id: String,
    access_token: SecretBox<String>,
    pub cluster: String,
    pub host: String,
    pub voice: String,
    pub encoding: String,
    pub word_limit: usize,
}

impl TtsConfig {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Parse configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let app_id = required(&lookup, "VOLC_APP_ID")?;
        let access_token = required(&lookup, "VOLC_ACCESS_TOKEN")?;

        let word_limit = match lookup("VOLC_TTS_WORD_LIMIT") {
            Some(raw) => {
                let limit = raw
                    .trim()
                    .parse::<usize>()
                    .map_err(|e| ConfigError::InvalidValue {
                        var: "VOLC_TTS_WORD_LIMIT".to_string(),
                        reason: e.to_string(),
                    })?;
                if limit == 0 {
                    return Err(ConfigError::InvalidValue {
                        var: "VOLC_TTS_WORD_LIMIT".to_string(),
                        reason: "must be greater than zero".to_string(),
                    });
                }
                limit
            }
            None => DEFAULT_WORD_LIMIT,
        };

        Ok(Self {
            app_id,
            access_token: SecretBox::new(Box::new(access_token)),
            cluster: optional(&lookup, "VOLC_CLUSTER", DEFAULT_CLUSTER),
            host: optional(&lookup, "VOLC_TTS_HOST", DEFAULT_HOST),
            voice: optional(&lookup, "VOLC_TTS_VOICE", DEFAULT_VOICE),
            encoding: optional(&lookup, "VOLC_TTS_ENCODING", DEFAULT_ENCODING),
            word_limit,
        })
    }

    /// Access token (use only when making API calls)
    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn endpoint(&self) -> TtsResult<Endpoint> {
        Endpoint::new(&self.host, self.access_token())
    }

    pub fn request_defaults(&self) -> RequestDefaults {
        let mut defaults = RequestDefaults::new(AppInfo {
            appid: self.app_id.clone(),
            token: self.access_token().to_string(),
            cluster: self.cluster.clone(),
        });
        defaults.encoding = self.encoding.clone();
        defaults.max_chunk_chars = self.word_limit;
        defaults
    }
}

fn required<F>(lookup: &F, var: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        Some(_) => Err(ConfigError::InvalidValue {
            var: var.to_string(),
            reason: "cannot be empty".to_string(),
        }),
        None => Err(ConfigError::MissingEnvVar(var.to_string())),
    }
}

fn optional<F>(lookup: &F, var: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Load configuration with helpful error messages for development
pub fn load_config() -> Result<TtsConfig, ConfigError> {
    match TtsConfig::load() {
        Ok(config) => {
            log::info!("Successfully loaded TTS configuration");
            Ok(config)
        }
        Err(ConfigError::MissingEnvVar(var)) => {
            log::error!("Missing required environment variable: {}", var);
            log::error!("Create a .env file in the project root with:");
            log::error!("{}=your_value_here", var);
            Err(ConfigError::MissingEnvVar(var))
        }
        Err(e) => {
            log::error!("Configuration error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = TtsConfig::from_lookup(lookup_from(&[
            ("VOLC_APP_ID", "123"),
            ("VOLC_ACCESS_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(config.app_id, "123");
        assert_eq!(config.access_token(), "tok");
        assert_eq!(config.cluster, DEFAULT_CLUSTER);
        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.voice, DEFAULT_VOICE);
        assert_eq!(config.encoding, DEFAULT_ENCODING);
        assert_eq!(config.word_limit, DEFAULT_WORD_LIMIT);

        let defaults = config.request_defaults();
        assert_eq!(defaults.app.token, "tok");
        assert_eq!(defaults.max_chunk_chars, DEFAULT_WORD_LIMIT);
        assert_eq!(
            config.endpoint().unwrap().url(),
            "wss://openspeech.bytedance.com/api/v1/tts/ws_binary"
        );
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(matches!(
            TtsConfig::from_lookup(lookup_from(&[("VOLC_APP_ID", "123")])),
            Err(ConfigError::MissingEnvVar(var)) if var == "VOLC_ACCESS_TOKEN"
        ));
        assert!(matches!(
            TtsConfig::from_lookup(lookup_from(&[
                ("VOLC_APP_ID", "123"),
                ("VOLC_ACCESS_TOKEN", "  "),
            ])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            TtsConfig::from_lookup(lookup_from(&[
                ("VOLC_APP_ID", "123"),
                ("VOLC_ACCESS_TOKEN", "tok"),
                ("VOLC_TTS_WORD_LIMIT", "0"),
            ])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            TtsConfig::from_lookup(lookup_from(&[
                ("VOLC_APP_ID", "123"),
                ("VOLC_ACCESS_TOKEN", "tok"),
                ("VOLC_TTS_WORD_LIMIT", "many"),
            ])),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_load_from_environment() {
        env::set_var("VOLC_APP_ID", "env-app");
        env::set_var("VOLC_ACCESS_TOKEN", "env-token");
        env::set_var("VOLC_TTS_WORD_LIMIT", "300");

        let config = TtsConfig::load().unwrap();
        assert_eq!(config.app_id, "env-app");
        assert_eq!(config.access_token(), "env-token");
        assert_eq!(config.word_limit, 300);

        env::remove_var("VOLC_APP_ID");
        env::remove_var("VOLC_ACCESS_TOKEN");
        env::remove_var("VOLC_TTS_WORD_LIMIT");
    }
}
