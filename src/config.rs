use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::chatbot::controller::{ControllerConfig, DEFAULT_FALLBACK_REPLY};
use crate::chatbot::gemini::{GeminiClient, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::chatbot::generator::GenerationError;
use crate::chatbot::intents::{default_intents, Intent, IntentTable, DEFAULT_HUMOR_MARKERS};
use crate::chatbot::playback::TypingPace;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Invalid regex pattern.
    InvalidRegex { pattern: String, source: regex::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidRegex { pattern, source } => {
                write!(f, "invalid regex pattern '{}': {}", pattern, source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::InvalidRegex { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct IntentFile {
    name: String,
    pattern: String,
    replies: Vec<String>,
}

#[derive(Deserialize)]
struct ConfigFile {
    /// Gemini API key. Falls back to $GEMINI_API_KEY when empty.
    #[serde(default)]
    gemini_api_key: String,
    gemini_model: Option<String>,
    gemini_base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_canned_delay_ms")]
    canned_delay_ms: u64,
    #[serde(default = "default_typing_min_ms")]
    typing_min_ms: u64,
    #[serde(default = "default_typing_max_ms")]
    typing_max_ms: u64,
    /// Name of the portfolio owner, used in the generation prompt.
    owner_name: Option<String>,
    /// Custom system context for the generation prompt.
    persona: Option<String>,
    fallback_reply: Option<String>,
    #[serde(default)]
    humor_markers: Vec<String>,
    /// Replaces the built-in intent table when non-empty.
    #[serde(default)]
    intents: Vec<IntentFile>,
    /// Directory for state files (logs). Defaults to current directory.
    data_dir: Option<String>,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_canned_delay_ms() -> u64 {
    500
}

fn default_typing_min_ms() -> u64 {
    10
}

fn default_typing_max_ms() -> u64 {
    30
}

const DEFAULT_OWNER_NAME: &str = "Alex";

pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub request_timeout: Duration,
    pub canned_delay: Duration,
    pub typing_pace: TypingPace,
    pub owner_name: String,
    /// System context placed at the top of every generation prompt.
    pub persona: String,
    pub fallback_reply: String,
    pub humor_markers: Vec<String>,
    pub intents: IntentTable,
    /// Directory for state files (logs).
    pub data_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: std::env::var("GEMINI_API_KEY").unwrap_or_default(),
            gemini_model: DEFAULT_MODEL.to_string(),
            gemini_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(default_request_timeout_secs()),
            canned_delay: Duration::from_millis(default_canned_delay_ms()),
            typing_pace: TypingPace::from_millis(default_typing_min_ms(), default_typing_max_ms()),
            owner_name: DEFAULT_OWNER_NAME.to_string(),
            persona: default_persona(DEFAULT_OWNER_NAME),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            humor_markers: DEFAULT_HUMOR_MARKERS.iter().map(|m| m.to_string()).collect(),
            intents: default_intents(),
            data_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.request_timeout_secs == 0 {
            return Err(ConfigError::Validation("request_timeout_secs must be greater than 0".into()));
        }
        if file.typing_min_ms > file.typing_max_ms {
            return Err(ConfigError::Validation(format!(
                "typing_min_ms ({}) must not exceed typing_max_ms ({})",
                file.typing_min_ms, file.typing_max_ms
            )));
        }
        if let Some(ref reply) = file.fallback_reply
            && reply.trim().is_empty()
        {
            return Err(ConfigError::Validation("fallback_reply must not be blank".into()));
        }

        let intents = if file.intents.is_empty() {
            default_intents()
        } else {
            let mut compiled = Vec::with_capacity(file.intents.len());
            for intent in file.intents {
                if intent.replies.is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "intent '{}' must have at least one reply",
                        intent.name
                    )));
                }
                let compiled_intent = Intent::new(intent.name, &intent.pattern, intent.replies)
                    .map_err(|e| ConfigError::InvalidRegex { pattern: intent.pattern, source: e })?;
                compiled.push(compiled_intent);
            }
            IntentTable::new(compiled)
        };

        let gemini_api_key = if file.gemini_api_key.is_empty() {
            std::env::var("GEMINI_API_KEY").unwrap_or_default()
        } else {
            file.gemini_api_key
        };

        let owner_name = file.owner_name.unwrap_or_else(|| DEFAULT_OWNER_NAME.to_string());
        let persona = file.persona.unwrap_or_else(|| default_persona(&owner_name));

        let humor_markers = if file.humor_markers.is_empty() {
            DEFAULT_HUMOR_MARKERS.iter().map(|m| m.to_string()).collect()
        } else {
            file.humor_markers.into_iter().map(|m| m.trim().to_lowercase()).collect()
        };

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(Self {
            gemini_api_key,
            gemini_model: file.gemini_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_base_url: file.gemini_base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: Duration::from_secs(file.request_timeout_secs),
            canned_delay: Duration::from_millis(file.canned_delay_ms),
            typing_pace: TypingPace::from_millis(file.typing_min_ms, file.typing_max_ms),
            owner_name,
            persona,
            fallback_reply: file.fallback_reply.unwrap_or_else(|| DEFAULT_FALLBACK_REPLY.to_string()),
            humor_markers,
            intents,
            data_dir,
        })
    }

    /// Controller tunables derived from this config.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            canned_delay: self.canned_delay,
            pace: self.typing_pace,
            remote_timeout: self.request_timeout,
            fallback_reply: self.fallback_reply.clone(),
            humor_markers: self.humor_markers.clone(),
        }
    }

    pub fn gemini_client(&self) -> Result<GeminiClient, GenerationError> {
        GeminiClient::new(
            self.gemini_api_key.clone(),
            self.gemini_base_url.clone(),
            self.gemini_model.clone(),
            self.persona.clone(),
            self.request_timeout,
        )
    }
}

fn default_persona(owner_name: &str) -> String {
    format!(
        "You are the assistant on {owner_name}'s personal portfolio website and you speak as {owner_name}. \
         {owner_name} is a full-stack developer who builds web platforms and developer tools. \
         The site has sections for skills, projects, a career timeline and a contact form."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let file = write_config("{}");
        let config = Config::load(file.path()).expect("should load empty config");
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.canned_delay, Duration::from_millis(500));
        assert_eq!(config.typing_pace, TypingPace::from_millis(10, 30));
        assert_eq!(config.fallback_reply, DEFAULT_FALLBACK_REPLY);
        assert_eq!(config.humor_markers, vec!["joke", "funny", "haha", "tease"]);
        assert_eq!(config.intents.len(), default_intents().len());
        assert!(config.persona.contains("Alex"));
    }

    #[test]
    fn test_full_config() {
        let file = write_config(r#"{
            "gemini_api_key": "abc",
            "gemini_model": "gemini-1.5-pro",
            "request_timeout_secs": 5,
            "canned_delay_ms": 0,
            "typing_min_ms": 1,
            "typing_max_ms": 2,
            "owner_name": "Sam",
            "fallback_reply": "Nope.",
            "humor_markers": [" LOL "],
            "intents": [
                {"name": "pets", "pattern": "\\b(cat|dog)s?\\b", "replies": ["One cat.", "Still one cat."]}
            ],
            "data_dir": "/tmp/foliobot"
        }"#);
        let config = Config::load(file.path()).expect("should load valid config");
        assert_eq!(config.gemini_api_key, "abc");
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert!(config.persona.contains("Sam"));
        assert_eq!(config.humor_markers, vec!["lol"]);
        assert_eq!(config.intents.len(), 1);
        assert_eq!(config.intents.resolve("do you have dogs", 1).unwrap().text, "Still one cat.");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/foliobot"));

        let controller = config.controller_config();
        assert_eq!(controller.remote_timeout, Duration::from_secs(5));
        assert_eq!(controller.canned_delay, Duration::ZERO);
        assert_eq!(controller.fallback_reply, "Nope.");
    }

    #[test]
    fn test_persona_override() {
        let file = write_config(r#"{"persona": "You are a pirate."}"#);
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.persona, "You are a pirate.");
    }

    #[test]
    fn test_invalid_regex_pattern() {
        let file = write_config(r#"{
            "intents": [{"name": "bad", "pattern": "[invalid(regex", "replies": ["x"]}]
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::InvalidRegex { .. }));
    }

    #[test]
    fn test_intent_without_replies() {
        let file = write_config(r#"{
            "intents": [{"name": "empty", "pattern": "x", "replies": []}]
        }"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_typing_range_inverted() {
        let file = write_config(r#"{"typing_min_ms": 50, "typing_max_ms": 10}"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("typing_min_ms"));
    }

    #[test]
    fn test_zero_timeout() {
        let file = write_config(r#"{"request_timeout_secs": 0}"#);
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_blank_fallback() {
        let file = write_config(r#"{"fallback_reply": "   "}"#);
        let err = assert_err(Config::load(file.path()));
        assert!(err.to_string().contains("fallback_reply"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::load("/nonexistent/path/config.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_config("{ invalid json }");
        let err = assert_err(Config::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
