//! Server configuration
//!
//! Values come from the environment, optionally overridden by a TOML file and
//! finally by CLI flags (see `main.rs`).
//!
//! ```toml
//! default_model = "auto"
//! consensus_model_timeout_secs = 600
//! max_conversation_turns = 20
//! conversation_timeout_hours = 3
//!
//! [providers.gemini]
//! api_key = "..."
//!
//! [providers.custom]
//! base_url = "http://localhost:11434/v1"
//! default_model = "llama3.2"
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::providers::ProviderKind;

pub const DEFAULT_CONSENSUS_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_MAX_CONVERSATION_TURNS: usize = 20;
pub const DEFAULT_CONVERSATION_TIMEOUT_HOURS: u64 = 3;
pub const DEFAULT_CUSTOM_MODEL: &str = "llama3.2";

/// Credentials and endpoint for one provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

impl ProviderConfig {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Default::default()
        }
    }

    /// API key if it is set to something other than a placeholder
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| is_real_key(k))
    }

    fn merge(&mut self, other: ProviderConfig) {
        if other.api_key.is_some() {
            self.api_key = other.api_key;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.default_model.is_some() {
            self.default_model = other.default_model;
        }
    }
}

/// Rejects empty values and the `your_..._here` placeholders from `.env.example`
pub fn is_real_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && !(key.starts_with("your_") && key.ends_with("_here"))
}

/// Top-level server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Model used by `chat` when the request names none
    pub default_model: String,
    /// Per-call timeout for models without a catalog override
    pub consensus_model_timeout: Duration,
    /// Messages a conversation may hold before a new one is started
    pub max_conversation_turns: usize,
    /// Idle time after which a conversation expires
    pub conversation_timeout: Duration,
    /// Log directive for tracing-subscriber
    pub log_level: String,
    pub providers: HashMap<ProviderKind, ProviderConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            default_model: "auto".to_string(),
            consensus_model_timeout: Duration::from_secs(DEFAULT_CONSENSUS_TIMEOUT_SECS),
            max_conversation_turns: DEFAULT_MAX_CONVERSATION_TURNS,
            conversation_timeout: Duration::from_secs(DEFAULT_CONVERSATION_TIMEOUT_HOURS * 3600),
            log_level: "info".to_string(),
            providers: HashMap::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut providers = HashMap::new();
        for kind in ProviderKind::ALL {
            if kind == ProviderKind::Custom {
                continue;
            }
            if let Some(key) = lookup(kind.api_key_env()).filter(|k| is_real_key(k)) {
                providers.insert(kind, ProviderConfig::with_api_key(key));
            }
        }

        if let Some(url) = lookup("CUSTOM_API_URL").filter(|u| !u.trim().is_empty()) {
            providers.insert(
                ProviderKind::Custom,
                ProviderConfig {
                    api_key: lookup("CUSTOM_API_KEY"),
                    base_url: Some(url),
                    default_model: Some(
                        lookup("CUSTOM_MODEL_NAME")
                            .filter(|m| !m.trim().is_empty())
                            .unwrap_or_else(|| DEFAULT_CUSTOM_MODEL.to_string()),
                    ),
                },
            );
        }

        let consensus_secs = parse_positive(
            lookup("CONSENSUS_MODEL_TIMEOUT"),
            "CONSENSUS_MODEL_TIMEOUT",
            DEFAULT_CONSENSUS_TIMEOUT_SECS,
        );
        let max_turns = parse_positive(
            lookup("MAX_CONVERSATION_TURNS"),
            "MAX_CONVERSATION_TURNS",
            DEFAULT_MAX_CONVERSATION_TURNS as u64,
        );
        let timeout_hours = parse_positive(
            lookup("CONVERSATION_TIMEOUT_HOURS"),
            "CONVERSATION_TIMEOUT_HOURS",
            DEFAULT_CONVERSATION_TIMEOUT_HOURS,
        );

        Self {
            default_model: lookup("DEFAULT_MODEL")
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "auto".to_string()),
            consensus_model_timeout: Duration::from_secs(consensus_secs),
            max_conversation_turns: max_turns as usize,
            conversation_timeout: Duration::from_secs(timeout_hours * 3600),
            log_level: lookup("LOG_LEVEL")
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| "info".to_string()),
            providers,
        }
    }

    /// Apply overrides from a TOML file
    pub fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        self.merge_toml(&content)
    }

    /// Apply overrides from TOML text
    pub fn merge_toml(&mut self, content: &str) -> Result<(), ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;

        if let Some(model) = file.default_model {
            self.default_model = model;
        }
        if let Some(secs) = file.consensus_model_timeout_secs.filter(|s| *s > 0) {
            self.consensus_model_timeout = Duration::from_secs(secs);
        }
        if let Some(turns) = file.max_conversation_turns.filter(|t| *t > 0) {
            self.max_conversation_turns = turns;
        }
        if let Some(hours) = file.conversation_timeout_hours.filter(|h| *h > 0) {
            self.conversation_timeout = Duration::from_secs(hours * 3600);
        }
        if let Some(level) = file.log_level {
            self.log_level = level;
        }
        for (name, provider) in file.providers {
            let kind: ProviderKind = name.parse().map_err(ConfigError::UnknownProvider)?;
            self.providers.entry(kind).or_default().merge(provider);
        }
        Ok(())
    }

    /// Level for this crate's tracing directive: the CLI flag wins over the
    /// merged file/environment value
    pub fn effective_log_level<'a>(&'a self, cli: Option<&'a str>) -> &'a str {
        cli.map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(self.log_level.as_str())
    }

    /// How often the continuation sweep runs: a tenth of the TTL, at least five minutes
    pub fn cleanup_interval(&self) -> Duration {
        (self.conversation_timeout / 10).max(Duration::from_secs(300))
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    default_model: Option<String>,
    consensus_model_timeout_secs: Option<u64>,
    max_conversation_turns: Option<usize>,
    conversation_timeout_hours: Option<u64>,
    log_level: Option<String>,
    #[serde(default)]
    providers: HashMap<String, ProviderConfig>,
}

fn parse_positive(value: Option<String>, name: &str, default: u64) -> u64 {
    match value {
        None => default,
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v > 0.0 => v as u64,
            _ => {
                tracing::warn!("Invalid {} value ('{}'), using default of {}", name, raw, default);
                default
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ServerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.default_model, "auto");
        assert_eq!(config.consensus_model_timeout, Duration::from_secs(600));
        assert_eq!(config.max_conversation_turns, 20);
        assert_eq!(config.conversation_timeout, Duration::from_secs(3 * 3600));
        assert!(config.providers.is_empty());
    }

    #[test]
    fn test_placeholder_keys_are_ignored() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "your_gemini_api_key_here"),
            ("OPENAI_API_KEY", "sk-real"),
            ("XAI_API_KEY", "   "),
        ]));
        assert!(!config.providers.contains_key(&ProviderKind::Gemini));
        assert!(!config.providers.contains_key(&ProviderKind::XAi));
        assert_eq!(
            config.providers[&ProviderKind::OpenAi].usable_api_key(),
            Some("sk-real")
        );
    }

    #[test]
    fn test_custom_provider_needs_url() {
        let config = ServerConfig::from_lookup(lookup_from(&[("CUSTOM_API_KEY", "k")]));
        assert!(!config.providers.contains_key(&ProviderKind::Custom));

        let config = ServerConfig::from_lookup(lookup_from(&[(
            "CUSTOM_API_URL",
            "http://localhost:11434/v1",
        )]));
        let custom = &config.providers[&ProviderKind::Custom];
        assert_eq!(custom.default_model.as_deref(), Some("llama3.2"));
        assert!(custom.api_key.is_none());
    }

    #[test]
    fn test_invalid_timeout_falls_back() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("CONSENSUS_MODEL_TIMEOUT", "-5"),
            ("MAX_CONVERSATION_TURNS", "abc"),
            ("CONVERSATION_TIMEOUT_HOURS", "1"),
        ]));
        assert_eq!(config.consensus_model_timeout, Duration::from_secs(600));
        assert_eq!(config.max_conversation_turns, 20);
        assert_eq!(config.conversation_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_cleanup_interval_has_floor() {
        let mut config = ServerConfig::default();
        assert_eq!(config.cleanup_interval(), Duration::from_secs(1080));
        config.conversation_timeout = Duration::from_secs(600);
        assert_eq!(config.cleanup_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_toml_overrides_env() {
        let mut config = ServerConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-env")]));
        config
            .merge_toml(
                r#"
default_model = "o3"
max_conversation_turns = 8

[providers.openai]
api_key = "sk-file"

[providers.custom]
base_url = "http://localhost:8080/v1"
"#,
            )
            .unwrap();
        assert_eq!(config.default_model, "o3");
        assert_eq!(config.max_conversation_turns, 8);
        assert_eq!(
            config.providers[&ProviderKind::OpenAi].api_key.as_deref(),
            Some("sk-file")
        );
        assert!(config.providers.contains_key(&ProviderKind::Custom));
    }

    #[test]
    fn test_toml_rejects_unknown_provider() {
        let mut config = ServerConfig::default();
        let err = config
            .merge_toml("[providers.mystery]\napi_key = \"x\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "mystery"));
    }

    #[test]
    fn test_log_level_precedence() {
        let mut config = ServerConfig::from_lookup(lookup_from(&[("LOG_LEVEL", "warn")]));
        assert_eq!(config.effective_log_level(None), "warn");

        config.merge_toml("log_level = \"debug\"\n").unwrap();
        assert_eq!(config.effective_log_level(None), "debug");
        assert_eq!(config.effective_log_level(Some("trace")), "trace");
        assert_eq!(config.effective_log_level(Some("  ")), "debug");
    }
}
