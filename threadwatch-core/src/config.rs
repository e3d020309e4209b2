//! Process configuration.
//!
//! Settings come from three layers, later layers winning: built-in defaults,
//! an optional TOML file, and environment variables for credentials.

use crate::error::ConfigError;
use crate::types::KeywordMatcher;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "threadwatch.toml";

pub const ENV_REDDIT_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_REDDIT_USER_AGENT: &str = "REDDIT_USER_AGENT";
pub const ENV_MAIL_USER: &str = "USER_EMAIL";
pub const ENV_MAIL_PASSWORD: &str = "USER_PASSWORD";
pub const ENV_MAIL_RECIPIENT: &str = "USER_RECIPIENT_EMAIL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

pub const DEFAULT_KEYWORDS: [&str; 9] = [
    "airbnb",
    "solve this problem",
    "I need help for",
    "how to solve",
    "how can I do",
    "where I find",
    "what can I do",
    "I have a problem",
    "help me",
];

/// Reddit caps listing depth at roughly this many items.
pub const MAX_FETCH_LIMIT: u32 = 1000;

/// Longest accepted reconciliation window, one week.
pub const MAX_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub reddit: RedditConfig,
    pub mail: MailConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub keywords: Vec<String>,
    pub poll_interval_secs: u64,
    pub window_secs: u64,
    pub fetch_limit: u32,
    pub results_path: PathBuf,
    pub tracking_path: PathBuf,
    /// Drop raw rows that fell out of the window without being reconciled.
    pub retire_stale_raw: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            poll_interval_secs: 300,
            window_secs: 3600,
            fetch_limit: MAX_FETCH_LIMIT,
            results_path: PathBuf::from("results.csv"),
            tracking_path: PathBuf::from("tracking.csv"),
            retire_stale_raw: true,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Clamped to [`MAX_WINDOW_SECS`]; `validate` rejects anything longer.
    pub fn window(&self) -> chrono::Duration {
        let secs = self.window_secs.min(MAX_WINDOW_SECS) as i64;
        chrono::TimeDelta::try_seconds(secs)
            .unwrap_or_else(|| chrono::TimeDelta::seconds(MAX_WINDOW_SECS as i64))
    }

    pub fn keyword_matcher(&self) -> KeywordMatcher {
        KeywordMatcher::new(&self.keywords)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
    pub subreddit: String,
    pub api_base_url: String,
    pub token_url: String,
    pub request_timeout_secs: u64,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: String::new(),
            subreddit: "all".to_string(),
            api_base_url: "https://oauth.reddit.com".to_string(),
            token_url: "https://www.reddit.com/api/v1/access_token".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub recipient: String,
    pub timeout_secs: u64,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            recipient: String::new(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            timeout_secs: 120,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or `threadwatch.toml` when present, then applies the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let contents = match path {
            Some(path) => Some(std::fs::read_to_string(path).map_err(|_| {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            })?),
            None => std::fs::read_to_string(DEFAULT_CONFIG_FILE).ok(),
        };

        Self::from_sources(contents.as_deref(), |name| std::env::var(name).ok())
    }

    pub fn from_sources<F>(toml_text: Option<&str>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = match toml_text {
            Some(text) => toml::from_str(text)?,
            None => AppConfig::default(),
        };

        let lookup = |name: &str| env(name).filter(|value| !value.trim().is_empty());
        let overlay = |target: &mut String, name: &str| {
            if let Some(value) = lookup(name) {
                *target = value;
            }
        };

        overlay(&mut config.reddit.client_id, ENV_REDDIT_CLIENT_ID);
        overlay(&mut config.reddit.client_secret, ENV_REDDIT_CLIENT_SECRET);
        overlay(&mut config.reddit.user_agent, ENV_REDDIT_USER_AGENT);
        overlay(&mut config.mail.username, ENV_MAIL_USER);
        overlay(&mut config.mail.password, ENV_MAIL_PASSWORD);
        overlay(&mut config.mail.recipient, ENV_MAIL_RECIPIENT);
        overlay(&mut config.llm.api_key, ENV_OPENAI_API_KEY);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.reddit.client_id, ENV_REDDIT_CLIENT_ID),
            (&self.reddit.client_secret, ENV_REDDIT_CLIENT_SECRET),
            (&self.reddit.user_agent, ENV_REDDIT_USER_AGENT),
            (&self.mail.username, ENV_MAIL_USER),
            (&self.mail.password, ENV_MAIL_PASSWORD),
            (&self.mail.recipient, ENV_MAIL_RECIPIENT),
            (&self.llm.api_key, ENV_OPENAI_API_KEY),
        ];
        for (value, var_name) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingEnvironmentVariable {
                    var_name: var_name.to_string(),
                });
            }
        }

        if self.monitor.keyword_matcher().is_empty() {
            return Err(ConfigError::MissingField {
                field: "monitor.keywords".to_string(),
            });
        }

        let positive = [
            ("monitor.poll_interval_secs", self.monitor.poll_interval_secs),
            ("monitor.window_secs", self.monitor.window_secs),
            ("reddit.request_timeout_secs", self.reddit.request_timeout_secs),
            ("mail.timeout_secs", self.mail.timeout_secs),
            ("llm.timeout_secs", self.llm.timeout_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(invalid(field, value));
            }
        }

        if self.monitor.window_secs > MAX_WINDOW_SECS {
            return Err(invalid("monitor.window_secs", self.monitor.window_secs));
        }

        if self.monitor.fetch_limit == 0 || self.monitor.fetch_limit > MAX_FETCH_LIMIT {
            return Err(invalid("monitor.fetch_limit", self.monitor.fetch_limit));
        }

        if self.mail.smtp_port == 0 {
            return Err(invalid("mail.smtp_port", self.mail.smtp_port));
        }

        if self.reddit.subreddit.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "reddit.subreddit".to_string(),
            });
        }

        for (field, value) in [
            ("reddit.api_base_url", &self.reddit.api_base_url),
            ("reddit.token_url", &self.reddit.token_url),
            ("llm.base_url", &self.llm.base_url),
        ] {
            url::Url::parse(value).map_err(|_| invalid(field, value))?;
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}
