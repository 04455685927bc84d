//! Configuration types.
//!
//! Everything is read from the environment once at start-up and then
//! handed to the components that need it.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Environment variable holding the Telegram bot token.
pub const TOKEN_ENV: &str = "RECRUIT_BOT_TOKEN";

/// Default GitHub REST API base URL.
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Default `User-Agent` sent with every GitHub request.
pub const DEFAULT_USER_AGENT: &str = "recruit-utils-bot";

/// GitHub caps `per_page` at 100.
const MAX_PAGE_SIZE: u32 = 100;

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram settings; `None` when running with the CLI channel only.
    pub telegram: Option<TelegramConfig>,
    /// Whether to read messages from stdin as well.
    pub cli_enabled: bool,
    /// Path of the JSON logging configuration file.
    pub log_config_path: PathBuf,
    pub github: GitHubConfig,
}

/// Telegram channel settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids allowed to talk to the bot; `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// GitHub REST client settings.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Optional token; anonymous requests are used when absent.
    pub token: Option<SecretString>,
    /// `per_page` for list endpoints.
    pub page_size: u32,
    /// Upper bound on pages fetched per listing.
    pub max_pages: u32,
    pub timeout: Duration,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GITHUB_API_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token: None,
            page_size: MAX_PAGE_SIZE,
            max_pages: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cli_enabled = var("RECRUIT_BOT_CLI")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let telegram = match var(TOKEN_ENV) {
            Some(token) => Some(TelegramConfig {
                bot_token: SecretString::from(token.trim().to_string()),
                allowed_users: parse_list(
                    &var("RECRUIT_BOT_ALLOWED_USERS").unwrap_or_else(|| "*".to_string()),
                ),
            }),
            None if cli_enabled => None,
            None => return Err(ConfigError::MissingEnvVar(TOKEN_ENV.to_string())),
        };

        let log_config_path = var("RECRUIT_BOT_LOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("logging.json"));

        let defaults = GitHubConfig::default();

        let page_size = parse_number("GITHUB_PAGE_SIZE", var("GITHUB_PAGE_SIZE"), defaults.page_size)?;
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ConfigError::InvalidValue {
                key: "GITHUB_PAGE_SIZE".into(),
                message: format!("must be between 1 and {MAX_PAGE_SIZE}, got {page_size}"),
            });
        }

        let max_pages = parse_number("GITHUB_MAX_PAGES", var("GITHUB_MAX_PAGES"), defaults.max_pages)?;
        if max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                key: "GITHUB_MAX_PAGES".into(),
                message: "must be at least 1".into(),
            });
        }

        let timeout_secs = parse_number(
            "GITHUB_TIMEOUT_SECS",
            var("GITHUB_TIMEOUT_SECS"),
            defaults.timeout.as_secs(),
        )?;

        let github = GitHubConfig {
            base_url: var("GITHUB_API_URL")
                .map(|u| u.trim().trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            user_agent: var("GITHUB_USER_AGENT").unwrap_or(defaults.user_agent),
            token: var("GITHUB_TOKEN").map(|t| SecretString::from(t.trim().to_string())),
            page_size,
            max_pages,
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            telegram,
            cli_enabled,
            log_config_path,
            github,
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(default),
    }
}
