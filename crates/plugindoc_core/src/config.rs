use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::confluence::{ConfluenceClientConfig, DEFAULT_ENDPOINT, DEFAULT_USER_AGENT};
use crate::error::InputError;
use crate::render::Messages;
use crate::session::Credentials;
use crate::sync::{DEFAULT_PARENT_PAGE, SyncOptions};

pub const DEFAULT_CONFIG_PATH: &str = ".plugindoc/config.toml";
pub const DEFAULT_USERNAME: &str = "admin";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct PluginDocConfig {
    #[serde(default)]
    pub confluence: ConfluenceSection,
    /// Overrides for the fixed strings of rendered pages.
    #[serde(default)]
    pub messages: Messages,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ConfluenceSection {
    pub endpoint: Option<String>,
    pub space_key: Option<String>,
    pub parent_page: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub max_retries: Option<usize>,
    pub retry_delay_ms: Option<u64>,
    pub version_message: Option<String>,
}

/// Values given on the command line. They win over env and config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub endpoint: Option<String>,
    pub space_key: Option<String>,
    pub parent_page: Option<String>,
    pub username: Option<String>,
}

/// Everything a publish run needs, fully resolved.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub client: ConfluenceClientConfig,
    pub credentials: Credentials,
    pub options: SyncOptions,
}

/// Load and parse a PluginDocConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<PluginDocConfig> {
    if !config_path.exists() {
        return Ok(PluginDocConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: PluginDocConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

impl PluginDocConfig {
    /// Resolve settings: overrides > env > config > defaults.
    pub fn resolve(&self, overrides: &ConfigOverrides) -> Result<PublishSettings, InputError> {
        self.resolve_with(overrides, |key| env::var(key).ok())
    }

    pub fn resolve_with<F>(
        &self,
        overrides: &ConfigOverrides,
        lookup: F,
    ) -> Result<PublishSettings, InputError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = &self.confluence;
        let pick = |flag: &Option<String>, key: &str, configured: &Option<String>| {
            non_blank(flag.clone())
                .or_else(|| non_blank(lookup(key)))
                .or_else(|| non_blank(configured.clone()))
        };

        let space_key = pick(&overrides.space_key, "CONFLUENCE_SPACE_KEY", &section.space_key)
            .ok_or(InputError::MissingSetting("space key"))?;
        let parent_page_title = match &overrides.parent_page {
            Some(flag) if flag.trim().is_empty() => {
                return Err(InputError::MissingSetting("parent page title"));
            }
            _ => pick(
                &overrides.parent_page,
                "CONFLUENCE_PARENT_PAGE",
                &section.parent_page,
            )
            .unwrap_or_else(|| DEFAULT_PARENT_PAGE.to_string()),
        };
        let username = pick(&overrides.username, "CONFLUENCE_USERNAME", &section.username)
            .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
        let password = non_blank(lookup("CONFLUENCE_PASSWORD"))
            .or_else(|| non_blank(section.password.clone()))
            .ok_or(InputError::MissingSetting("password"))?;

        let defaults = ConfluenceClientConfig::default();
        let client = ConfluenceClientConfig {
            endpoint: pick(&overrides.endpoint, "CONFLUENCE_ENDPOINT", &section.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            user_agent: non_blank(lookup("CONFLUENCE_USER_AGENT"))
                .or_else(|| non_blank(section.user_agent.clone()))
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            timeout_ms: parsed(lookup("CONFLUENCE_HTTP_TIMEOUT_MS"))
                .or(section.timeout_ms)
                .unwrap_or(defaults.timeout_ms),
            max_retries: parsed(lookup("CONFLUENCE_HTTP_RETRIES"))
                .or(section.max_retries)
                .unwrap_or(defaults.max_retries),
            retry_delay_ms: section.retry_delay_ms.unwrap_or(defaults.retry_delay_ms),
            version_message: non_blank(section.version_message.clone())
                .unwrap_or(defaults.version_message),
            ..defaults
        };

        let mut options = SyncOptions::new(space_key);
        options.parent_page_title = parent_page_title;
        options.messages = self.messages.clone();

        Ok(PublishSettings {
            client,
            credentials: Credentials { username, password },
            options,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
}

fn parsed<T: std::str::FromStr>(value: Option<String>) -> Option<T> {
    value.and_then(|item| item.trim().parse::<T>().ok())
}
