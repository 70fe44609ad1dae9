//! Configuration management

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::services::EngineSettings;
use crate::domain::entities::{CommandKind, DEFAULT_ITEMS_PER_PAGE};

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub dispatch: DispatchConfig,
    pub session: SessionConfig,
    pub security: SecurityConfig,
    pub adapters: AdaptersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
}

/// Debounce and flush timing of the dispatcher
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DispatchConfig {
    pub default_debounce_ms: u64,
    /// Per-command debounce, keyed by command name (`page-forward`, `join`, ...)
    pub debounce_overrides_ms: BTreeMap<String, u64>,
    pub flush_delay_ms: u64,
    pub confirm_window_secs: u64,
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    pub items_per_page: usize,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SecurityConfig {
    /// Members need one of these roles; empty admits everyone
    pub required_roles: Vec<String>,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AdaptersConfig {
    pub console: Option<ConsoleConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ConsoleConfig {
    pub enabled: bool,
    pub group_id: String,
    pub user_id: String,
    pub roles: Vec<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "cadence-bot".to_string(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_debounce_ms: 250,
            debounce_overrides_ms: BTreeMap::new(),
            flush_delay_ms: 100,
            confirm_window_secs: 5,
            shutdown_grace_secs: 5,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
            store_path: PathBuf::from("data/sessions.json"),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 20,
            window_seconds: 60,
        }
    }
}

impl Default for AdaptersConfig {
    fn default() -> Self {
        Self {
            console: Some(ConsoleConfig::default()),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            group_id: "console".to_string(),
            user_id: "console-user".to_string(),
            roles: Vec::new(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn load_env() -> Result<Self, ConfigError> {
        Config::default().with_env_overrides()
    }

    /// Apply `BOT_NAME`, `DISPATCH_DEBOUNCE_MS` and `SESSION_STORE_PATH`
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        if let Some(name) = var("BOT_NAME") {
            self.bot.name = name;
        }
        if let Some(debounce) = var("DISPATCH_DEBOUNCE_MS") {
            self.dispatch.default_debounce_ms = debounce
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("DISPATCH_DEBOUNCE_MS={}", debounce)))?;
        }
        if let Some(path) = var("SESSION_STORE_PATH") {
            self.session.store_path = PathBuf::from(path);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.items_per_page == 0 {
            return Err(ConfigError::InvalidValue("session.items-per-page must be positive".to_string()));
        }
        if self.security.rate_limit.enabled && self.security.rate_limit.max_requests == 0 {
            return Err(ConfigError::InvalidValue(
                "security.rate-limit.max-requests must be positive".to_string(),
            ));
        }
        for name in self.dispatch.debounce_overrides_ms.keys() {
            name.parse::<CommandKind>()
                .map_err(|_| ConfigError::InvalidValue(format!("unknown command in debounce-overrides-ms: {}", name)))?;
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        serde_yaml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let dispatch = &self.dispatch;
        let debounce_overrides = dispatch
            .debounce_overrides_ms
            .iter()
            .map(|(name, ms)| {
                name.parse::<CommandKind>()
                    .map(|kind| (kind, Duration::from_millis(*ms)))
                    .map_err(|_| ConfigError::InvalidValue(format!("unknown command: {}", name)))
            })
            .collect::<Result<_, _>>()?;

        Ok(EngineSettings {
            items_per_page: self.session.items_per_page,
            default_debounce: Duration::from_millis(dispatch.default_debounce_ms),
            debounce_overrides,
            flush_delay: Duration::from_millis(dispatch.flush_delay_ms),
            confirm_window: Duration::from_secs(dispatch.confirm_window_secs),
            shutdown_grace: Duration::from_secs(dispatch.shutdown_grace_secs),
        })
    }
}
