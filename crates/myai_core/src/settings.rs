//! Typed application settings backed by the key/value store.
//!
//! # Responsibility
//! - Read provider toggles, credentials, models, temperature and theme with
//!   defaults applied.
//! - Validate settings writes issued from the settings surface.
//!
//! # Invariants
//! - Engines only ever read settings; writes go through the `set_*` helpers.
//! - Credentials never appear in `Debug` output or logs.
//! - At least one provider stays enabled after any toggle write.

use crate::ai::provider::ProviderKind;
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::RepoError;
use log::warn;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

pub const KEY_OPENAI_ENABLED: &str = "openai_enabled";
pub const KEY_OPENAI_API_KEY: &str = "openai_api_key";
pub const KEY_OPENAI_MODEL: &str = "openai_model";
pub const KEY_OPENAI_BASE_URL: &str = "openai_base_url";
pub const KEY_CLAUDE_ENABLED: &str = "claude_enabled";
pub const KEY_CLAUDE_API_KEY: &str = "claude_api_key";
pub const KEY_CLAUDE_MODEL: &str = "claude_model";
pub const KEY_CLAUDE_BASE_URL: &str = "claude_base_url";
pub const KEY_TEMPERATURE: &str = "temperature";
pub const KEY_THEME: &str = "theme";

/// Environment variables that override stored credentials.
pub const ENV_OPENAI_API_KEY: &str = "MYAI_OPENAI_API_KEY";
pub const ENV_CLAUDE_API_KEY: &str = "MYAI_CLAUDE_API_KEY";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-sonnet-20241022";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_CLAUDE_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 2.0;

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

/// Per-provider configuration.
#[derive(Clone, PartialEq)]
pub struct ProviderSettings {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    /// Scheme + host (+ optional port), without the API path.
    pub base_url: String,
}

impl ProviderSettings {
    pub fn has_credential(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

impl Debug for ProviderSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("enabled", &self.enabled)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Every setting the core consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct AiSettings {
    pub openai: ProviderSettings,
    pub claude: ProviderSettings,
    /// Shared sampling temperature, always within 0.0..=2.0.
    pub temperature: f32,
    pub theme: Theme,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            openai: ProviderSettings {
                enabled: true,
                api_key: None,
                model: DEFAULT_OPENAI_MODEL.to_string(),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            },
            claude: ProviderSettings {
                enabled: false,
                api_key: None,
                model: DEFAULT_CLAUDE_MODEL.to_string(),
                base_url: DEFAULT_CLAUDE_BASE_URL.to_string(),
            },
            temperature: DEFAULT_TEMPERATURE,
            theme: Theme::Light,
        }
    }
}

impl AiSettings {
    /// Loads settings, letting process environment credentials win.
    pub fn load(repo: &impl SettingsRepository) -> Result<Self, SettingsError> {
        Self::load_with_env(repo, |name| std::env::var(name).ok())
    }

    /// Loads settings with an injectable environment lookup.
    pub fn load_with_env(
        repo: &impl SettingsRepository,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, SettingsError> {
        let values = repo.all_values()?;
        let get = |key: &str| values.get(key).map(|value| value.trim().to_string());
        let defaults = Self::default();

        let env_or_stored = |env_name: &str, key: &str| {
            env(env_name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .or_else(|| get(key).filter(|value| !value.is_empty()))
        };

        let openai = ProviderSettings {
            // Provider A is on unless explicitly switched off.
            enabled: get(KEY_OPENAI_ENABLED).map_or(true, |value| value != "false"),
            api_key: env_or_stored(ENV_OPENAI_API_KEY, KEY_OPENAI_API_KEY),
            model: get(KEY_OPENAI_MODEL)
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.openai.model),
            base_url: get(KEY_OPENAI_BASE_URL)
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.openai.base_url),
        };
        let claude = ProviderSettings {
            // Provider B is off unless explicitly switched on.
            enabled: get(KEY_CLAUDE_ENABLED).is_some_and(|value| value == "true"),
            api_key: env_or_stored(ENV_CLAUDE_API_KEY, KEY_CLAUDE_API_KEY),
            model: get(KEY_CLAUDE_MODEL)
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.claude.model),
            base_url: get(KEY_CLAUDE_BASE_URL)
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.claude.base_url),
        };

        let temperature = match get(KEY_TEMPERATURE) {
            Some(raw) => match parse_temperature(&raw) {
                Ok(value) => value,
                Err(err) => {
                    warn!("event=settings_load module=settings status=fallback key={KEY_TEMPERATURE} error={err}");
                    DEFAULT_TEMPERATURE
                }
            },
            None => DEFAULT_TEMPERATURE,
        };
        let theme = get(KEY_THEME)
            .and_then(|value| Theme::parse(&value))
            .unwrap_or_default();

        Ok(Self {
            openai,
            claude,
            temperature,
            theme,
        })
    }

    pub fn provider(&self, kind: ProviderKind) -> &ProviderSettings {
        match kind {
            ProviderKind::OpenAi => &self.openai,
            ProviderKind::Claude => &self.claude,
        }
    }
}

/// Settings read/write failures.
#[derive(Debug)]
pub enum SettingsError {
    EmptyCredential(ProviderKind),
    InvalidCredential {
        provider: ProviderKind,
        expected_prefix: &'static str,
    },
    NoProviderEnabled,
    InvalidTemperature(String),
    InvalidTheme(String),
    EmptyModel(ProviderKind),
    Repo(RepoError),
}

impl Display for SettingsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCredential(_) => write!(f, "Please enter an API key"),
            Self::InvalidCredential {
                provider,
                expected_prefix,
            } => match provider {
                ProviderKind::OpenAi => {
                    write!(f, "Warning: API key should start with \"{expected_prefix}\"")
                }
                ProviderKind::Claude => write!(
                    f,
                    "Warning: Claude API key should start with \"{expected_prefix}\""
                ),
            },
            Self::NoProviderEnabled => write!(f, "At least one AI provider must be enabled!"),
            Self::InvalidTemperature(value) => write!(
                f,
                "temperature must be a number between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}, got `{value}`"
            ),
            Self::InvalidTheme(value) => {
                write!(f, "unsupported theme `{value}`; expected light|dark")
            }
            Self::EmptyModel(provider) => {
                write!(f, "{} model name cannot be empty", provider.display_name())
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SettingsError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SettingsError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

/// Stores a provider credential after trimming and prefix validation.
pub fn set_api_key(
    repo: &impl SettingsRepository,
    provider: ProviderKind,
    key: &str,
) -> Result<(), SettingsError> {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::EmptyCredential(provider));
    }
    let expected_prefix = provider.credential_prefix();
    if !trimmed.starts_with(expected_prefix) {
        return Err(SettingsError::InvalidCredential {
            provider,
            expected_prefix,
        });
    }
    repo.set_value(api_key_key(provider), trimmed)?;
    Ok(())
}

/// Removes a stored credential. Returns whether one existed.
pub fn clear_api_key(
    repo: &impl SettingsRepository,
    provider: ProviderKind,
) -> Result<bool, SettingsError> {
    Ok(repo.remove_value(api_key_key(provider))?)
}

/// Toggles one provider, refusing to leave both disabled.
pub fn set_provider_enabled(
    repo: &impl SettingsRepository,
    provider: ProviderKind,
    enabled: bool,
) -> Result<(), SettingsError> {
    let current = AiSettings::load_with_env(repo, |_| None)?;
    let other = match provider {
        ProviderKind::OpenAi => current.claude.enabled,
        ProviderKind::Claude => current.openai.enabled,
    };
    if !enabled && !other {
        return Err(SettingsError::NoProviderEnabled);
    }
    let key = match provider {
        ProviderKind::OpenAi => KEY_OPENAI_ENABLED,
        ProviderKind::Claude => KEY_CLAUDE_ENABLED,
    };
    repo.set_value(key, if enabled { "true" } else { "false" })?;
    Ok(())
}

pub fn set_model(
    repo: &impl SettingsRepository,
    provider: ProviderKind,
    model: &str,
) -> Result<(), SettingsError> {
    let trimmed = model.trim();
    if trimmed.is_empty() {
        return Err(SettingsError::EmptyModel(provider));
    }
    let key = match provider {
        ProviderKind::OpenAi => KEY_OPENAI_MODEL,
        ProviderKind::Claude => KEY_CLAUDE_MODEL,
    };
    repo.set_value(key, trimmed)?;
    Ok(())
}

pub fn set_temperature(repo: &impl SettingsRepository, raw: &str) -> Result<f32, SettingsError> {
    let value = parse_temperature(raw)?;
    repo.set_value(KEY_TEMPERATURE, &value.to_string())?;
    Ok(value)
}

pub fn set_theme(repo: &impl SettingsRepository, raw: &str) -> Result<Theme, SettingsError> {
    let theme = Theme::parse(raw).ok_or_else(|| SettingsError::InvalidTheme(raw.to_string()))?;
    repo.set_value(KEY_THEME, theme.as_str())?;
    Ok(theme)
}

fn parse_temperature(raw: &str) -> Result<f32, SettingsError> {
    let value: f32 = raw
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidTemperature(raw.to_string()))?;
    if !value.is_finite() || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&value) {
        return Err(SettingsError::InvalidTemperature(raw.to_string()));
    }
    Ok(value)
}

fn api_key_key(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::OpenAi => KEY_OPENAI_API_KEY,
        ProviderKind::Claude => KEY_CLAUDE_API_KEY,
    }
}
