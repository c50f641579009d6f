use crate::error::ConfigError;
use crate::types::LanguageTag;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub languages: LanguagesConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub quota: QuotaConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LanguagesConfig {
    #[serde(default = "default_from_lang")]
    pub from: LanguageTag,

    #[serde(default = "default_to_lang")]
    pub to: LanguageTag,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            from: default_from_lang(),
            to: default_to_lang(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Overrides the build-time default credential when set.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_base_url(),
            api_key: None,
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QuotaConfig {
    #[serde(default = "default_rpm_limit")]
    pub rpm_limit: u32,

    #[serde(default = "default_rpd_limit")]
    pub rpd_limit: u32,

    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            rpm_limit: default_rpm_limit(),
            rpd_limit: default_rpd_limit(),
            state_dir: default_state_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_entries: default_max_entries(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_from_lang() -> LanguageTag {
    LanguageTag::Mandarin
}

fn default_to_lang() -> LanguageTag {
    LanguageTag::Thai
}

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_rpm_limit() -> u32 {
    15
}

fn default_rpd_limit() -> u32 {
    1500
}

fn default_state_dir() -> String {
    "state".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_entries() -> usize {
    50
}

/// Interpolate `${VAR}` patterns with environment variable values.
fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([^}]+)\}").unwrap();
    let mut result = input.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        match std::env::var(var_name) {
            Ok(val) => {
                result = result.replace(&cap[0], &val);
            }
            Err(_) => {
                errors.push(var_name.to_string());
            }
        }
    }

    if let Some(first_missing) = errors.into_iter().next() {
        return Err(ConfigError::EnvVarNotFound(first_missing));
    }

    Ok(result)
}

impl AppConfig {
    /// Load configuration from a TOML file, with environment variable interpolation.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let interpolated = interpolate_env_vars(&content)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }

    /// Parse configuration from a TOML string (for testing).
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let interpolated = interpolate_env_vars(s)?;
        let config: AppConfig = toml::from_str(&interpolated)?;
        Ok(config)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            languages: LanguagesConfig::default(),
            backend: BackendConfig::default(),
            quota: QuotaConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}
