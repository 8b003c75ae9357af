use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Integration configurations, keyed by integration name
    #[serde(default)]
    pub integrations: HashMap<String, IntegrationConfig>,

    /// Playbook engine configuration
    #[serde(default)]
    pub engine: EngineConfig,

    /// Playbook catalog configuration
    #[serde(default)]
    pub playbooks: PlaybooksConfig,

    /// Case store configuration
    #[serde(default)]
    pub cases: CaseStoreConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from embedded defaults, an optional file and the environment.
    ///
    /// File resolution: explicit `path`, else `$SOAR_CONFIG`, else `config/soar`
    /// (any supported extension, not required).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ));

        builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => match std::env::var("SOAR_CONFIG") {
                Ok(env_path) => builder.add_source(config::File::with_name(&env_path).required(true)),
                Err(_) => builder.add_source(config::File::with_name("config/soar").required(false)),
            },
        };

        builder
            // Override with environment variables (prefix: SOAR__)
            .add_source(
                config::Environment::with_prefix("SOAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Names of integrations marked as enabled, sorted
    pub fn enabled_integrations(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .integrations
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationConfig {
    /// Whether the integration is initialised at startup
    #[serde(default)]
    pub enabled: bool,

    /// API key; integrations fall back to mock data when absent
    pub api_key: Option<String>,

    /// Override for the vendor API base URL
    pub base_url: Option<String>,

    /// HTTP timeout (seconds)
    #[serde(default = "default_integration_timeout")]
    pub timeout_secs: u64,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            base_url: None,
            timeout_secs: default_integration_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow code_eval actions to run scripts
    #[serde(default = "default_true")]
    pub code_eval_enabled: bool,

    /// Operation budget per script, 0 means unlimited
    #[serde(default)]
    pub script_max_operations: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            code_eval_enabled: true,
            script_max_operations: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybooksConfig {
    /// Directory scanned for playbook documents
    #[serde(default = "default_playbook_dir")]
    pub directory: PathBuf,
}

impl Default for PlaybooksConfig {
    fn default() -> Self {
        Self {
            directory: default_playbook_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseStoreConfig {
    /// Case store backend type
    #[serde(default)]
    pub backend: CaseBackend,

    /// Path for the embedded database
    #[serde(default = "default_case_path")]
    pub path: PathBuf,
}

impl Default for CaseStoreConfig {
    fn default() -> Self {
        Self {
            backend: CaseBackend::default(),
            path: default_case_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum CaseBackend {
    Memory,
    #[default]
    Sled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_integration_timeout() -> u64 {
    30
}

fn default_playbook_dir() -> PathBuf {
    PathBuf::from("config/playbooks")
}

fn default_case_path() -> PathBuf {
    PathBuf::from("data/cases")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
