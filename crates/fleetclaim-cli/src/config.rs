//! Configuration loading

use anyhow::{Context, Result};
use fleetclaim_core::NamingPolicy;
use fleetclaim_dashboard::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub validate: ValidateConfig,
    #[serde(default)]
    pub claim: ClaimConfig,
    #[serde(default)]
    pub policy: NamingPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// API root, e.g. https://api.meraki.com/api/v1
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Retries after an HTTP 429 before giving up on a request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl DashboardConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        let key = std::env::var(&self.api_key_env).with_context(|| {
            format!("API key ({}) not found in environment variables", self.api_key_env)
        })?;
        if key.trim().is_empty() {
            anyhow::bail!("API key ({}) is empty", self.api_key_env);
        }
        Ok(key)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    "MK_CSM_KEY".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateConfig {
    /// Supplier manifest to validate
    #[serde(default = "default_manifest")]
    pub input: PathBuf,
    /// Directory receiving the three output files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_validate_log")]
    pub log_file: PathBuf,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            input: default_manifest(),
            output_dir: default_output_dir(),
            log_file: default_validate_log(),
        }
    }
}

fn default_manifest() -> PathBuf {
    PathBuf::from("VCC - AP Report.csv")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("validation_output")
}

fn default_validate_log() -> PathBuf {
    PathBuf::from("list_validation.log")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimConfig {
    /// Validated upload file to claim
    #[serde(default = "default_claim_input")]
    pub input: PathBuf,
    /// Directory the input is archived into after a run
    #[serde(default = "default_claimed_dir")]
    pub claimed_dir: PathBuf,
    #[serde(default = "default_claim_log")]
    pub log_file: PathBuf,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            input: default_claim_input(),
            claimed_dir: default_claimed_dir(),
            log_file: default_claim_log(),
        }
    }
}

fn default_claim_input() -> PathBuf {
    PathBuf::from("validated_upload.csv")
}

fn default_claimed_dir() -> PathBuf {
    PathBuf::from("claimed_lists")
}

fn default_claim_log() -> PathBuf {
    PathBuf::from("claim_device.log")
}

/// Load configuration from file, or defaults when it does not exist
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(&Config::default())?;
    std::fs::write(path, content)?;
    Ok(())
}
