use crate::error::AppResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub ssh: SshSettings,
    #[serde(default)]
    pub explorer: ExplorerSettings,
    #[serde(default)]
    pub security: SecuritySettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshSettings {
    #[serde(default = "default_port")]
    pub default_port: u16,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub connect_retries: u32,
    #[serde(default = "default_backoff")]
    pub retry_min_backoff_ms: u64,
    #[serde(default = "default_retry_factor")]
    pub retry_factor: u32,
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
}

fn default_port() -> u16 {
    22
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_backoff() -> u64 {
    2000
}

fn default_retry_factor() -> u32 {
    2
}

fn default_health_interval() -> u64 {
    30
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            default_port: default_port(),
            connect_timeout_secs: default_connect_timeout(),
            connect_retries: default_retries(),
            retry_min_backoff_ms: default_backoff(),
            retry_factor: default_retry_factor(),
            health_check_interval_secs: default_health_interval(),
        }
    }
}

impl SshSettings {
    pub fn connect_settings(&self) -> ConnectSettings {
        ConnectSettings {
            timeout: Duration::from_secs(self.connect_timeout_secs),
            retries: self.connect_retries,
            min_backoff: Duration::from_millis(self.retry_min_backoff_ms),
            backoff_factor: self.retry_factor.max(1),
            health_interval: Duration::from_secs(self.health_check_interval_secs.max(1)),
        }
    }
}

/// Runtime knobs for one session's connect and health monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub min_backoff: Duration,
    pub backoff_factor: u32,
    pub health_interval: Duration,
}

impl ConnectSettings {
    /// Delay before retry number `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .saturating_pow(attempt.saturating_sub(1));
        self.min_backoff.saturating_mul(factor)
    }
}

impl Default for ConnectSettings {
    fn default() -> Self {
        SshSettings::default().connect_settings()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExplorerSettings {
    #[serde(default)]
    pub show_hidden: bool,
}

/// Where saved credentials live
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretStoreKind {
    #[default]
    Keychain,
    EncryptedFile,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecuritySettings {
    #[serde(default)]
    pub secret_store: SecretStoreKind,
    #[serde(default = "default_namespace")]
    pub credential_namespace: String,
}

fn default_namespace() -> String {
    "ssh-creds".to_string()
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            secret_store: SecretStoreKind::default(),
            credential_namespace: default_namespace(),
        }
    }
}

impl AppSettings {
    pub fn load(config_dir: &Path) -> AppResult<Self> {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: AppSettings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = AppSettings::default();
            settings.save(config_dir)?;
            Ok(settings)
        }
    }

    pub fn save(&self, config_dir: &Path) -> AppResult<()> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }
}
