use anyhow::{anyhow, Context, Result};
use log::info;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use chatsphere::backend::MESSAGES_COLLECTION;
use chatsphere::models::{Provider, Session};

pub const CONFIG_FILE: &str = "config.json";
pub const ACCOUNTS_FILE: &str = "accounts.json";
pub const STORE_FILE: &str = "store.json";
pub const LOG_FILE: &str = "chatsphere.log";

static DATA_DIR_OVERRIDE: OnceCell<PathBuf> = OnceCell::new();

/// Identity handed out by the local identity service for an OAuth provider
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProviderIdentity {
    pub uid: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
    pub email: Option<String>,
}

impl ProviderIdentity {
    pub fn session(&self, provider: Provider) -> Session {
        Session {
            uid: self.uid.clone(),
            display_name: self.display_name.clone(),
            photo_url: self.photo_url.clone(),
            email: self.email.clone(),
            provider,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub collection: String,
    /// Delay before the local store stamps a write
    pub ack_delay_ms: u64,
    pub notice_timeout_secs: i64,
    pub log_level: String,
    pub google: Option<ProviderIdentity>,
    pub github: Option<ProviderIdentity>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collection: MESSAGES_COLLECTION.to_string(),
            ack_delay_ms: 0,
            notice_timeout_secs: 5,
            log_level: "debug".to_string(),
            google: None,
            github: None,
        }
    }
}

impl Config {
    pub fn provider_identities(&self) -> Vec<(Provider, Session)> {
        let mut identities = Vec::new();
        if let Some(google) = &self.google {
            identities.push((Provider::Google, google.session(Provider::Google)));
        }
        if let Some(github) = &self.github {
            identities.push((Provider::Github, github.session(Provider::Github)));
        }
        identities
    }
}

pub fn set_data_dir_override(dir: PathBuf) {
    let _ = DATA_DIR_OVERRIDE.set(dir);
}

/// Directory holding config, accounts, messages, cached credentials and the log
pub fn data_dir() -> Result<PathBuf> {
    let dir = match DATA_DIR_OVERRIDE.get() {
        Some(dir) => dir.clone(),
        None => dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?
            .join("chatsphere"),
    };

    if !dir.exists() {
        fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

pub fn load_config(dir: &Path) -> Result<Config> {
    let path = dir.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let contents = fs::read_to_string(&path)?;
    let config: Config = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    info!("Loaded config from {}", path.display());
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.collection, "messages");
        assert_eq!(config.ack_delay_ms, 0);
        assert!(config.provider_identities().is_empty());
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{"ack_delay_ms": 250, "github": {"uid": "gh-1", "display_name": "Octo"}}"#,
        )
        .unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config.ack_delay_ms, 250);
        assert_eq!(config.notice_timeout_secs, 5);

        let identities = config.provider_identities();
        assert_eq!(identities.len(), 1);
        assert_eq!(identities[0].0, Provider::Github);
        assert_eq!(identities[0].1.display_name.as_deref(), Some("Octo"));
    }
}
