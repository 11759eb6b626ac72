use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::transcript::Zone;

pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const GOOGLE_TOKEN_ENV: &str = "ESSAYCHAT_GOOGLE_TOKEN";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Firebase Auth + Cloud Storage
    Firebase,
    /// Offline: hashed uids, logs copied into a local directory
    Local,
}

impl Backend {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "firebase" => Ok(Self::Firebase),
            "local" => Ok(Self::Local),
            _ => bail!("invalid backend: must be firebase or local"),
        }
    }
}

impl Default for Backend {
    fn default() -> Self {
        Backend::Firebase
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Backend::Firebase => "firebase",
            Backend::Local => "local",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Identity and storage backend (firebase or local)
    #[serde(default)]
    pub backend: Backend,

    /// Firebase / Google Cloud project id
    #[serde(default)]
    pub project_id: String,

    /// Storage bucket receiving chat logs
    #[serde(default)]
    pub storage_bucket: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_completion_url")]
    pub completion_url: String,

    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    #[serde(default = "default_storage_url")]
    pub storage_url: String,

    /// Europe/London, UTC, or a fixed +HH:MM offset
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Seconds before a remote call gives up (0 waits forever)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    /// Where CSV files are written before upload (default: cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    /// Hidden instruction sent ahead of the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_completion_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_identity_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_storage_url() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_timezone() -> String {
    "Europe/London".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_heartbeat_secs() -> u64 {
    60
}

/// `$ESSAYCHAT_HOME`, or `~/.essaychat`
pub fn app_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("ESSAYCHAT_HOME") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home).join(".essaychat"))
}

fn config_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("config.toml"))
}

pub fn ledger_path() -> Result<PathBuf> {
    Ok(app_dir()?.join("exports.json"))
}

fn cache_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("XDG_CACHE_HOME") {
        return Ok(PathBuf::from(dir).join("essaychat"));
    }
    let home = std::env::var("HOME").context("HOME not set")?;
    Ok(PathBuf::from(home).join(".cache").join("essaychat"))
}

pub fn secret(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
        _ => bail!("{name} not set"),
    }
}

impl Config {
    /// Load config from $ESSAYCHAT_HOME/config.toml, returning defaults if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        fs::write(&path, content).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }

    /// Apply `essaychat config set <key> <value>`
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend" => self.backend = Backend::parse(value)?,
            "project_id" | "project" => self.project_id = value.to_string(),
            "storage_bucket" | "bucket" => self.storage_bucket = value.to_string(),
            "model" => self.model = value.to_string(),
            "completion_url" => self.completion_url = value.to_string(),
            "identity_url" => self.identity_url = value.to_string(),
            "storage_url" => self.storage_url = value.to_string(),
            "timezone" | "tz" => {
                Zone::parse(value)?;
                self.timezone = value.to_string();
            }
            "request_timeout_secs" | "timeout" => {
                self.request_timeout_secs = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid timeout: must be whole seconds"))?;
            }
            "heartbeat_secs" => {
                let secs: u64 = value
                    .parse()
                    .map_err(|_| anyhow::anyhow!("invalid heartbeat: must be whole seconds"))?;
                if secs == 0 {
                    bail!("invalid heartbeat: must be at least 1 second");
                }
                self.heartbeat_secs = secs;
            }
            "export_dir" => {
                self.export_dir = (!value.is_empty()).then(|| PathBuf::from(value));
            }
            "system_prompt" => {
                self.system_prompt = (!value.is_empty()).then(|| value.to_string());
            }
            _ => bail!("unknown config key: {key}"),
        }
        Ok(())
    }

    pub fn zone(&self) -> Result<Zone> {
        Zone::parse(&self.timezone)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn export_dir(&self) -> Result<PathBuf> {
        match &self.export_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(cache_dir()?.join("logs")),
        }
    }

    /// Bucket directory used by the local backend
    pub fn local_bucket_dir(&self) -> Result<PathBuf> {
        Ok(app_dir()?.join("bucket"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            project_id: String::new(),
            storage_bucket: String::new(),
            model: default_model(),
            completion_url: default_completion_url(),
            identity_url: default_identity_url(),
            storage_url: default_storage_url(),
            timezone: default_timezone(),
            request_timeout_secs: default_request_timeout_secs(),
            heartbeat_secs: default_heartbeat_secs(),
            export_dir: None,
            system_prompt: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{EnvGuard, env_lock};
    use tempfile::TempDir;

    #[test]
    fn config_roundtrip() {
        let _lock = env_lock();
        let tmp = TempDir::new().unwrap();
        let _guard = EnvGuard::set("ESSAYCHAT_HOME", tmp.path().to_str().unwrap());

        let mut config = Config::default();
        config.backend = Backend::Local;
        config.storage_bucket = "essay-logs.appspot.com".to_string();
        config.system_prompt = Some("You are an essay tutor.".to_string());
        let path = config.save().unwrap();
        assert_eq!(path, tmp.path().join("config.toml"));

        let loaded = Config::load().unwrap();
        assert_eq!(loaded.backend, Backend::Local);
        assert_eq!(loaded.storage_bucket, "essay-logs.appspot.com");
        assert_eq!(loaded.system_prompt.as_deref(), Some("You are an essay tutor."));
    }

    #[test]
    fn config_defaults() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Firebase);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.timezone, "Europe/London");
        assert_eq!(config.zone().unwrap(), Zone::London);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(60));
    }

    #[test]
    fn config_partial_parse() {
        let content = "storage_bucket = \"b\"\nrequest_timeout_secs = 0\n";
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.storage_bucket, "b");
        assert_eq!(config.request_timeout(), None);
        assert_eq!(config.completion_url, "https://api.openai.com/v1");
        assert_eq!(config.backend, Backend::Firebase);
    }

    #[test]
    fn config_backend_parse() {
        let content = "backend = \"local\"\n";
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert!(Backend::parse("s3").is_err());
    }

    #[test]
    fn config_set_validates_values() {
        let mut config = Config::default();
        config.set("tz", "+02:00").unwrap();
        assert_eq!(config.timezone, "+02:00");
        assert!(config.set("timezone", "Atlantis").is_err());
        assert_eq!(config.timezone, "+02:00");
        assert!(config.set("heartbeat_secs", "0").is_err());
        assert!(config.set("timeout", "soon").is_err());
        assert!(config.set("colour", "blue").is_err());

        config.set("export_dir", "/tmp/logs").unwrap();
        assert_eq!(config.export_dir().unwrap(), PathBuf::from("/tmp/logs"));
        config.set("export_dir", "").unwrap();
        assert_eq!(config.export_dir, None);
    }

    #[test]
    fn missing_secret_is_an_error() {
        let _lock = env_lock();
        let _guard = EnvGuard::set("ESSAYCHAT_TEST_SECRET", "  ");
        assert!(secret("ESSAYCHAT_TEST_SECRET").is_err());
        let _guard = EnvGuard::set("ESSAYCHAT_TEST_SECRET", "sk-abc\n");
        assert_eq!(secret("ESSAYCHAT_TEST_SECRET").unwrap(), "sk-abc");
    }
}
