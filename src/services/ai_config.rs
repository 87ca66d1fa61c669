//! Runtime configuration
//!
//! Read from `config.json` in the data directory; a missing file means
//! defaults. API keys can come from the environment so they never have to be
//! written to disk.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::db::DEFAULT_MAX_ATTEMPTS;
use crate::error::{AppError, AppResult, ResultExt};

const CONFIG_FILE_NAME: &str = "config.json";
const DATABASE_FILE_NAME: &str = "threadmind.sqlite3";

pub const ENV_DATA_DIR: &str = "THREADMIND_DATA_DIR";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_RESEND_API_KEY: &str = "RESEND_API_KEY";

/// Provider credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: Option<String>,
    pub enabled: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: None,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,
    pub generation_model: String,
    pub embedding_model: String,
    pub http_timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            generation_model: "gemini-2.5-flash".to_string(),
            embedding_model: "gemini-embedding-001".to_string(),
            http_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    #[serde(flatten)]
    pub provider: ProviderConfig,
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            from_address: "Threadmind <noreply@threadmind.dev>".to_string(),
        }
    }
}

/// Retrieval policy. `top_k` and `min_score` bound the prompt fed to generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagPolicy {
    pub top_k: usize,
    pub min_score: f32,
    pub cache_ttl_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for RagPolicy {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.35,
            cache_ttl_secs: 24 * 60 * 60,
            request_timeout_secs: 100,
        }
    }
}

impl RagPolicy {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub concurrency: usize,
    pub max_attempts: u32,
    pub lease_secs: u64,
    pub poll_interval_ms: u64,
    pub retry_backoff_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            lease_secs: 300,
            poll_interval_ms: 500,
            retry_backoff_secs: 10,
        }
    }
}

impl QueueConfig {
    pub fn lease(&self) -> Duration {
        Duration::from_secs(self.lease_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Linear back-off: the n-th failed attempt waits n × `retry_backoff_secs`.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        Duration::from_secs(self.retry_backoff_secs.saturating_mul(u64::from(attempts.max(1))))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub staleness_hours: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 1,
            staleness_hours: 24,
        }
    }
}

impl SchedulerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn staleness(&self) -> chrono::Duration {
        // Capped at ~100 years; chrono panics on out-of-range durations.
        chrono::Duration::hours(self.staleness_hours.min(876_000) as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: u32,
    #[serde(default)]
    pub database_path: String,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub rag: RagPolicy,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: 1,
            database_path: String::new(),
            gemini: GeminiConfig::default(),
            mail: MailConfig::default(),
            rag: RagPolicy::default(),
            queue: QueueConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl AppConfig {
    fn apply_defaults(&mut self, data_dir: &Path) {
        if self.database_path.trim().is_empty() {
            self.database_path = data_dir.join(DATABASE_FILE_NAME).to_string_lossy().to_string();
        }
    }

    /// Environment wins over the file for secrets.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(ENV_GEMINI_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.gemini.provider.api_key = key;
        }
        if let Some(key) = lookup(ENV_RESEND_API_KEY).filter(|k| !k.trim().is_empty()) {
            self.mail.provider.api_key = key;
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.rag.top_k == 0 {
            return Err(AppError::Config("rag.top_k must be at least 1".to_string()));
        }
        if !(-1.0..=1.0).contains(&self.rag.min_score) {
            return Err(AppError::Config("rag.min_score must lie in [-1, 1]".to_string()));
        }
        if self.queue.concurrency == 0 {
            return Err(AppError::Config("queue.concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Resolves the data directory: `THREADMIND_DATA_DIR`, else the platform default.
pub fn default_data_dir() -> AppResult<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    ProjectDirs::from("dev", "threadmind", "threadmind")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| AppError::Config("cannot resolve a home directory".to_string()))
}

pub struct ConfigService {
    config_path: PathBuf,
    data_dir: PathBuf,
}

impl ConfigService {
    pub fn new(data_dir: &Path) -> AppResult<Self> {
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            config_path: data_dir.join(CONFIG_FILE_NAME),
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn default_config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.apply_defaults(&self.data_dir);
        config
    }

    /// Loads the file (or defaults), then applies environment overrides.
    pub fn load(&self) -> AppResult<AppConfig> {
        let mut config = if self.config_path.exists() {
            let raw = fs::read(&self.config_path)?;
            let mut config: AppConfig =
                serde_json::from_slice(&raw).config_err("invalid config.json")?;
            config.apply_defaults(&self.data_dir);
            config
        } else {
            self.default_config()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(config)?;
        fs::write(&self.config_path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults_under_data_dir() {
        let dir = tempdir().unwrap();
        let service = ConfigService::new(dir.path()).unwrap();
        let config = service.load().unwrap();

        assert_eq!(config.rag.top_k, 3);
        assert!((config.rag.min_score - 0.35).abs() < f32::EPSILON);
        assert_eq!(config.rag.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.queue.concurrency, 10);
        assert_eq!(config.scheduler.staleness(), chrono::Duration::hours(24));
        assert!(config.database_path.ends_with(DATABASE_FILE_NAME));
    }

    #[test]
    fn save_then_load_keeps_overrides() {
        let dir = tempdir().unwrap();
        let service = ConfigService::new(dir.path()).unwrap();
        let mut config = service.load().unwrap();
        config.rag.top_k = 5;
        config.queue.concurrency = 2;
        service.save(&config).unwrap();

        let loaded = service.load().unwrap();
        assert_eq!(loaded.rag.top_k, 5);
        assert_eq!(loaded.queue.concurrency, 2);
    }

    #[test]
    fn partial_file_fills_missing_sections() {
        let dir = tempdir().unwrap();
        let service = ConfigService::new(dir.path()).unwrap();
        fs::write(
            service.config_path(),
            r#"{"version": 1, "rag": {"top_k": 7}, "gemini": {"api_key": "file-key", "enabled": true}}"#,
        )
        .unwrap();

        let config = service.load().unwrap();
        assert_eq!(config.rag.top_k, 7);
        assert_eq!(config.rag.request_timeout_secs, 100);
        assert_eq!(config.gemini.generation_model, "gemini-2.5-flash");
        assert_eq!(config.queue.max_attempts, DEFAULT_MAX_ATTEMPTS);
    }

    #[test]
    fn env_overrides_replace_api_keys() {
        let mut config = AppConfig::default();
        config.gemini.provider.api_key = "file-key".to_string();
        config.apply_env_overrides(|key| match key {
            ENV_GEMINI_API_KEY => Some("env-key".to_string()),
            ENV_RESEND_API_KEY => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(config.gemini.provider.api_key, "env-key");
        assert_eq!(config.mail.provider.api_key, "");
    }

    #[test]
    fn invalid_policy_is_rejected() {
        let mut config = AppConfig::default();
        config.rag.top_k = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn retry_delay_grows_with_attempts() {
        let queue = QueueConfig::default();
        assert_eq!(queue.retry_delay(1), Duration::from_secs(10));
        assert_eq!(queue.retry_delay(3), Duration::from_secs(30));
    }
}
