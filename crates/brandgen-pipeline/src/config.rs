//! Layered configuration system
//!
//! Config is loaded with three layers of precedence (highest wins):
//! 1. Environment variables: `DASHSCOPE_API_KEY`, `SUPABASE_URL`,
//!    `SUPABASE_SERVICE_ROLE_KEY`
//! 2. Project-local: `.brandgen/config.toml`
//! 3. Global: `~/.brandgen/config.toml`
//!
//! The resolved [`BrandgenConfig`] is built once at start-up and handed to
//! every component that needs a secret or a policy value.

use crate::retry::RetryPolicy;
use brandgen_core::{BrandgenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the generation provider section in `[providers]`
pub const DASHSCOPE: &str = "dashscope";

const DEFAULT_BUCKET: &str = "highrise-temp";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_BACKOFF_SECS: u64 = 15;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MANIFEST: &str = ".brandgen/manifest.toml";

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub describe_model: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
}

/// Object storage used for temporary uploads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
}

/// `[generation]` as written in a config file; unset keys fall through
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationFile {
    #[serde(default)]
    pub max_retries: Option<u32>,
    #[serde(default)]
    pub backoff_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub manifest: Option<String>,
}

/// Resolved generation policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationConfig {
    pub max_retries: u32,
    pub backoff_secs: u64,
    pub request_timeout_secs: u64,
    pub manifest: PathBuf,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_secs: DEFAULT_BACKOFF_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            manifest: PathBuf::from(DEFAULT_MANIFEST),
        }
    }
}

/// Top-level config file structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandgenConfigFile {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub generation: GenerationFile,
}

/// Secrets needed to talk to object storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageCredentials<'a> {
    pub url: &'a str,
    pub service_key: &'a str,
    pub bucket: &'a str,
}

/// Resolved configuration with environment variable overrides applied
#[derive(Debug, Clone, Default)]
pub struct BrandgenConfig {
    pub providers: HashMap<String, ProviderConfig>,
    pub storage: StorageConfig,
    pub generation: GenerationConfig,
}

impl BrandgenConfig {
    /// Load config with layered precedence: global < project < env vars
    pub fn load() -> Result<Self> {
        let mut config = BrandgenConfigFile::default();

        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                Self::merge_into(&mut config, Self::load_file(&global_path)?);
            }
        }

        let local_path = PathBuf::from(".brandgen/config.toml");
        if local_path.exists() {
            Self::merge_into(&mut config, Self::load_file(&local_path)?);
        }

        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(Self::resolve(config))
    }

    /// Load config from a specific file path plus the given environment
    pub fn load_from_file<F>(path: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::load_file(path)?;
        Self::apply_env_overrides(&mut config, env);
        Ok(Self::resolve(config))
    }

    /// Get API key for a provider
    pub fn api_key(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_key.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Get API URL override for a provider
    pub fn api_url(&self, provider_name: &str) -> Option<&str> {
        self.providers
            .get(provider_name)
            .and_then(|p| p.api_url.as_deref())
    }

    /// Provider section, if any
    pub fn provider(&self, provider_name: &str) -> Option<&ProviderConfig> {
        self.providers.get(provider_name)
    }

    /// The generation-service key, or a fatal config error
    pub fn require_generation_key(&self) -> Result<&str> {
        self.api_key(DASHSCOPE).ok_or_else(|| {
            BrandgenError::ConfigError(
                "DASHSCOPE_API_KEY not set (environment, .env.local or [providers.dashscope])"
                    .to_string(),
            )
        })
    }

    /// Storage endpoint and credential, or a fatal config error
    pub fn require_storage(&self) -> Result<StorageCredentials<'_>> {
        let url = self
            .storage
            .url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| BrandgenError::ConfigError("SUPABASE_URL not set".to_string()))?;
        let service_key = self
            .storage
            .service_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                BrandgenError::ConfigError("SUPABASE_SERVICE_ROLE_KEY not set".to_string())
            })?;

        Ok(StorageCredentials {
            url: url.trim_end_matches('/'),
            service_key,
            bucket: self.storage.bucket.as_deref().unwrap_or(DEFAULT_BUCKET),
        })
    }

    /// Backoff policy for rate-limited generation calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.generation.max_retries,
            Duration::from_secs(self.generation.backoff_secs),
        )
    }

    /// Per-request timeout for every HTTP call
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.generation.request_timeout_secs)
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".brandgen").join("config.toml"))
    }

    fn load_file(path: &Path) -> Result<BrandgenConfigFile> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            BrandgenError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    fn resolve(file: BrandgenConfigFile) -> Self {
        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            max_retries: file.generation.max_retries.unwrap_or(defaults.max_retries),
            backoff_secs: file.generation.backoff_secs.unwrap_or(defaults.backoff_secs),
            request_timeout_secs: file
                .generation
                .request_timeout_secs
                .unwrap_or(defaults.request_timeout_secs),
            manifest: file
                .generation
                .manifest
                .map(PathBuf::from)
                .unwrap_or(defaults.manifest),
        };

        Self {
            providers: file.providers,
            storage: file.storage,
            generation,
        }
    }

    fn merge_into(base: &mut BrandgenConfigFile, overlay: BrandgenConfigFile) {
        for (name, provider) in overlay.providers {
            let entry = base.providers.entry(name).or_default();
            if provider.api_key.is_some() {
                entry.api_key = provider.api_key;
            }
            if provider.api_url.is_some() {
                entry.api_url = provider.api_url;
            }
            if provider.describe_model.is_some() {
                entry.describe_model = provider.describe_model;
            }
            if provider.image_model.is_some() {
                entry.image_model = provider.image_model;
            }
        }

        let storage = overlay.storage;
        if storage.url.is_some() {
            base.storage.url = storage.url;
        }
        if storage.service_key.is_some() {
            base.storage.service_key = storage.service_key;
        }
        if storage.bucket.is_some() {
            base.storage.bucket = storage.bucket;
        }

        let generation = overlay.generation;
        if generation.max_retries.is_some() {
            base.generation.max_retries = generation.max_retries;
        }
        if generation.backoff_secs.is_some() {
            base.generation.backoff_secs = generation.backoff_secs;
        }
        if generation.request_timeout_secs.is_some() {
            base.generation.request_timeout_secs = generation.request_timeout_secs;
        }
        if generation.manifest.is_some() {
            base.generation.manifest = generation.manifest;
        }
    }

    fn apply_env_overrides<F>(config: &mut BrandgenConfigFile, env: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = env("DASHSCOPE_API_KEY") {
            config.providers.entry(DASHSCOPE.to_string()).or_default().api_key = Some(key);
        }
        if let Some(url) = env("SUPABASE_URL") {
            config.storage.url = Some(url);
        }
        if let Some(key) = env("SUPABASE_SERVICE_ROLE_KEY") {
            config.storage.service_key = Some(key);
        }
    }
}
