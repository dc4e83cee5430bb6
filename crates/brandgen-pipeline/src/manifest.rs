//! Generation manifest
//!
//! Records every downloaded output with its provenance (catalog, provider,
//! final prompt, size, content hash, time) so a finished site can be audited
//! and individual images regenerated deliberately.

use brandgen_core::{BrandgenError, Result};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A record of a single generated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub catalog: String,
    pub key: String,
    pub provider: String,
    pub prompt: String,
    pub size: String,
    pub output_path: String,
    pub content_hash: String,
    pub generated_at: String,
    pub duration_secs: f64,
    /// Scene description the prompt was built from (restyle jobs)
    #[serde(default)]
    pub description: Option<String>,
}

/// All generated images, one entry per (catalog, key)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub updated_at: String,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

/// TOML wrapper
#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    manifest: GenerationManifest,
}

impl GenerationManifest {
    pub fn new() -> Self {
        Self {
            updated_at: now_rfc3339(),
            entries: Vec::new(),
        }
    }

    /// Insert an entry, replacing any earlier one for the same job
    pub fn record(&mut self, entry: ManifestEntry) {
        self.entries
            .retain(|e| !(e.catalog == entry.catalog && e.key == entry.key));
        self.entries.push(entry);
        self.updated_at = now_rfc3339();
    }

    pub fn get(&self, catalog: &str, key: &str) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .find(|e| e.catalog == catalog && e.key == key)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: ManifestFile = toml::from_str(&content).map_err(|e| {
            BrandgenError::ConfigError(format!(
                "Failed to parse manifest {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(file.manifest)
    }

    /// Load the manifest, or start an empty one if the file does not exist
    pub fn load_or_new(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = ManifestFile {
            manifest: self.clone(),
        };
        let content = toml::to_string_pretty(&file)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl Default for GenerationManifest {
    fn default() -> Self {
        Self::new()
    }
}

/// Current UTC time, second precision
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
