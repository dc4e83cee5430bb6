//! Job catalogs
//!
//! A catalog is the static job list for one kind of imagery run, plus the
//! settings every job in it shares. Three catalogs ship inside the binary;
//! projects can add their own as `catalogs/<name>.catalog.toml` or point at
//! any TOML file directly.

use crate::job::JobDef;
use crate::provider::DEFAULT_SCENE_TEMPLATE;
use crate::style::StyleGuide;
use brandgen_core::{BrandgenError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

const BUILTIN: &[(&str, &str)] = &[
    ("highrise", include_str!("../catalogs/highrise.toml")),
    ("real-photos", include_str!("../catalogs/real-photos.toml")),
    ("logo", include_str!("../catalogs/logo.toml")),
];

/// What a job starts from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogMode {
    /// Prompt only: synthesize, then download
    Text,
    /// Local photo: upload, describe, synthesize, clean up, download
    Restyle,
}

impl fmt::Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Text => write!(f, "text"),
            CatalogMode::Restyle => write!(f, "restyle"),
        }
    }
}

/// What a failed job does to the rest of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Record the failure and move on to the next job
    Continue,
    /// Stop the run with the job's error
    Halt,
}

fn default_true() -> bool {
    true
}

fn default_remote_prefix() -> String {
    "brandgen".to_string()
}

fn default_template() -> String {
    DEFAULT_SCENE_TEMPLATE.to_string()
}

/// `[catalog]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mode: CatalogMode,
    pub on_error: FailurePolicy,
    /// Where source photos live (restyle catalogs)
    #[serde(default)]
    pub input_dir: Option<PathBuf>,
    pub output_dir: PathBuf,
    /// Pause between processed jobs
    #[serde(default)]
    pub job_delay_secs: u64,
    /// Leading part of temporary object names
    #[serde(default = "default_remote_prefix")]
    pub remote_prefix: String,
    /// Leave existing outputs alone unless forced or selected
    #[serde(default = "default_true")]
    pub skip_existing: bool,
}

/// `[describe]` section of a restyle catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribeSettings {
    /// Instruction sent to the vision model with each photo
    pub instruction: String,
    /// How the styled job prompt and the description are combined
    #[serde(default = "default_template")]
    pub template: String,
}

/// A parsed, validated catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(rename = "catalog")]
    pub settings: CatalogSettings,
    #[serde(default)]
    pub style: StyleGuide,
    #[serde(default)]
    pub describe: Option<DescribeSettings>,
    #[serde(default)]
    pub jobs: Vec<JobDef>,
}

impl Catalog {
    /// Parse and validate catalog TOML
    pub fn parse(content: &str) -> Result<Self> {
        let catalog: Catalog = toml::from_str(content)
            .map_err(|e| BrandgenError::ConfigError(format!("Failed to parse catalog: {}", e)))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(|e| match e {
            BrandgenError::ConfigError(msg) => {
                BrandgenError::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })
    }

    /// Names of the catalogs compiled into the binary
    pub fn builtin_names() -> Vec<&'static str> {
        BUILTIN.iter().map(|(name, _)| *name).collect()
    }

    /// A compiled-in catalog by name
    pub fn builtin(name: &str) -> Option<Result<Self>> {
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, content)| Self::parse(content))
    }

    /// Resolve a catalog by file path, project catalog name, or built-in name
    pub fn find(name: &str) -> Result<Self> {
        let direct = Path::new(name);
        if direct.extension().is_some() && direct.exists() {
            return Self::load(direct);
        }

        let project = PathBuf::from(format!("catalogs/{}.catalog.toml", name));
        if project.exists() {
            return Self::load(&project);
        }

        if let Some(builtin) = Self::builtin(name) {
            return builtin;
        }

        Err(BrandgenError::ConfigError(format!(
            "Catalog '{}' not found (built-in: {}; searched: {})",
            name,
            Self::builtin_names().join(", "),
            project.display()
        )))
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn keys(&self) -> Vec<&str> {
        self.jobs.iter().map(|j| j.key.as_str()).collect()
    }

    /// Whether running this catalog needs the object store
    pub fn needs_storage(&self) -> bool {
        self.settings.mode == CatalogMode::Restyle
    }

    /// Jobs to run: all of them, or the one named by `only`
    pub fn select(&self, only: Option<&str>) -> Result<Vec<&JobDef>> {
        match only {
            None => Ok(self.jobs.iter().collect()),
            Some(key) => {
                let selected: Vec<&JobDef> = self.jobs.iter().filter(|j| j.key == key).collect();
                if selected.is_empty() {
                    return Err(BrandgenError::ConfigError(format!(
                        "No job with key \"{}\" in catalog '{}'. Available keys: {}",
                        key,
                        self.name(),
                        self.keys().join(", ")
                    )));
                }
                Ok(selected)
            }
        }
    }

    pub fn output_path(&self, job: &JobDef) -> PathBuf {
        self.settings.output_dir.join(&job.output)
    }

    pub fn source_path(&self, job: &JobDef) -> Option<PathBuf> {
        let source = job.source.as_ref()?;
        Some(match self.settings.input_dir {
            Some(ref dir) => dir.join(source),
            None => PathBuf::from(source),
        })
    }

    /// Source files of `jobs` that are not on disk
    pub fn missing_sources(&self, jobs: &[&JobDef]) -> Vec<PathBuf> {
        jobs.iter()
            .filter_map(|job| self.source_path(job))
            .filter(|path| !path.is_file())
            .collect()
    }

    fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(BrandgenError::ConfigError(msg));

        if self.settings.name.trim().is_empty() {
            return fail("catalog name is empty".to_string());
        }
        if self.jobs.is_empty() {
            return fail(format!("catalog '{}' has no jobs", self.name()));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.key.trim().is_empty() {
                return fail(format!("catalog '{}' has a job with an empty key", self.name()));
            }
            if !seen.insert(job.key.as_str()) {
                return fail(format!("duplicate job key '{}'", job.key));
            }
            if job.output.trim().is_empty() {
                return fail(format!("job '{}' has no output file", job.key));
            }
            if self.settings.mode == CatalogMode::Restyle && job.source.is_none() {
                return fail(format!("restyle job '{}' has no source image", job.key));
            }
        }

        if self.settings.mode == CatalogMode::Restyle {
            match self.describe {
                None => return fail(format!("restyle catalog '{}' needs a [describe] section", self.name())),
                Some(ref d) if !d.template.contains("{description}") => {
                    return fail("describe template must contain {description}".to_string())
                }
                Some(_) => {}
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ImageSize;

    const RESTYLE: &str = r#"
[catalog]
name = "test-restyle"
mode = "restyle"
on_error = "halt"
input_dir = "raw"
output_dir = "out"

[describe]
instruction = "Describe the photo."

[[jobs]]
key = "one"
source = "one.jpeg"
output = "one.png"
size = "1024*768"
"#;

    #[test]
    fn test_builtin_catalogs_parse() {
        for name in Catalog::builtin_names() {
            let catalog = Catalog::builtin(name).unwrap().unwrap();
            assert_eq!(catalog.name(), name);
        }
    }

    #[test]
    fn test_highrise_catalog() {
        let catalog = Catalog::builtin("highrise").unwrap().unwrap();
        assert_eq!(catalog.settings.mode, CatalogMode::Text);
        assert_eq!(catalog.settings.on_error, FailurePolicy::Continue);
        assert_eq!(catalog.jobs.len(), 12);
        assert_eq!(catalog.settings.job_delay_secs, 8);
        assert!(catalog.style.negative().is_some());
        let hero = catalog.select(Some("hero-bg")).unwrap()[0];
        assert_eq!(hero.size, ImageSize::new(1664, 928));
        assert_eq!(catalog.output_path(hero), PathBuf::from("public/images/hero-bg.png"));
        assert!(!catalog.needs_storage());
    }

    #[test]
    fn test_real_photos_catalog() {
        let catalog = Catalog::builtin("real-photos").unwrap().unwrap();
        assert_eq!(catalog.settings.on_error, FailurePolicy::Halt);
        assert_eq!(catalog.keys(), vec!["fleet-1", "fleet-2", "fleet-3", "fleet-4"]);
        let fleet3 = catalog.select(Some("fleet-3")).unwrap()[0];
        assert_eq!(
            catalog.source_path(fleet3),
            Some(PathBuf::from("images/raw/turck3.jpeg"))
        );
        assert!(catalog.needs_storage());
    }

    #[test]
    fn test_logo_catalog_always_regenerates() {
        let catalog = Catalog::builtin("logo").unwrap().unwrap();
        assert!(!catalog.settings.skip_existing);
        assert!(!catalog.style.prompt_extend);
        let template = &catalog.describe.as_ref().unwrap().template;
        assert!(template.contains("{description}"));
    }

    #[test]
    fn test_select_unknown_key_lists_available() {
        let catalog = Catalog::parse(RESTYLE).unwrap();
        let err = catalog.select(Some("nope")).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("Available keys: one"));
    }

    #[test]
    fn test_defaults() {
        let catalog = Catalog::parse(RESTYLE).unwrap();
        assert!(catalog.settings.skip_existing);
        assert_eq!(catalog.settings.job_delay_secs, 0);
        assert_eq!(catalog.settings.remote_prefix, "brandgen");
        assert_eq!(catalog.describe.unwrap().template, DEFAULT_SCENE_TEMPLATE);
    }

    #[test]
    fn test_restyle_requires_describe_and_sources() {
        let no_describe = RESTYLE.replace("[describe]\ninstruction = \"Describe the photo.\"\n", "");
        assert!(Catalog::parse(&no_describe).is_err());

        let no_source = RESTYLE.replace("source = \"one.jpeg\"\n", "");
        let err = Catalog::parse(&no_source).unwrap_err();
        assert!(err.to_string().contains("no source image"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let dup = format!(
            "{}\n[[jobs]]\nkey = \"one\"\nsource = \"b.jpeg\"\noutput = \"b.png\"\nsize = \"1*1\"\n",
            RESTYLE
        );
        let err = Catalog::parse(&dup).unwrap_err();
        assert!(err.to_string().contains("duplicate job key"));
    }

    #[test]
    fn test_missing_sources() {
        let dir = std::env::temp_dir().join(format!("brandgen_catalog_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut catalog = Catalog::parse(RESTYLE).unwrap();
        catalog.settings.input_dir = Some(dir.clone());

        let jobs = catalog.select(None).unwrap();
        assert_eq!(catalog.missing_sources(&jobs), vec![dir.join("one.jpeg")]);

        std::fs::write(dir.join("one.jpeg"), b"jpeg").unwrap();
        assert!(catalog.missing_sources(&jobs).is_empty());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_find_by_path_and_unknown() {
        let dir = std::env::temp_dir().join(format!("brandgen_catalog_test_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("custom.catalog.toml");
        std::fs::write(&path, RESTYLE).unwrap();

        let catalog = Catalog::find(path.to_str().unwrap()).unwrap();
        assert_eq!(catalog.name(), "test-restyle");

        let err = Catalog::find("no_such_catalog_xyz").unwrap_err();
        assert!(err.to_string().contains("built-in: highrise, real-photos, logo"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
