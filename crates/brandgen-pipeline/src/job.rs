//! Job definitions and per-run outcomes

use crate::provider::ImageSize;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One source-to-output transformation, as written in a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDef {
    /// Unique key within the catalog (used by `--only`)
    pub key: String,
    /// Source image file name under the catalog input directory
    #[serde(default)]
    pub source: Option<String>,
    /// Output file name under the catalog output directory
    pub output: String,
    /// Subject prompt; the catalog style wraps it
    #[serde(default)]
    pub prompt: String,
    pub size: ImageSize,
}

/// How a job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Generated,
    Skipped,
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Generated => write!(f, "generated"),
            JobStatus::Skipped => write!(f, "skipped"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of one job in a run
#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub key: String,
    pub status: JobStatus,
    pub output_path: PathBuf,
    /// `sha256:` digest of the written output
    pub content_hash: Option<String>,
    pub error: Option<String>,
    pub duration_secs: f64,
}

impl JobOutcome {
    pub fn skipped(key: &str, output_path: PathBuf) -> Self {
        Self {
            key: key.to_string(),
            status: JobStatus::Skipped,
            output_path,
            content_hash: None,
            error: None,
            duration_secs: 0.0,
        }
    }

    pub fn failed(key: &str, output_path: PathBuf, error: String, duration_secs: f64) -> Self {
        Self {
            key: key.to_string(),
            status: JobStatus::Failed,
            output_path,
            content_hash: None,
            error: Some(error),
            duration_secs,
        }
    }
}

/// Summary of a catalog run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub catalog: String,
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn new(catalog: &str) -> Self {
        Self {
            catalog: catalog.to_string(),
            outcomes: Vec::new(),
        }
    }

    fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn generated(&self) -> usize {
        self.count(JobStatus::Generated)
    }

    pub fn skipped(&self) -> usize {
        self.count(JobStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    pub fn outcome(&self, key: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.key == key)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} job(s), {} generated, {} skipped, {} failed",
            self.catalog,
            self.outcomes.len(),
            self.generated(),
            self.skipped(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_def_from_toml() {
        let job: JobDef = toml::from_str(
            r#"
key = "fleet-1"
source = "truck1.jpeg"
output = "fleet-1.png"
size = "1024*768"
prompt = "SUBJECT: tipper truck"
"#,
        )
        .unwrap();
        assert_eq!(job.key, "fleet-1");
        assert_eq!(job.source.as_deref(), Some("truck1.jpeg"));
        assert_eq!(job.size, ImageSize::new(1024, 768));
    }

    #[test]
    fn test_report_counts() {
        let mut report = RunReport::new("highrise");
        report.outcomes.push(JobOutcome::skipped("a", PathBuf::from("a.png")));
        report.outcomes.push(JobOutcome::failed(
            "b",
            PathBuf::from("b.png"),
            "boom".to_string(),
            1.0,
        ));
        report.outcomes.push(JobOutcome {
            key: "c".to_string(),
            status: JobStatus::Generated,
            output_path: PathBuf::from("c.png"),
            content_hash: Some("sha256:00".to_string()),
            error: None,
            duration_secs: 2.0,
        });

        assert_eq!(report.generated(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcome("b").unwrap().error.as_deref(), Some("boom"));
        assert_eq!(
            report.to_string(),
            "highrise: 3 job(s), 1 generated, 1 skipped, 1 failed"
        );
    }
}
