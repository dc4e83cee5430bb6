//! Catalog orchestrator
//!
//! Runs the jobs of one catalog strictly in order. A text job is synthesize
//! then download; a restyle job is upload, describe, synthesize, clean up,
//! download. Outputs that already exist are left alone unless the run is
//! forced or the job was selected by key.

use crate::catalog::{Catalog, CatalogMode, FailurePolicy};
use crate::fetch::ResultFetcher;
use crate::job::{JobDef, JobOutcome, JobStatus, RunReport};
use crate::manifest::{now_rfc3339, GenerationManifest, ManifestEntry};
use crate::provider::{GenerationProvider, SynthesisRequest};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::storage::{remote_name, ObjectStore, RemoteAsset};
use brandgen_core::{BrandgenError, ContentHash, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Per-run switches from the command line
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only the job with this key (regenerates even if the output exists)
    pub only: Option<String>,
    /// Regenerate outputs that already exist
    pub force: bool,
}

/// What a successful job produced
#[derive(Debug, Clone)]
struct Produced {
    prompt: String,
    description: Option<String>,
    content_hash: ContentHash,
    bytes: u64,
}

/// Deletes a temporary upload when dropped, unless already released
struct UploadGuard<'a> {
    store: &'a dyn ObjectStore,
    asset: Option<RemoteAsset>,
}

impl<'a> UploadGuard<'a> {
    fn new(store: &'a dyn ObjectStore, asset: RemoteAsset) -> Self {
        Self {
            store,
            asset: Some(asset),
        }
    }

    fn public_url(&self) -> &str {
        self.asset.as_ref().map(|a| a.public_url.as_str()).unwrap_or("")
    }

    /// Delete the object now. Failures are logged, never raised.
    fn release(&mut self) {
        if let Some(asset) = self.asset.take() {
            match self.store.delete(&asset) {
                Ok(()) => tracing::debug!(object = %asset.name, "deleted temporary upload"),
                Err(e) => tracing::warn!(object = %asset.name, error = %e, "failed to delete temporary upload"),
            }
        }
    }
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Sequential runner for catalog jobs
pub struct Pipeline<'a> {
    provider: &'a dyn GenerationProvider,
    store: Option<&'a dyn ObjectStore>,
    fetcher: &'a dyn ResultFetcher,
    retry: RetryPolicy,
    sleeper: &'a dyn Sleeper,
    manifest_path: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(provider: &'a dyn GenerationProvider, fetcher: &'a dyn ResultFetcher) -> Self {
        Self {
            provider,
            store: None,
            fetcher,
            retry: RetryPolicy::default(),
            sleeper: &ThreadSleeper,
            manifest_path: None,
        }
    }

    /// Object store for restyle catalogs
    pub fn with_store(mut self, store: &'a dyn ObjectStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_sleeper(mut self, sleeper: &'a dyn Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Record every downloaded output in the manifest at `path`
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = Some(path.into());
        self
    }

    /// Run the selected jobs of `catalog`.
    ///
    /// Configuration problems (unknown key, missing source photos, no object
    /// store for a restyle catalog) fail before any remote call. A job
    /// failure is recorded and the run continues, or the run stops with that
    /// error, depending on the catalog's failure policy.
    pub fn run(&self, catalog: &Catalog, options: &RunOptions) -> Result<RunReport> {
        let jobs = catalog.select(options.only.as_deref())?;
        self.preflight(catalog, &jobs)?;

        std::fs::create_dir_all(&catalog.settings.output_dir)?;
        let mut manifest = match self.manifest_path {
            Some(ref path) => match GenerationManifest::load_or_new(path) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "manifest unreadable, not recording this run");
                    None
                }
            },
            None => None,
        };

        println!(
            "Running catalog '{}' ({} job(s), {} mode)",
            catalog.name(),
            jobs.len(),
            catalog.settings.mode
        );

        let mut report = RunReport::new(catalog.name());
        let mut bucket_ready = false;
        let mut processed_any = false;

        for job in jobs {
            let dest = catalog.output_path(job);

            if self.should_skip(catalog, options, &dest) {
                println!("  {}  -> exists, skipping (use --force to regenerate)", job.key);
                report.outcomes.push(JobOutcome::skipped(&job.key, dest));
                continue;
            }

            let delay = Duration::from_secs(catalog.settings.job_delay_secs);
            if processed_any && !delay.is_zero() {
                tracing::debug!(secs = delay.as_secs(), "pausing between jobs");
                self.sleeper.sleep(delay);
            }
            processed_any = true;

            print!("  {} ({})  ->", job.key, job.size);
            flush_stdout();
            let start = Instant::now();

            match self.process(catalog, job, &dest, &mut bucket_ready) {
                Ok(produced) => {
                    let secs = start.elapsed().as_secs_f64();
                    println!(" saved {} ({} bytes, {:.1}s)", dest.display(), produced.bytes, secs);

                    if let (Some(manifest), Some(path)) = (manifest.as_mut(), self.manifest_path.as_ref()) {
                        manifest.record(ManifestEntry {
                            catalog: catalog.name().to_string(),
                            key: job.key.clone(),
                            provider: self.provider.name().to_string(),
                            prompt: produced.prompt.clone(),
                            size: job.size.to_string(),
                            output_path: dest.display().to_string(),
                            content_hash: produced.content_hash.to_prefixed_hex(),
                            generated_at: now_rfc3339(),
                            duration_secs: secs,
                            description: produced.description.clone(),
                        });
                        if let Err(e) = manifest.save(path) {
                            tracing::warn!(path = %path.display(), error = %e, "failed to save manifest");
                        }
                    }

                    report.outcomes.push(JobOutcome {
                        key: job.key.clone(),
                        status: JobStatus::Generated,
                        output_path: dest,
                        content_hash: Some(produced.content_hash.to_prefixed_hex()),
                        error: None,
                        duration_secs: secs,
                    });
                }
                Err(e) => {
                    println!(" FAILED: {}", e);
                    tracing::error!(catalog = %catalog.name(), job = %job.key, error = %e, "job failed");
                    if catalog.settings.on_error == FailurePolicy::Halt {
                        return Err(e);
                    }
                    report.outcomes.push(JobOutcome::failed(
                        &job.key,
                        dest,
                        e.to_string(),
                        start.elapsed().as_secs_f64(),
                    ));
                }
            }
        }

        println!("\n{}", report);
        Ok(report)
    }

    fn preflight(&self, catalog: &Catalog, jobs: &[&JobDef]) -> Result<()> {
        if catalog.settings.mode != CatalogMode::Restyle {
            return Ok(());
        }

        let missing = catalog.missing_sources(jobs);
        if !missing.is_empty() {
            let list: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
            return Err(BrandgenError::ConfigError(format!(
                "Missing source image(s): {}",
                list.join(", ")
            )));
        }

        if self.store.is_none() {
            return Err(BrandgenError::ConfigError(format!(
                "Catalog '{}' needs object storage for uploads",
                catalog.name()
            )));
        }
        Ok(())
    }

    fn should_skip(&self, catalog: &Catalog, options: &RunOptions, dest: &Path) -> bool {
        catalog.settings.skip_existing && options.only.is_none() && !options.force && dest.exists()
    }

    fn process(
        &self,
        catalog: &Catalog,
        job: &JobDef,
        dest: &Path,
        bucket_ready: &mut bool,
    ) -> Result<Produced> {
        match catalog.settings.mode {
            CatalogMode::Text => self.process_text(catalog, job, dest),
            CatalogMode::Restyle => self.process_restyle(catalog, job, dest, bucket_ready),
        }
    }

    fn process_text(&self, catalog: &Catalog, job: &JobDef, dest: &Path) -> Result<Produced> {
        let request = catalog.style.text_request(&job.prompt, job.size);

        print!(" generating");
        flush_stdout();
        let result = self.provider.synthesize(&request, &self.retry, self.sleeper)?;

        self.download(&result.url, dest, request.prompt, None)
    }

    fn process_restyle(
        &self,
        catalog: &Catalog,
        job: &JobDef,
        dest: &Path,
        bucket_ready: &mut bool,
    ) -> Result<Produced> {
        let store = self.store.ok_or_else(|| {
            BrandgenError::ConfigError("restyle job without object storage".to_string())
        })?;
        let describe = catalog.describe.as_ref().ok_or_else(|| {
            BrandgenError::ConfigError(format!("catalog '{}' has no [describe] section", catalog.name()))
        })?;
        let source = catalog.source_path(job).ok_or_else(|| {
            BrandgenError::ConfigError(format!("job '{}' has no source image", job.key))
        })?;

        if !*bucket_ready {
            store.ensure_bucket()?;
            *bucket_ready = true;
        }

        print!(" uploading");
        flush_stdout();
        let name = remote_name(
            &catalog.settings.remote_prefix,
            &job.key,
            &source,
            chrono::Utc::now().timestamp_millis(),
        );
        let mut upload = UploadGuard::new(store, store.upload(&source, &name)?);

        print!(" describing");
        flush_stdout();
        let description = self.provider.describe(upload.public_url(), &describe.instruction)?;
        tracing::info!(job = %job.key, chars = description.len(), "scene described");

        let request = catalog.style.apply(SynthesisRequest::restyle(
            &describe.template,
            &catalog.style.enrich_prompt(&job.prompt),
            &description,
            job.size,
        ));

        print!(" generating");
        flush_stdout();
        let result = self.provider.synthesize(&request, &self.retry, self.sleeper)?;
        upload.release();

        self.download(&result.url, dest, request.prompt, Some(description))
    }

    fn download(
        &self,
        url: &str,
        dest: &Path,
        prompt: String,
        description: Option<String>,
    ) -> Result<Produced> {
        print!(" downloading");
        flush_stdout();
        let bytes = self.fetcher.fetch(url, dest)?;
        let content_hash = ContentHash::from_file(dest)?;
        Ok(Produced {
            prompt,
            description,
            content_hash,
            bytes,
        })
    }
}

fn flush_stdout() {
    std::io::stdout().flush().ok();
}
