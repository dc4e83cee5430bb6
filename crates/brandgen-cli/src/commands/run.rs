use anyhow::{Context, Result};
use brandgen_pipeline::{
    BrandgenConfig, Catalog, DashScopeProvider, HttpFetcher, Pipeline, RunOptions, SupabaseStore,
    UreqTransport,
};

pub struct RunArgs {
    pub catalog: String,
    pub only: Option<String>,
    pub force: bool,
    pub no_manifest: bool,
}

pub fn run(args: RunArgs) -> Result<()> {
    let catalog = Catalog::find(&args.catalog)?;
    let config = BrandgenConfig::load().context("Failed to load configuration")?;
    tracing::debug!(
        catalog = %catalog.name(),
        jobs = catalog.jobs.len(),
        max_retries = config.generation.max_retries,
        backoff_secs = config.generation.backoff_secs,
        "loaded catalog"
    );

    // Every secret the catalog needs is checked here, before any network call
    let transport = UreqTransport::new(config.request_timeout());
    let provider = DashScopeProvider::from_config(&config, &transport)?;
    let store = if catalog.needs_storage() {
        Some(SupabaseStore::from_config(&config, &transport)?)
    } else {
        None
    };
    let fetcher = HttpFetcher::new(&transport);

    let mut pipeline = Pipeline::new(&provider, &fetcher).with_retry(config.retry_policy());
    if let Some(ref store) = store {
        pipeline = pipeline.with_store(store);
    }
    if !args.no_manifest {
        pipeline = pipeline.with_manifest(&config.generation.manifest);
    }

    let options = RunOptions {
        only: args.only,
        force: args.force,
    };
    let report = pipeline.run(&catalog, &options).map_err(|e| {
        let what = if e.is_config() { "cannot run" } else { "stopped" };
        anyhow::Error::new(e).context(format!("Catalog '{}' {}", catalog.name(), what))
    })?;

    if report.failed() > 0 {
        eprintln!("{} job(s) failed; rerun to retry them", report.failed());
        for outcome in report.outcomes.iter().filter(|o| o.error.is_some()) {
            eprintln!("  {}: {}", outcome.key, outcome.error.as_deref().unwrap_or_default());
        }
    }

    Ok(())
}
