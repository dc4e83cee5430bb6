//! Brandgen Pipeline - brand imagery generation
//!
//! Turns job catalogs into image files: text prompts are synthesized
//! directly, photos are uploaded, described by a vision model and recreated
//! in the catalog's style. Rate limits are retried with exponential backoff
//! and every temporary upload is cleaned up.

pub mod catalog;
pub mod config;
pub mod fetch;
pub mod job;
pub mod manifest;
pub mod palette;
pub mod pipeline;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod storage;
pub mod style;
pub mod transport;

pub use catalog::{Catalog, CatalogMode, FailurePolicy};
pub use config::BrandgenConfig;
pub use fetch::{HttpFetcher, ResultFetcher};
pub use job::{JobDef, JobOutcome, JobStatus, RunReport};
pub use manifest::{GenerationManifest, ManifestEntry};
pub use palette::{extract_palette, Palette, PaletteColor};
pub use pipeline::{Pipeline, RunOptions};
pub use provider::{GenerationProvider, GenerationResult, ImageSize, SynthesisRequest};
pub use providers::DashScopeProvider;
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use storage::{ObjectStore, RemoteAsset, SupabaseStore};
pub use style::StyleGuide;
pub use transport::{HttpTransport, UreqTransport};
