//! brandgen Core - Foundational types for the brandgen imagery pipeline
//!
//! This crate provides the types every other brandgen crate depends on:
//! - `BrandgenError` - Error taxonomy shared by every pipeline stage
//! - `ContentHash` - SHA-256 digests of generated outputs

mod error;
mod hash;

pub use error::{BrandgenError, Result};
pub use hash::ContentHash;
