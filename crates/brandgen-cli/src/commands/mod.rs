//! CLI command implementations

pub mod catalogs;
pub mod palette;
pub mod run;
