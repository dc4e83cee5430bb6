//! Generation provider implementations

pub mod dashscope;
#[cfg(test)]
pub(crate) mod mock;

pub use dashscope::DashScopeProvider;
