//! # sealpack-core
//!
//! Hasher, capability traits, configuration, bounded subprocess execution,
//! and the fail-closed `InstallPipeline` that every install goes through.

pub mod config;
pub mod digest;
pub mod pipeline;
pub mod process;
pub mod traits;

pub use pipeline::InstallPipeline;
