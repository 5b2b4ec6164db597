//! wav2train - speech corpus preparation
//!
//! Aligns long-form recordings against their transcripts, cuts them into
//! clips, filters the resulting manifests and assembles training datasets.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod align;
pub mod audio;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod corpus;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod text;

// Core traits (external tools behind seams)
pub use align::Aligner;
pub use audio::AudioTool;
pub use filter::Scorer;
pub use process::ProcessRunner;

// Pipeline
pub use align::SegmentExtractor;
pub use batch::{BatchMerger, CacheStore};
pub use filter::{FilterChain, FilterOptions};
pub use pipeline::{PipelineScheduler, WorkerPool};

// Records
pub use manifest::ManifestLine;

// Error handling
pub use error::{ManifestError, PrepError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.0+abc1234"` when git hash is available, `"0.3.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
