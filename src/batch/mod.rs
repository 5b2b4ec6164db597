//! Final dataset assembly: per-split filtering, audio caching and the
//! rewritten flagsfile.

pub mod cache;
pub mod flagsfile;
pub mod merger;

pub use cache::{CacheStore, content_hash};
pub use flagsfile::Flagsfile;
pub use merger::{BatchMerger, BatchOptions, BatchSummary, Split, SplitOutput};
