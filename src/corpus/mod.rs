//! Dataset housekeeping around the core pipeline: splitting a manifest,
//! building a letter lexicon and relocating clip directories.

pub mod lexicon;
pub mod rebase;
pub mod split;

pub use lexicon::{build_lexicon, spelling};
pub use rebase::{rebase_dir, rebase_line};
pub use split::{SplitFiles, SplitSizes, split_manifest};
