//! Manifest filtering: length bounds, regex, audio validity and optional
//! ASR quality, with per-stage survivor statistics.

pub mod asr;
pub mod chain;
pub mod range;
pub mod stages;
pub mod stats;

pub use asr::{MockScorer, SampleScore, Scorer, Thresholds, W2lScorer, parse_sample_line};
pub use chain::{FilterChain, FilterOptions, FilterOutcome};
pub use range::Range;
pub use stages::{StageKind, parse_order};
pub use stats::{LineIter, Stats};
