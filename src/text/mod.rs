//! Transcript text handling.

pub mod normalize;

pub use normalize::normalize;
