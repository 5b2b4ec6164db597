//! Audio decoding and trimming.

pub mod probe;
pub mod tool;

pub use probe::{AudioInfo, probe};
pub use tool::{AudioTool, MockAudioTool, SoxAudioTool};
