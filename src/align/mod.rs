//! Forced alignment of recordings and segmentation into clips.

pub mod aligner;
pub mod discovery;
pub mod segment;
pub mod types;

pub use aligner::{Aligner, DsAligner, MockAligner};
pub use discovery::{ExtensionProbe, discover};
pub use segment::{DiscardReason, RecordingClips, SegmentExtractor, Segments};
pub use types::{AlignedRecording, AlignedSegment, InputPair, recording_name};
