//! Default configuration constants for wav2train.
//!
//! Shared by the config types, the CLI and the pipeline stages so the same
//! numbers are never spelled twice.

/// Audio extensions probed next to each transcript, in priority order.
pub const AUDIO_EXTENSIONS: [&str; 8] = ["flac", "wav", "mp3", "ogg", "sph", "aac", "wma", "alac"];

/// Transcript file extension scanned for in the input directory.
pub const TRANSCRIPT_EXTENSION: &str = "txt";

/// Default aligner interpreter.
pub const ALIGNER_PROGRAM: &str = "python";

/// Default aligner entry point, relative to the aligner working directory.
pub const ALIGNER_SCRIPT: &str = "align/align.py";

/// Maximum character error rate (percent) the aligner keeps a segment at.
pub const MAX_CER: u32 = 25;

/// Voice activity detection aggressiveness passed to the aligner (0-3).
pub const VAD_AGGRESSIVENESS: u8 = 2;

/// Default sox binary.
pub const SOX_PROGRAM: &str = "sox";

/// Sample rate of written clips in Hz.
pub const CLIP_SAMPLE_RATE: u32 = 16000;

/// Bit depth of written clips.
pub const CLIP_BITS: u16 = 16;

/// Container extension of written clips.
pub const CLIP_EXTENSION: &str = "flac";

/// Maximum allowed difference between decoded and claimed duration, in ms.
pub const DURATION_TOLERANCE_MS: f64 = 1.0;

/// Shortest decoded clip the validity filter accepts, in ms.
pub const MIN_VALID_DURATION_MS: f64 = 1.0;

/// Fan-out of each cache sharding level (two hex digits).
pub const CACHE_FAN_OUT: usize = 256;

/// Default filter stage order.
pub const FILTER_ORDER: &str = "audio,chars,regex,valid";

/// Stderr lines from the aligner that are startup noise, matched by prefix.
pub const ALIGNER_BANNER_PREFIXES: [&str; 3] = [
    "TensorFlow: v",
    "DeepSpeech: v",
    "Warning: reading entire model",
];

/// Stderr lines from the aligner that are startup noise, matched anywhere.
pub const ALIGNER_BANNER_FRAGMENTS: [&str; 1] = ["Your CPU supports instructions"];

/// Number of CPUs available to this process (at least 1).
pub fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
