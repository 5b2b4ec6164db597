use crate::defaults;
use crate::error::{PrepError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub aligner: AlignerConfig,
    pub audio: AudioConfig,
    pub scorer: ScorerConfig,
}

/// External forced-aligner configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AlignerConfig {
    /// Interpreter or executable that runs the aligner
    pub program: String,
    /// Entry point passed as the first argument (empty to omit)
    pub script: String,
    /// Directory the aligner is started in
    pub working_dir: Option<PathBuf>,
    /// Maximum character error rate in percent
    pub max_cer: u32,
    /// Voice activity detection aggressiveness (0-3)
    pub vad_aggressiveness: u8,
}

/// Clip writing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sox: String,
    pub sample_rate: u32,
    pub bits: u16,
    pub clip_extension: String,
}

/// Defaults for the optional ASR-quality filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ScorerConfig {
    pub binary: Option<PathBuf>,
    pub am: Option<PathBuf>,
    pub tokens: Option<PathBuf>,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            program: defaults::ALIGNER_PROGRAM.to_string(),
            script: defaults::ALIGNER_SCRIPT.to_string(),
            working_dir: None,
            max_cer: defaults::MAX_CER,
            vad_aggressiveness: defaults::VAD_AGGRESSIVENESS,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sox: defaults::SOX_PROGRAM.to_string(),
            sample_rate: defaults::CLIP_SAMPLE_RATE,
            bits: defaults::CLIP_BITS,
            clip_extension: defaults::CLIP_EXTENSION.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PrepError::ConfigFileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                PrepError::Io(e)
            }
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults only if the file is missing.
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(PrepError::ConfigFileNotFound { .. }) => Ok(Self::default()),
            other => other,
        }
    }

    /// Check values that TOML typing alone cannot catch.
    pub fn validate(&self) -> Result<()> {
        if self.aligner.program.trim().is_empty() {
            return Err(PrepError::ConfigInvalidValue {
                key: "aligner.program".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.aligner.vad_aggressiveness > 3 {
            return Err(PrepError::ConfigInvalidValue {
                key: "aligner.vad_aggressiveness".to_string(),
                message: format!("must be 0-3, got {}", self.aligner.vad_aggressiveness),
            });
        }
        if self.aligner.max_cer > 100 {
            return Err(PrepError::ConfigInvalidValue {
                key: "aligner.max_cer".to_string(),
                message: format!("must be a percentage, got {}", self.aligner.max_cer),
            });
        }
        if self.audio.sample_rate == 0 {
            return Err(PrepError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.clip_extension.is_empty() || self.audio.clip_extension.contains('.') {
            return Err(PrepError::ConfigInvalidValue {
                key: "audio.clip_extension".to_string(),
                message: "must be a bare extension such as 'flac'".to_string(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - WAV2TRAIN_ALIGNER → aligner.program
    /// - WAV2TRAIN_ALIGN_SCRIPT → aligner.script
    /// - WAV2TRAIN_SOX → audio.sox
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(program) = std::env::var("WAV2TRAIN_ALIGNER")
            && !program.is_empty()
        {
            self.aligner.program = program;
        }

        if let Ok(script) = std::env::var("WAV2TRAIN_ALIGN_SCRIPT") {
            self.aligner.script = script;
        }

        if let Ok(sox) = std::env::var("WAV2TRAIN_SOX")
            && !sox.is_empty()
        {
            self.audio.sox = sox;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/wav2train/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("wav2train")
            .join("config.toml")
    }
}
