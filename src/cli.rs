//! Command-line interface for wav2train
//!
//! Provides argument parsing using clap derive macros.

use crate::batch::BatchOptions;
use crate::defaults;
use crate::filter::{FilterOptions, Range, StageKind, parse_order};
use crate::pipeline::{OrderBy, SchedulerOptions};
use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::str::FromStr;

/// Turn long-form recordings and transcripts into training manifests
#[derive(Parser, Debug)]
#[command(
    name = "wav2train",
    version,
    about = "Turn long-form recordings and transcripts into training manifests"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Hide progress bars and informational logging
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align recordings against their transcripts and cut them into clips
    Align(AlignArgs),

    /// Filter a manifest, writing survivors to stdout or a file
    Filter {
        /// Input manifest
        #[arg(value_name = "LST")]
        lst: PathBuf,

        /// Output manifest (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Filter every split of a training flagsfile into a new dataset
    Batch(BatchArgs),

    /// Shuffle a manifest into train/dev/test lists
    Split {
        /// Manifest to split
        #[arg(value_name = "LST")]
        lst: PathBuf,

        /// Seed for a reproducible shuffle
        #[arg(long, value_name = "N")]
        seed: Option<u64>,
    },

    /// Build a letter lexicon from the words of one or more manifests
    Lexicon {
        /// Output name; the lexicon is written to <NAME>.lexicon
        #[arg(value_name = "NAME")]
        name: PathBuf,

        /// Manifests to collect words from
        #[arg(value_name = "LST", required = true)]
        lists: Vec<PathBuf>,
    },

    /// Point manifests at the clips/ directory next to them
    Rebase {
        /// Dataset directories containing clips/
        #[arg(value_name = "DIR", required = true)]
        dirs: Vec<PathBuf>,
    },

    /// Check that external tools are reachable
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Arguments of the `align` command
#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Directory of `<name>.txt` transcripts with matching audio files
    #[arg(value_name = "INPUT_DIR")]
    pub input_dir: PathBuf,

    /// Directory receiving align/, clips/ and clips.lst
    #[arg(value_name = "OUTPUT_DIR")]
    pub output_dir: PathBuf,

    /// Alignments to run in parallel
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub jobs: usize,

    /// Transcription workers per alignment (default: CPUs / jobs)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Directory containing the speech model
    #[arg(short, long, value_name = "DIR")]
    pub model: Option<PathBuf>,

    /// Scheduling order of recordings (size: largest first, name)
    #[arg(long, value_name = "ORDER", default_value = "size")]
    pub order_by: OrderBy,
}

impl AlignArgs {
    pub fn scheduler_options(&self, show_progress: bool) -> SchedulerOptions {
        SchedulerOptions {
            jobs: self.jobs.max(1),
            segment_workers: defaults::cpu_count(),
            order_by: self.order_by,
            show_progress,
        }
    }
}

/// Arguments of the `batch` command
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input flagsfile
    #[arg(long, value_name = "FILE")]
    pub flagsfile: PathBuf,

    /// Output directory
    #[arg(long, value_name = "DIR")]
    pub output: PathBuf,

    /// Merge all train lists into one
    #[arg(long)]
    pub merge: bool,

    /// Copy surviving clips into this content-addressed cache
    #[arg(long, value_name = "DIR")]
    pub cache: Option<PathBuf>,

    #[command(flatten)]
    pub filter: FilterArgs,
}

impl BatchArgs {
    pub fn batch_options(&self, show_progress: bool) -> BatchOptions {
        BatchOptions {
            flagsfile: self.flagsfile.clone(),
            output: self.output.clone(),
            merge: self.merge,
            cache: self.cache.clone(),
            workers: defaults::cpu_count(),
            show_progress,
        }
    }
}

/// Filter stage order, e.g. `chars,audio`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOrder(pub Vec<StageKind>);

impl FromStr for StageOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_order(s).map(StageOrder)
    }
}

/// Filter flags shared by `filter` and `batch`
#[derive(Args, Debug, Clone)]
pub struct FilterArgs {
    /// Keep clips whose duration is within MIN-MAX milliseconds
    #[arg(long, value_name = "MIN-MAX")]
    pub audio: Option<Range>,

    /// Keep transcripts whose length is within MIN-MAX characters
    #[arg(long, value_name = "MIN-MAX")]
    pub chars: Option<Range>,

    /// Keep transcripts matching PATTERN at their start, e.g. "^[a-z' ]+$"
    #[arg(long, value_name = "PATTERN")]
    pub regex: Option<String>,

    /// Drop clips that fail to decode or whose length disagrees with the manifest
    #[arg(long)]
    pub valid: bool,

    /// Order of the filter stages
    #[arg(long, value_name = "STAGES", default_value = defaults::FILTER_ORDER)]
    pub order: StageOrder,

    /// Path to the wav2letter Test binary
    #[arg(long, alias = "w2l_test", value_name = "BIN")]
    pub w2l_test: Option<PathBuf>,

    /// Path to the wav2letter acoustic model
    #[arg(long, value_name = "FILE")]
    pub am: Option<PathBuf>,

    /// Path to the wav2letter tokens file
    #[arg(long, value_name = "FILE")]
    pub tokens: Option<PathBuf>,

    /// Maximum letter error rate, as a fraction (0.5 = 50%)
    #[arg(long, alias = "LER", value_name = "RATE")]
    pub ler: Option<f64>,

    /// Maximum word error rate, as a fraction (0.5 = 50%)
    #[arg(long, alias = "WER", value_name = "RATE")]
    pub wer: Option<f64>,

    /// Description shown on the progress bar
    #[arg(long, value_name = "TEXT")]
    pub desc: Option<String>,
}

impl FilterArgs {
    /// Convert to library options.
    pub fn to_options(&self) -> FilterOptions {
        FilterOptions {
            audio: self.audio,
            chars: self.chars,
            regex: self.regex.clone(),
            valid: self.valid,
            order: self.order.0.clone(),
            w2l_test: self.w2l_test.clone(),
            am: self.am.clone(),
            tokens: self.tokens.clone(),
            ler: self.ler,
            wer: self.wer,
            desc: self.desc.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_align() {
        let cli = Cli::try_parse_from(["wav2train", "align", "in", "out"]).unwrap();
        match cli.command {
            Commands::Align(args) => {
                assert_eq!(args.input_dir, PathBuf::from("in"));
                assert_eq!(args.output_dir, PathBuf::from("out"));
                assert_eq!(args.jobs, 1);
                assert!(args.workers.is_none());
                assert!(args.model.is_none());
                assert_eq!(args.order_by, OrderBy::Size);
            }
            _ => panic!("Expected Align command"),
        }
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_parse_align_short_flags() {
        let cli = Cli::try_parse_from([
            "wav2train", "align", "in", "out", "-j", "4", "-w", "2", "-m", "/models", "-v",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Align(args) => {
                assert_eq!(args.jobs, 4);
                assert_eq!(args.workers, Some(2));
                assert_eq!(args.model, Some(PathBuf::from("/models")));
                let options = args.scheduler_options(true);
                assert_eq!(options.jobs, 4);
                assert!(options.show_progress);
            }
            _ => panic!("Expected Align command"),
        }
    }

    #[test]
    fn test_align_missing_output_is_usage_error() {
        let err = Cli::try_parse_from(["wav2train", "align", "in"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_missing_command_is_usage_error() {
        assert!(Cli::try_parse_from(["wav2train"]).is_err());
    }

    #[test]
    fn test_parse_filter_flags() {
        let cli = Cli::try_parse_from([
            "wav2train",
            "filter",
            "clips.lst",
            "--audio",
            "1000-5000",
            "--chars",
            "1-200",
            "--regex",
            "[a-z' ]+$",
            "--valid",
            "--order",
            "chars,audio",
            "-o",
            "out.lst",
        ])
        .unwrap();
        match cli.command {
            Commands::Filter { lst, output, filter } => {
                assert_eq!(lst, PathBuf::from("clips.lst"));
                assert_eq!(output, Some(PathBuf::from("out.lst")));
                let options = filter.to_options();
                assert_eq!(options.audio, Some(Range::new(1000, 5000)));
                assert_eq!(options.chars, Some(Range::new(1, 200)));
                assert!(options.valid);
                assert_eq!(
                    options.order,
                    vec![
                        StageKind::Chars,
                        StageKind::Audio,
                        StageKind::Regex,
                        StageKind::Valid
                    ]
                );
                assert!(!options.asr_enabled());
            }
            _ => panic!("Expected Filter command"),
        }
    }

    #[test]
    fn test_filter_defaults_to_standard_order() {
        let cli = Cli::try_parse_from(["wav2train", "filter", "a.lst"]).unwrap();
        match cli.command {
            Commands::Filter { filter, output, .. } => {
                assert!(output.is_none());
                assert_eq!(filter.to_options(), FilterOptions::default());
            }
            _ => panic!("Expected Filter command"),
        }
    }

    #[test]
    fn test_bad_range_is_rejected() {
        let result = Cli::try_parse_from(["wav2train", "filter", "a.lst", "--audio", "5000-1000"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["wav2train", "filter", "a.lst", "--audio", "abc"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_order_is_rejected() {
        let result =
            Cli::try_parse_from(["wav2train", "filter", "a.lst", "--order", "audio,audio"]);
        assert!(result.is_err());
        let result = Cli::try_parse_from(["wav2train", "filter", "a.lst", "--order", "speed"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_asr_flags_accept_original_spellings() {
        let cli = Cli::try_parse_from([
            "wav2train",
            "filter",
            "a.lst",
            "--w2l_test",
            "/bin/Test",
            "--am",
            "am.bin",
            "--LER",
            "0.1",
            "--wer",
            "0.255",
        ])
        .unwrap();
        match cli.command {
            Commands::Filter { filter, .. } => {
                let options = filter.to_options();
                assert_eq!(options.ler, Some(0.1));
                assert_eq!(options.wer, Some(0.255));
                assert!(options.asr_enabled());
                assert!(options.validate().is_ok());
            }
            _ => panic!("Expected Filter command"),
        }
    }

    #[test]
    fn test_parse_batch() {
        let cli = Cli::try_parse_from([
            "wav2train",
            "batch",
            "--flagsfile",
            "train.cfg",
            "--output",
            "out",
            "--merge",
            "--cache",
            "/cache",
            "--audio",
            "500-15000",
        ])
        .unwrap();
        match cli.command {
            Commands::Batch(args) => {
                let options = args.batch_options(false);
                assert_eq!(options.flagsfile, PathBuf::from("train.cfg"));
                assert_eq!(options.output, PathBuf::from("out"));
                assert!(options.merge);
                assert_eq!(options.cache, Some(PathBuf::from("/cache")));
                assert_eq!(args.filter.audio, Some(Range::new(500, 15000)));
            }
            _ => panic!("Expected Batch command"),
        }
    }

    #[test]
    fn test_batch_requires_flagsfile() {
        let err = Cli::try_parse_from(["wav2train", "batch", "--output", "out"]).unwrap_err();
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn test_parse_corpus_tools() {
        let cli = Cli::try_parse_from(["wav2train", "split", "clips.lst", "--seed", "7"]).unwrap();
        match cli.command {
            Commands::Split { lst, seed } => {
                assert_eq!(lst, PathBuf::from("clips.lst"));
                assert_eq!(seed, Some(7));
            }
            _ => panic!("Expected Split command"),
        }

        let cli = Cli::try_parse_from(["wav2train", "lexicon", "en", "a.lst", "b.lst"]).unwrap();
        match cli.command {
            Commands::Lexicon { name, lists } => {
                assert_eq!(name, PathBuf::from("en"));
                assert_eq!(lists.len(), 2);
            }
            _ => panic!("Expected Lexicon command"),
        }

        assert!(Cli::try_parse_from(["wav2train", "lexicon", "en"]).is_err());
        assert!(Cli::try_parse_from(["wav2train", "rebase"]).is_err());
    }

    #[test]
    fn test_global_options_after_command() {
        let cli = Cli::try_parse_from([
            "wav2train",
            "check",
            "--config",
            "/tmp/config.toml",
            "-q",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
        assert!(cli.quiet);
        assert!(matches!(cli.command, Commands::Check));
    }

    #[test]
    fn test_parse_verbose_double() {
        let cli = Cli::try_parse_from(["wav2train", "-vv", "check"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_version_flag() {
        let err = Cli::try_parse_from(["wav2train", "--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn test_completions() {
        let cli = Cli::try_parse_from(["wav2train", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
