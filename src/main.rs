use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use wav2train::align::{DsAligner, SegmentExtractor};
use wav2train::audio::{AudioTool, SoxAudioTool};
use wav2train::batch::BatchMerger;
use wav2train::cli::{AlignArgs, BatchArgs, Cli, Commands, FilterArgs};
use wav2train::config::Config;
use wav2train::corpus::{build_lexicon, rebase_dir, split_manifest};
use wav2train::defaults::cpu_count;
use wav2train::diagnostics::{print_report, run_checks};
use wav2train::filter::{FilterChain, Stats};
use wav2train::logging;
use wav2train::manifest::{ManifestWriter, read_raw_lines};
use wav2train::pipeline::{PipelineScheduler, stt_parallelism};
use wav2train::process::{ProcessRunner, SystemProcessRunner};

/// Log file written next to the outputs of an `align` run.
const ALIGN_LOG: &str = "align.log";

fn main() -> Result<()> {
    let cli = Cli::parse();
    let show_progress = !cli.quiet && std::io::stderr().is_terminal();

    match &cli.command {
        Commands::Align(args) => {
            std::fs::create_dir_all(&args.output_dir).with_context(|| {
                format!("cannot create output directory {}", args.output_dir.display())
            })?;
            logging::init(
                cli.verbose,
                cli.quiet,
                Some(&args.output_dir.join(ALIGN_LOG)),
            )?;
        }
        _ => logging::init(cli.verbose, cli.quiet, None)?,
    }
    tracing::debug!(version = %wav2train::version_string(), "wav2train starting");

    match cli.command {
        Commands::Align(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_align(config, &args, cli.verbose > 0, show_progress)?;
        }
        Commands::Filter {
            lst,
            output,
            filter,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_filter(config, &lst, output.as_deref(), &filter, show_progress)?;
        }
        Commands::Batch(args) => {
            let config = load_config(cli.config.as_deref())?;
            run_batch(config, &args, show_progress)?;
        }
        Commands::Split { lst, seed } => {
            let files = split_manifest(&lst, seed)?;
            println!(
                "train={} dev={} test={}",
                files.sizes.train, files.sizes.dev, files.sizes.test
            );
        }
        Commands::Lexicon { name, lists } => {
            let (path, words) = build_lexicon(&name, &lists)?;
            println!("{} words -> {}", words, path.display());
        }
        Commands::Rebase { dirs } => {
            run_rebase(&dirs)?;
        }
        Commands::Check => {
            let config = load_config(cli.config.as_deref())?;
            let checks = run_checks(&SystemProcessRunner, &config);
            if !print_report(&checks) {
                std::process::exit(1);
            }
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "wav2train",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        // Load from custom path
        Config::load(path)?
    } else {
        // Try default path, fall back to defaults
        Config::load_or_default(&Config::default_path())?
    };

    // Apply environment variable overrides
    Ok(config.with_env_overrides())
}

fn audio_tool(runner: &Arc<dyn ProcessRunner>, config: &Config) -> Arc<dyn AudioTool> {
    Arc::new(SoxAudioTool::new(Arc::clone(runner), config.audio.clone()))
}

fn run_align(config: Config, args: &AlignArgs, verbose: bool, show_progress: bool) -> Result<()> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner);
    let options = args.scheduler_options(show_progress);
    let stt_workers = stt_parallelism(cpu_count(), options.jobs, args.workers);

    let aligner = DsAligner::new(Arc::clone(&runner), config.aligner.clone())
        .with_stt_workers(stt_workers)
        .with_model_dir(args.model.clone())
        .with_verbose(verbose);

    let (_, clips_dir) = PipelineScheduler::prepare_output(&args.output_dir)?;
    let extractor = SegmentExtractor::new(audio_tool(&runner, &config), clips_dir)
        .with_clip_extension(&config.audio.clip_extension);

    let scheduler = PipelineScheduler::new(Arc::new(aligner), Arc::new(extractor), options);
    let summary = scheduler.run(&args.input_dir, &args.output_dir)?;

    for (audio, message) in &summary.failures {
        eprintln!("{} {}: {}", "failed".red(), audio.display(), message);
    }
    eprintln!("{summary}");
    eprintln!("wrote {}", summary.manifest.display());
    Ok(())
}

fn build_chain(config: &Config, filter: &FilterArgs, show_progress: bool) -> Result<FilterChain> {
    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner);
    let options = filter.to_options().with_scorer_defaults(&config.scorer);
    let chain = FilterChain::new(options, audio_tool(&runner, config), runner)?
        .with_workers(cpu_count())
        .with_progress(show_progress);
    Ok(chain)
}

fn run_filter(
    config: Config,
    lst: &Path,
    output: Option<&Path>,
    filter: &FilterArgs,
    show_progress: bool,
) -> Result<()> {
    let chain = build_chain(&config, filter, show_progress)?;
    let raw = read_raw_lines(lst).with_context(|| format!("cannot read {}", lst.display()))?;
    let outcome = chain.run(raw)?;

    match output {
        Some(path) => {
            let mut writer = ManifestWriter::create(path)?;
            for line in &outcome.lines {
                writer.write_line(line)?;
            }
            writer.finish()?;
        }
        None => {
            let mut writer = ManifestWriter::new(std::io::stdout().lock());
            for line in &outcome.lines {
                writer.write_line(line)?;
            }
            writer.finish()?;
        }
    }

    print_stats(None, &outcome.stats);
    Ok(())
}

fn run_batch(config: Config, args: &BatchArgs, show_progress: bool) -> Result<()> {
    let chain = build_chain(&config, &args.filter, show_progress)?;
    let merger = BatchMerger::new(chain, args.batch_options(show_progress));
    let summary = merger.run()?;

    for output in &summary.outputs {
        print_stats(Some(&format!("{} {}", output.split, output.name)), &output.stats);
        if output.cache_failures > 0 {
            eprintln!(
                "{} {} clips could not be cached",
                "warning".yellow(),
                output.cache_failures
            );
        }
    }
    for list in &summary.unreadable {
        eprintln!("{} skipped unreadable list {}", "warning".yellow(), list.display());
    }
    eprintln!("wrote {}", summary.flagsfile.display());
    Ok(())
}

fn run_rebase(dirs: &[std::path::PathBuf]) -> Result<()> {
    let mut failed = 0;
    for dir in dirs {
        match rebase_dir(dir) {
            Ok(rewritten) => {
                for path in rewritten {
                    println!("{}", path.display());
                }
            }
            Err(e) => {
                failed += 1;
                eprintln!("{} {}: {}", "error".red(), dir.display(), e);
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} directories could not be rebased", dirs.len());
    }
    Ok(())
}

/// Dump filter statistics to stderr, outside the logger.
fn print_stats(title: Option<&str>, stats: &Stats) {
    let color = std::io::stderr().is_terminal();
    let heading = |label: &str| {
        if color {
            label.bold().to_string()
        } else {
            label.to_string()
        }
    };
    if let Some(title) = title {
        eprintln!("{}", heading(&format!("[{title}]")));
    }
    eprintln!("| {} {}", heading("pipeline:"), stats.pipeline_summary());
    eprintln!("| {}    {}", heading("stats:"), stats.size_summary());
}
