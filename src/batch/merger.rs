//! Build filtered train/test/valid manifests from a flagsfile.
//!
//! For each split the listed manifests are either merged into one list
//! (train only, opt-in) or filtered one by one. Survivors are optionally
//! moved into the content-addressed cache, and a rewritten flagsfile points
//! at the new lists.

use crate::batch::cache::CacheStore;
use crate::batch::flagsfile::{self, Flagsfile};
use crate::error::{PrepError, Result};
use crate::filter::{FilterChain, Stats};
use crate::manifest::{ManifestLine, read_raw_lines, write_manifest};
use crate::pipeline::WorkerPool;
use crate::progress::phase_bar;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Name of the rewritten flagsfile in the output directory.
pub const FLAGSFILE: &str = "flagsfile";

/// One of the three dataset splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
    Valid,
}

impl Split {
    pub const ALL: [Split; 3] = [Split::Train, Split::Test, Split::Valid];

    pub fn name(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
            Split::Valid => "valid",
        }
    }

    /// Flagsfile key listing this split's manifests.
    pub fn key(&self) -> &'static str {
        match self {
            Split::Train => flagsfile::TRAIN,
            Split::Test => flagsfile::TEST,
            Split::Valid => flagsfile::VALID,
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Inputs of one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub flagsfile: PathBuf,
    pub output: PathBuf,
    /// Merge all train manifests into a single `train.lst`.
    pub merge: bool,
    pub cache: Option<PathBuf>,
    pub workers: usize,
    pub show_progress: bool,
}

/// One manifest written by the run.
#[derive(Debug)]
pub struct SplitOutput {
    pub split: Split,
    /// File name inside the output directory.
    pub name: String,
    pub lines: usize,
    /// Lines that survived filtering but could not be cached.
    pub cache_failures: usize,
    pub stats: Stats,
}

/// Everything a batch run wrote.
#[derive(Debug)]
pub struct BatchSummary {
    pub outputs: Vec<SplitOutput>,
    /// Input lists that could not be read and were left out.
    pub unreadable: Vec<PathBuf>,
    pub flagsfile: PathBuf,
}

/// Deepest directory containing every path in `paths`.
pub fn common_dir(paths: &[PathBuf]) -> PathBuf {
    let mut parents = paths.iter().map(|p| p.parent().unwrap_or(Path::new("")));
    let Some(first) = parents.next() else {
        return PathBuf::new();
    };
    let mut common: Vec<Component> = first.components().collect();
    for parent in parents {
        let shared = common
            .iter()
            .zip(parent.components())
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    common.iter().collect()
}

/// Output name for `list`: its path under `common` with separators turned
/// into `-` and the extension replaced by `.lst`.
pub fn output_name(list: &Path, common: &Path) -> String {
    let relative = list.strip_prefix(common).unwrap_or(list);
    let relative = relative.with_extension("");
    let joined = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("-");
    format!("{joined}.lst")
}

/// Runs the filter chain over every split of a flagsfile.
pub struct BatchMerger {
    chain: FilterChain,
    options: BatchOptions,
}

impl BatchMerger {
    pub fn new(chain: FilterChain, options: BatchOptions) -> Self {
        Self { chain, options }
    }

    /// Process all three splits and write `<output>/flagsfile`.
    pub fn run(&self) -> Result<BatchSummary> {
        let flagsfile_path = fs::canonicalize(&self.options.flagsfile).map_err(|e| {
            PrepError::Other(format!(
                "cannot read flagsfile {}: {e}",
                self.options.flagsfile.display()
            ))
        })?;
        let mut flags = Flagsfile::load(&flagsfile_path)?;

        fs::create_dir_all(&self.options.output)?;
        let output = fs::canonicalize(&self.options.output)?;

        let flags_dir = flagsfile_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let datadir = match flags.get(flagsfile::DATADIR) {
            Some(dir) if !dir.is_empty() => flags_dir.join(dir),
            _ => flags_dir,
        };

        let cache = self
            .options
            .cache
            .as_ref()
            .map(|root| {
                tracing::info!(root = %root.display(), "preparing cache directories");
                CacheStore::create(root)
            })
            .transpose()?
            .map(Arc::new);

        let mut outputs = Vec::new();
        let mut unreadable = Vec::new();
        for split in Split::ALL {
            let lists: Vec<PathBuf> = flags
                .list(split.key())
                .iter()
                .map(|name| datadir.join(name))
                .collect();
            let merge = self.options.merge && split == Split::Train;
            let written =
                self.process_split(split, &lists, merge, &output, cache.as_ref(), &mut unreadable)?;
            let names: Vec<&str> = written.iter().map(|o| o.name.as_str()).collect();
            flags.set(split.key(), names.join(","));
            outputs.extend(written);
        }
        flags.set(flagsfile::DATADIR, output.to_string_lossy());

        let flagsfile = output.join(FLAGSFILE);
        flags.save(&flagsfile)?;
        Ok(BatchSummary {
            outputs,
            unreadable,
            flagsfile,
        })
    }

    fn process_split(
        &self,
        split: Split,
        lists: &[PathBuf],
        merge: bool,
        output: &Path,
        cache: Option<&Arc<CacheStore>>,
        unreadable: &mut Vec<PathBuf>,
    ) -> Result<Vec<SplitOutput>> {
        if lists.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!("[+] {split}");

        // Names come from every listed path so they do not shift when one
        // list is missing.
        let common = common_dir(lists);
        let mut readable = Vec::with_capacity(lists.len());
        for list in lists {
            match read_raw_lines(list) {
                Ok(raw) => readable.push((list, raw)),
                Err(e) => {
                    tracing::warn!(list = %list.display(), error = %e, "skipping unreadable list");
                    unreadable.push(list.clone());
                }
            }
        }
        if readable.is_empty() {
            return Ok(Vec::new());
        }

        if merge {
            let raw = readable.into_iter().flat_map(|(_, raw)| raw).collect();
            let name = format!("{}.lst", split.name());
            let out = self.filter_into(split, raw, &name, output, cache)?;
            return Ok(vec![out]);
        }

        let mut outputs = Vec::with_capacity(readable.len());
        for (list, raw) in readable {
            let name = output_name(list, &common);
            outputs.push(self.filter_into(split, raw, &name, output, cache)?);
        }
        Ok(outputs)
    }

    fn filter_into(
        &self,
        split: Split,
        raw: Vec<String>,
        name: &str,
        output: &Path,
        cache: Option<&Arc<CacheStore>>,
    ) -> Result<SplitOutput> {
        let outcome = self.chain.run_as(raw, name)?;
        let (lines, cache_failures) = match cache {
            Some(store) => self.cache_lines(outcome.lines, Arc::clone(store)),
            None => (outcome.lines, 0),
        };
        let written = write_manifest(&output.join(name), &lines)?;
        Ok(SplitOutput {
            split,
            name: name.to_string(),
            lines: written,
            cache_failures,
            stats: outcome.stats,
        })
    }

    /// Rewrite lines to cached clip paths, keeping their order. Lines whose
    /// clip cannot be read are dropped.
    fn cache_lines(
        &self,
        lines: Vec<ManifestLine>,
        store: Arc<CacheStore>,
    ) -> (Vec<ManifestLine>, usize) {
        let bar = phase_bar(lines.len() as u64, "cache", self.options.show_progress);
        let progress = bar.clone();
        let mut cached: Vec<(usize, Result<ManifestLine>)> = WorkerPool::new(self.options.workers)
            .map_unordered(lines.into_iter().enumerate(), move |(index, line)| {
                let result = store.cache_line(&line).map_err(|e| {
                    PrepError::Other(format!("{}: {e}", line.clip_path.display()))
                });
                progress.inc(1);
                (index, result)
            })
            .collect();
        bar.finish_and_clear();
        cached.sort_by_key(|(index, _)| *index);

        let mut failures = 0;
        let lines = cached
            .into_iter()
            .filter_map(|(_, result)| match result {
                Ok(line) => Some(line),
                Err(e) => {
                    failures += 1;
                    tracing::warn!("cannot cache clip {e}");
                    None
                }
            })
            .collect();
        (lines, failures)
    }
}
