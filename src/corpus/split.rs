//! Shuffle a manifest into train/dev/test lists.

use crate::error::{PrepError, Result};
use crate::manifest::read_raw_lines;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

/// Largest hold-out set, in lines.
pub const MAX_HOLDOUT: usize = 20_000;

/// Sizes of the three parts for a manifest of `total` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSizes {
    pub train: usize,
    pub dev: usize,
    pub test: usize,
}

impl SplitSizes {
    /// Hold out 20% (at least 2, at most 20000) and halve it into dev/test.
    pub fn for_total(total: usize) -> Result<Self> {
        if total < 3 {
            return Err(PrepError::Other(format!(
                "cannot split dataset with fewer than 3 clips (found {total})"
            )));
        }
        let holdout = (total / 5).clamp(2, MAX_HOLDOUT);
        let dev = holdout / 2;
        Ok(Self {
            train: total - holdout,
            dev,
            test: holdout - dev,
        })
    }
}

/// Paths written by [`split_manifest`].
#[derive(Debug, Clone, PartialEq)]
pub struct SplitFiles {
    pub sizes: SplitSizes,
    pub train: PathBuf,
    pub dev: PathBuf,
    pub test: PathBuf,
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    fs::write(path, out)?;
    Ok(())
}

/// Shuffle `lines` with `rng` and cut them into train, dev and test.
pub fn split_lines<R: Rng + ?Sized>(
    mut lines: Vec<String>,
    rng: &mut R,
) -> Result<(SplitSizes, Vec<String>, Vec<String>, Vec<String>)> {
    let sizes = SplitSizes::for_total(lines.len())?;
    lines.shuffle(rng);
    let holdout = lines.split_off(sizes.train);
    let (dev, test) = holdout.split_at(sizes.dev);
    Ok((sizes, lines, dev.to_vec(), test.to_vec()))
}

/// Split `manifest` into `train.lst`, `dev.lst` and `test.lst` next to it.
///
/// With a seed the shuffle is reproducible.
pub fn split_manifest(manifest: &Path, seed: Option<u64>) -> Result<SplitFiles> {
    let lines = read_raw_lines(manifest)?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    };
    let (sizes, train, dev, test) = split_lines(lines, &mut rng)?;

    let base = manifest.parent().unwrap_or(Path::new("."));
    let files = SplitFiles {
        sizes,
        train: base.join("train.lst"),
        dev: base.join("dev.lst"),
        test: base.join("test.lst"),
    };
    write_lines(&files.train, &train)?;
    write_lines(&files.dev, &dev)?;
    write_lines(&files.test, &test)?;
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    #[test]
    fn sizes_follow_holdout_rule() {
        assert!(SplitSizes::for_total(2).is_err());
        assert_eq!(
            SplitSizes::for_total(3).unwrap(),
            SplitSizes {
                train: 1,
                dev: 1,
                test: 1
            }
        );
        assert_eq!(
            SplitSizes::for_total(100).unwrap(),
            SplitSizes {
                train: 80,
                dev: 10,
                test: 10
            }
        );
        assert_eq!(
            SplitSizes::for_total(51).unwrap(),
            SplitSizes {
                train: 41,
                dev: 5,
                test: 5
            }
        );
        let big = SplitSizes::for_total(1_000_000).unwrap();
        assert_eq!(big.dev + big.test, MAX_HOLDOUT);
        assert_eq!(big.train, 980_000);
    }

    #[test]
    fn split_is_a_partition() {
        let lines: Vec<String> = (0..37).map(|i| format!("c{i} /c/{i}.flac 1 x")).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let (sizes, train, dev, test) = split_lines(lines.clone(), &mut rng).unwrap();

        assert_eq!((train.len(), dev.len(), test.len()), (sizes.train, sizes.dev, sizes.test));
        let all: BTreeSet<String> = train.into_iter().chain(dev).chain(test).collect();
        assert_eq!(all, lines.into_iter().collect());
    }

    #[test]
    fn seeded_split_is_reproducible() {
        let dir = TempDir::new().unwrap();
        let manifest = dir.path().join("clips.lst");
        let body: String = (0..20).map(|i| format!("c{i} /c/{i}.flac 1 text {i}\n")).collect();
        fs::write(&manifest, body).unwrap();

        let first = split_manifest(&manifest, Some(42)).unwrap();
        let train_a = fs::read_to_string(&first.train).unwrap();
        split_manifest(&manifest, Some(42)).unwrap();
        let train_b = fs::read_to_string(&first.train).unwrap();

        assert_eq!(train_a, train_b);
        assert_eq!(first.sizes.train, 16);
        assert_eq!(fs::read_to_string(&first.dev).unwrap().lines().count(), 2);
        assert_eq!(fs::read_to_string(&first.test).unwrap().lines().count(), 2);
    }
}
