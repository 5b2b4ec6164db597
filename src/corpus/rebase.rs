//! Point manifests at a moved `clips/` directory.

use crate::error::{PrepError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Rewrite one raw manifest line if its clip lives in a `clips` directory.
pub fn rebase_line(line: &str, clips_dir: &Path) -> String {
    let mut parts: Vec<&str> = line.splitn(4, ' ').collect();
    if parts.len() < 2 {
        return line.to_string();
    }
    let clip = Path::new(parts[1]);
    let in_clips = clip
        .parent()
        .and_then(Path::file_name)
        .is_some_and(|name| name == "clips");
    let Some(file_name) = clip.file_name().filter(|_| in_clips) else {
        return line.to_string();
    };
    let rebased = clips_dir.join(file_name).to_string_lossy().into_owned();
    parts[1] = &rebased;
    parts.join(" ")
}

/// Rewrite every `*.lst` in `data_dir` against `data_dir/clips`.
///
/// Each list is written to a temporary file and renamed over the original,
/// so a failure leaves the original intact. Returns the rewritten lists.
pub fn rebase_dir(data_dir: &Path) -> Result<Vec<PathBuf>> {
    let clips_dir = data_dir.join("clips");
    if !clips_dir.is_dir() {
        return Err(PrepError::Other(format!(
            "cannot rebase {}: no clips/",
            data_dir.display()
        )));
    }
    let clips_dir = fs::canonicalize(&clips_dir)?;

    let mut lists: Vec<PathBuf> = fs::read_dir(data_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "lst"))
        .collect();
    lists.sort();

    for list in &lists {
        tracing::info!("[+] {}", list.display());
        let text = fs::read_to_string(list)?;
        let mut tmp = NamedTempFile::new_in(data_dir)?;
        for line in text.lines() {
            writeln!(tmp, "{}", rebase_line(line, &clips_dir))?;
        }
        tmp.persist(list).map_err(|e| e.error)?;
    }
    Ok(lists)
}
