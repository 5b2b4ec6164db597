//! Progress bars shared by the long-running phases.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Bar for one phase of `len` items, or a hidden bar when `visible` is false.
pub fn phase_bar(len: u64, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_bar()
            .template("{prefix:>8.bold} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .expect("hardcoded progress bar template")
            .progress_chars("#>-"),
    );
    pb.set_prefix(label.to_string());
    pb
}

/// Put `pb` under `multi` so concurrent phases draw on separate lines.
///
/// Hidden bars stay hidden.
pub fn attach(multi: &MultiProgress, pb: ProgressBar) -> ProgressBar {
    if pb.is_hidden() {
        pb
    } else {
        multi.add(pb)
    }
}

/// Spinner for a phase of unknown length.
pub fn phase_spinner(label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        // SAFETY: hardcoded template string, always valid
        #[allow(clippy::expect_used)]
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {pos} {msg}")
            .expect("hardcoded spinner template"),
    );
    pb.set_prefix(label.to_string());
    pb
}
