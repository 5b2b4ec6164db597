//! Letter lexicon for a set of manifests.

use crate::error::Result;
use crate::manifest::read_raw_lines;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Letters of `word`, space separated, with immediate repeats collapsed.
///
/// A word quoted in single quotes is unquoted first.
pub fn spelling(word: &str) -> String {
    let word = if word.len() >= 2 && word.starts_with('\'') && word.ends_with('\'') {
        word[1..word.len() - 1].trim()
    } else {
        word
    };
    let mut letters: Vec<char> = word.chars().collect();
    letters.dedup();
    letters
        .iter()
        .map(char::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Unique words of the text column of every manifest.
pub fn collect_words(lists: &[PathBuf]) -> Result<BTreeSet<String>> {
    let mut words = BTreeSet::new();
    for list in lists {
        for line in read_raw_lines(list)? {
            let text = line.splitn(4, ' ').last().unwrap_or_default();
            words.extend(text.split_whitespace().map(str::to_string));
        }
    }
    Ok(words)
}

/// Write `<name>.lexicon` with one `word spelling` line per word, sorted.
pub fn build_lexicon(name: &Path, lists: &[PathBuf]) -> Result<(PathBuf, usize)> {
    let words = collect_words(lists)?;
    let mut out = String::new();
    for word in &words {
        out.push_str(&format!("{word} {}\n", spelling(word)));
    }
    let mut path = name.as_os_str().to_owned();
    path.push(".lexicon");
    let path = PathBuf::from(path);
    fs::write(&path, out)?;
    Ok((path, words.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn repeated_letters_collapse() {
        assert_eq!(spelling("hello"), "h e l o");
        assert_eq!(spelling("book"), "b o k");
        assert_eq!(spelling("abba"), "a b a");
        assert_eq!(spelling("don't"), "d o n ' t");
    }

    #[test]
    fn quoted_words_are_unquoted() {
        assert_eq!(spelling("'tis'"), "t i s");
        assert_eq!(spelling("'"), "'");
    }

    #[test]
    fn lexicon_is_sorted_and_unique() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.lst");
        let b = dir.path().join("b.lst");
        fs::write(&a, "a-0 /c/a-0.flac 100 the cat\na-1 /c/a-1.flac 200 a cat\n").unwrap();
        fs::write(&b, "b-0 /c/b-0.flac 100 all the   books\n").unwrap();

        let (path, count) = build_lexicon(&dir.path().join("corpus"), &[a, b]).unwrap();
        assert_eq!(path, dir.path().join("corpus.lexicon"));
        assert_eq!(count, 5);
        assert_eq!(
            fs::read_to_string(path).unwrap(),
            "a a\nall a l\nbooks b o k s\ncat c a t\nthe t h e\n"
        );
    }
}
