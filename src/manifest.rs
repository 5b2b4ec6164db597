//! Manifest ("lst") records.
//!
//! One line per training utterance: `<id> <clip_path> <duration_ms> <text>`.
//! The first three fields never contain spaces; the text is everything after
//! the third space and may contain spaces but never a line break. This is the
//! wire format between every stage, so parsing and formatting live here and
//! nowhere else.

use crate::error::{ManifestError, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// A single manifest record.
///
/// A record parsed from text keeps that text and formats back to it byte for
/// byte, so durations such as `1000.0` survive a pass through the filters.
/// Records built with [`ManifestLine::new`] or rewritten with
/// [`ManifestLine::with_clip_path`] are formatted from their fields.
#[derive(Debug, Clone)]
pub struct ManifestLine {
    pub id: String,
    pub clip_path: PathBuf,
    pub duration_ms: f64,
    pub text: String,
    source: Option<String>,
}

impl PartialEq for ManifestLine {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.clip_path == other.clip_path
            && self.duration_ms == other.duration_ms
            && self.text == other.text
    }
}

impl ManifestLine {
    /// Build a record, enforcing the field rules of the line format.
    pub fn new(
        id: impl Into<String>,
        clip_path: impl Into<PathBuf>,
        duration_ms: f64,
        text: impl Into<String>,
    ) -> std::result::Result<Self, ManifestError> {
        let line = Self {
            id: id.into(),
            clip_path: clip_path.into(),
            duration_ms,
            text: text.into(),
            source: None,
        };
        line.validate()?;
        Ok(line)
    }

    fn validate(&self) -> std::result::Result<(), ManifestError> {
        if self.id.is_empty() {
            return Err(ManifestError::EmptyField { field: "id" });
        }
        if self.id.contains(char::is_whitespace) {
            return Err(ManifestError::SpaceInField { field: "id" });
        }
        let path = self.clip_path.to_string_lossy();
        if path.is_empty() {
            return Err(ManifestError::EmptyField { field: "clip_path" });
        }
        if path.contains(char::is_whitespace) {
            return Err(ManifestError::SpaceInField { field: "clip_path" });
        }
        if !self.duration_ms.is_finite() || self.duration_ms < 0.0 {
            return Err(ManifestError::InvalidDuration {
                value: self.duration_ms.to_string(),
            });
        }
        if self.text.contains(['\n', '\r']) {
            return Err(ManifestError::Newline);
        }
        Ok(())
    }

    /// Duration truncated to whole milliseconds.
    pub fn duration_ms_truncated(&self) -> u64 {
        self.duration_ms.trunc() as u64
    }

    /// Text length in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    /// Word count as the number of space separators plus one (0 for empty text).
    pub fn word_count(&self) -> usize {
        if self.text.is_empty() {
            0
        } else {
            self.text.matches(' ').count() + 1
        }
    }

    /// Returns a copy pointing at a different clip file.
    pub fn with_clip_path(&self, clip_path: impl Into<PathBuf>) -> Self {
        Self {
            clip_path: clip_path.into(),
            source: None,
            ..self.clone()
        }
    }
}

impl FromStr for ManifestLine {
    type Err = ManifestError;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim_end_matches(['\n', '\r']);
        let parts: Vec<&str> = line.splitn(4, ' ').collect();
        if parts.len() < 4 {
            return Err(ManifestError::MissingFields { found: parts.len() });
        }
        let duration_ms: f64 = parts[2]
            .parse()
            .map_err(|_| ManifestError::InvalidDuration {
                value: parts[2].to_string(),
            })?;
        let mut record = Self::new(parts[0], parts[1], duration_ms, parts[3])?;
        record.source = Some(line.to_string());
        Ok(record)
    }
}

impl fmt::Display for ManifestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            return f.write_str(source);
        }
        write!(
            f,
            "{} {} {} {}",
            self.id,
            self.clip_path.display(),
            self.duration_ms,
            self.text
        )
    }
}

/// Round a millisecond value to three decimals.
pub fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Read the non-empty lines of a manifest file, unparsed.
pub fn read_raw_lines(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if !line.trim().is_empty() {
            lines.push(line);
        }
    }
    Ok(lines)
}

/// Parse raw lines, dropping (and logging) the ones that do not fit the format.
pub fn parse_lines<I>(lines: I) -> impl Iterator<Item = ManifestLine>
where
    I: IntoIterator<Item = String>,
{
    lines.into_iter().filter_map(|raw| match raw.parse() {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::debug!(line = %raw, error = %e, "dropping malformed manifest line");
            None
        }
    })
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<Vec<ManifestLine>> {
    Ok(parse_lines(read_raw_lines(path)?).collect())
}

/// Single writer for a manifest file.
///
/// Each record goes out in one `write_all`, so a line is never split even if
/// several writers were (incorrectly) pointed at the same sink.
pub struct ManifestWriter<W: Write> {
    inner: BufWriter<W>,
    written: usize,
}

impl ManifestWriter<File> {
    /// Create (truncate) a manifest file.
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> ManifestWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            written: 0,
        }
    }

    /// Write one record followed by a newline.
    pub fn write_line(&mut self, line: &ManifestLine) -> Result<()> {
        let record = format!("{line}\n");
        self.inner.write_all(record.as_bytes())?;
        self.written += 1;
        Ok(())
    }

    /// Number of records written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the number of records written.
    pub fn finish(mut self) -> Result<usize> {
        self.inner.flush()?;
        Ok(self.written)
    }
}

/// Write a full manifest file.
pub fn write_manifest<'a, I>(path: &Path, lines: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a ManifestLine>,
{
    let mut writer = ManifestWriter::create(path)?;
    for line in lines {
        writer.write_line(line)?;
    }
    writer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn parses_four_fields_with_free_text() {
        let line: ManifestLine = "book-3 /clips/book-3.flac 2500.5 hello there world"
            .parse()
            .unwrap();
        assert_eq!(line.id, "book-3");
        assert_eq!(line.clip_path, PathBuf::from("/clips/book-3.flac"));
        assert_eq!(line.duration_ms, 2500.5);
        assert_eq!(line.text, "hello there world");
    }

    #[test]
    fn format_then_parse_returns_same_record() {
        let original = ManifestLine::new("a-0", "/c/a-0.flac", 1234.567, "it's a test").unwrap();
        let reparsed: ManifestLine = original.to_string().parse().unwrap();
        assert_eq!(reparsed, original);
        assert_eq!(original.to_string(), "a-0 /c/a-0.flac 1234.567 it's a test");
    }

    #[test]
    fn whole_durations_format_without_fraction() {
        let line = ManifestLine::new("a", "/a.flac", 1000.0, "x").unwrap();
        assert_eq!(line.to_string(), "a /a.flac 1000 x");
    }

    #[test]
    fn parsed_lines_format_back_to_their_source() {
        for text in ["a /c/a.flac 1000.0 hello", "b /c/b.flac 2500.50 two  spaces"] {
            let line: ManifestLine = text.parse().unwrap();
            assert_eq!(line.to_string(), text);
        }
        let line: ManifestLine = "a /c/a.flac 1000.0 hello\r".parse().unwrap();
        assert_eq!(line.to_string(), "a /c/a.flac 1000.0 hello");
    }

    #[test]
    fn rewritten_clip_path_formats_from_fields() {
        let line: ManifestLine = "a /c/a.flac 1000.0 hello".parse().unwrap();
        let moved = line.with_clip_path("/cache/ab/cd/abcd.flac");
        assert_eq!(moved.to_string(), "a /cache/ab/cd/abcd.flac 1000 hello");
        assert_eq!(line, ManifestLine::new("a", "/c/a.flac", 1000.0, "hello").unwrap());
    }

    #[test]
    fn too_few_fields_is_distinct_error() {
        let err = "a /a.flac 100".parse::<ManifestLine>().unwrap_err();
        assert_eq!(err, ManifestError::MissingFields { found: 3 });

        let err = "a /a.flac abc text".parse::<ManifestLine>().unwrap_err();
        assert_eq!(
            err,
            ManifestError::InvalidDuration {
                value: "abc".to_string()
            }
        );
    }

    #[test]
    fn empty_text_is_allowed() {
        let line: ManifestLine = "a /a.flac 10 ".parse().unwrap();
        assert_eq!(line.text, "");
        assert_eq!(line.word_count(), 0);
    }

    #[test]
    fn rejects_spaces_in_fixed_fields_and_newlines_in_text() {
        assert_eq!(
            ManifestLine::new("a b", "/a.flac", 1.0, "x").unwrap_err(),
            ManifestError::SpaceInField { field: "id" }
        );
        assert_eq!(
            ManifestLine::new("a", "/my clips/a.flac", 1.0, "x").unwrap_err(),
            ManifestError::SpaceInField { field: "clip_path" }
        );
        assert_eq!(
            ManifestLine::new("a", "/a.flac", 1.0, "x\ny").unwrap_err(),
            ManifestError::Newline
        );
        assert_eq!(
            ManifestLine::new("", "/a.flac", 1.0, "x").unwrap_err(),
            ManifestError::EmptyField { field: "id" }
        );
    }

    #[test]
    fn counts_words_and_chars() {
        let line = ManifestLine::new("a", "/a.flac", 1.0, "héllo big world").unwrap();
        assert_eq!(line.char_count(), 15);
        assert_eq!(line.word_count(), 3);
    }

    #[test]
    fn truncates_duration() {
        let line = ManifestLine::new("a", "/a.flac", 999.999, "x").unwrap();
        assert_eq!(line.duration_ms_truncated(), 999);
    }

    #[test]
    fn round_ms_keeps_three_decimals() {
        assert_eq!(round_ms(1000.0), 1000.0);
        assert_eq!(round_ms(0.1 + 0.2), 0.3);
        assert_eq!(round_ms(12.34567), 12.346);
    }

    #[test]
    fn write_and_read_manifest_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clips.lst");
        let lines = vec![
            ManifestLine::new("a-0", "/c/a-0.flac", 1500.0, "one two").unwrap(),
            ManifestLine::new("a-1", "/c/a-1.flac", 800.25, "three").unwrap(),
        ];

        let written = write_manifest(&path, &lines).unwrap();
        assert_eq!(written, 2);

        let read = read_manifest(&path).unwrap();
        assert_eq!(read, lines);
    }

    #[test]
    fn read_skips_blank_and_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.lst");
        std::fs::write(&path, "a /a.flac 10 x\n\nbroken line\nb /b.flac 20 y\n").unwrap();

        let raw = read_raw_lines(&path).unwrap();
        assert_eq!(raw.len(), 3);

        let parsed = read_manifest(&path).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].id, "b");
    }
}
