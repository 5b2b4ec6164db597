//! Training "flagsfile": one `--key=value` per line.
//!
//! Keys keep their file order. Lines without `=` carry no setting and are
//! dropped on rewrite.

use crate::error::Result;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

pub const DATADIR: &str = "--datadir";
pub const TRAIN: &str = "--train";
pub const TEST: &str = "--test";
pub const VALID: &str = "--valid";

/// Ordered key/value settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flagsfile {
    entries: Vec<(String, String)>,
}

impl Flagsfile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(text.parse().unwrap_or_default())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_string())?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replace `key` in place, or append it.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
    }

    /// Comma-separated list value, empty items removed.
    pub fn list(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|v| {
                v.split(',')
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl FromStr for Flagsfile {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut flags = Flagsfile::default();
        for line in s.lines() {
            if let Some((key, value)) = line.trim().split_once('=') {
                flags.set(key, value);
            }
        }
        Ok(flags)
    }
}

impl fmt::Display for Flagsfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            writeln!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
