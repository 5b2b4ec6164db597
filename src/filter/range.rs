//! Inclusive `MIN-MAX` ranges used by the length filters.

use std::fmt;
use std::str::FromStr;

/// Inclusive integer range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub min: u64,
    pub max: u64,
}

impl Range {
    /// A range that admits everything.
    pub const ALL: Range = Range {
        min: 0,
        max: u64::MAX,
    };

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: u64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

impl FromStr for Range {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Range::ALL);
        }
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| format!("range '{s}' must look like MIN-MAX"))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|e| format!("range '{s}': '{part}' is not a count: {e}"))
        };
        let (min, max) = (parse(min)?, parse(max)?);
        if min > max {
            return Err(format!("range '{s}' is empty (MIN > MAX)"));
        }
        Ok(Range { min, max })
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_inclusive_range() {
        let r: Range = "1000-5000".parse().unwrap();
        assert_eq!(r, Range::new(1000, 5000));
        assert!(r.contains(1000));
        assert!(r.contains(2500));
        assert!(r.contains(5000));
        assert!(!r.contains(500));
        assert!(!r.contains(5001));
    }

    #[test]
    fn empty_description_admits_everything() {
        let r: Range = "".parse().unwrap();
        assert_eq!(r, Range::ALL);
        assert!(r.contains(0));
        assert!(r.contains(u64::MAX));
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!("1000".parse::<Range>().is_err());
        assert!("a-b".parse::<Range>().is_err());
        assert!("-5-10".parse::<Range>().is_err());
        assert!("10-5".parse::<Range>().is_err());
    }

    #[test]
    fn single_value_range() {
        let r: Range = "7-7".parse().unwrap();
        assert!(r.contains(7));
        assert!(!r.contains(6));
        assert_eq!(r.to_string(), "7-7");
    }
}
