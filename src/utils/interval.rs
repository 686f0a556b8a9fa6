use crate::utils::{Error, Result};
use std::{fmt, str::FromStr};

/// Half-open genomic interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    pub start: i64,
    pub end: i64,
}

impl Interval {
    pub fn new(start: i64, end: i64) -> Result<Self> {
        if start >= end {
            return Err(Error::Parse(format!(
                "Invalid interval: start {} >= end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `start-end`.
    pub fn from_string(encoding: &str) -> Result<Self> {
        let error_msg = || Error::Parse(format!("Invalid interval encoding: {}", encoding));
        let (start, end) = encoding.split_once('-').ok_or_else(error_msg)?;
        let start: i64 = start.parse().map_err(|_| error_msg())?;
        let end: i64 = end.parse().map_err(|_| error_msg())?;
        Self::new(start, end)
    }

    pub fn len(&self) -> i64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Boundary-inclusive containment, i.e. `start <= pos <= end`.
    pub fn touches(&self, pos: i64) -> bool {
        pos >= self.start && pos <= self.end
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Consecutive pairs of a slice, e.g. the exon pairs flanking each intron.
pub fn pairwise<T>(items: &[T]) -> impl Iterator<Item = (&T, &T)> {
    items.windows(2).map(|w| (&w[0], &w[1]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub fn is_reverse(self) -> bool {
        self == Strand::Reverse
    }

    /// `1` for the forward strand, `-1` for the reverse strand.
    pub fn sign(self) -> i64 {
        match self {
            Strand::Forward => 1,
            Strand::Reverse => -1,
        }
    }
}

impl FromStr for Strand {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(Strand::Forward),
            "-" => Ok(Strand::Reverse),
            _ => Err(Error::Parse(format!("Invalid strand: '{}'", s))),
        }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strand::Forward => write!(f, "+"),
            Strand::Reverse => write!(f, "-"),
        }
    }
}
