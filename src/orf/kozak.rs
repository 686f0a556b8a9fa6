use crate::utils::{open_catalog_reader, Error, Result};
use std::io::BufRead;
use std::path::Path;

/// Position weight matrix (log-odds) around a translation initiation site.
#[derive(Debug, Clone, PartialEq)]
pub struct KozakMatrix {
    /// Position of the first row relative to the first base of the start codon.
    first_pos: i64,
    /// Weights for A, C, G and T at consecutive positions.
    weights: Vec<[f64; 4]>,
}

fn base_index(base: u8) -> Option<usize> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' | b'U' | b'u' => Some(3),
        _ => None,
    }
}

impl KozakMatrix {
    pub fn new(first_pos: i64, weights: Vec<[f64; 4]>) -> Self {
        KozakMatrix { first_pos, weights }
    }

    /// Reads a matrix with one `position<TAB>A<TAB>C<TAB>G<TAB>T` row per
    /// consecutive position, `#` lines are comments.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_catalog_reader(path)?;
        let mut first_pos = None;
        let mut weights = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let error = || {
                Error::Parse(format!(
                    "Error at Kozak matrix line {}: {}",
                    line_number + 1,
                    line
                ))
            };
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 5 {
                return Err(error());
            }
            let pos: i64 = fields[0].trim().parse().map_err(|_| error())?;
            let expected = first_pos.unwrap_or(pos) + weights.len() as i64;
            if pos != expected {
                return Err(error());
            }
            first_pos.get_or_insert(pos);
            let mut row = [0.0; 4];
            for (value, field) in row.iter_mut().zip(&fields[1..]) {
                *value = field.trim().parse().map_err(|_| error())?;
            }
            weights.push(row);
        }
        let first_pos = first_pos.ok_or_else(|| {
            Error::Config(format!("Kozak matrix {} is empty", path.display()))
        })?;
        Ok(KozakMatrix { first_pos, weights })
    }

    /// Sums the weights of the bases around `start`. Positions outside the
    /// sequence and ambiguous bases contribute nothing.
    pub fn score(&self, sequence: &str, start: usize) -> f64 {
        let seq = sequence.as_bytes();
        self.weights
            .iter()
            .enumerate()
            .filter_map(|(row, weights)| {
                let pos = start as i64 + self.first_pos + row as i64;
                let base = *seq.get(usize::try_from(pos).ok()?)?;
                base_index(base).map(|b| weights[b])
            })
            .sum()
    }
}

impl Default for KozakMatrix {
    /// Log2-odds matrix for the `gccRccATGG` consensus, from position -6 to +4.
    fn default() -> Self {
        // base probabilities per position, A C G T
        const PROFILE: [[f64; 4]; 11] = [
            [0.15, 0.15, 0.55, 0.15],
            [0.15, 0.55, 0.15, 0.15],
            [0.15, 0.55, 0.15, 0.15],
            [0.45, 0.10, 0.35, 0.10],
            [0.15, 0.55, 0.15, 0.15],
            [0.15, 0.55, 0.15, 0.15],
            [0.25, 0.25, 0.25, 0.25],
            [0.25, 0.25, 0.25, 0.25],
            [0.25, 0.25, 0.25, 0.25],
            [0.13, 0.13, 0.61, 0.13],
            [0.25, 0.25, 0.25, 0.25],
        ];
        let weights = PROFILE
            .iter()
            .map(|row| row.map(|p| (p / 0.25f64).log2()))
            .collect();
        KozakMatrix {
            first_pos: -6,
            weights,
        }
    }
}
