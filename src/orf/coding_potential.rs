//! Composition based coding potential statistics of an ORF sequence.

use crate::utils::{open_catalog_reader, Error, Result};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

/// Hexamer frequencies of coding and noncoding (background) sequences.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HexamerTable {
    coding: HashMap<String, f64>,
    noncoding: HashMap<String, f64>,
}

impl HexamerTable {
    pub fn new(coding: HashMap<String, f64>, noncoding: HashMap<String, f64>) -> Self {
        HexamerTable { coding, noncoding }
    }

    /// Reads `hexamer<TAB>coding<TAB>noncoding` rows. A header line starting
    /// with `hexamer` and `#` lines are skipped.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_catalog_reader(path)?;
        let mut table = HexamerTable::default();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') || line.starts_with("hexamer") {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let parsed = match fields.as_slice() {
                [word, coding, noncoding] => coding
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .zip(noncoding.trim().parse::<f64>().ok())
                    .map(|freqs| (word.to_uppercase(), freqs)),
                _ => None,
            };
            let (word, (coding, noncoding)) = parsed.ok_or_else(|| {
                Error::Parse(format!(
                    "Error at hexamer table line {}: {}",
                    line_number + 1,
                    line
                ))
            })?;
            table.coding.insert(word.clone(), coding);
            table.noncoding.insert(word, noncoding);
        }
        Ok(table)
    }

    /// Mean log ratio of coding vs noncoding frequency over the in-frame
    /// hexamers of `seq`. Words absent from either table are skipped. Returns
    /// `0` for sequences shorter than a word and `-1` when no word counts.
    pub fn kmer_ratio(&self, seq: &str, word_size: usize, step: usize) -> f64 {
        if seq.len() < word_size || step == 0 {
            return 0.0;
        }
        let mut log_ratio_sum = 0.0;
        let mut n_words = 0;
        for start in (0..=seq.len() - word_size).step_by(step) {
            let word = &seq[start..start + word_size];
            let (Some(&coding), Some(&noncoding)) = (self.coding.get(word), self.noncoding.get(word)) else {
                continue;
            };
            log_ratio_sum += match (coding > 0.0, noncoding > 0.0) {
                (true, true) => (coding / noncoding).ln(),
                (true, false) => 1.0,
                (false, true) => -1.0,
                (false, false) => continue,
            };
            n_words += 1;
        }
        if n_words == 0 {
            -1.0
        } else {
            log_ratio_sum / n_words as f64
        }
    }

    pub fn hexamer_score(&self, seq: &str) -> f64 {
        self.kmer_ratio(seq, 6, 3)
    }
}

// Fickett TESTCODE lookup tables, rows A C G T.
const POSITION_PROB: [[f64; 10]; 4] = [
    [0.94, 0.68, 0.84, 0.93, 0.58, 0.68, 0.45, 0.34, 0.20, 0.22],
    [0.80, 0.70, 0.70, 0.81, 0.66, 0.48, 0.51, 0.33, 0.30, 0.23],
    [0.90, 0.88, 0.74, 0.64, 0.53, 0.48, 0.27, 0.16, 0.08, 0.08],
    [0.97, 0.97, 0.91, 0.68, 0.69, 0.44, 0.54, 0.20, 0.09, 0.09],
];
const POSITION_WEIGHT: [f64; 4] = [0.26, 0.18, 0.31, 0.33];
const POSITION_PARA: [f64; 10] = [1.9, 1.8, 1.7, 1.6, 1.5, 1.4, 1.3, 1.2, 1.1, 0.0];

const CONTENT_PROB: [[f64; 10]; 4] = [
    [0.28, 0.49, 0.44, 0.55, 0.62, 0.49, 0.67, 0.65, 0.81, 0.21],
    [0.82, 0.64, 0.51, 0.64, 0.59, 0.59, 0.43, 0.44, 0.39, 0.31],
    [0.40, 0.54, 0.47, 0.64, 0.64, 0.73, 0.41, 0.41, 0.33, 0.29],
    [0.28, 0.24, 0.39, 0.40, 0.55, 0.75, 0.56, 0.69, 0.51, 0.58],
];
const CONTENT_WEIGHT: [f64; 4] = [0.11, 0.12, 0.15, 0.14];
const CONTENT_PARA: [f64; 9] = [0.33, 0.31, 0.29, 0.27, 0.25, 0.23, 0.21, 0.17, 0.0];

fn lookup(value: f64, para: &[f64], prob: &[f64; 10], weight: f64) -> f64 {
    if value < 0.0 {
        return 0.0;
    }
    para.iter()
        .position(|&threshold| value >= threshold)
        .map_or(0.0, |idx| prob[idx] * weight)
}

/// Fickett TESTCODE score from base composition and the periodicity of each
/// base over the three codon positions.
pub fn fickett_score(seq: &str) -> f64 {
    let seq = seq.to_uppercase();
    let bytes = seq.as_bytes();
    if bytes.len() < 2 {
        return 0.0;
    }
    let mut score = 0.0;
    for (b, base) in [b'A', b'C', b'G', b'T'].into_iter().enumerate() {
        let mut phase_counts = [0usize; 3];
        for (i, &x) in bytes.iter().enumerate() {
            if x == base {
                phase_counts[i % 3] += 1;
            }
        }
        let total: usize = phase_counts.iter().sum();
        let content = total as f64 / bytes.len() as f64;
        let max = phase_counts.iter().max().copied().unwrap_or(0) as f64;
        let min = phase_counts.iter().min().copied().unwrap_or(0) as f64;
        let position = max / (min + 1.0);
        score += lookup(content, &CONTENT_PARA, &CONTENT_PROB[b], CONTENT_WEIGHT[b]);
        score += lookup(position, &POSITION_PARA, &POSITION_PROB[b], POSITION_WEIGHT[b]);
    }
    score
}
