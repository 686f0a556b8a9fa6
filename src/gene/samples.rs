use super::Transcript;
use crate::utils::{open_catalog_reader, Error, Result};
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct SampleInfo {
    pub name: String,
    pub group: String,
    /// Total (non-chimeric) reads, the TPM normalization factor.
    pub total_reads: u64,
}

/// Read-only sample table shared by all genes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleTable {
    samples: Vec<SampleInfo>,
}

impl SampleTable {
    pub fn new(samples: Vec<SampleInfo>) -> Self {
        SampleTable { samples }
    }

    /// Reads `sample<TAB>group<TAB>total_reads` lines, `#` lines are comments.
    pub fn from_path(path: &Path) -> Result<Self> {
        let reader = open_catalog_reader(path)?;
        let mut samples = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let error = |msg: &str| {
                Error::Parse(format!(
                    "Error at sample table line {}: {}",
                    line_number + 1,
                    msg
                ))
            };
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 3 {
                return Err(error("expected 3 fields"));
            }
            let total_reads: u64 = fields[2]
                .trim()
                .parse()
                .map_err(|_| error("invalid read count"))?;
            if total_reads == 0 {
                return Err(error("total read count must be positive"));
            }
            if samples.iter().any(|s: &SampleInfo| s.name == fields[0]) {
                return Err(error(&format!("duplicate sample {}", fields[0])));
            }
            samples.push(SampleInfo {
                name: fields[0].to_string(),
                group: fields[1].to_string(),
                total_reads,
            });
        }
        if samples.is_empty() {
            return Err(Error::Config(format!(
                "Sample table {} is empty",
                path.display()
            )));
        }
        Ok(SampleTable { samples })
    }

    pub fn samples(&self) -> &[SampleInfo] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_index(&self, name: &str) -> Option<usize> {
        self.samples.iter().position(|s| s.name == name)
    }

    /// Group names in order of first appearance.
    pub fn groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = Vec::new();
        for sample in &self.samples {
            if !groups.contains(&sample.group) {
                groups.push(sample.group.clone());
            }
        }
        groups
    }

    pub fn group_indices(&self, group: &str) -> Vec<usize> {
        self.samples
            .iter()
            .enumerate()
            .filter(|(_, s)| s.group == group)
            .map(|(i, _)| i)
            .collect()
    }

    /// Resolves group names to sample indices, unknown groups are
    /// configuration errors.
    pub fn resolve_groups(&self, groups: &[String]) -> Result<Vec<Vec<usize>>> {
        groups
            .iter()
            .map(|group| {
                let indices = self.group_indices(group);
                if indices.is_empty() {
                    Err(Error::Config(format!(
                        "Unknown sample group '{}', valid groups are: {}",
                        group,
                        self.groups().join(", ")
                    )))
                } else {
                    Ok(indices)
                }
            })
            .collect()
    }
}

pub fn tpm(coverage: u64, total_reads: u64, pseudocount: f64) -> f64 {
    (coverage as f64 + pseudocount) / total_reads as f64 * 1e6
}

/// Samples x transcripts read counts of a gene.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageMatrix {
    counts: Vec<Vec<u64>>,
}

impl CoverageMatrix {
    /// Arranges per-sample transcript coverage along the sample table. Counts
    /// for samples missing from the table are a data inconsistency.
    pub fn new(samples: &SampleTable, transcripts: &[Transcript]) -> Result<Self> {
        let mut counts = vec![vec![0; transcripts.len()]; samples.len()];
        for (transcript_idx, transcript) in transcripts.iter().enumerate() {
            for (sample, &count) in &transcript.coverage {
                let sample_idx = samples.sample_index(sample).ok_or_else(|| {
                    Error::Data(format!(
                        "transcript {} has coverage for sample '{}' missing from the sample table",
                        transcript.id, sample
                    ))
                })?;
                counts[sample_idx][transcript_idx] = count;
            }
        }
        Ok(CoverageMatrix { counts })
    }

    pub fn n_samples(&self) -> usize {
        self.counts.len()
    }

    pub fn n_transcripts(&self) -> usize {
        self.counts.first().map_or(0, |row| row.len())
    }

    pub fn get(&self, sample: usize, transcript: usize) -> u64 {
        self.counts[sample][transcript]
    }

    /// Coverage of a transcript summed over all samples.
    pub fn transcript_total(&self, transcript: usize) -> u64 {
        self.counts.iter().map(|row| row[transcript]).sum()
    }

    /// Total coverage of the gene in each sample.
    pub fn gene_coverage(&self) -> Vec<u64> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// Per-transcript coverage summed over the given samples.
    pub fn sum_samples(&self, samples: &[usize]) -> Vec<u64> {
        (0..self.n_transcripts())
            .map(|t| samples.iter().map(|&s| self.counts[s][t]).sum())
            .collect()
    }

    pub fn tpm(&self, samples: &SampleTable, sample: usize, transcript: usize, pseudocount: f64) -> f64 {
        tpm(
            self.get(sample, transcript),
            samples.samples()[sample].total_reads,
            pseudocount,
        )
    }
}
