//! Per-transcript report columns.

use super::{Gene, SampleTable};
use crate::utils::Result;
use itertools::Itertools;
use std::{fmt, str::FromStr};

const NA: &str = "NA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportField {
    Length,
    NExons,
    ExonStarts,
    ExonEnds,
    /// Novelty class and subcategories, two columns.
    Annotation,
    /// One column per sample.
    Coverage,
    Tpm,
    /// One column per group.
    GroupCoverageSum,
    GroupTpmMean,
    Fragments,
    NoncanonicalSplicing,
    DirectRepeatLen,
    DownstreamAContent,
    Orf,
    Cds,
    /// Keys without extractor, reported as `NA`.
    Unknown(String),
}

impl FromStr for ReportField {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "length" => ReportField::Length,
            "n_exons" => ReportField::NExons,
            "exon_starts" => ReportField::ExonStarts,
            "exon_ends" => ReportField::ExonEnds,
            "annotation" => ReportField::Annotation,
            "coverage" => ReportField::Coverage,
            "tpm" => ReportField::Tpm,
            "group_coverage_sum" => ReportField::GroupCoverageSum,
            "group_tpm_mean" => ReportField::GroupTpmMean,
            "fragments" => ReportField::Fragments,
            "noncanonical_splicing" => ReportField::NoncanonicalSplicing,
            "direct_repeat_len" => ReportField::DirectRepeatLen,
            "downstream_A_content" => ReportField::DownstreamAContent,
            "ORF" => ReportField::Orf,
            "CDS" => ReportField::Cds,
            other => ReportField::Unknown(other.to_string()),
        })
    }
}

impl fmt::Display for ReportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = match self {
            ReportField::Length => "length",
            ReportField::NExons => "n_exons",
            ReportField::ExonStarts => "exon_starts",
            ReportField::ExonEnds => "exon_ends",
            ReportField::Annotation => "annotation",
            ReportField::Coverage => "coverage",
            ReportField::Tpm => "tpm",
            ReportField::GroupCoverageSum => "group_coverage_sum",
            ReportField::GroupTpmMean => "group_tpm_mean",
            ReportField::Fragments => "fragments",
            ReportField::NoncanonicalSplicing => "noncanonical_splicing",
            ReportField::DirectRepeatLen => "direct_repeat_len",
            ReportField::DownstreamAContent => "downstream_A_content",
            ReportField::Orf => "ORF",
            ReportField::Cds => "CDS",
            ReportField::Unknown(key) => key,
        };
        write!(f, "{}", key)
    }
}

fn or_na<T>(value: Option<T>, f: impl FnOnce(T) -> String) -> String {
    value.map_or_else(|| NA.to_string(), f)
}

impl ReportField {
    pub fn parse_list(keys: &str) -> Vec<ReportField> {
        keys.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .filter_map(|key| key.parse().ok())
            .collect()
    }

    pub fn headers(&self, samples: &SampleTable) -> Vec<String> {
        match self {
            ReportField::Annotation => vec!["novelty_class".to_string(), "subcategories".to_string()],
            ReportField::Coverage | ReportField::Tpm => samples
                .samples()
                .iter()
                .map(|s| format!("{}_{}", s.name, self))
                .collect(),
            ReportField::GroupCoverageSum => samples.groups().iter().map(|g| format!("{}_coverage_sum", g)).collect(),
            ReportField::GroupTpmMean => samples.groups().iter().map(|g| format!("{}_tpm_mean", g)).collect(),
            _ => vec![self.to_string()],
        }
    }

    /// Column values for a long-read transcript of `gene`.
    pub fn values(&self, gene: &Gene, transcript: usize, pseudocount: f64) -> Result<Vec<String>> {
        let t = gene.transcript(transcript, false)?;
        let samples = gene.samples();
        let value = match self {
            ReportField::Length => t.length().to_string(),
            ReportField::NExons => t.exons.len().to_string(),
            ReportField::ExonStarts => t.exons.iter().map(|e| e.start).join(","),
            ReportField::ExonEnds => t.exons.iter().map(|e| e.end).join(","),
            ReportField::Annotation => {
                return Ok(match &t.annotation {
                    Some(annotation) => vec![
                        annotation.class.to_string(),
                        annotation.subcategories.iter().join(","),
                    ],
                    None => vec![NA.to_string(); 2],
                })
            }
            ReportField::Coverage => {
                let coverage = gene.coverage()?;
                return Ok((0..samples.len())
                    .map(|s| coverage.get(s, transcript).to_string())
                    .collect());
            }
            ReportField::Tpm => {
                return (0..samples.len())
                    .map(|s| Ok(format!("{:.3}", gene.tpm(s, transcript, pseudocount)?)))
                    .collect()
            }
            ReportField::GroupCoverageSum => {
                let coverage = gene.coverage()?;
                return Ok(samples
                    .groups()
                    .iter()
                    .map(|g| {
                        samples
                            .group_indices(g)
                            .iter()
                            .map(|&s| coverage.get(s, transcript))
                            .sum::<u64>()
                            .to_string()
                    })
                    .collect());
            }
            ReportField::GroupTpmMean => {
                let mut means = Vec::new();
                for group in samples.groups() {
                    let indices = samples.group_indices(&group);
                    let mut sum = 0.0;
                    for &s in &indices {
                        sum += gene.tpm(s, transcript, pseudocount)?;
                    }
                    means.push(format!("{:.3}", sum / indices.len() as f64));
                }
                return Ok(means);
            }
            ReportField::Fragments => or_na(t.fragments.as_ref(), |fragments| {
                fragments
                    .iter()
                    .map(|f| format!("{}:{}:{}", f.container, f.five_prime_exons, f.three_prime_exons))
                    .join(",")
            }),
            ReportField::NoncanonicalSplicing => or_na(t.noncanonical_splicing.as_ref(), |introns| {
                introns.iter().map(|(i, seq)| format!("{}:{}", i, seq)).join(",")
            }),
            ReportField::DirectRepeatLen => or_na(t.direct_repeat_len.as_ref(), |lengths| lengths.iter().join(",")),
            ReportField::DownstreamAContent => or_na(t.downstream_a_content, |a| format!("{:.3}", a)),
            ReportField::Orf => or_na(t.orf.as_ref(), |orf| format!("{}-{}", orf.start, orf.end)),
            ReportField::Cds => or_na(t.cds, |(a, b)| format!("{}-{}", a.min(b), a.max(b))),
            ReportField::Unknown(_) => NA.to_string(),
        };
        Ok(vec![value])
    }
}
