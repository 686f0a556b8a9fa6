use crate::graph::Fragment;
use crate::utils::{Error, Interval, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::{fmt, str::FromStr};

/// Read counts per sample and genomic position.
pub type SampleProfile = BTreeMap<String, BTreeMap<i64, u64>>;

/// Structural novelty of a transcript relative to the reference annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NoveltyClass {
    /// Full splice match
    Fsm,
    /// Incomplete splice match
    Ism,
    /// Novel in catalog
    Nic,
    /// Novel not in catalog
    Nnc,
    /// Novel gene
    Novel,
}

impl NoveltyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoveltyClass::Fsm => "FSM",
            NoveltyClass::Ism => "ISM",
            NoveltyClass::Nic => "NIC",
            NoveltyClass::Nnc => "NNC",
            NoveltyClass::Novel => "NOVEL",
        }
    }
}

impl FromStr for NoveltyClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "FSM" => Ok(NoveltyClass::Fsm),
            "ISM" => Ok(NoveltyClass::Ism),
            "NIC" => Ok(NoveltyClass::Nic),
            "NNC" => Ok(NoveltyClass::Nnc),
            "NOVEL" => Ok(NoveltyClass::Novel),
            _ => Err(Error::Parse(format!("Invalid novelty class: {}", s))),
        }
    }
}

impl fmt::Display for NoveltyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub class: NoveltyClass,
    pub subcategories: BTreeSet<String>,
}

/// Properties of a predicted open reading frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OrfInfo {
    pub five_utr_len: i64,
    pub cds_len: i64,
    pub three_utr_len: i64,
    pub start_codon: String,
    pub stop_codon: String,
    pub nmd: bool,
    pub upstream_start_codons: usize,
    pub kozak: Option<f64>,
    pub hexamer: Option<f64>,
    pub fickett: Option<f64>,
    /// Reference transcripts whose annotated CDS initiation anchors this ORF.
    pub ref_ids: Vec<usize>,
}

/// ORF in genomic coordinates, `start < end` regardless of strand.
#[derive(Debug, Clone, PartialEq)]
pub struct Orf {
    pub start: i64,
    pub end: i64,
    pub info: OrfInfo,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transcript {
    pub id: String,
    pub exons: Vec<Interval>,
    /// Annotated CDS as two raw genomic endpoints.
    pub cds: Option<(i64, i64)>,
    pub orf: Option<Orf>,
    pub coverage: BTreeMap<String, u64>,
    pub tss: Option<SampleProfile>,
    pub pas: Option<SampleProfile>,
    pub tss_unified: Option<SampleProfile>,
    pub pas_unified: Option<SampleProfile>,
    pub fragments: Option<Vec<Fragment>>,
    pub noncanonical_splicing: Option<Vec<(usize, String)>>,
    pub direct_repeat_len: Option<Vec<usize>>,
    pub downstream_a_content: Option<f64>,
    pub annotation: Option<Annotation>,
}

impl Transcript {
    pub fn new(id: &str, exons: Vec<Interval>) -> Self {
        Transcript {
            id: id.to_string(),
            exons,
            ..Default::default()
        }
    }

    /// Spliced length.
    pub fn length(&self) -> i64 {
        self.exons.iter().map(|e| e.len()).sum()
    }

    pub fn is_monoexon(&self) -> bool {
        self.exons.len() == 1
    }

    pub fn start(&self) -> i64 {
        self.exons.first().map_or(0, |e| e.start)
    }

    pub fn end(&self) -> i64 {
        self.exons.last().map_or(0, |e| e.end)
    }

    /// Introns as `(donor, acceptor)` genomic positions, in genomic order.
    pub fn introns(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.exons.windows(2).map(|w| (w[0].end, w[1].start))
    }

    pub fn total_coverage(&self) -> u64 {
        self.coverage.values().sum()
    }
}

/// 5'UTR, CDS and 3'UTR lengths in genomic orientation (`[left, cds, right]`)
/// of a chain of exons with a CDS given by its genomic bounds.
pub fn coding_len(exons: &[Interval], cds: (i64, i64)) -> [i64; 3] {
    let (cds_start, cds_end) = (cds.0.min(cds.1), cds.0.max(cds.1));
    let mut lengths = [0; 3];
    for exon in exons {
        lengths[0] += (exon.end.min(cds_start) - exon.start).max(0);
        lengths[1] += (exon.end.min(cds_end) - exon.start.max(cds_start)).max(0);
        lengths[2] += (exon.end - exon.start.max(cds_end)).max(0);
    }
    lengths
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exons(coords: &[(i64, i64)]) -> Vec<Interval> {
        coords
            .iter()
            .map(|&(s, e)| Interval::new(s, e).unwrap())
            .collect()
    }

    #[test]
    fn transcript_geometry() {
        let transcript = Transcript::new("t1", exons(&[(100, 200), (300, 350)]));
        assert_eq!(transcript.length(), 150);
        assert_eq!(transcript.start(), 100);
        assert_eq!(transcript.end(), 350);
        assert!(!transcript.is_monoexon());
        assert_eq!(transcript.introns().collect::<Vec<_>>(), vec![(200, 300)]);
    }

    #[test]
    fn coding_len_splits_utrs_and_cds() {
        let chain = exons(&[(100, 200), (300, 400), (500, 600)]);
        assert_eq!(coding_len(&chain, (150, 550)), [50, 200, 50]);
        // CDS within a single exon
        assert_eq!(coding_len(&chain, (320, 380)), [120, 60, 120]);
        // endpoint order does not matter
        assert_eq!(coding_len(&chain, (550, 150)), [50, 200, 50]);
    }

    #[test]
    fn novelty_class_parsing() {
        assert_eq!("NIC".parse::<NoveltyClass>().unwrap(), NoveltyClass::Nic);
        assert!("XYZ".parse::<NoveltyClass>().is_err());
        assert_eq!(NoveltyClass::Fsm.to_string(), "FSM");
    }
}
