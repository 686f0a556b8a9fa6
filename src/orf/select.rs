use super::{find_orfs, fickett_score, HexamerTable, KozakMatrix, OrfCandidate};
use crate::gene::{transcript_to_genome, Orf, OrfInfo, OffsetSide};
use crate::utils::{Error, Interval, Result, Strand};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Minimal distance of the stop codon to the last exon-exon junction for NMD.
pub const NMD_JUNCTION_DIST: i64 = 55;

#[derive(Debug, Clone)]
pub struct OrfParams {
    pub start_codons: Vec<String>,
    pub stop_codons: Vec<String>,
    pub min_len: usize,
    pub min_kozak: Option<f64>,
    /// Longest 5'UTR of an unanchored ORF. `None` disables the limit, while
    /// `Some(0)` only admits ORFs starting at the first transcript base.
    pub max_5utr_len: Option<usize>,
    pub prefer_annotated_init: bool,
    pub kozak_matrix: Option<Arc<KozakMatrix>>,
    pub hexamers: Option<Arc<HexamerTable>>,
    pub get_fickett: bool,
}

impl Default for OrfParams {
    fn default() -> Self {
        OrfParams {
            start_codons: vec!["ATG".to_string()],
            stop_codons: vec!["TAA".to_string(), "TAG".to_string(), "TGA".to_string()],
            min_len: 300,
            min_kozak: None,
            max_5utr_len: None,
            prefer_annotated_init: true,
            kozak_matrix: Some(Arc::new(KozakMatrix::default())),
            hexamers: None,
            get_fickett: true,
        }
    }
}

impl OrfParams {
    pub fn validate(&self) -> Result<()> {
        if self.min_kozak.is_some() && self.kozak_matrix.is_none() {
            return Err(Error::Config(
                "min_kozak requires a Kozak matrix".to_string(),
            ));
        }
        if self.start_codons.is_empty() || self.stop_codons.is_empty() {
            return Err(Error::Config(
                "start and stop codons must not be empty".to_string(),
            ));
        }
        if let Some(codon) = self
            .start_codons
            .iter()
            .chain(&self.stop_codons)
            .find(|c| c.len() != 3)
        {
            return Err(Error::Config(format!("Invalid codon '{}'", codon)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedOrf {
    pub orf: OrfCandidate,
    /// Kozak score computed during selection, if any.
    pub kozak: Option<f64>,
}

/// Picks one ORF of `sequence`.
///
/// With `prefer_annotated_init` the longest ORF opened by an annotated
/// initiation site wins and no further filters apply. Otherwise ORFs longer
/// than `min_len` with a 5'UTR of at most `max_5utr_len` qualify and the first
/// one (by start) is taken; with `min_kozak` it is the first one whose Kozak
/// score exceeds the threshold.
pub fn select_orf(
    sequence: &str,
    anchors: &BTreeMap<usize, Vec<usize>>,
    params: &OrfParams,
) -> Option<SelectedOrf> {
    let no_anchors = BTreeMap::new();
    let anchors = if params.prefer_annotated_init {
        anchors
    } else {
        &no_anchors
    };
    let orfs = find_orfs(sequence, &params.start_codons, &params.stop_codons, anchors);

    if let Some(anchored) = orfs
        .iter()
        .filter(|orf| orf.is_anchored())
        .max_by_key(|orf| (orf.coding_len(), std::cmp::Reverse(orf.start)))
    {
        return Some(SelectedOrf {
            orf: anchored.clone(),
            kozak: None,
        });
    }

    let mut candidates = orfs.into_iter().filter(|orf| {
        orf.coding_len() > params.min_len
            && params.max_5utr_len.map_or(true, |max_len| orf.start <= max_len)
    });
    match (params.min_kozak, params.kozak_matrix.as_deref()) {
        (Some(min_kozak), Some(matrix)) => candidates.find_map(|orf| {
            let kozak = matrix.score(sequence, orf.start);
            (kozak > min_kozak).then_some(SelectedOrf {
                orf,
                kozak: Some(kozak),
            })
        }),
        _ => candidates.next().map(|orf| SelectedOrf { orf, kozak: None }),
    }
}

/// Genomic position of the selected ORF, UTR lengths, NMD flag and scores.
pub fn build_orf(
    exons: &[Interval],
    strand: Strand,
    sequence: &str,
    selected: &SelectedOrf,
    params: &OrfParams,
) -> Result<Orf> {
    let orf = &selected.orf;
    let length: i64 = exons.iter().map(|e| e.len()).sum();
    let (start, stop) = (orf.start as i64, orf.stop as i64);
    let out_of_range = || {
        Error::Data(format!(
            "ORF {}-{} outside of transcript with exons {:?}",
            start, stop, exons
        ))
    };
    let start_pos = transcript_to_genome(exons, strand, start, OffsetSide::Start).ok_or_else(out_of_range)?;
    let stop_pos = transcript_to_genome(exons, strand, stop, OffsetSide::End).ok_or_else(out_of_range)?;

    // exon-exon junctions in forward orientation are at the cumulative exon lengths
    let cumulative: Vec<i64> = exons
        .iter()
        .scan(0, |acc, e| {
            *acc += e.len();
            Some(*acc)
        })
        .collect();
    let n_exons = cumulative.len();
    let junction_dist = match strand {
        Strand::Forward => {
            let stop_exon = cumulative.partition_point(|&c| c < stop);
            if stop_exon + 1 < n_exons {
                cumulative[n_exons - 2] - stop
            } else {
                0
            }
        }
        Strand::Reverse => {
            let fwd_start = length - stop;
            let start_exon = cumulative.partition_point(|&c| c <= fwd_start);
            if start_exon > 0 {
                fwd_start - cumulative[0]
            } else {
                0
            }
        }
    };

    let coding_seq = &sequence[orf.start..orf.stop];
    let kozak = params
        .kozak_matrix
        .as_ref()
        .map(|matrix| selected.kozak.unwrap_or_else(|| matrix.score(sequence, orf.start)));

    Ok(Orf {
        start: start_pos.min(stop_pos),
        end: start_pos.max(stop_pos),
        info: OrfInfo {
            five_utr_len: start,
            cds_len: stop - start,
            three_utr_len: length - stop,
            start_codon: orf.start_codon.clone(),
            stop_codon: orf.stop_codon.clone(),
            nmd: junction_dist > NMD_JUNCTION_DIST,
            upstream_start_codons: orf.upstream_start_codons,
            kozak,
            hexamer: params.hexamers.as_ref().map(|table| table.hexamer_score(coding_seq)),
            fickett: params.get_fickett.then(|| fickett_score(coding_seq)),
            ref_ids: orf.ref_ids.clone(),
        },
    })
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

    fn params(min_len: usize) -> OrfParams {
        OrfParams {
            min_len,
            ..Default::default()
        }
    }

    // two ORFs: weak context at 3 (9 bases), strong context at 21 (12 bases)
    const SEQ: &str = "TTTATGAAATAATTTGCCACCATGGCCAAATGAGG";

    #[test]
    fn first_valid_orf_without_kozak_threshold() {
        let selected = select_orf(SEQ, &BTreeMap::new(), &params(5)).unwrap();
        assert_eq!(selected.orf.start, 3);
        // the length filter is strict
        let selected = select_orf(SEQ, &BTreeMap::new(), &params(9)).unwrap();
        assert_eq!(selected.orf.start, 21);
        assert!(select_orf(SEQ, &BTreeMap::new(), &params(12)).is_none());
    }

    #[test]
    fn kozak_threshold_picks_first_qualifying_orf() {
        let params = OrfParams {
            min_kozak: Some(0.0),
            ..params(5)
        };
        let selected = select_orf(SEQ, &BTreeMap::new(), &params).unwrap();
        assert_eq!(selected.orf.start, 21);
        assert!(selected.kozak.unwrap() > 0.0);

        let strict = OrfParams {
            min_kozak: Some(100.0),
            ..params
        };
        assert!(select_orf(SEQ, &BTreeMap::new(), &strict).is_none());
    }

    #[test]
    fn five_utr_limit() {
        let params = OrfParams {
            max_5utr_len: Some(2),
            ..params(5)
        };
        assert!(select_orf(SEQ, &BTreeMap::new(), &params).is_none());

        let params = OrfParams {
            max_5utr_len: Some(3),
            ..params
        };
        assert_eq!(select_orf(SEQ, &BTreeMap::new(), &params).unwrap().orf.start, 3);
    }

    #[test]
    fn five_utr_is_unlimited_by_default() {
        assert_eq!(OrfParams::default().max_5utr_len, None);
        let selected = select_orf(SEQ, &BTreeMap::new(), &params(9)).unwrap();
        assert_eq!(selected.orf.start, 21);

        let params = OrfParams {
            max_5utr_len: Some(0),
            ..params(9)
        };
        assert!(select_orf(SEQ, &BTreeMap::new(), &params).is_none());
    }

    #[test]
    fn anchored_orf_waives_filters() {
        let anchors = BTreeMap::from([(21, vec![0])]);
        let selected = select_orf(SEQ, &anchors, &params(1000)).unwrap();
        assert_eq!(selected.orf.start, 21);
        assert_eq!(selected.orf.ref_ids, vec![0]);

        let ignore_anchors = OrfParams {
            prefer_annotated_init: false,
            ..params(1000)
        };
        assert!(select_orf(SEQ, &anchors, &ignore_anchors).is_none());
    }

    #[test]
    fn min_kozak_without_matrix_is_config_error() {
        let params = OrfParams {
            min_kozak: Some(1.0),
            kozak_matrix: None,
            ..Default::default()
        };
        assert!(matches!(params.validate(), Err(Error::Config(_))));
        assert!(OrfParams::default().validate().is_ok());
    }

    #[test]
    fn genomic_coordinates_and_lengths() {
        // 35 bases over two exons, junction after transcript base 10
        let chain = exons(&[(1000, 1010), (2000, 2025)]);
        let selected = select_orf(SEQ, &BTreeMap::new(), &params(9)).unwrap();
        let orf = build_orf(&chain, Strand::Forward, SEQ, &selected, &params(9)).unwrap();
        assert_eq!((orf.start, orf.end), (2011, 2023));
        assert_eq!(orf.info.five_utr_len, 21);
        assert_eq!(orf.info.cds_len, 12);
        assert_eq!(orf.info.three_utr_len, 2);
        assert_eq!(orf.info.start_codon, "ATG");
        assert_eq!(orf.info.stop_codon, "TGA");
        assert!(!orf.info.nmd);
        assert!(orf.info.kozak.is_some());
        assert!(orf.info.fickett.is_some());
        assert!(orf.info.hexamer.is_none());
    }

    #[test]
    fn reverse_strand_orf_maps_to_genomic_interval() {
        let chain = exons(&[(1000, 1025), (2000, 2010)]);
        let selected = select_orf(SEQ, &BTreeMap::new(), &params(9)).unwrap();
        let orf = build_orf(&chain, Strand::Reverse, SEQ, &selected, &params(9)).unwrap();
        // transcript 21..33 is forward offsets 2..14
        assert_eq!((orf.start, orf.end), (1002, 1014));
    }

    #[test]
    fn stop_far_upstream_of_last_junction_triggers_nmd() {
        let chain = exons(&[(0, 100), (200, 300)]);
        let mut seq = "A".repeat(200);
        seq.replace_range(10..22, "ATGGCCAAATGA");
        let selected = select_orf(&seq, &BTreeMap::new(), &params(5)).unwrap();
        let orf = build_orf(&chain, Strand::Forward, &seq, &selected, &params(5)).unwrap();
        assert!(orf.info.nmd);

        // the same ORF close to the junction
        let mut seq = "A".repeat(200);
        seq.replace_range(60..72, "ATGGCCAAATGA");
        let selected = select_orf(&seq, &BTreeMap::new(), &params(5)).unwrap();
        let orf = build_orf(&chain, Strand::Forward, &seq, &selected, &params(5)).unwrap();
        assert!(!orf.info.nmd);

        // on the reverse strand the last junction is at the genomic first exon end
        let selected = select_orf(&seq, &BTreeMap::new(), &params(5)).unwrap();
        let orf = build_orf(&exons(&[(0, 100), (200, 300)]), Strand::Reverse, &seq, &selected, &params(5)).unwrap();
        assert!(!orf.info.nmd);
        let mut seq = "A".repeat(200);
        seq.replace_range(10..22, "ATGGCCAAATGA");
        let selected = select_orf(&seq, &BTreeMap::new(), &params(5)).unwrap();
        let orf = build_orf(&chain, Strand::Reverse, &seq, &selected, &params(5)).unwrap();
        assert!(orf.info.nmd);
    }
}
