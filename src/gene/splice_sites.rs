//! Sequence-level checks on splice sites and transcript ends.

use crate::utils::{pairwise, GenomeProvider, Interval, Result, Strand};
use bio::alphabets::dna::revcomp;
use std::collections::HashMap;

pub const CANONICAL_SPLICE_SITE: &str = "GTAG";

fn reverse_complement(seq: &str) -> String {
    String::from_utf8_lossy(&revcomp(seq.as_bytes())).into_owned()
}

/// Donor and acceptor dinucleotides of an intron in transcription
/// orientation, e.g. `GTAG`.
pub fn splice_site_seq(
    genome: &dyn GenomeProvider,
    chrom: &str,
    strand: Strand,
    donor: i64,
    acceptor: i64,
) -> Result<String> {
    let seq = genome.fetch(chrom, donor, donor + 2)? + &genome.fetch(chrom, acceptor - 2, acceptor)?;
    Ok(match strand {
        Strand::Forward => seq,
        Strand::Reverse => reverse_complement(&seq),
    })
}

/// Introns (genomic order index) whose splice sites are not `GTAG`.
pub fn noncanonical_splicing(
    genome: &dyn GenomeProvider,
    chrom: &str,
    strand: Strand,
    exons: &[Interval],
) -> Result<Vec<(usize, String)>> {
    let mut noncanonical = Vec::new();
    for (intron, (e1, e2)) in pairwise(exons).enumerate() {
        let seq = splice_site_seq(genome, chrom, strand, e1.end, e2.start)?;
        if seq != CANONICAL_SPLICE_SITE {
            noncanonical.push((intron, seq));
        }
    }
    Ok(noncanonical)
}

/// Length of the match run before the `max_mm + 1`-th mismatch, for each
/// number of tolerated mismatches.
fn find_runlength(align: impl Iterator<Item = bool>, max_mm: usize) -> Vec<usize> {
    let mut score = vec![0; max_mm + 1];
    let mut mm = 0;
    for is_match in align {
        if is_match {
            score[mm] += 1;
        } else {
            mm += 1;
            if mm > max_mm {
                return score;
            }
            score[mm] = score[mm - 1];
        }
    }
    for i in mm + 1..=max_mm {
        score[i] = score[i - 1];
    }
    score
}

/// Direct repeat length between the windows around donor and acceptor.
///
/// The windows are aligned at every offset up to `wobble`, and the mismatch
/// budget is split between the runs left and right of the window center.
pub fn repeat_len(seq1: &[u8], seq2: &[u8], wobble: usize, max_mm: usize) -> usize {
    if seq1.len() < 2 * wobble || seq2.len() < 2 * wobble {
        return 0;
    }
    let center = (seq1.len() / 2).saturating_sub(wobble);
    let s2 = &seq2[wobble..seq2.len() - wobble];
    (0..=2 * wobble)
        .map(|w| {
            let s1 = &seq1[w..seq1.len() - (2 * wobble - w)];
            let align: Vec<bool> = s1.iter().zip(s2).map(|(a, b)| a == b).collect();
            let split = center.min(align.len());
            let left = find_runlength(align[..split].iter().rev().copied(), max_mm);
            let right = find_runlength(align[split..].iter().copied(), max_mm);
            (0..=max_mm)
                .map(|left_mm| left[left_mm] + right[max_mm - left_mm])
                .max()
                .unwrap_or(0)
        })
        .max()
        .unwrap_or(0)
}

/// Parameters of the direct repeat search at splice junctions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeatParams {
    pub delta: i64,
    pub max_mm: usize,
    pub wobble: usize,
}

impl Default for RepeatParams {
    fn default() -> Self {
        RepeatParams {
            delta: 15,
            max_mm: 2,
            wobble: 2,
        }
    }
}

/// Computes direct repeat lengths, capped at `delta`, for every intron.
/// Windows and scores are cached across calls sharing `cache`.
pub fn direct_repeat_len(
    genome: &dyn GenomeProvider,
    chrom: &str,
    exons: &[Interval],
    params: &RepeatParams,
    cache: &mut HashMap<(i64, i64), usize>,
) -> Result<Vec<usize>> {
    let mut lengths = Vec::with_capacity(exons.len().saturating_sub(1));
    for (e1, e2) in pairwise(exons) {
        let intron = (e1.end, e2.start);
        let score = match cache.get(&intron) {
            Some(&score) => score,
            None => {
                let donor_seq = genome.fetch(chrom, intron.0 - params.delta, intron.0 + params.delta)?;
                let acceptor_seq = genome.fetch(chrom, intron.1 - params.delta, intron.1 + params.delta)?;
                let score = repeat_len(
                    donor_seq.as_bytes(),
                    acceptor_seq.as_bytes(),
                    params.wobble,
                    params.max_mm,
                );
                cache.insert(intron, score);
                score
            }
        };
        lengths.push(score.min(params.delta.max(0) as usize));
    }
    Ok(lengths)
}

/// Fraction of genomic A (T on the reverse strand) in the `length` bases
/// downstream of the transcript end.
pub fn downstream_a_content(
    genome: &dyn GenomeProvider,
    chrom: &str,
    strand: Strand,
    exons: &[Interval],
    length: i64,
) -> Result<f64> {
    let (Some(first), Some(last)) = (exons.first(), exons.last()) else {
        return Ok(0.0);
    };
    if length <= 0 {
        return Ok(0.0);
    }
    let (start, base) = match strand {
        Strand::Forward => (last.end, b'A'),
        Strand::Reverse => (first.start - length, b'T'),
    };
    let seq = genome.fetch(chrom, start, start + length)?;
    let count = seq.bytes().filter(|&b| b == base).count();
    Ok(count as f64 / length as f64)
}

/// Spliced sequence in transcription orientation.
pub fn spliced_sequence(
    genome: &dyn GenomeProvider,
    chrom: &str,
    strand: Strand,
    exons: &[Interval],
) -> Result<String> {
    let mut seq = String::with_capacity(exons.iter().map(|e| e.len() as usize).sum());
    for exon in exons {
        seq.push_str(&genome.fetch(chrom, exon.start, exon.end)?);
    }
    Ok(match strand {
        Strand::Forward => seq,
        Strand::Reverse => reverse_complement(&seq),
    })
}

// Standard genetic code, codons ordered TCAG at each position.
const GENETIC_CODE: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

fn codon_index(codon: &[u8]) -> Option<usize> {
    codon.iter().try_fold(0, |acc, base| {
        let value = match base {
            b'T' | b'U' => 0,
            b'C' => 1,
            b'A' => 2,
            b'G' => 3,
            _ => return None,
        };
        Some(acc * 4 + value)
    })
}

fn is_start_codon(codon: &[u8]) -> bool {
    matches!(codon, b"ATG" | b"CTG" | b"TTG")
}

/// Translates a complete coding sequence, start and stop codon included.
///
/// The sequence must be a multiple of three, open with a start codon, end
/// with a stop codon and contain no internal stop. The initiator is always
/// translated as `M` and the stop is not part of the protein.
pub fn translate_cds(seq: &str) -> std::result::Result<String, String> {
    let seq = seq.as_bytes();
    if seq.len() % 3 != 0 {
        return Err(format!("length {} is not a multiple of three", seq.len()));
    }
    if seq.len() < 6 {
        return Err("sequence too short".to_string());
    }
    if !is_start_codon(&seq[..3]) {
        return Err("missing start codon".to_string());
    }
    let mut protein = String::with_capacity(seq.len() / 3);
    for (i, codon) in seq.chunks(3).enumerate() {
        let amino_acid = match codon_index(codon) {
            Some(idx) => GENETIC_CODE[idx] as char,
            None => 'X',
        };
        let is_last = i == seq.len() / 3 - 1;
        match (amino_acid, is_last) {
            ('*', true) => return Ok(protein),
            ('*', false) => return Err(format!("internal stop codon at codon {}", i)),
            (_, true) => return Err("missing stop codon".to_string()),
            _ if i == 0 => protein.push('M'),
            _ => protein.push(amino_acid),
        }
    }
    Err("missing stop codon".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryGenome;

    fn exons(coords: &[(i64, i64)]) -> Vec<Interval> {
        coords
            .iter()
            .map(|&(s, e)| Interval::new(s, e).unwrap())
            .collect()
    }

    #[test]
    fn canonical_and_gcag_introns() {
        // intron 1: 10..20 GT..AG, intron 2: 30..40 GC..AG
        let seq = "AAAAAAAAAAGTCCCCCCAGAAAAAAAAAAGCCCCCCCAGAAAAAAAAAA";
        let genome = MemoryGenome::new().with_chrom("chr1", seq);
        let chain = exons(&[(0, 10), (20, 30), (40, 50)]);
        let result = noncanonical_splicing(&genome, "chr1", Strand::Forward, &chain).unwrap();
        assert_eq!(result, vec![(1, "GCAG".to_string())]);
    }

    #[test]
    fn reverse_strand_sites_are_reverse_complemented() {
        // CT..AC on the forward strand reads GT..AG on the reverse strand
        let seq = "AAAAAAAAAACTCCCCCCACAAAAAAAAAA";
        let genome = MemoryGenome::new().with_chrom("chr1", seq);
        let chain = exons(&[(0, 10), (20, 30)]);
        assert!(noncanonical_splicing(&genome, "chr1", Strand::Reverse, &chain)
            .unwrap()
            .is_empty());
        assert_eq!(
            noncanonical_splicing(&genome, "chr1", Strand::Forward, &chain).unwrap(),
            vec![(0, "CTAC".to_string())]
        );
    }

    #[test]
    fn runlength_per_mismatch_budget() {
        let align = [true, true, false, true, false, true, true, true];
        assert_eq!(find_runlength(align.iter().copied(), 0), vec![2]);
        assert_eq!(find_runlength(align.iter().copied(), 2), vec![2, 3, 6]);
        assert_eq!(find_runlength([true, true].iter().copied(), 2), vec![2, 2, 2]);
    }

    #[test]
    fn identical_windows_repeat_over_full_overlap() {
        let window = b"ACGTTGCAAGCTTACGGATCCATGCAAGTC";
        assert_eq!(window.len(), 30);
        let score = repeat_len(window, window, 2, 0);
        assert_eq!(score, 30 - 2 * 2);
        assert_eq!(score.min(15), 15);
    }

    #[test]
    fn direct_repeat_len_is_capped_at_delta() {
        let unit = "ACGTTGCAAGCTTACGGATCCATGCAAGTCGGATTCAGCTAGGCTAACGTTCAGCATGACTAGCATGCTAGTTGACGATCGATGCTAGGCATTCAGAATC";
        assert_eq!(unit.len(), 100);
        let genome = MemoryGenome::new().with_chrom("chr1", &unit.repeat(2));
        let chain = exons(&[(0, 50), (150, 200)]);
        let mut cache = HashMap::new();
        let lengths =
            direct_repeat_len(&genome, "chr1", &chain, &RepeatParams::default(), &mut cache)
                .unwrap();
        assert_eq!(lengths, vec![15]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn a_content_downstream_of_transcript_end() {
        let seq = "CCCCCCCCCCAAAAATTTTT";
        let genome = MemoryGenome::new().with_chrom("chr1", seq);
        let forward = downstream_a_content(&genome, "chr1", Strand::Forward, &exons(&[(0, 10)]), 10).unwrap();
        assert!((forward - 0.5).abs() < 1e-12);
        let reverse = downstream_a_content(&genome, "chr1", Strand::Reverse, &exons(&[(15, 20)]), 5).unwrap();
        assert!((reverse - 0.0).abs() < 1e-12);
        let reverse = downstream_a_content(&genome, "chr1", Strand::Reverse, &exons(&[(20, 21)]), 5)
            .unwrap();
        assert!((reverse - 1.0).abs() < 1e-12);
    }

    #[test]
    fn spliced_sequence_follows_strand() {
        let genome = MemoryGenome::new().with_chrom("chr1", "AACCGGTTAA");
        let chain = exons(&[(0, 2), (6, 8)]);
        assert_eq!(spliced_sequence(&genome, "chr1", Strand::Forward, &chain).unwrap(), "AATT");
        assert_eq!(spliced_sequence(&genome, "chr1", Strand::Reverse, &chain).unwrap(), "AATT");
        let chain = exons(&[(2, 4)]);
        assert_eq!(spliced_sequence(&genome, "chr1", Strand::Reverse, &chain).unwrap(), "GG");
    }

    #[test]
    fn translation_of_complete_cds() {
        assert_eq!(translate_cds("ATGGCTTGGTAA").unwrap(), "MAW");
        assert_eq!(translate_cds("TTGGCTTAG").unwrap(), "MA");
        assert!(translate_cds("ATGGCTTG").is_err());
        assert!(translate_cds("ATGTAAGCTTGA").is_err());
        assert!(translate_cds("GCTGCTTAA").is_err());
        assert!(translate_cds("ATGGCTGCT").is_err());
    }
}
