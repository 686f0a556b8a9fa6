use std::collections::BTreeMap;

/// Open reading frame in transcript coordinates. `stop` is the end of the
/// stop codon, so `stop - start` is the coding length including it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrfCandidate {
    pub start: usize,
    pub stop: usize,
    pub frame: usize,
    pub start_codon: String,
    pub stop_codon: String,
    /// Start codons upstream of `start`, in any frame.
    pub upstream_start_codons: usize,
    /// Reference transcripts annotating `start` as CDS initiation.
    pub ref_ids: Vec<usize>,
}

impl OrfCandidate {
    pub fn coding_len(&self) -> usize {
        self.stop - self.start
    }

    pub fn is_anchored(&self) -> bool {
        !self.ref_ids.is_empty()
    }
}

fn codon_positions(sequence: &[u8], codons: &[String]) -> Vec<usize> {
    if sequence.len() < 3 {
        return Vec::new();
    }
    (0..=sequence.len() - 3)
        .filter(|&i| codons.iter().any(|c| c.as_bytes() == &sequence[i..i + 3]))
        .collect()
}

/// Enumerates ORFs in all three frames.
///
/// A start codon opens an ORF if it lies past the stop of the previous ORF in
/// its frame; annotated initiation sites in `anchors` (transcript offset ->
/// reference ids) always open one. ORFs end at the next in-frame stop codon,
/// ORFs without one are dropped. The result is ordered by start.
pub fn find_orfs(
    sequence: &str,
    start_codons: &[String],
    stop_codons: &[String],
    anchors: &BTreeMap<usize, Vec<usize>>,
) -> Vec<OrfCandidate> {
    let seq = sequence.as_bytes();
    let start_positions = codon_positions(seq, start_codons);
    let stop_positions = codon_positions(seq, stop_codons);

    // start position -> anchoring reference ids
    let mut starts: BTreeMap<usize, Vec<usize>> = start_positions.iter().map(|&p| (p, Vec::new())).collect();
    for (&pos, ref_ids) in anchors {
        if pos + 3 <= seq.len() {
            starts.entry(pos).or_default().extend(ref_ids.iter().copied());
        }
    }

    let mut orfs = Vec::new();
    for frame in 0..3 {
        let frame_stops: Vec<usize> = stop_positions
            .iter()
            .copied()
            .filter(|p| p % 3 == frame)
            .collect();
        let mut previous_stop = 0;
        for (&start, ref_ids) in starts.iter().filter(|(p, _)| *p % 3 == frame) {
            if start < previous_stop && ref_ids.is_empty() {
                continue;
            }
            let next_stop = frame_stops.partition_point(|&p| p < start);
            let Some(&stop_pos) = frame_stops.get(next_stop) else {
                break;
            };
            let stop = stop_pos + 3;
            orfs.push(OrfCandidate {
                start,
                stop,
                frame,
                start_codon: sequence[start..start + 3].to_string(),
                stop_codon: sequence[stop_pos..stop].to_string(),
                upstream_start_codons: start_positions.partition_point(|&p| p < start),
                ref_ids: ref_ids.clone(),
            });
            previous_stop = previous_stop.max(stop);
        }
    }
    orfs.sort_by_key(|orf| (orf.start, orf.stop));
    orfs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codons(codons: &[&str]) -> Vec<String> {
        codons.iter().map(|c| c.to_string()).collect()
    }

    fn find(sequence: &str, anchors: &BTreeMap<usize, Vec<usize>>) -> Vec<OrfCandidate> {
        find_orfs(
            sequence,
            &codons(&["ATG"]),
            &codons(&["TAA", "TAG", "TGA"]),
            anchors,
        )
    }

    #[test]
    fn orf_spans_start_to_inclusive_stop() {
        let orfs = find("CCATGAAACCCTAGCC", &BTreeMap::new());
        assert_eq!(orfs.len(), 1);
        let orf = &orfs[0];
        assert_eq!((orf.start, orf.stop, orf.frame), (2, 14, 2));
        assert_eq!(orf.start_codon, "ATG");
        assert_eq!(orf.stop_codon, "TAG");
        assert_eq!(orf.coding_len(), 12);
        assert_eq!(orf.upstream_start_codons, 0);
    }

    #[test]
    fn nested_in_frame_start_does_not_open_an_orf() {
        // second ATG is in frame with the first one and before its stop
        let orfs = find("ATGATGAAATAA", &BTreeMap::new());
        assert_eq!(orfs.len(), 1);
        assert_eq!(orfs[0].start, 0);
    }

    #[test]
    fn orfs_in_other_frames_count_upstream_starts() {
        let orfs = find("ATGCATGTAAACTAA", &BTreeMap::new());
        let starts: Vec<(usize, usize)> = orfs.iter().map(|o| (o.start, o.stop)).collect();
        assert_eq!(starts, vec![(0, 15), (4, 10)]);
        assert_eq!(orfs[1].upstream_start_codons, 1);
    }

    #[test]
    fn orf_without_stop_is_dropped() {
        assert!(find("ATGAAAAAAAAA", &BTreeMap::new()).is_empty());
    }

    #[test]
    fn anchors_always_open_an_orf() {
        let anchors = BTreeMap::from([(3, vec![7])]);
        let orfs = find("ATGCTGAAATAA", &anchors);
        assert_eq!(orfs.len(), 2);
        assert_eq!(orfs[1].start, 3);
        assert_eq!(orfs[1].start_codon, "CTG");
        assert_eq!(orfs[1].ref_ids, vec![7]);
        assert!(orfs[1].is_anchored());
        assert!(!orfs[0].is_anchored());
    }
}
