use crate::utils::{pairwise, Error, Interval, Result, Strand};
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type NodeId = usize;
pub type EdgeId = usize;

/// Minimal sub-exon segment. Every exon of every transcript is a contiguous
/// run of segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentNode {
    pub start: i64,
    pub end: i64,
    pub transcripts: Vec<usize>,
    pub in_edges: Vec<EdgeId>,
    pub out_edges: Vec<EdgeId>,
}

/// Transition between two consecutive segments of at least one transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEdge {
    pub from: NodeId,
    pub to: NodeId,
    pub transcripts: Vec<usize>,
    pub is_junction: bool,
}

#[derive(Debug, Clone)]
pub struct SegmentGraph {
    strand: Strand,
    nodes: Vec<SegmentNode>,
    edges: Vec<SegmentEdge>,
    paths: Vec<Vec<NodeId>>,
}

fn validate_exons(transcript: usize, exons: &[Interval]) -> Result<()> {
    if exons.is_empty() {
        return Err(Error::Data(format!("transcript {} has no exons", transcript)));
    }
    if let Some(exon) = exons.iter().find(|e| e.start >= e.end) {
        return Err(Error::Data(format!(
            "transcript {} has an empty exon {}",
            transcript, exon
        )));
    }
    if let Some((e1, e2)) = pairwise(exons).find(|(e1, e2)| e1.end >= e2.start) {
        return Err(Error::Data(format!(
            "transcript {} has unordered or overlapping exons {} and {}",
            transcript, e1, e2
        )));
    }
    Ok(())
}

impl SegmentGraph {
    /// Builds the graph from the exon chains of a transcript set. Transcript ids
    /// are the positions in `transcript_exons`.
    pub fn new(transcript_exons: &[&[Interval]], strand: Strand) -> Result<Self> {
        for (transcript, exons) in transcript_exons.iter().enumerate() {
            validate_exons(transcript, exons)?;
        }

        // exon depth changes at every boundary
        let mut depth_change: BTreeMap<i64, i64> = BTreeMap::new();
        for exons in transcript_exons {
            for exon in exons.iter() {
                *depth_change.entry(exon.start).or_default() += 1;
                *depth_change.entry(exon.end).or_default() -= 1;
            }
        }
        let boundaries: Vec<(i64, i64)> = depth_change.into_iter().collect();
        let mut nodes = Vec::new();
        let mut depth = 0;
        for window in boundaries.windows(2) {
            depth += window[0].1;
            if depth > 0 {
                nodes.push(SegmentNode {
                    start: window[0].0,
                    end: window[1].0,
                    transcripts: Vec::new(),
                    in_edges: Vec::new(),
                    out_edges: Vec::new(),
                });
            }
        }

        let mut paths = Vec::with_capacity(transcript_exons.len());
        for (transcript, exons) in transcript_exons.iter().enumerate() {
            let mut path = Vec::new();
            for exon in exons.iter() {
                let first = nodes.partition_point(|n| n.start < exon.start);
                let mut current = first;
                while current < nodes.len() && nodes[current].end <= exon.end {
                    if current > first && nodes[current - 1].end != nodes[current].start {
                        break;
                    }
                    path.push(current);
                    current += 1;
                }
                let covered = current > first
                    && nodes[first].start == exon.start
                    && nodes[current - 1].end == exon.end;
                if !covered {
                    return Err(Error::Data(format!(
                        "exon {} of transcript {} is not a connected path in the segment graph",
                        exon, transcript
                    )));
                }
            }
            for &node in &path {
                nodes[node].transcripts.push(transcript);
            }
            paths.push(path);
        }

        let mut edges: Vec<SegmentEdge> = Vec::new();
        let mut edge_lookup: HashMap<(NodeId, NodeId), EdgeId> = HashMap::new();
        for (transcript, path) in paths.iter().enumerate() {
            for (&from, &to) in pairwise(path) {
                let edge_id = *edge_lookup.entry((from, to)).or_insert_with(|| {
                    edges.push(SegmentEdge {
                        from,
                        to,
                        transcripts: Vec::new(),
                        is_junction: nodes[from].end < nodes[to].start,
                    });
                    edges.len() - 1
                });
                edges[edge_id].transcripts.push(transcript);
            }
        }
        for (edge_id, edge) in edges.iter().enumerate() {
            nodes[edge.from].out_edges.push(edge_id);
            nodes[edge.to].in_edges.push(edge_id);
        }

        Ok(SegmentGraph {
            strand,
            nodes,
            edges,
            paths,
        })
    }

    pub fn strand(&self) -> Strand {
        self.strand
    }

    pub fn nodes(&self) -> &[SegmentNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[SegmentEdge] {
        &self.edges
    }

    pub fn n_transcripts(&self) -> usize {
        self.paths.len()
    }

    /// Node path of a transcript, in genomic order.
    pub fn path(&self, transcript: usize) -> &[NodeId] {
        &self.paths[transcript]
    }

    pub(crate) fn paths(&self) -> &[Vec<NodeId>] {
        &self.paths
    }

    #[inline]
    pub(crate) fn is_junction(&self, from: NodeId, to: NodeId) -> bool {
        self.nodes[from].end < self.nodes[to].start
    }

    /// Splice junctions as `(donor, acceptor)` genomic positions (intron
    /// start, intron end), with the transcripts using them.
    pub fn junctions(&self) -> impl Iterator<Item = (i64, i64, &[usize])> + '_ {
        self.edges.iter().filter(|e| e.is_junction).map(|e| {
            (
                self.nodes[e.from].end,
                self.nodes[e.to].start,
                e.transcripts.as_slice(),
            )
        })
    }

    /// Exon intervals of a transcript reconstructed from its path.
    pub fn exons(&self, transcript: usize) -> Vec<Interval> {
        let mut exons: Vec<Interval> = Vec::new();
        for &node in &self.paths[transcript] {
            let segment = &self.nodes[node];
            match exons.last_mut() {
                Some(last) if last.end == segment.start => last.end = segment.end,
                _ => exons.push(Interval {
                    start: segment.start,
                    end: segment.end,
                }),
            }
        }
        exons
    }

    /// Looks for introns of `exons` that match a graph junction shifted by the
    /// same offset at donor and acceptor, as produced by ambiguous alignments.
    ///
    /// Returns intron index -> shift. Exact matches are not reported and the
    /// smallest shift within `max_shift` wins.
    pub fn fuzzy_junction(&self, exons: &[Interval], max_shift: i64) -> BTreeMap<usize, i64> {
        let mut shifts = BTreeMap::new();
        if max_shift < 1 {
            return shifts;
        }
        let junctions: BTreeSet<(i64, i64)> = self.junctions().map(|(d, a, _)| (d, a)).collect();
        for (intron, (e1, e2)) in pairwise(exons).enumerate() {
            let (donor, acceptor) = (e1.end, e2.start);
            if junctions.contains(&(donor, acceptor)) {
                continue;
            }
            let best = junctions
                .range((donor - max_shift, i64::MIN)..=(donor + max_shift, i64::MAX))
                .map(|&(d, a)| (d - donor, a - acceptor))
                .filter(|&(shift_d, shift_a)| shift_d == shift_a && shift_d != 0)
                .min_by_key(|&(shift, _)| (shift.abs(), shift));
            if let Some((shift, _)) = best {
                shifts.insert(intron, shift);
            }
        }
        shifts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exons(coords: &[(i64, i64)]) -> Vec<Interval> {
        coords
            .iter()
            .map(|&(start, end)| Interval::new(start, end).unwrap())
            .collect()
    }

    fn build(transcripts: &[Vec<Interval>], strand: Strand) -> SegmentGraph {
        let refs: Vec<&[Interval]> = transcripts.iter().map(|t| t.as_slice()).collect();
        SegmentGraph::new(&refs, strand).unwrap()
    }

    #[test]
    fn segments_split_at_every_boundary() {
        let graph = build(
            &[
                exons(&[(100, 200), (300, 500)]),
                exons(&[(100, 200), (300, 400), (450, 500)]),
            ],
            Strand::Forward,
        );
        let segments: Vec<(i64, i64)> = graph.nodes().iter().map(|n| (n.start, n.end)).collect();
        assert_eq!(
            segments,
            vec![(100, 200), (300, 400), (400, 450), (450, 500)]
        );
        assert_eq!(graph.path(0), &[0, 1, 2, 3]);
        assert_eq!(graph.path(1), &[0, 1, 3]);
        assert_eq!(graph.nodes()[2].transcripts, vec![0]);
    }

    #[test]
    fn every_transcript_is_a_connected_path() {
        let transcripts = vec![
            exons(&[(10, 50), (80, 120), (200, 260)]),
            exons(&[(30, 50), (100, 120), (200, 240)]),
            exons(&[(10, 120), (200, 300)]),
        ];
        let graph = build(&transcripts, Strand::Reverse);
        for (transcript, original) in transcripts.iter().enumerate() {
            assert_eq!(&graph.exons(transcript), original);
            for (&from, &to) in pairwise(graph.path(transcript)) {
                let edge = graph
                    .edges()
                    .iter()
                    .find(|e| e.from == from && e.to == to)
                    .unwrap();
                assert!(edge.transcripts.contains(&transcript));
            }
        }
    }

    #[test]
    fn junction_edges_are_flagged() {
        let graph = build(&[exons(&[(0, 10), (20, 30)])], Strand::Forward);
        let junctions: Vec<(i64, i64)> = graph.junctions().map(|(d, a, _)| (d, a)).collect();
        assert_eq!(junctions, vec![(10, 20)]);
        assert_eq!(graph.nodes()[0].out_edges, vec![0]);
        assert_eq!(graph.nodes()[1].in_edges, vec![0]);
    }

    #[test]
    fn touching_exons_of_different_transcripts_are_split() {
        let graph = build(
            &[exons(&[(0, 10)]), exons(&[(10, 20)])],
            Strand::Forward,
        );
        assert_eq!(graph.nodes().len(), 2);
        assert_eq!(graph.path(1), &[1]);
    }

    #[test]
    fn malformed_exons_are_rejected() {
        let overlapping = exons(&[(0, 10), (5, 20)]);
        let result = SegmentGraph::new(&[overlapping.as_slice()], Strand::Forward);
        assert!(matches!(result, Err(Error::Data(_))));
        let empty: Vec<Interval> = Vec::new();
        assert!(SegmentGraph::new(&[empty.as_slice()], Strand::Forward).is_err());
    }

    #[test]
    fn fuzzy_junction_finds_consistent_shift() {
        let graph = build(&[exons(&[(0, 100), (200, 300)])], Strand::Forward);
        let shifted = exons(&[(0, 103), (203, 300)]);
        assert_eq!(graph.fuzzy_junction(&shifted, 5), BTreeMap::from([(0, -3)]));
        assert!(graph.fuzzy_junction(&shifted, 2).is_empty());
        // inconsistent shifts at donor and acceptor are not fuzzy junctions
        let novel = exons(&[(0, 103), (205, 300)]);
        assert!(graph.fuzzy_junction(&novel, 10).is_empty());
        // exact junctions are not reported
        let exact = exons(&[(50, 100), (200, 250)]);
        assert!(graph.fuzzy_junction(&exact, 10).is_empty());
    }
}
