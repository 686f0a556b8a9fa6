use super::{NodeId, SegmentGraph};
use crate::utils::{Error, Strand};
use std::{collections::BTreeSet, fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    ExonSkipping,
    AltFivePrime,
    AltThreePrime,
    IntronRetention,
    MutuallyExclusive,
    AltTss,
    AltPas,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::ExonSkipping,
        EventType::AltFivePrime,
        EventType::AltThreePrime,
        EventType::IntronRetention,
        EventType::MutuallyExclusive,
        EventType::AltTss,
        EventType::AltPas,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ExonSkipping => "ES",
            EventType::AltFivePrime => "5AS",
            EventType::AltThreePrime => "3AS",
            EventType::IntronRetention => "IR",
            EventType::MutuallyExclusive => "ME",
            EventType::AltTss => "TSS",
            EventType::AltPas => "PAS",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::AltTss | EventType::AltPas)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| {
                Error::Config(format!(
                    "Unknown event type '{}', expected one of ES, 5AS, 3AS, IR, ME, TSS, PAS",
                    s
                ))
            })
    }
}

/// Alternative splicing event: two paths between `start_node` and
/// `end_node`, with the transcripts supporting each of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceEvent {
    pub primary: Vec<usize>,
    pub alternative: Vec<usize>,
    pub start_node: NodeId,
    pub end_node: NodeId,
    pub kind: EventType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum BubbleSide {
    Internal,
    Left,
    Right,
}

// Bubble key: side and the two sub-paths, smaller first.
type BubbleKey = (BubbleSide, Vec<NodeId>, Vec<NodeId>);

struct PathShape {
    exonic_len: i64,
    n_junctions: usize,
    left_contiguous: bool,
}

impl SegmentGraph {
    fn shape(&self, sub_path: &[NodeId]) -> PathShape {
        let junctions: Vec<bool> = sub_path
            .windows(2)
            .map(|w| self.is_junction(w[0], w[1]))
            .collect();
        let interior = &sub_path[1..sub_path.len().saturating_sub(1).max(1)];
        PathShape {
            exonic_len: interior
                .iter()
                .map(|&n| self.nodes()[n].end - self.nodes()[n].start)
                .sum(),
            n_junctions: junctions.iter().filter(|&&j| j).count(),
            left_contiguous: sub_path.len() > 2 && !junctions[0],
        }
    }

    /// Common nodes of two paths as pairs of positions.
    fn shared_positions(p1: &[NodeId], p2: &[NodeId]) -> Vec<(usize, usize)> {
        let mut shared = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < p1.len() && j < p2.len() {
            match p1[i].cmp(&p2[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    shared.push((i, j));
                    i += 1;
                    j += 1;
                }
            }
        }
        shared
    }

    fn sorted_key(side: BubbleSide, a: &[NodeId], b: &[NodeId]) -> BubbleKey {
        if a <= b {
            (side, a.to_vec(), b.to_vec())
        } else {
            (side, b.to_vec(), a.to_vec())
        }
    }

    fn collect_bubbles(&self) -> Vec<BubbleKey> {
        let mut bubbles: BTreeSet<BubbleKey> = BTreeSet::new();
        let paths = self.paths();
        for (t1, p1) in paths.iter().enumerate() {
            for p2 in &paths[t1 + 1..] {
                let shared = Self::shared_positions(p1, p2);
                let (Some(&(f1, f2)), Some(&(l1, l2))) = (shared.first(), shared.last()) else {
                    continue;
                };

                for w in shared.windows(2) {
                    let ((a1, a2), (b1, b2)) = (w[0], w[1]);
                    let (s1, s2) = (&p1[a1..=b1], &p2[a2..=b2]);
                    if s1 != s2 {
                        bubbles.insert(Self::sorted_key(BubbleSide::Internal, s1, s2));
                    }
                }

                let (s1, s2) = (&p1[..=f1], &p2[..=f2]);
                if p1[0] != p2[0]
                    && self.shape(s1).n_junctions > 0
                    && self.shape(s2).n_junctions > 0
                {
                    bubbles.insert(Self::sorted_key(BubbleSide::Left, s1, s2));
                }

                let (s1, s2) = (&p1[l1..], &p2[l2..]);
                if p1.last() != p2.last()
                    && self.shape(s1).n_junctions > 0
                    && self.shape(s2).n_junctions > 0
                {
                    bubbles.insert(Self::sorted_key(BubbleSide::Right, s1, s2));
                }
            }
        }
        bubbles.into_iter().collect()
    }

    fn supporting_transcripts(&self, side: BubbleSide, sub_path: &[NodeId]) -> Vec<usize> {
        self.paths()
            .iter()
            .enumerate()
            .filter(|(_, path)| match side {
                BubbleSide::Left => path.starts_with(sub_path),
                BubbleSide::Right => path.ends_with(sub_path),
                BubbleSide::Internal => path
                    .binary_search(&sub_path[0])
                    .ok()
                    .and_then(|offset| path.get(offset..offset + sub_path.len()))
                    .is_some_and(|window| window == sub_path),
            })
            .map(|(transcript, _)| transcript)
            .collect()
    }

    fn classify(&self, a: &[NodeId], b: &[NodeId]) -> EventType {
        let (shape_a, shape_b) = (self.shape(a), self.shape(b));
        if shape_a.n_junctions == 0 || shape_b.n_junctions == 0 {
            return EventType::IntronRetention;
        }
        // two junctions enclose at least one complete exon
        match (shape_a.n_junctions >= 2, shape_b.n_junctions >= 2) {
            (true, true) => EventType::MutuallyExclusive,
            (true, false) | (false, true) => EventType::ExonSkipping,
            (false, false) => {
                let left_differs = shape_a.left_contiguous || shape_b.left_contiguous;
                match (left_differs, self.strand()) {
                    (true, Strand::Forward) | (false, Strand::Reverse) => EventType::AltFivePrime,
                    (true, Strand::Reverse) | (false, Strand::Forward) => EventType::AltThreePrime,
                }
            }
        }
    }

    /// Orders the two sub-paths of an internal bubble as (primary,
    /// alternative). The alternative path has more exonic bases, ties go to
    /// the path that diverges further downstream.
    fn internal_order<'a>(&self, a: &'a [NodeId], b: &'a [NodeId]) -> (&'a [NodeId], &'a [NodeId]) {
        let (len_a, len_b) = (self.shape(a).exonic_len, self.shape(b).exonic_len);
        let a_is_alternative = match len_a.cmp(&len_b) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => match self.strand() {
                Strand::Forward => a[1] > b[1],
                Strand::Reverse => a[1] < b[1],
            },
        };
        if a_is_alternative {
            (b, a)
        } else {
            (a, b)
        }
    }

    fn make_event(&self, side: BubbleSide, a: &[NodeId], b: &[NodeId]) -> SpliceEvent {
        let (primary, alternative, start_node, end_node, kind) = match side {
            BubbleSide::Internal => {
                let (primary, alternative) = self.internal_order(a, b);
                (
                    primary,
                    alternative,
                    a[0],
                    a[a.len() - 1],
                    self.classify(a, b),
                )
            }
            BubbleSide::Left => {
                // the more distal first node is the alternative
                let (primary, alternative) = if a[0] < b[0] { (b, a) } else { (a, b) };
                let kind = match self.strand() {
                    Strand::Forward => EventType::AltTss,
                    Strand::Reverse => EventType::AltPas,
                };
                (primary, alternative, alternative[0], a[a.len() - 1], kind)
            }
            BubbleSide::Right => {
                let (a_last, b_last) = (a[a.len() - 1], b[b.len() - 1]);
                let (primary, alternative) = if a_last > b_last { (b, a) } else { (a, b) };
                let kind = match self.strand() {
                    Strand::Forward => EventType::AltPas,
                    Strand::Reverse => EventType::AltTss,
                };
                (
                    primary,
                    alternative,
                    a[0],
                    alternative[alternative.len() - 1],
                    kind,
                )
            }
        };
        SpliceEvent {
            primary: self.supporting_transcripts(side, primary),
            alternative: self.supporting_transcripts(side, alternative),
            start_node,
            end_node,
            kind,
        }
    }

    /// Enumerates alternative splicing events of the requested types.
    ///
    /// Events are unique per pair of sub-paths and ordered by
    /// (start node, end node).
    pub fn find_splice_bubbles(&self, event_types: &[EventType]) -> Vec<SpliceEvent> {
        let mut events: Vec<SpliceEvent> = self
            .collect_bubbles()
            .into_iter()
            .map(|(side, a, b)| self.make_event(side, &a, &b))
            .filter(|event| event_types.contains(&event.kind))
            .collect();
        events.sort_by(|e1, e2| {
            (e1.start_node, e1.end_node, e1.kind, &e1.primary, &e1.alternative).cmp(&(
                e2.start_node,
                e2.end_node,
                e2.kind,
                &e2.primary,
                &e2.alternative,
            ))
        });
        events
    }

    fn side(&self, event: &SpliceEvent) -> BubbleSide {
        match (event.kind, self.strand()) {
            (EventType::AltTss, Strand::Forward) | (EventType::AltPas, Strand::Reverse) => {
                BubbleSide::Left
            }
            (EventType::AltTss, Strand::Reverse) | (EventType::AltPas, Strand::Forward) => {
                BubbleSide::Right
            }
            _ => BubbleSide::Internal,
        }
    }

    /// Genomic `(start, end)` of an event.
    pub fn event_coordinate(&self, event: &SpliceEvent) -> (i64, i64) {
        let (start, end) = (
            &self.nodes()[event.start_node],
            &self.nodes()[event.end_node],
        );
        match self.side(event) {
            BubbleSide::Internal => (start.end, end.start),
            BubbleSide::Left => (start.start, end.start),
            BubbleSide::Right => (start.end, end.end),
        }
    }

    /// Smallest distance between any endpoints of the two events.
    pub fn events_dist(&self, e1: &SpliceEvent, e2: &SpliceEvent) -> i64 {
        let (s1, t1) = self.event_coordinate(e1);
        let (s2, t2) = self.event_coordinate(e2);
        [s1 - s2, s1 - t2, t1 - s2, t1 - t2]
            .iter()
            .map(|d| d.abs())
            .min()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Interval;

    fn graph(transcripts: &[&[(i64, i64)]], strand: Strand) -> SegmentGraph {
        let exons: Vec<Vec<Interval>> = transcripts
            .iter()
            .map(|t| t.iter().map(|&(s, e)| Interval::new(s, e).unwrap()).collect())
            .collect();
        let refs: Vec<&[Interval]> = exons.iter().map(|e| e.as_slice()).collect();
        SegmentGraph::new(&refs, strand).unwrap()
    }

    #[test]
    fn exon_skipping_event() {
        let graph = graph(
            &[
                &[(0, 100), (200, 300), (400, 500)],
                &[(0, 100), (400, 500)],
            ],
            Strand::Forward,
        );
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventType::ExonSkipping);
        assert_eq!(event.primary, vec![1]);
        assert_eq!(event.alternative, vec![0]);
        assert_eq!(graph.event_coordinate(event), (100, 400));
    }

    #[test]
    fn intron_retention_event() {
        let graph = graph(&[&[(0, 100), (200, 300)], &[(0, 300)]], Strand::Forward);
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::IntronRetention);
        assert_eq!(events[0].alternative, vec![1]);
    }

    #[test]
    fn alternative_donor_depends_on_strand() {
        let transcripts: &[&[(i64, i64)]] = &[&[(0, 100), (200, 300)], &[(0, 120), (200, 300)]];
        let forward = graph(transcripts, Strand::Forward);
        let events = forward.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::AltFivePrime);
        assert_eq!(events[0].alternative, vec![1]);

        let reverse = graph(transcripts, Strand::Reverse);
        let events = reverse.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events[0].kind, EventType::AltThreePrime);
    }

    #[test]
    fn mutually_exclusive_exons() {
        let graph = graph(
            &[
                &[(0, 100), (200, 250), (400, 500)],
                &[(0, 100), (300, 350), (400, 500)],
            ],
            Strand::Forward,
        );
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventType::MutuallyExclusive);
        // equal length, the downstream exon is the alternative
        assert_eq!(events[0].alternative, vec![1]);
    }

    #[test]
    fn alternative_first_exon_is_a_tss_event() {
        let graph = graph(
            &[&[(0, 100), (400, 500)], &[(200, 300), (400, 500)]],
            Strand::Forward,
        );
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.kind, EventType::AltTss);
        assert_eq!(event.alternative, vec![0]);
        assert_eq!(event.primary, vec![1]);
        assert_eq!(graph.event_coordinate(event), (0, 400));

        let as_reverse = self::graph(
            &[&[(0, 100), (400, 500)], &[(200, 300), (400, 500)]],
            Strand::Reverse,
        );
        let events = as_reverse.find_splice_bubbles(&[EventType::AltPas]);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn truncated_first_exon_is_not_a_tss_event() {
        let graph = graph(
            &[&[(0, 100), (400, 500)], &[(50, 100), (400, 500)]],
            Strand::Forward,
        );
        assert!(graph.find_splice_bubbles(&EventType::ALL).is_empty());
    }

    #[test]
    fn event_type_filter_and_parsing() {
        let graph = graph(
            &[
                &[(0, 100), (200, 300), (400, 500)],
                &[(0, 100), (400, 500)],
            ],
            Strand::Forward,
        );
        assert!(graph
            .find_splice_bubbles(&[EventType::IntronRetention])
            .is_empty());
        assert_eq!("5AS".parse::<EventType>().unwrap(), EventType::AltFivePrime);
        assert!("XX".parse::<EventType>().is_err());
        assert_eq!(EventType::MutuallyExclusive.to_string(), "ME");
    }

    #[test]
    fn distance_between_events() {
        let graph = graph(
            &[
                &[(0, 100), (200, 300), (400, 500), (600, 700), (800, 900)],
                &[(0, 100), (400, 500), (800, 900)],
            ],
            Strand::Forward,
        );
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 2);
        assert_eq!(graph.event_coordinate(&events[0]), (100, 400));
        assert_eq!(graph.event_coordinate(&events[1]), (500, 800));
        assert_eq!(graph.events_dist(&events[0], &events[1]), 100);
    }
}
