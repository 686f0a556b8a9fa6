use super::{NodeId, SegmentGraph};
use crate::utils::Strand;
use std::collections::BTreeMap;

/// A transcript whose path is a contiguous part of a longer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub container: usize,
    /// Container exons lying entirely 5' of the fragment.
    pub five_prime_exons: usize,
    /// Container exons lying entirely 3' of the fragment.
    pub three_prime_exons: usize,
}

impl SegmentGraph {
    fn count_junctions(&self, path: &[NodeId]) -> usize {
        path.windows(2)
            .filter(|w| self.is_junction(w[0], w[1]))
            .count()
    }

    /// Transcripts whose node path is a contiguous sub-path of another,
    /// different, transcript path.
    pub fn find_fragments(&self) -> BTreeMap<usize, Vec<Fragment>> {
        let mut fragments: BTreeMap<usize, Vec<Fragment>> = BTreeMap::new();
        let paths = self.paths();
        for (transcript, path) in paths.iter().enumerate() {
            for (container, container_path) in paths.iter().enumerate() {
                if transcript == container
                    || path.len() >= container_path.len()
                    || path.is_empty()
                {
                    continue;
                }
                // node ids are strictly increasing along a path
                let Ok(offset) = container_path.binary_search(&path[0]) else {
                    continue;
                };
                let last = offset + path.len() - 1;
                if container_path.get(offset..=last) != Some(path.as_slice()) {
                    continue;
                }
                let left_exons = self.count_junctions(&container_path[..=offset]);
                let right_exons = self.count_junctions(&container_path[last..]);
                let (five_prime_exons, three_prime_exons) = match self.strand() {
                    Strand::Forward => (left_exons, right_exons),
                    Strand::Reverse => (right_exons, left_exons),
                };
                fragments.entry(transcript).or_default().push(Fragment {
                    container,
                    five_prime_exons,
                    three_prime_exons,
                });
            }
        }
        fragments
    }
}
