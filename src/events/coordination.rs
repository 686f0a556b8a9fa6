use crate::graph::{EventType, SegmentGraph, SpliceEvent};
use crate::utils::stats::{chi2_contingency, fisher_exact};
use crate::utils::{Error, Result, Strand};
use std::collections::BTreeSet;
use std::str::FromStr;

const PSEUDOCOUNT: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    Chi2,
    Fisher,
}

impl FromStr for TestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "chi2" => Ok(TestKind::Chi2),
            "fisher" => Ok(TestKind::Fisher),
            _ => Err(Error::Config(format!(
                "Unknown test '{}', expected chi2 or fisher",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinationParams {
    pub test: TestKind,
    /// Minimal distance in bases between the two events of a pair.
    pub min_dist: i64,
    pub min_total: u64,
    pub min_alt_fraction: f64,
}

impl Default for CoordinationParams {
    fn default() -> Self {
        CoordinationParams {
            test: TestKind::Chi2,
            min_dist: 1,
            min_total: 100,
            min_alt_fraction: 0.1,
        }
    }
}

/// Outcome of the independence test of two events `a` and `b`.
///
/// Table rows are the primary and alternative state of `a`, columns those of
/// `b`.
#[derive(Debug, Clone, PartialEq)]
pub struct EventPairTest {
    pub type_a: EventType,
    pub type_b: EventType,
    pub coordinate_a: (i64, i64),
    pub coordinate_b: (i64, i64),
    pub p_value: f64,
    /// Chi-squared statistic or the odds ratio of Fisher's exact test.
    pub statistic: f64,
    pub log2_odds_ratio: f64,
    pub delta_psi_ab: f64,
    pub delta_psi_ba: f64,
    pub counts: [[u64; 2]; 2],
    pub transcripts: [[Vec<usize>; 2]; 2],
}

fn coverage_sum(coverage: &[u64], transcripts: &[usize]) -> u64 {
    transcripts.iter().map(|&t| coverage[t]).sum()
}

fn passes_event_filter(coverage: &[u64], event: &SpliceEvent, params: &CoordinationParams) -> bool {
    let primary = coverage_sum(coverage, &event.primary);
    let alternative = coverage_sum(coverage, &event.alternative);
    let total = primary + alternative;
    total >= params.min_total
        && total > 0
        && primary.min(alternative) as f64 / total as f64 >= params.min_alt_fraction
}

/// Cross-tabulates the coverage of transcripts in each combination of event
/// states. Transcripts not in any state of both events do not count.
pub fn contingency_table(
    e1: &SpliceEvent,
    e2: &SpliceEvent,
    coverage: &[u64],
) -> ([[u64; 2]; 2], [[Vec<usize>; 2]; 2]) {
    let mut counts = [[0; 2]; 2];
    let mut transcripts: [[Vec<usize>; 2]; 2] = Default::default();
    for (i, state_a) in [&e1.primary, &e1.alternative].into_iter().enumerate() {
        let state_a: BTreeSet<usize> = state_a.iter().copied().collect();
        for (j, state_b) in [&e2.primary, &e2.alternative].into_iter().enumerate() {
            let shared: Vec<usize> = state_b
                .iter()
                .copied()
                .filter(|t| state_a.contains(t))
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            counts[i][j] = coverage_sum(coverage, &shared);
            transcripts[i][j] = shared;
        }
    }
    (counts, transcripts)
}

fn pairwise_event_test(counts: [[u64; 2]; 2], test: TestKind) -> Result<(f64, f64)> {
    match test {
        TestKind::Chi2 => {
            let table: Vec<Vec<u64>> = counts.iter().map(|row| row.to_vec()).collect();
            let result = chi2_contingency(&table)?;
            Ok((result.p_value, result.statistic))
        }
        TestKind::Fisher => {
            let (odds_ratio, p_value) = fisher_exact(counts);
            Ok((p_value, odds_ratio))
        }
    }
}

/// Log2 odds ratio and the two conditional delta PSI values of a table.
fn effect_sizes(counts: [[u64; 2]; 2]) -> (f64, f64, f64) {
    let [[a, b], [c, d]] = counts.map(|row| row.map(|x| x as f64 + PSEUDOCOUNT));
    let total = a + b + c + d;
    let log2_odds_ratio = (a * d).log2() - (b * c).log2();
    // PSI of one event's primary state given the other's primary state, minus
    // its overall PSI
    let delta_psi_ab = a / (a + c) - (a + b) / total;
    let delta_psi_ba = a / (a + b) - (a + c) / total;
    (log2_odds_ratio, delta_psi_ab, delta_psi_ba)
}

/// Tests every pair of sufficiently covered events for coordinated usage.
///
/// `coverage` holds the read count of each transcript of the graph.
pub fn coordination_test(
    graph: &SegmentGraph,
    events: &[SpliceEvent],
    coverage: &[u64],
    params: &CoordinationParams,
) -> Result<Vec<EventPairTest>> {
    if coverage.len() != graph.n_transcripts() {
        return Err(Error::Data(format!(
            "coverage of {} transcripts for a graph with {} transcripts",
            coverage.len(),
            graph.n_transcripts()
        )));
    }
    let mut events: Vec<&SpliceEvent> = events
        .iter()
        .filter(|event| passes_event_filter(coverage, event, params))
        .collect();
    match graph.strand() {
        Strand::Forward => events.sort_by_key(|e| (e.start_node, e.end_node)),
        Strand::Reverse => events.sort_by_key(|e| std::cmp::Reverse((e.end_node, e.start_node))),
    }

    let mut results = Vec::new();
    for (i, e1) in events.iter().enumerate() {
        for e2 in &events[i + 1..] {
            if graph.events_dist(e1, e2) < params.min_dist {
                continue;
            }
            if e1.kind == e2.kind && e1.kind.is_terminal() {
                continue;
            }
            let (counts, transcripts) = contingency_table(e1, e2, coverage);
            let total: u64 = counts.iter().flatten().sum();
            if total < params.min_total || total == 0 {
                continue;
            }
            let margins = [
                counts[0][0] + counts[0][1],
                counts[1][0] + counts[1][1],
                counts[0][0] + counts[1][0],
                counts[0][1] + counts[1][1],
            ];
            let min_margin = margins.iter().min().copied().unwrap_or(0);
            if (min_margin as f64 / total as f64) < params.min_alt_fraction {
                continue;
            }
            let (p_value, statistic) = pairwise_event_test(counts, params.test).map_err(|e| {
                log::error!("Test on contingency table {:?} failed: {}", counts, e);
                e
            })?;
            let (log2_odds_ratio, delta_psi_ab, delta_psi_ba) = effect_sizes(counts);
            results.push(EventPairTest {
                type_a: e1.kind,
                type_b: e2.kind,
                coordinate_a: graph.event_coordinate(e1),
                coordinate_b: graph.event_coordinate(e2),
                p_value,
                statistic,
                log2_odds_ratio,
                delta_psi_ab,
                delta_psi_ba,
                counts,
                transcripts,
            });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Interval;
    use approx::assert_relative_eq;

    // two cassette exons, (200, 300) and (600, 700)
    fn two_cassettes() -> SegmentGraph {
        let chains: Vec<Vec<Interval>> = [
            vec![(0, 100), (200, 300), (400, 500), (600, 700), (800, 900)],
            vec![(0, 100), (400, 500), (600, 700), (800, 900)],
            vec![(0, 100), (200, 300), (400, 500), (800, 900)],
            vec![(0, 100), (400, 500), (800, 900)],
        ]
        .iter()
        .map(|chain| {
            chain
                .iter()
                .map(|&(s, e)| Interval::new(s, e).unwrap())
                .collect()
        })
        .collect();
        let refs: Vec<&[Interval]> = chains.iter().map(|c| c.as_slice()).collect();
        SegmentGraph::new(&refs, Strand::Forward).unwrap()
    }

    const COVERAGE: [u64; 4] = [50, 10, 10, 40];

    #[test]
    fn contingency_table_conserves_coverage() {
        let graph = two_cassettes();
        let events = graph.find_splice_bubbles(&EventType::ALL);
        assert_eq!(events.len(), 2);
        let (counts, transcripts) = contingency_table(&events[0], &events[1], &COVERAGE);
        assert_eq!(counts, [[40, 10], [10, 50]]);
        assert_eq!(transcripts[0][0], vec![3]);
        assert_eq!(transcripts[1][1], vec![0]);
        // every transcript is in one state of each event
        let total: u64 = counts.iter().flatten().sum();
        assert_eq!(total, COVERAGE.iter().sum::<u64>());
        let row_sums = [counts[0][0] + counts[0][1], counts[1][0] + counts[1][1]];
        assert_eq!(row_sums[0], coverage_sum(&COVERAGE, &events[0].primary));
        assert_eq!(row_sums[1], coverage_sum(&COVERAGE, &events[0].alternative));
    }

    #[test]
    fn coordinated_cassette_exons() {
        let graph = two_cassettes();
        let events = graph.find_splice_bubbles(&EventType::ALL);
        let results = coordination_test(&graph, &events, &COVERAGE, &CoordinationParams::default()).unwrap();
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!((result.type_a, result.type_b), (EventType::ExonSkipping, EventType::ExonSkipping));
        assert_eq!(result.coordinate_a, (100, 400));
        assert_eq!(result.coordinate_b, (500, 800));
        assert!(result.p_value < 1e-6);
        assert!(result.log2_odds_ratio > 4.0);
        assert_relative_eq!(
            result.delta_psi_ab,
            40.01 / 50.02 - 50.02 / 110.04,
            epsilon = 1e-9
        );
        assert!(result.delta_psi_ba > 0.0);

        let fisher = CoordinationParams {
            test: TestKind::Fisher,
            ..Default::default()
        };
        let results = coordination_test(&graph, &events, &COVERAGE, &fisher).unwrap();
        assert_relative_eq!(results[0].statistic, 20.0);
        assert!(results[0].p_value < 1e-6);
    }

    #[test]
    fn filters_on_coverage_and_distance() {
        let graph = two_cassettes();
        let events = graph.find_splice_bubbles(&EventType::ALL);
        let deep = CoordinationParams {
            min_total: 200,
            ..Default::default()
        };
        assert!(coordination_test(&graph, &events, &COVERAGE, &deep).unwrap().is_empty());

        let distant = CoordinationParams {
            min_dist: 101,
            ..Default::default()
        };
        assert!(coordination_test(&graph, &events, &COVERAGE, &distant).unwrap().is_empty());

        // minor states hold 20 and 15 of 115 reads
        let skewed = CoordinationParams {
            min_alt_fraction: 0.2,
            ..Default::default()
        };
        let coverage = [90, 10, 5, 10];
        assert!(coordination_test(&graph, &events, &coverage, &skewed).unwrap().is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("fisher".parse::<TestKind>().unwrap(), TestKind::Fisher);
        assert!(matches!("t-test".parse::<TestKind>(), Err(Error::Config(_))));
    }
}
