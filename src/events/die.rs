use crate::utils::stats::chi2_contingency;
use crate::utils::Result;
use std::fmt;

/// Row of the tested isoform table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoformIndex {
    Transcript(usize),
    /// Sum of the isoforms beyond the most covered ones.
    Other,
}

impl fmt::Display for IsoformIndex {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IsoformIndex::Transcript(idx) => write!(f, "{}", idx),
            IsoformIndex::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DieResult {
    pub p_value: f64,
    /// Summed usage change of the reported isoforms, first group minus second.
    pub delta_usage: f64,
    pub isoforms: Vec<IsoformIndex>,
}

impl DieResult {
    fn not_tested() -> Self {
        DieResult {
            p_value: f64::NAN,
            delta_usage: f64::NAN,
            isoforms: Vec::new(),
        }
    }

    pub fn is_tested(&self) -> bool {
        !self.p_value.is_nan()
    }
}

/// Differential isoform expression test between sample groups.
///
/// `coverage[t][g]` is the read count of transcript `t` in group `g`. Genes
/// with less than `min_cov` reads in any group, or with less than two covered
/// isoforms, are not tested. Isoforms beyond the `max_isoforms` most covered
/// ones are pooled into an `Other` row. With two groups the isoforms with the
/// largest usage change (up to two, all in the same direction) are reported.
pub fn die_test(coverage: &[Vec<u64>], min_cov: u64, max_isoforms: usize) -> Result<DieResult> {
    let n_groups = coverage.first().map_or(0, |row| row.len());
    let group_totals: Vec<u64> = (0..n_groups)
        .map(|g| coverage.iter().map(|row| row[g]).sum())
        .collect();
    if n_groups == 0 || group_totals.iter().any(|&total| total < min_cov) {
        return Ok(DieResult::not_tested());
    }

    let mut rows: Vec<(IsoformIndex, Vec<u64>)> = coverage
        .iter()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|&c| c > 0))
        .map(|(t, row)| (IsoformIndex::Transcript(t), row.clone()))
        .collect();
    if rows.len() < 2 {
        return Ok(DieResult::not_tested());
    }
    if rows.len() > max_isoforms {
        rows.sort_by_key(|(_, row)| std::cmp::Reverse(row.iter().sum::<u64>()));
        let mut other = vec![0; n_groups];
        for (_, row) in rows.drain(max_isoforms..) {
            other.iter_mut().zip(&row).for_each(|(o, c)| *o += c);
        }
        rows.push((IsoformIndex::Other, other));
    }

    let table: Vec<Vec<u64>> = rows.iter().map(|(_, row)| row.clone()).collect();
    let p_value = chi2_contingency(&table)
        .map_err(|e| {
            log::error!("chi2 test on isoform table {:?} failed: {}", table, e);
            e
        })?
        .p_value;

    if n_groups != 2 {
        return Ok(DieResult {
            p_value,
            delta_usage: f64::NAN,
            isoforms: Vec::new(),
        });
    }

    let deltas: Vec<f64> = rows
        .iter()
        .map(|(_, row)| {
            row[0] as f64 / group_totals[0] as f64 - row[1] as f64 / group_totals[1] as f64
        })
        .collect();
    let mut order: Vec<usize> = (0..deltas.len()).collect();
    order.sort_by(|&a, &b| deltas[a].total_cmp(&deltas[b]));

    let positive: Vec<usize> = order.iter().rev().take(2).copied().filter(|&i| deltas[i] > 0.0).collect();
    let negative: Vec<usize> = order.iter().take(2).copied().filter(|&i| deltas[i] < 0.0).collect();
    let positive_sum: f64 = positive.iter().map(|&i| deltas[i]).sum();
    let negative_sum: f64 = negative.iter().map(|&i| deltas[i]).sum();
    let (delta_usage, selected) = if positive_sum > -negative_sum {
        (positive_sum, positive)
    } else {
        (negative_sum, negative)
    };
    Ok(DieResult {
        p_value,
        delta_usage,
        isoforms: selected.into_iter().map(|i| rows[i].0).collect(),
    })
}
