//! Contingency table tests used by the coordination and DIE tests.

use crate::utils::{Error, Result};
use statrs::distribution::{ChiSquared, ContinuousCDF};
use statrs::function::factorial::ln_binomial;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chi2Result {
    pub statistic: f64,
    pub p_value: f64,
    pub dof: usize,
}

/// Chi-squared test of independence on an `r x c` table of counts.
///
/// Tables with a single degree of freedom get Yates' continuity correction.
/// A table with an empty row or column has zero expected frequencies and is
/// rejected.
pub fn chi2_contingency(observed: &[Vec<u64>]) -> Result<Chi2Result> {
    let n_rows = observed.len();
    let n_cols = observed.first().map_or(0, |row| row.len());
    if n_rows == 0 || n_cols == 0 || observed.iter().any(|row| row.len() != n_cols) {
        return Err(Error::Stats(format!(
            "malformed contingency table {:?}",
            observed
        )));
    }

    let row_sums: Vec<f64> = observed
        .iter()
        .map(|row| row.iter().sum::<u64>() as f64)
        .collect();
    let col_sums: Vec<f64> = (0..n_cols)
        .map(|j| observed.iter().map(|row| row[j]).sum::<u64>() as f64)
        .collect();
    let total: f64 = row_sums.iter().sum();

    if row_sums.iter().chain(col_sums.iter()).any(|&s| s == 0.0) {
        return Err(Error::Stats(format!(
            "contingency table {:?} has a zero element in its expected frequencies",
            observed
        )));
    }

    let dof = (n_rows - 1) * (n_cols - 1);
    if dof == 0 {
        return Ok(Chi2Result {
            statistic: 0.0,
            p_value: 1.0,
            dof,
        });
    }

    let mut statistic = 0.0;
    for (i, row) in observed.iter().enumerate() {
        for (j, &count) in row.iter().enumerate() {
            let expected = row_sums[i] * col_sums[j] / total;
            let mut diff = count as f64 - expected;
            if dof == 1 {
                diff = diff.signum() * (diff.abs() - 0.5).max(0.0);
            }
            statistic += diff * diff / expected;
        }
    }

    let distribution = ChiSquared::new(dof as f64).map_err(|e| Error::Stats(e.to_string()))?;
    Ok(Chi2Result {
        statistic,
        p_value: distribution.sf(statistic),
        dof,
    })
}

/// Two-sided Fisher's exact test on a 2x2 table. Returns `(odds_ratio, p_value)`.
pub fn fisher_exact(table: [[u64; 2]; 2]) -> (f64, f64) {
    let [[a, b], [c, d]] = table;
    if a + b == 0 || c + d == 0 || a + c == 0 || b + d == 0 {
        return (f64::NAN, 1.0);
    }
    let odds_ratio = if b > 0 && c > 0 {
        (a * d) as f64 / (b * c) as f64
    } else {
        f64::INFINITY
    };

    let row1 = a + b;
    let row2 = c + d;
    let col1 = a + c;
    let ln_total = ln_binomial(row1 + row2, col1);
    let ln_pmf = |x: u64| ln_binomial(row1, x) + ln_binomial(row2, col1 - x) - ln_total;

    let low = col1.saturating_sub(row2);
    let high = col1.min(row1);
    let observed = ln_pmf(a);
    // relative tolerance for tables as likely as the observed one
    let threshold = observed + (1.0 + 1e-7f64).ln();
    let p_value: f64 = (low..=high)
        .map(ln_pmf)
        .filter(|&lp| lp <= threshold)
        .map(f64::exp)
        .sum();
    (odds_ratio, p_value.min(1.0))
}
