use std::f64::consts::PI;

/// Positions at which the cumulative count first reaches each requested
/// fraction of the total.
///
/// `profile` must be sorted by position and `fractions` ascending.
pub fn weighted_quantiles(profile: &[(i64, u64)], fractions: &[f64]) -> Vec<i64> {
    let total: u64 = profile.iter().map(|(_, count)| count).sum();
    let mut quantiles = Vec::with_capacity(fractions.len());
    let mut cumulative = 0;
    let mut current = 0;
    for &(pos, count) in profile {
        cumulative += count;
        while current < fractions.len() && cumulative as f64 >= total as f64 * fractions[current] {
            quantiles.push(pos);
            current += 1;
        }
        if current == fractions.len() {
            break;
        }
    }
    quantiles
}

/// Symmetric Hann window with `len` points (endpoints are zero).
fn hann_window(len: usize) -> Vec<f64> {
    if len == 1 {
        return vec![1.0];
    }
    (0..len)
        .map(|k| 0.5 - 0.5 * (2.0 * PI * k as f64 / (len - 1) as f64).cos())
        .collect()
}

#[inline]
fn reflect_index(i: isize, n: usize) -> usize {
    let last = n as isize - 1;
    let reflected = if i < 0 {
        -i
    } else if i > last {
        2 * last - i
    } else {
        i
    };
    reflected.clamp(0, last) as usize
}

/// Moving-window smoothing with a normalized Hann window.
///
/// The signal is mirrored at both edges, so the output has the same length as
/// the input and index `i` of the output is centered on index `i` of the input.
pub fn smooth(values: &[f64], window_len: usize) -> Vec<f64> {
    if values.is_empty() || window_len <= 1 {
        return values.to_vec();
    }
    let window = hann_window(window_len);
    let norm: f64 = window.iter().sum();
    let half = (window_len / 2) as isize;
    (0..values.len() as isize)
        .map(|center| {
            window
                .iter()
                .enumerate()
                .map(|(k, w)| w * values[reflect_index(center - half + k as isize, values.len())])
                .sum::<f64>()
                / norm
        })
        .collect()
}

/// Indices of local maxima (flat peaks resolve to their left-of-center
/// midpoint). Edges are never peaks.
fn local_maxima(values: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if values.len() < 3 {
        return peaks;
    }
    let last = values.len() - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                peaks.push((left_edge + right_edge) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}

/// Topographic prominence of the peak at `peak`.
pub fn prominence(values: &[f64], peak: usize) -> f64 {
    let height = values[peak];
    let mut left_min = height;
    for &value in values[..=peak].iter().rev() {
        if value > height {
            break;
        }
        left_min = left_min.min(value);
    }
    let mut right_min = height;
    for &value in &values[peak..] {
        if value > height {
            break;
        }
        right_min = right_min.min(value);
    }
    height - left_min.max(right_min)
}

/// Local maxima whose prominence is at least `min_prominence`.
pub fn find_peaks(values: &[f64], min_prominence: f64) -> Vec<usize> {
    local_maxima(values)
        .into_iter()
        .filter(|&peak| prominence(values, peak) >= min_prominence)
        .collect()
}

/// `1` if `a` exceeds `b` by at least `min_dist`, `-1` if `b` exceeds `a` by at
/// least `min_dist`, `0` otherwise.
pub fn cmp_dist(a: i64, b: i64, min_dist: i64) -> i64 {
    if a >= b + min_dist {
        1
    } else if b >= a + min_dist {
        -1
    } else {
        0
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rng, seq::SliceRandom, Rng};
    use std::collections::BTreeMap;

    #[test]
    fn quantiles_of_uniform_profile() {
        let profile: Vec<(i64, u64)> = (1..=10).map(|p| (p, 1)).collect();
        assert_eq!(weighted_quantiles(&profile, &[0.1, 0.5, 0.9]), vec![1, 5, 9]);
    }

    #[test]
    fn quantiles_respect_weights() {
        let profile = vec![(100, 1), (200, 8), (300, 1)];
        assert_eq!(
            weighted_quantiles(&profile, &[0.1, 0.5, 0.9]),
            vec![100, 200, 200]
        );
    }

    #[test]
    fn quantiles_of_empty_profile() {
        assert!(weighted_quantiles(&[], &[0.5]).is_empty());
    }

    #[test]
    fn hann_window_matches_reference_values() {
        let window = hann_window(5);
        assert_relative_eq!(window[0], 0.0);
        assert_relative_eq!(window[1], 0.5, epsilon = 1e-12);
        assert_relative_eq!(window[2], 1.0);
        assert_relative_eq!(window[4], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn smoothing_preserves_constant_signal() {
        let values = vec![3.0; 40];
        for value in smooth(&values, 31) {
            assert_relative_eq!(value, 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn smoothing_spreads_a_spike_symmetrically() {
        let mut values = vec![0.0; 21];
        values[10] = 10.0;
        let smoothed = smooth(&values, 5);
        assert_eq!(smoothed.len(), 21);
        assert_relative_eq!(smoothed[9], smoothed[11], epsilon = 1e-12);
        assert!(smoothed[10] > smoothed[9]);
        assert_relative_eq!(smoothed[0], 0.0);
    }

    #[test]
    fn peaks_require_prominence() {
        let values = vec![0.0, 5.0, 4.5, 5.2, 0.0, 0.0, 3.0, 0.0];
        // 5.0 is separated from 5.2 by a shallow valley only
        assert_eq!(find_peaks(&values, 1.0), vec![3, 6]);
        assert_eq!(find_peaks(&values, 0.1), vec![1, 3, 6]);
        assert_eq!(find_peaks(&values, 4.0), vec![3]);
    }

    #[test]
    fn flat_peak_resolves_to_midpoint() {
        let values = vec![0.0, 2.0, 2.0, 2.0, 0.0];
        assert_eq!(find_peaks(&values, 1.0), vec![2]);
    }

    #[test]
    fn prominence_of_highest_peak_reaches_lowest_base() {
        let values = vec![1.0, 4.0, 2.0, 6.0, 0.0];
        assert_relative_eq!(prominence(&values, 3), 5.0);
        assert_relative_eq!(prominence(&values, 1), 2.0);
    }

    #[test]
    fn cmp_dist_requires_margin() {
        assert_eq!(cmp_dist(10, 5, 3), 1);
        assert_eq!(cmp_dist(5, 10, 3), -1);
        assert_eq!(cmp_dist(6, 5, 3), 0);
    }

    #[test]
    fn quantiles_match_expanded_positions() {
        let mut rng = rng();
        for _ in 0..100 {
            let n = rng.random_range(1..50);
            let mut positions: Vec<i64> = (0..n).map(|_| rng.random_range(-100..100)).collect();
            positions.shuffle(&mut rng);
            let mut counts: BTreeMap<i64, u64> = BTreeMap::new();
            for &pos in &positions {
                *counts.entry(pos).or_insert(0) += 1;
            }
            let profile: Vec<(i64, u64)> = counts.into_iter().collect();
            positions.sort_unstable();
            for fraction in [0.1, 0.5, 0.9] {
                let rank = ((n as f64 * fraction).ceil() as usize).max(1);
                assert_eq!(weighted_quantiles(&profile, &[fraction]), vec![positions[rank - 1]]);
            }
        }
    }
}
