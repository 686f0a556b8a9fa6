use crate::gene::{SampleProfile, Transcript};
use crate::utils::math::{cmp_dist, find_peaks, smooth, weighted_quantiles};
use crate::utils::{Error, Result, Strand};
use std::collections::BTreeMap;

/// Minimal distance of a unified TSS/PAS to the adjacent splice junction.
const MIN_JUNCTION_DIST: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnifyParams {
    pub smooth_window: usize,
    /// Minimal peak prominence on the log2 scale of the smoothed profile.
    pub rel_prominence: f64,
    /// Quantiles of a group's read ends that peaks must lie between.
    pub search_range: (f64, f64),
}

impl Default for UnifyParams {
    fn default() -> Self {
        UnifyParams {
            smooth_window: 31,
            rel_prominence: 1.0,
            search_range: (0.1, 0.9),
        }
    }
}

impl UnifyParams {
    pub fn validate(&self) -> Result<()> {
        let (low, high) = self.search_range;
        if !(0.0 <= low && low <= 0.5 && 0.5 <= high && high <= 1.0) {
            return Err(Error::Config(format!(
                "search range ({}, {}) must satisfy 0 <= low <= 0.5 <= high <= 1",
                low, high
            )));
        }
        if self.smooth_window == 0 {
            return Err(Error::Config("smooth window must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Tss,
    Pas,
}

impl End {
    fn profile(self, transcript: &Transcript) -> Option<&SampleProfile> {
        match self {
            End::Tss => transcript.tss.as_ref(),
            End::Pas => transcript.pas.as_ref(),
        }
    }

    fn unified_mut(self, transcript: &mut Transcript) -> &mut Option<SampleProfile> {
        match self {
            End::Tss => &mut transcript.tss_unified,
            End::Pas => &mut transcript.pas_unified,
        }
    }

    /// Splice junction next to this end, used to group transcripts.
    fn junction(self, transcript: &Transcript, strand: Strand) -> Option<i64> {
        let first_junction = transcript.exons.first().map(|e| e.end);
        let last_junction = transcript.exons.last().map(|e| e.start);
        match (self, strand) {
            (End::Tss, Strand::Forward) | (End::Pas, Strand::Reverse) => first_junction,
            (End::Tss, Strand::Reverse) | (End::Pas, Strand::Forward) => last_junction,
        }
    }

    /// Whether `pos` lies on the transcribed side of `junction`.
    fn is_valid_site(self, pos: i64, junction: i64, strand: Strand) -> bool {
        match self {
            End::Tss => cmp_dist(junction, pos, MIN_JUNCTION_DIST) == strand.sign(),
            End::Pas => cmp_dist(pos, junction, MIN_JUNCTION_DIST) == strand.sign(),
        }
    }
}

fn pooled_profile<'a>(profiles: impl Iterator<Item = &'a SampleProfile>) -> BTreeMap<i64, u64> {
    let mut pooled = BTreeMap::new();
    for counts in profiles.flat_map(|profile| profile.values()) {
        for (&pos, &count) in counts {
            *pooled.entry(pos).or_insert(0) += count;
        }
    }
    pooled
}

/// Peak positions of the smoothed gene-wide profile.
fn call_peaks(histogram: &BTreeMap<i64, u64>, params: &UnifyParams) -> Vec<i64> {
    let (Some((&first, _)), Some((&last, _))) = (histogram.first_key_value(), histogram.last_key_value()) else {
        return Vec::new();
    };
    let window = params.smooth_window as i64;
    let first = if last - first < window {
        first - (window + first - last - 1)
    } else {
        first
    };
    let values: Vec<f64> = (first..=last)
        .map(|pos| histogram.get(&pos).copied().unwrap_or(0) as f64)
        .collect();
    let log_smoothed: Vec<f64> = smooth(&values, params.smooth_window)
        .into_iter()
        .map(|v| (v + 1.0).log2())
        .collect();
    find_peaks(&log_smoothed, params.rel_prominence)
        .into_iter()
        .map(|idx| first + idx as i64)
        .collect()
}

/// Reassigns the read ends of `end` to consensus sites, per group of
/// transcripts sharing the adjacent splice junction.
fn unify_end(transcripts: &mut [Transcript], strand: Strand, end: End, params: &UnifyParams) {
    let peaks = call_peaks(
        &pooled_profile(transcripts.iter().filter_map(|t| end.profile(t))),
        params,
    );

    let mut groups: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
    for (idx, transcript) in transcripts.iter().enumerate() {
        if let Some(junction) = end.junction(transcript, strand) {
            groups.entry(junction).or_default().push(idx);
        }
    }

    for (junction, members) in groups {
        let profile: Vec<(i64, u64)> =
            pooled_profile(members.iter().filter_map(|&idx| end.profile(&transcripts[idx])))
                .into_iter()
                .collect();
        let quantiles = weighted_quantiles(&profile, &[params.search_range.0, 0.5, params.search_range.1]);
        let [low, median, high] = quantiles[..] else {
            continue;
        };
        let mut candidates: Vec<i64> = peaks.iter().copied().filter(|&p| low < p && p <= high).collect();
        if candidates.is_empty() {
            candidates.push(median);
        }
        candidates.retain(|&p| end.is_valid_site(p, junction, strand));

        for &idx in &members {
            let Some(raw) = end.profile(&transcripts[idx]) else {
                continue;
            };
            let unified: SampleProfile = raw
                .iter()
                .map(|(sample, counts)| {
                    let mut sample_unified = BTreeMap::new();
                    for (&pos, &count) in counts {
                        let site = candidates
                            .iter()
                            .copied()
                            .min_by_key(|&p| (p - pos).abs())
                            .unwrap_or(pos);
                        *sample_unified.entry(site).or_insert(0) += count;
                    }
                    (sample.clone(), sample_unified)
                })
                .collect();
            *end.unified_mut(&mut transcripts[idx]) = Some(unified);
        }
    }
}

/// Most supported position of a unified profile, the leftmost one on ties.
fn dominant_site(profile: Option<&SampleProfile>) -> Option<i64> {
    let summed = pooled_profile(profile.into_iter());
    let mut best: Option<(i64, u64)> = None;
    for (pos, count) in summed {
        if best.map_or(true, |(_, max)| count > max) {
            best = Some((pos, count));
        }
    }
    best.map(|(pos, _)| pos)
}

fn set_boundaries(transcript: &mut Transcript, strand: Strand) -> Result<()> {
    let tss = dominant_site(transcript.tss_unified.as_ref());
    let pas = dominant_site(transcript.pas_unified.as_ref());
    let (new_start, new_end) = match strand {
        Strand::Forward => (tss, pas),
        Strand::Reverse => (pas, tss),
    };
    let start = new_start.unwrap_or_else(|| transcript.start());
    let end = new_end.unwrap_or_else(|| transcript.end());
    let n_exons = transcript.exons.len();
    let inconsistent = |reason: &str| {
        log::error!(
            "Cannot unify ends of {} with exons {:?}: {} (TSS={:?}, PAS={:?}, unified TSS={:?}, unified PAS={:?})",
            transcript.id,
            transcript.exons,
            reason,
            transcript.tss,
            transcript.pas,
            transcript.tss_unified,
            transcript.pas_unified
        );
        Error::Data(format!(
            "inconsistent unified ends of transcript {}: {}",
            transcript.id, reason
        ))
    };

    if start >= end {
        if n_exons == 1 {
            transcript.tss_unified = None;
            transcript.pas_unified = None;
            return Ok(());
        }
        return Err(inconsistent(&format!("start {} >= end {}", start, end)));
    }
    if n_exons > 1 && start >= transcript.exons[0].end {
        return Err(inconsistent(&format!(
            "start {} >= first exon end {}",
            start, transcript.exons[0].end
        )));
    }
    if n_exons > 1 && end <= transcript.exons[n_exons - 1].start {
        return Err(inconsistent(&format!(
            "end {} <= last exon start {}",
            end,
            transcript.exons[n_exons - 1].start
        )));
    }
    if let Some(first) = transcript.exons.first_mut() {
        first.start = start;
    }
    if let Some(last) = transcript.exons.last_mut() {
        last.end = end;
    }
    Ok(())
}

/// Replaces noisy read start and end positions by consensus TSS and PAS and
/// moves the terminal exon boundaries to the dominant sites.
///
/// Returns `false` if the transcripts carry no TSS or PAS evidence.
pub fn unify_ends(transcripts: &mut [Transcript], strand: Strand, params: &UnifyParams) -> Result<bool> {
    params.validate()?;
    let has_evidence = |end: End| {
        transcripts
            .iter()
            .filter_map(|t| end.profile(t))
            .flat_map(|profile| profile.values())
            .any(|counts| !counts.is_empty())
    };
    if !has_evidence(End::Tss) || !has_evidence(End::Pas) {
        return Ok(false);
    }

    unify_end(transcripts, strand, End::Tss, params);
    unify_end(transcripts, strand, End::Pas, params);
    for transcript in transcripts.iter_mut() {
        set_boundaries(transcript, strand)?;
    }
    Ok(true)
}
