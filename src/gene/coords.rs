use crate::utils::{Interval, Strand};

/// Which side of a base a transcript offset refers to when it falls on an
/// exon boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSide {
    /// First base of a feature, e.g. the first base of a start codon.
    Start,
    /// Position just past the last base of a feature.
    End,
}

/// Converts sorted genomic positions into transcript offsets.
///
/// A position is inside an exon if `start <= pos <= end`. Intronic positions
/// and positions outside the transcript map to `None`. On the reverse strand
/// offsets are mirrored so that they count from the transcript 5' end.
pub fn map_to_transcript(exons: &[Interval], strand: Strand, positions: &[i64]) -> Vec<Option<i64>> {
    let mut mapped = Vec::with_capacity(positions.len());
    let mut exon_idx = 0;
    let mut offset = 0;
    for &pos in positions {
        while exon_idx < exons.len() && pos > exons[exon_idx].end {
            offset += exons[exon_idx].len();
            exon_idx += 1;
        }
        let Some(exon) = exons.get(exon_idx) else {
            break;
        };
        mapped.push((pos >= exon.start).then(|| offset + pos - exon.start));
    }
    mapped.resize(positions.len(), None);

    if strand.is_reverse() {
        let length: i64 = exons.iter().map(|e| e.len()).sum();
        mapped
            .iter_mut()
            .for_each(|p| *p = p.map(|offset| length - offset));
    }
    mapped
}

/// Converts an offset in transcription orientation back to a genomic
/// position. Returns `None` for offsets outside `0..=length`.
///
/// On the forward strand a `Start` offset at an exon boundary resolves to the
/// first base of the next exon, an `End` offset to the end of the previous
/// exon. The reverse strand mirrors the offset first, so `Start` and `End`
/// swap roles in genomic orientation.
pub fn transcript_to_genome(
    exons: &[Interval],
    strand: Strand,
    offset: i64,
    side: OffsetSide,
) -> Option<i64> {
    let length: i64 = exons.iter().map(|e| e.len()).sum();
    if offset < 0 || offset > length {
        return None;
    }
    let (fwd_offset, fwd_side) = match strand {
        Strand::Forward => (offset, side),
        Strand::Reverse => (
            length - offset,
            match side {
                OffsetSide::Start => OffsetSide::End,
                OffsetSide::End => OffsetSide::Start,
            },
        ),
    };
    let mut cumulative = 0;
    for exon in exons {
        let next = cumulative + exon.len();
        let inside = match fwd_side {
            OffsetSide::Start => next > fwd_offset,
            OffsetSide::End => next >= fwd_offset,
        };
        if inside {
            return Some(exon.start + fwd_offset - cumulative);
        }
        cumulative = next;
    }
    // a start offset equal to the transcript length
    exons.last().map(|e| e.end)
}
