use super::{
    coding_len, direct_repeat_len, downstream_a_content, map_to_transcript, noncanonical_splicing, spliced_sequence,
    translate_cds, CoverageMatrix, RepeatParams, SampleTable, Transcript, TranscriptFilter,
};
use crate::ends::{unify_ends, UnifyParams};
use crate::events::{coordination_test, die_test, CoordinationParams, DieResult, EventPairTest};
use crate::graph::{EventType, SegmentGraph};
use crate::orf::{build_orf, select_orf, OrfParams};
use crate::utils::{pairwise, Error, GenomeProvider, Interval, Result, Strand};
use once_cell::unsync::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Lazily built structures derived from the transcripts of a gene.
#[derive(Debug, Default)]
struct GeneCache {
    segment_graph: OnceCell<SegmentGraph>,
    ref_segment_graph: OnceCell<SegmentGraph>,
    coverage: OnceCell<CoverageMatrix>,
}

/// A gene with its long-read transcripts and reference transcripts.
///
/// Transcript lists can only be changed through methods that reset the
/// cached segment graphs and coverage matrix.
#[derive(Debug)]
pub struct Gene {
    pub id: String,
    pub name: Option<String>,
    pub chrom: String,
    pub strand: Strand,
    transcripts: Vec<Transcript>,
    ref_transcripts: Vec<Transcript>,
    samples: Arc<SampleTable>,
    cache: GeneCache,
}

fn build_graph(transcripts: &[Transcript], strand: Strand) -> Result<SegmentGraph> {
    let exons: Vec<&[Interval]> = transcripts.iter().map(|t| t.exons.as_slice()).collect();
    SegmentGraph::new(&exons, strand)
}

/// Splice junctions in transcription orientation.
fn oriented_junctions(exons: &[Interval], strand: Strand) -> Vec<(i64, i64)> {
    let mut junctions: Vec<(i64, i64)> = pairwise(exons).map(|(e1, e2)| (e1.end, e2.start)).collect();
    if strand.is_reverse() {
        junctions.reverse();
    }
    junctions
}

impl Gene {
    pub fn new(
        id: &str,
        name: Option<String>,
        chrom: &str,
        strand: Strand,
        transcripts: Vec<Transcript>,
        ref_transcripts: Vec<Transcript>,
        samples: Arc<SampleTable>,
    ) -> Self {
        Gene {
            id: id.to_string(),
            name,
            chrom: chrom.to_string(),
            strand,
            transcripts,
            ref_transcripts,
            samples,
            cache: GeneCache::default(),
        }
    }

    pub fn transcripts(&self) -> &[Transcript] {
        &self.transcripts
    }

    pub fn ref_transcripts(&self) -> &[Transcript] {
        &self.ref_transcripts
    }

    pub fn samples(&self) -> &SampleTable {
        &self.samples
    }

    pub fn is_annotated(&self) -> bool {
        !self.ref_transcripts.is_empty()
    }

    /// Leftmost transcript start, long-read and reference transcripts alike.
    pub fn start(&self) -> i64 {
        self.transcripts
            .iter()
            .chain(&self.ref_transcripts)
            .map(|t| t.start())
            .min()
            .unwrap_or(0)
    }

    pub fn end(&self) -> i64 {
        self.transcripts
            .iter()
            .chain(&self.ref_transcripts)
            .map(|t| t.end())
            .max()
            .unwrap_or(0)
    }

    pub fn invalidate(&mut self) {
        self.cache = GeneCache::default();
    }

    /// Mutable access to the long-read transcripts. Caches are reset.
    pub fn edit_transcripts<R>(&mut self, f: impl FnOnce(&mut Vec<Transcript>) -> R) -> R {
        self.invalidate();
        f(&mut self.transcripts)
    }

    pub fn edit_ref_transcripts<R>(&mut self, f: impl FnOnce(&mut Vec<Transcript>) -> R) -> R {
        self.invalidate();
        f(&mut self.ref_transcripts)
    }

    fn transcript_list(&self, reference: bool) -> &[Transcript] {
        if reference {
            &self.ref_transcripts
        } else {
            &self.transcripts
        }
    }

    pub fn transcript(&self, idx: usize, reference: bool) -> Result<&Transcript> {
        self.transcript_list(reference).get(idx).ok_or_else(|| {
            Error::Data(format!(
                "gene {} has no {}transcript {}",
                self.id,
                if reference { "reference " } else { "" },
                idx
            ))
        })
    }

    fn selected(&self, ids: Option<&[usize]>, reference: bool) -> Vec<(usize, &Transcript)> {
        self.transcript_list(reference)
            .iter()
            .enumerate()
            .filter(|(idx, _)| ids.map_or(true, |ids| ids.contains(idx)))
            .collect()
    }

    pub fn segment_graph(&self) -> Result<&SegmentGraph> {
        self.cache
            .segment_graph
            .get_or_try_init(|| build_graph(&self.transcripts, self.strand))
    }

    pub fn ref_segment_graph(&self) -> Result<&SegmentGraph> {
        self.cache
            .ref_segment_graph
            .get_or_try_init(|| build_graph(&self.ref_transcripts, self.strand))
    }

    /// Samples x transcripts coverage of the long-read transcripts.
    pub fn coverage(&self) -> Result<&CoverageMatrix> {
        self.cache
            .coverage
            .get_or_try_init(|| CoverageMatrix::new(&self.samples, &self.transcripts))
    }

    pub fn tpm(&self, sample: usize, transcript: usize, pseudocount: f64) -> Result<f64> {
        Ok(self.coverage()?.tpm(&self.samples, sample, transcript, pseudocount))
    }

    /// Marks transcripts contained in longer ones. Returns the number of
    /// fragments.
    pub fn add_fragments(&mut self) -> Result<usize> {
        let mut fragments = self.segment_graph()?.find_fragments();
        let n_fragments = fragments.len();
        for (idx, transcript) in self.transcripts.iter_mut().enumerate() {
            transcript.fragments = fragments.remove(&idx);
        }
        Ok(n_fragments)
    }

    /// Finds introns of a transcript that match a reference junction up to a
    /// shift of at most `max_shift`, and with `modify` moves them onto the
    /// reference junction.
    pub fn correct_fuzzy_junctions(
        &mut self,
        transcript: usize,
        max_shift: i64,
        modify: bool,
    ) -> Result<BTreeMap<usize, i64>> {
        if !self.is_annotated() {
            return Ok(BTreeMap::new());
        }
        let shifts = self
            .ref_segment_graph()?
            .fuzzy_junction(&self.transcript(transcript, false)?.exons, max_shift);
        if !modify || shifts.is_empty() {
            return Ok(shifts);
        }
        log::debug!(
            "{}: shifting junctions of transcript {} by {:?}",
            self.id,
            transcript,
            shifts
        );
        self.edit_transcripts(|transcripts| {
            let exons = &mut transcripts[transcript].exons;
            for (&intron, &shift) in &shifts {
                let (left, right) = (exons[intron], exons[intron + 1]);
                if left.start <= left.end + shift && right.start + shift <= right.end {
                    exons[intron].end += shift;
                    exons[intron + 1].start += shift;
                }
            }
            exons.retain(|exon| !exon.is_empty());
        });
        Ok(shifts)
    }

    pub fn add_direct_repeat_len(&mut self, genome: &dyn GenomeProvider, params: &RepeatParams) -> Result<()> {
        let mut cache = HashMap::new();
        for transcript in self.transcripts.iter_mut() {
            transcript.direct_repeat_len = Some(direct_repeat_len(
                genome,
                &self.chrom,
                &transcript.exons,
                params,
                &mut cache,
            )?);
        }
        Ok(())
    }

    /// Records introns without canonical `GTAG` splice sites. Transcripts with
    /// only canonical introns are left without entry.
    pub fn add_noncanonical_splicing(&mut self, genome: &dyn GenomeProvider) -> Result<()> {
        for transcript in self.transcripts.iter_mut() {
            let noncanonical = noncanonical_splicing(genome, &self.chrom, self.strand, &transcript.exons)?;
            transcript.noncanonical_splicing = (!noncanonical.is_empty()).then_some(noncanonical);
        }
        Ok(())
    }

    pub fn add_threeprime_a_content(&mut self, genome: &dyn GenomeProvider, length: i64) -> Result<()> {
        let mut a_content: HashMap<(i64, i64), f64> = HashMap::new();
        for transcript in self.transcripts.iter_mut().chain(self.ref_transcripts.iter_mut()) {
            let key = (transcript.start(), transcript.end());
            let content = match a_content.get(&key) {
                Some(&content) => content,
                None => {
                    let content = downstream_a_content(genome, &self.chrom, self.strand, &transcript.exons, length)?;
                    a_content.insert(key, content);
                    content
                }
            };
            transcript.downstream_a_content = Some(content);
        }
        Ok(())
    }

    /// Spliced sequences in transcription orientation of the selected
    /// transcripts (all if `ids` is `None`).
    pub fn get_sequence(
        &self,
        genome: &dyn GenomeProvider,
        ids: Option<&[usize]>,
        reference: bool,
    ) -> Result<Vec<(usize, String)>> {
        self.selected(ids, reference)
            .into_iter()
            .map(|(idx, transcript)| {
                Ok((
                    idx,
                    spliced_sequence(genome, &self.chrom, self.strand, &transcript.exons)?,
                ))
            })
            .collect()
    }

    /// Protein sequences of the annotated CDS, or the predicted ORF for
    /// transcripts without CDS. Transcripts whose coding sequence does not
    /// translate are skipped.
    pub fn get_protein(
        &self,
        genome: &dyn GenomeProvider,
        ids: Option<&[usize]>,
        reference: bool,
    ) -> Result<Vec<(usize, String)>> {
        let mut proteins = Vec::new();
        for (idx, sequence) in self.get_sequence(genome, ids, reference)? {
            let transcript = &self.transcript_list(reference)[idx];
            let Some((start, end)) = transcript
                .cds
                .map(|(a, b)| (a.min(b), a.max(b)))
                .or_else(|| transcript.orf.as_ref().map(|orf| (orf.start, orf.end)))
            else {
                continue;
            };
            let mapped = map_to_transcript(&transcript.exons, self.strand, &[start, end]);
            let (Some(a), Some(b)) = (mapped[0], mapped[1]) else {
                log::warn!(
                    "{}: coding region {}-{} of {}transcript {} is not exonic",
                    self.id,
                    start,
                    end,
                    if reference { "reference " } else { "" },
                    idx
                );
                continue;
            };
            let coding_seq = &sequence[a.min(b) as usize..a.max(b) as usize];
            match translate_cds(coding_seq) {
                Ok(protein) => proteins.push((idx, protein)),
                Err(e) => log::warn!(
                    "{}: CDS of {}transcript {} cannot be translated: {}",
                    self.id,
                    if reference { "reference " } else { "" },
                    idx,
                    e
                ),
            }
        }
        Ok(proteins)
    }

    /// 5'UTR, CDS and 3'UTR lengths in transcription orientation, for
    /// transcripts with an annotated CDS.
    pub fn coding_len(&self, transcript: usize, reference: bool) -> Result<Option<[i64; 3]>> {
        let transcript = self.transcript(transcript, reference)?;
        Ok(transcript.cds.map(|cds| {
            let mut lengths = coding_len(&transcript.exons, cds);
            if self.strand.is_reverse() {
                lengths.reverse();
            }
            lengths
        }))
    }

    /// Genomic position of the CDS initiation site of a transcript with CDS.
    fn cds_init(&self, transcript: &Transcript) -> Option<i64> {
        transcript.cds.map(|(a, b)| match self.strand {
            Strand::Forward => a.min(b),
            Strand::Reverse => a.max(b),
        })
    }

    /// Transcript offsets of annotated CDS initiation sites, with the reference
    /// transcripts annotating them.
    ///
    /// A reference initiation site applies to a long-read transcript if it is
    /// exonic there and all reference 5'UTR junctions agree with the leading
    /// junctions of the transcript. A reference transcript only anchors its
    /// own CDS.
    pub fn reference_cds_anchor_positions(
        &self,
        transcript: usize,
        reference: bool,
    ) -> Result<BTreeMap<usize, Vec<usize>>> {
        let target = self.transcript(transcript, reference)?;
        let mut anchors: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut add_anchor = |init: i64, ref_id: usize| {
            if let Some(Some(pos)) = map_to_transcript(&target.exons, self.strand, &[init]).first() {
                anchors.entry(*pos as usize).or_default().push(ref_id);
            }
        };
        if reference {
            if let Some(init) = self.cds_init(target) {
                add_anchor(init, transcript);
            }
            return Ok(anchors);
        }

        let target_junctions = oriented_junctions(&target.exons, self.strand);
        for (ref_id, ref_transcript) in self.ref_transcripts.iter().enumerate() {
            let Some(init) = self.cds_init(ref_transcript) else {
                continue;
            };
            if !target.exons.iter().any(|exon| exon.touches(init)) {
                continue;
            }
            let utr_exons: Vec<Interval> = ref_transcript
                .exons
                .iter()
                .filter(|exon| match self.strand {
                    Strand::Forward => exon.start < init,
                    Strand::Reverse => exon.end > init,
                })
                .copied()
                .collect();
            let utr_junctions = oriented_junctions(&utr_exons, self.strand);
            if utr_junctions
                .iter()
                .zip(&target_junctions)
                .all(|(utr, tr)| utr == tr)
            {
                add_anchor(init, ref_id);
            }
        }
        Ok(anchors)
    }

    /// Predicts one ORF per selected transcript. Returns the number of
    /// transcripts with an ORF.
    pub fn add_orfs(
        &mut self,
        genome: &dyn GenomeProvider,
        params: &OrfParams,
        ids: Option<&[usize]>,
        reference: bool,
    ) -> Result<usize> {
        params.validate()?;
        let mut orfs = Vec::new();
        for (idx, sequence) in self.get_sequence(genome, ids, reference)? {
            let anchors = if params.prefer_annotated_init {
                self.reference_cds_anchor_positions(idx, reference)?
            } else {
                BTreeMap::new()
            };
            let Some(selected) = select_orf(&sequence, &anchors, params) else {
                continue;
            };
            let exons = &self.transcript_list(reference)[idx].exons;
            orfs.push((idx, build_orf(exons, self.strand, &sequence, &selected, params)?));
        }
        let n_orfs = orfs.len();
        let transcripts = if reference {
            &mut self.ref_transcripts
        } else {
            &mut self.transcripts
        };
        for (idx, orf) in orfs {
            transcripts[idx].orf = Some(orf);
        }
        Ok(n_orfs)
    }

    pub fn map_to_transcript(&self, transcript: usize, positions: &[i64], reference: bool) -> Result<Vec<Option<i64>>> {
        let transcript = self.transcript(transcript, reference)?;
        Ok(map_to_transcript(&transcript.exons, self.strand, positions))
    }

    /// Tests all pairs of splice events of the given types for coordinated
    /// usage, on the coverage summed over `samples` (all samples if `None`).
    pub fn coordination_test(
        &self,
        samples: Option<&[usize]>,
        event_types: &[EventType],
        params: &CoordinationParams,
    ) -> Result<Vec<EventPairTest>> {
        let all_samples: Vec<usize> = (0..self.samples.len()).collect();
        let coverage = self.coverage()?.sum_samples(samples.unwrap_or(&all_samples));
        let graph = self.segment_graph()?;
        let events = graph.find_splice_bubbles(event_types);
        log::trace!("{}: {} splice events", self.id, events.len());
        coordination_test(graph, &events, &coverage, params)
    }

    /// Differential isoform usage between groups of sample indices.
    pub fn die_test(&self, groups: &[Vec<usize>], min_cov: u64, max_isoforms: usize) -> Result<DieResult> {
        let matrix = self.coverage()?;
        let coverage: Vec<Vec<u64>> = (0..matrix.n_transcripts())
            .map(|t| {
                groups
                    .iter()
                    .map(|group| group.iter().map(|&s| matrix.get(s, t)).sum())
                    .collect()
            })
            .collect();
        die_test(&coverage, min_cov, max_isoforms)
    }

    /// Unifies TSS and PAS positions and resets terminal exon boundaries.
    /// Returns false for genes without TSS or PAS evidence, which are left
    /// unchanged.
    pub fn unify_ends(&mut self, params: &UnifyParams) -> Result<bool> {
        let strand = self.strand;
        let id = self.id.clone();
        let unified = self.edit_transcripts(|transcripts| unify_ends(transcripts, strand, params))?;
        if !unified {
            log::warn!("{}: no TSS/PAS evidence, ends are not unified", id);
        }
        Ok(unified)
    }

    /// Indices of long-read transcripts matching `query` with total coverage
    /// within the given bounds.
    pub fn filter_transcripts(
        &self,
        query: Option<&TranscriptFilter>,
        min_coverage: Option<u64>,
        max_coverage: Option<u64>,
    ) -> Result<Vec<usize>> {
        let coverage = self.coverage()?;
        Ok(self
            .transcripts
            .iter()
            .enumerate()
            .filter(|(idx, transcript)| {
                let total = coverage.transcript_total(*idx);
                min_coverage.map_or(true, |min| total >= min)
                    && max_coverage.map_or(true, |max| total <= max)
                    && query.map_or(true, |q| q.matches(transcript))
            })
            .map(|(idx, _)| idx)
            .collect())
    }

    pub fn filter_ref_transcripts(&self, query: Option<&TranscriptFilter>) -> Vec<usize> {
        self.ref_transcripts
            .iter()
            .enumerate()
            .filter(|(_, transcript)| query.map_or(true, |q| q.matches(transcript)))
            .map(|(idx, _)| idx)
            .collect()
    }
}
