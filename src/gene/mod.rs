mod catalog;
mod coords;
mod filter;
#[allow(clippy::module_inception)]
mod gene;
mod info;
mod samples;
mod splice_sites;
mod transcript;

pub use catalog::{encode_profile, stream_genes_into_channel, CatalogRecord, GeneReader, TranscriptSource};
pub use coords::{map_to_transcript, transcript_to_genome, OffsetSide};
pub use filter::{FilterExpr, FilterRegistry, Predicate, TranscriptFilter};
pub use gene::Gene;
pub use info::ReportField;
pub use samples::{tpm, CoverageMatrix, SampleInfo, SampleTable};
pub use splice_sites::{
    direct_repeat_len, downstream_a_content, noncanonical_splicing, repeat_len, splice_site_seq, spliced_sequence,
    translate_cds, RepeatParams, CANONICAL_SPLICE_SITE,
};
pub use transcript::{coding_len, Annotation, NoveltyClass, Orf, OrfInfo, SampleProfile, Transcript};
