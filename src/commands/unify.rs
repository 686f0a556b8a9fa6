use super::{run_gene_pipeline, PipelineParams, NA};
use crate::cli::UnifyArgs;
use crate::ends::UnifyParams;
use crate::gene::{encode_profile, Gene, SampleProfile, SampleTable};
use crate::utils::{create_writer, Result, TsvWriter};
use itertools::Itertools;
use std::sync::Arc;

const HEADER: [&str; 8] = [
    "gene_id",
    "transcript_id",
    "chrom",
    "strand",
    "exon_starts",
    "exon_ends",
    "TSS",
    "PAS",
];

pub fn unify(args: UnifyArgs) -> Result<()> {
    let params = UnifyParams {
        smooth_window: args.smooth_window,
        rel_prominence: args.rel_prominence,
        search_range: args.search_range,
    };
    params.validate()?;
    let samples = Arc::new(SampleTable::from_path(&args.samples_path)?);

    let writer = create_writer(&args.output_prefix, "unified.tsv.gz", |path| {
        TsvWriter::new(path, &HEADER)
    })?;
    let pipeline = PipelineParams {
        catalog_path: &args.catalog_path,
        samples,
        genome_path: None,
        num_threads: args.num_threads,
    };
    run_gene_pipeline(pipeline, writer, |mut gene, _genome| unified_lines(&mut gene, &params))
}

fn unified_lines(gene: &mut Gene, params: &UnifyParams) -> Result<Vec<String>> {
    gene.unify_ends(params)?;
    let profile = |profile: &Option<SampleProfile>| {
        profile
            .as_ref()
            .map(encode_profile)
            .filter(|encoded| !encoded.is_empty())
            .unwrap_or_else(|| NA.to_string())
    };
    Ok(gene
        .transcripts()
        .iter()
        .map(|transcript| {
            [
                gene.id.clone(),
                transcript.id.clone(),
                gene.chrom.clone(),
                gene.strand.to_string(),
                transcript.exons.iter().map(|e| e.start).join(","),
                transcript.exons.iter().map(|e| e.end).join(","),
                profile(&transcript.tss_unified),
                profile(&transcript.pas_unified),
            ]
            .join("\t")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{SampleInfo, Transcript};
    use crate::utils::{Interval, Strand};

    fn gene(with_ends: bool) -> Gene {
        let samples = Arc::new(SampleTable::new(vec![SampleInfo {
            name: "s1".to_string(),
            group: "ctrl".to_string(),
            total_reads: 100,
        }]));
        let mut transcript = Transcript::new("t1", vec![Interval::new(100, 500).unwrap()]);
        transcript.coverage = [("s1".to_string(), 10)].into();
        if with_ends {
            transcript.tss = Some(SampleProfile::from([("s1".to_string(), [(150, 10)].into())]));
            transcript.pas = Some(SampleProfile::from([("s1".to_string(), [(450, 10)].into())]));
        }
        Gene::new("G1", None, "chr1", Strand::Forward, vec![transcript], Vec::new(), samples)
    }

    #[test]
    fn terminal_exons_move_to_unified_sites() {
        let mut gene = gene(true);
        let lines = unified_lines(&mut gene, &UnifyParams::default()).unwrap();
        assert_eq!(lines, vec!["G1\tt1\tchr1\t+\t150\t450\ts1@150:10\ts1@450:10"]);
    }

    #[test]
    fn genes_without_ends_are_reported_unchanged() {
        let mut gene = gene(false);
        let lines = unified_lines(&mut gene, &UnifyParams::default()).unwrap();
        assert_eq!(lines, vec!["G1\tt1\tchr1\t+\t100\t500\tNA\tNA"]);
    }
}
