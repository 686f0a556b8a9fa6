use super::{require_genome, run_gene_pipeline, PipelineParams};
use crate::cli::AnnotateArgs;
use crate::gene::{FilterRegistry, Gene, RepeatParams, ReportField, SampleTable, TranscriptFilter};
use crate::utils::{create_writer, GenomeProvider, Result, TsvWriter};
use std::sync::Arc;

/// Sequence-derived transcript annotations used by reports and filter rules.
#[derive(Debug, Clone)]
pub struct AnnotationParams {
    /// Junctions within this shift of a reference junction are moved onto it,
    /// 0 disables the correction.
    pub fuzzy_junction_shift: i64,
    pub repeat: RepeatParams,
    pub a_content_len: i64,
}

impl Default for AnnotationParams {
    fn default() -> Self {
        AnnotationParams {
            fuzzy_junction_shift: 5,
            repeat: RepeatParams::default(),
            a_content_len: 30,
        }
    }
}

pub fn add_annotations(gene: &mut Gene, genome: &dyn GenomeProvider, params: &AnnotationParams) -> Result<()> {
    if params.fuzzy_junction_shift > 0 {
        for idx in 0..gene.transcripts().len() {
            gene.correct_fuzzy_junctions(idx, params.fuzzy_junction_shift, true)?;
        }
    }
    let n_fragments = gene.add_fragments()?;
    log::trace!("{}: {} fragments", gene.id, n_fragments);
    gene.add_noncanonical_splicing(genome)?;
    gene.add_direct_repeat_len(genome, &params.repeat)?;
    gene.add_threeprime_a_content(genome, params.a_content_len)?;
    Ok(())
}

pub fn annotate(args: AnnotateArgs) -> Result<()> {
    let samples = Arc::new(SampleTable::from_path(&args.samples_path)?);
    let fields = ReportField::parse_list(&args.fields);
    for field in &fields {
        if let ReportField::Unknown(key) = field {
            log::warn!("Unknown report field '{}', reported as NA", key);
        }
    }
    let query = args
        .query
        .as_deref()
        .map(|q| FilterRegistry::transcript_defaults().compile(q))
        .transpose()?;
    let params = AnnotationParams {
        fuzzy_junction_shift: args.fuzzy_junction_shift,
        repeat: RepeatParams {
            delta: args.repeat_delta,
            max_mm: args.repeat_max_mm,
            wobble: args.repeat_wobble,
        },
        a_content_len: args.a_content_len,
    };

    let mut header = vec![
        "gene_id".to_string(),
        "transcript_id".to_string(),
        "chrom".to_string(),
        "strand".to_string(),
    ];
    header.extend(fields.iter().flat_map(|f| f.headers(&samples)));
    let header: Vec<&str> = header.iter().map(String::as_str).collect();
    let writer = create_writer(&args.output_prefix, "transcripts.tsv.gz", |path| {
        TsvWriter::new(path, &header)
    })?;

    let pipeline = PipelineParams {
        catalog_path: &args.catalog_path,
        samples,
        genome_path: Some(args.genome_path.clone()),
        num_threads: args.num_threads,
    };
    run_gene_pipeline(pipeline, writer, |mut gene, genome| {
        add_annotations(&mut gene, require_genome(genome)?, &params)?;
        report_lines(
            &gene,
            &fields,
            query.as_ref(),
            (args.min_coverage, args.max_coverage),
            args.pseudocount,
        )
    })
}

fn report_lines(
    gene: &Gene,
    fields: &[ReportField],
    query: Option<&TranscriptFilter>,
    (min_coverage, max_coverage): (Option<u64>, Option<u64>),
    pseudocount: f64,
) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    for idx in gene.filter_transcripts(query, min_coverage, max_coverage)? {
        let mut columns = vec![
            gene.id.clone(),
            gene.transcripts()[idx].id.clone(),
            gene.chrom.clone(),
            gene.strand.to_string(),
        ];
        for field in fields {
            columns.extend(field.values(gene, idx, pseudocount)?);
        }
        lines.push(columns.join("\t"));
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{SampleInfo, Transcript};
    use crate::utils::{Interval, MemoryGenome, Strand};

    fn gene() -> Gene {
        let samples = Arc::new(SampleTable::new(vec![SampleInfo {
            name: "s1".to_string(),
            group: "ctrl".to_string(),
            total_reads: 1_000_000,
        }]));
        let mut long = Transcript::new(
            "long",
            vec![Interval::new(10, 30).unwrap(), Interval::new(60, 90).unwrap()],
        );
        long.coverage = [("s1".to_string(), 20)].into();
        let mut fragment = Transcript::new("fragment", vec![Interval::new(65, 85).unwrap()]);
        fragment.coverage = [("s1".to_string(), 2)].into();
        let reference = Transcript::new(
            "ref",
            vec![Interval::new(10, 30).unwrap(), Interval::new(60, 90).unwrap()],
        );
        Gene::new(
            "G1",
            Some("ABC".to_string()),
            "chr1",
            Strand::Forward,
            vec![long, fragment],
            vec![reference],
            samples,
        )
    }

    fn genome() -> MemoryGenome {
        let mut seq = "C".repeat(120);
        // canonical intron 30..60
        seq.replace_range(30..32, "GT");
        seq.replace_range(58..60, "AG");
        // A-rich region downstream of the fragment
        seq.replace_range(85..115, &"A".repeat(30));
        MemoryGenome::new().with_chrom("chr1", &seq)
    }

    #[test]
    fn annotations_mark_fragments_and_priming() {
        let mut gene = gene();
        add_annotations(&mut gene, &genome(), &AnnotationParams::default()).unwrap();
        let long = &gene.transcripts()[0];
        assert!(long.noncanonical_splicing.is_none());
        assert_eq!(long.direct_repeat_len.as_ref().map(Vec::len), Some(1));
        let fragment = &gene.transcripts()[1];
        assert!(fragment.fragments.as_ref().is_some_and(|f| !f.is_empty()));
        assert!(fragment.downstream_a_content.unwrap() > 0.5);
    }

    #[test]
    fn report_respects_query_and_coverage() {
        let mut gene = gene();
        add_annotations(&mut gene, &genome(), &AnnotationParams::default()).unwrap();
        let fields = ReportField::parse_list("n_exons,coverage");
        let query = FilterRegistry::transcript_defaults()
            .compile("not FRAGMENT")
            .unwrap();
        let lines = report_lines(&gene, &fields, Some(&query), (None, None), 1.0).unwrap();
        assert_eq!(lines, vec!["G1\tlong\tchr1\t+\t2\t20"]);

        let lines = report_lines(&gene, &fields, None, (Some(5), None), 1.0).unwrap();
        assert_eq!(lines.len(), 1);
        let lines = report_lines(&gene, &fields, None, (None, Some(5)), 1.0).unwrap();
        assert_eq!(lines, vec!["G1\tfragment\tchr1\t+\t1\t2"]);
    }
}
