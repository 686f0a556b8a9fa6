use super::{format_float, require_genome, run_gene_pipeline, PipelineParams, NA};
use crate::cli::OrfArgs;
use crate::commands::annotate::{add_annotations, AnnotationParams};
use crate::gene::{FilterRegistry, Gene, SampleTable, TranscriptFilter};
use crate::orf::{HexamerTable, KozakMatrix, OrfParams};
use crate::utils::{create_writer, GenomeProvider, Result, TsvWriter};
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;

const HEADER: [&str; 18] = [
    "gene_id",
    "transcript_id",
    "chrom",
    "strand",
    "orf_start",
    "orf_end",
    "5utr_len",
    "cds_len",
    "3utr_len",
    "start_codon",
    "stop_codon",
    "nmd",
    "upstream_start_codons",
    "kozak",
    "hexamer",
    "fickett",
    "ref_ids",
    "protein",
];

struct OrfRun {
    params: OrfParams,
    query: Option<TranscriptFilter>,
    reference: bool,
    protein: bool,
}

pub fn orf(args: OrfArgs) -> Result<()> {
    let samples = Arc::new(SampleTable::from_path(&args.samples_path)?);
    let kozak_matrix = match &args.kozak_path {
        Some(path) => KozakMatrix::from_path(path)?,
        None => KozakMatrix::default(),
    };
    let hexamers = args
        .hexamer_path
        .as_deref()
        .map(HexamerTable::from_path)
        .transpose()?;
    let params = OrfParams {
        start_codons: args.start_codons.clone(),
        stop_codons: args.stop_codons.clone(),
        min_len: args.min_len,
        min_kozak: args.min_kozak,
        max_5utr_len: args.max_5utr_len,
        prefer_annotated_init: !args.ignore_annotated_init,
        kozak_matrix: Some(Arc::new(kozak_matrix)),
        hexamers: hexamers.map(Arc::new),
        get_fickett: !args.no_fickett,
    };
    params.validate()?;
    let registry = if args.reference {
        FilterRegistry::reference_defaults()
    } else {
        FilterRegistry::transcript_defaults()
    };
    let query = args.query.as_deref().map(|q| registry.compile(q)).transpose()?;
    let run = OrfRun {
        params,
        query,
        reference: args.reference,
        protein: args.protein,
    };

    let header = if run.protein {
        &HEADER[..]
    } else {
        &HEADER[..HEADER.len() - 1]
    };
    let writer = create_writer(&args.output_prefix, "orf.tsv.gz", |path| TsvWriter::new(path, header))?;
    let pipeline = PipelineParams {
        catalog_path: &args.catalog_path,
        samples,
        genome_path: Some(args.genome_path.clone()),
        num_threads: args.num_threads,
    };
    run_gene_pipeline(pipeline, writer, |mut gene, genome| {
        orf_lines(&mut gene, require_genome(genome)?, &run)
    })
}

fn orf_lines(gene: &mut Gene, genome: &dyn GenomeProvider, run: &OrfRun) -> Result<Vec<String>> {
    let ids = if run.reference {
        gene.filter_ref_transcripts(run.query.as_ref())
    } else {
        if run.query.is_some() {
            // filter rules may rely on sequence annotations
            add_annotations(
                gene,
                genome,
                &AnnotationParams {
                    fuzzy_junction_shift: 0,
                    ..Default::default()
                },
            )?;
        }
        gene.filter_transcripts(run.query.as_ref(), None, None)?
    };
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let n_orfs = gene.add_orfs(genome, &run.params, Some(ids.as_slice()), run.reference)?;
    log::debug!("{}: {} ORFs in {} transcripts", gene.id, n_orfs, ids.len());

    let proteins: HashMap<usize, String> = if run.protein {
        gene.get_protein(genome, Some(ids.as_slice()), run.reference)?
            .into_iter()
            .collect()
    } else {
        HashMap::new()
    };
    let transcripts = if run.reference {
        gene.ref_transcripts()
    } else {
        gene.transcripts()
    };

    let mut lines = Vec::new();
    for idx in ids {
        let transcript = &transcripts[idx];
        let Some(orf) = &transcript.orf else {
            continue;
        };
        let info = &orf.info;
        let ref_ids = if info.ref_ids.is_empty() {
            NA.to_string()
        } else {
            info.ref_ids
                .iter()
                .map(|&r| gene.ref_transcripts()[r].id.as_str())
                .join(",")
        };
        let mut columns = vec![
            gene.id.clone(),
            transcript.id.clone(),
            gene.chrom.clone(),
            gene.strand.to_string(),
            orf.start.to_string(),
            orf.end.to_string(),
            info.five_utr_len.to_string(),
            info.cds_len.to_string(),
            info.three_utr_len.to_string(),
            info.start_codon.clone(),
            info.stop_codon.clone(),
            info.nmd.to_string(),
            info.upstream_start_codons.to_string(),
            format_float(info.kozak),
            format_float(info.hexamer),
            format_float(info.fickett),
            ref_ids,
        ];
        if run.protein {
            columns.push(proteins.get(&idx).cloned().unwrap_or_else(|| NA.to_string()));
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

    fn genome() -> MemoryGenome {
        let seq = format!("{}ATG{}TAA{}", "C".repeat(10), "CCC".repeat(5), "C".repeat(10));
        MemoryGenome::new().with_chrom("chr1", &seq)
    }

    fn gene() -> Gene {
        let samples = Arc::new(SampleTable::new(vec![SampleInfo {
            name: "s1".to_string(),
            group: "ctrl".to_string(),
            total_reads: 100,
        }]));
        let coding = Transcript::new("coding", vec![Interval::new(0, 41).unwrap()]);
        let short = Transcript::new("short", vec![Interval::new(0, 20).unwrap()]);
        let mut reference = Transcript::new("ref", vec![Interval::new(0, 41).unwrap()]);
        reference.cds = Some((10, 31));
        Gene::new(
            "G1",
            None,
            "chr1",
            Strand::Forward,
            vec![coding, short],
            vec![reference],
            samples,
        )
    }

    fn run(reference: bool) -> OrfRun {
        OrfRun {
            params: OrfParams {
                min_len: 10,
                ..Default::default()
            },
            query: None,
            reference,
            protein: true,
        }
    }

    #[test]
    fn anchored_orf_columns() {
        let mut gene = gene();
        let lines = orf_lines(&mut gene, &genome(), &run(false)).unwrap();
        assert_eq!(lines.len(), 1);
        let columns: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(columns.len(), HEADER.len());
        assert_eq!(&columns[..13], &[
            "G1", "coding", "chr1", "+", "10", "31", "10", "21", "10", "ATG", "TAA", "false", "0"
        ]);
        assert_eq!(columns[14], "NA");
        assert_eq!(columns[16], "ref");
        assert_eq!(columns[17], "MPPPPP");
    }

    #[test]
    fn reference_transcripts_with_query() {
        let mut gene = gene();
        let mut run = run(true);
        run.query = Some(FilterRegistry::reference_defaults().compile("HAS_CDS").unwrap());
        let lines = orf_lines(&mut gene, &genome(), &run).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("G1\tref\tchr1\t+\t10\t31\t"));

        run.query = Some(FilterRegistry::reference_defaults().compile("not HAS_CDS").unwrap());
        assert!(orf_lines(&mut gene, &genome(), &run).unwrap().is_empty());
    }
}
