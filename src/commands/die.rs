use super::{format_float, format_p_value, run_gene_pipeline, PipelineParams, NA};
use crate::cli::DieArgs;
use crate::events::IsoformIndex;
use crate::gene::{Gene, SampleTable};
use crate::utils::{create_writer, Error, Result, TsvWriter};
use itertools::Itertools;
use std::sync::Arc;

const HEADER: [&str; 7] = [
    "gene_id",
    "gene_name",
    "chrom",
    "strand",
    "p_value",
    "delta_usage",
    "isoforms",
];

pub fn die(args: DieArgs) -> Result<()> {
    if args.groups.len() < 2 {
        return Err(Error::Config(format!(
            "At least two sample groups are required, got: {}",
            args.groups.join(",")
        )));
    }
    let samples = Arc::new(SampleTable::from_path(&args.samples_path)?);
    let groups = samples.resolve_groups(&args.groups)?;
    log::info!(
        "Comparing groups {} with {} samples",
        args.groups.join(" vs "),
        groups.iter().map(Vec::len).join("/")
    );

    let writer = create_writer(&args.output_prefix, "die.tsv.gz", |path| TsvWriter::new(path, &HEADER))?;
    let pipeline = PipelineParams {
        catalog_path: &args.catalog_path,
        samples,
        genome_path: None,
        num_threads: args.num_threads,
    };
    run_gene_pipeline(pipeline, writer, |gene, _genome| {
        die_lines(&gene, &groups, args.min_cov, args.max_isoforms)
    })
}

fn die_lines(gene: &Gene, groups: &[Vec<usize>], min_cov: u64, max_isoforms: usize) -> Result<Vec<String>> {
    let result = gene.die_test(groups, min_cov, max_isoforms)?;
    if !result.is_tested() {
        return Ok(Vec::new());
    }
    let isoforms = if result.isoforms.is_empty() {
        NA.to_string()
    } else {
        result
            .isoforms
            .iter()
            .map(|isoform| match isoform {
                IsoformIndex::Transcript(t) => gene.transcripts()[*t].id.clone(),
                IsoformIndex::Other => isoform.to_string(),
            })
            .join(",")
    };
    Ok(vec![[
        gene.id.clone(),
        gene.name.clone().unwrap_or_else(|| NA.to_string()),
        gene.chrom.clone(),
        gene.strand.to_string(),
        format_p_value(result.p_value),
        format_float(Some(result.delta_usage)),
        isoforms,
    ]
    .join("\t")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gene::{SampleInfo, Transcript};
    use crate::utils::{Interval, Strand};

    fn gene() -> Gene {
        let sample = |name: &str, group: &str| SampleInfo {
            name: name.to_string(),
            group: group.to_string(),
            total_reads: 1000,
        };
        let samples = Arc::new(SampleTable::new(vec![
            sample("a1", "ctrl"),
            sample("a2", "ctrl"),
            sample("b1", "case"),
        ]));
        let transcript = |id: &str, start: i64, counts: [u64; 3]| {
            let mut t = Transcript::new(id, vec![Interval::new(start, start + 100).unwrap()]);
            t.coverage = ["a1", "a2", "b1"]
                .iter()
                .zip(counts)
                .map(|(s, c)| (s.to_string(), c))
                .collect();
            t
        };
        Gene::new(
            "G1",
            None,
            "chr1",
            Strand::Reverse,
            vec![
                transcript("t1", 0, [25, 25, 10]),
                transcript("t2", 50, [5, 5, 45]),
                transcript("t3", 100, [5, 5, 5]),
                transcript("t4", 150, [5, 5, 5]),
            ],
            Vec::new(),
            samples,
        )
    }

    #[test]
    fn switching_gene_line() {
        let gene = gene();
        let groups = gene.samples().resolve_groups(&["ctrl".to_string(), "case".to_string()]).unwrap();
        let lines = die_lines(&gene, &groups, 25, 10).unwrap();
        assert_eq!(lines.len(), 1);
        let columns: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(&columns[..4], &["G1", "NA", "chr1", "-"]);
        assert_eq!(columns[5], "-0.567");
        assert_eq!(columns[6], "t2");
    }

    #[test]
    fn untested_genes_are_not_reported() {
        let gene = gene();
        let groups = gene.samples().resolve_groups(&["ctrl".to_string(), "case".to_string()]).unwrap();
        assert!(die_lines(&gene, &groups, 100, 10).unwrap().is_empty());
    }
}
