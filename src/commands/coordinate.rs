use super::{format_float, format_p_value, run_gene_pipeline, PipelineParams, NA};
use crate::cli::CoordinateArgs;
use crate::events::{CoordinationParams, EventPairTest};
use crate::gene::{Gene, SampleTable};
use crate::graph::EventType;
use crate::utils::{create_writer, Result, TsvWriter};
use itertools::Itertools;
use std::sync::Arc;

const HEADER: [&str; 23] = [
    "gene_id",
    "gene_name",
    "chrom",
    "strand",
    "type_A",
    "type_B",
    "start_A",
    "end_A",
    "start_B",
    "end_B",
    "p_value",
    "statistic",
    "log2OR",
    "dPSI_AB",
    "dPSI_BA",
    "priA_priB",
    "priA_altB",
    "altA_priB",
    "altA_altB",
    "priA_priB_transcripts",
    "priA_altB_transcripts",
    "altA_priB_transcripts",
    "altA_altB_transcripts",
];

pub fn coordinate(args: CoordinateArgs) -> Result<()> {
    let samples = Arc::new(SampleTable::from_path(&args.samples_path)?);
    let sample_subset: Option<Vec<usize>> = match &args.groups {
        Some(groups) => Some(samples.resolve_groups(groups)?.concat()),
        None => None,
    };
    let params = CoordinationParams {
        test: args.test,
        min_dist: args.min_dist,
        min_total: args.min_total,
        min_alt_fraction: args.min_alt_fraction,
    };
    log::debug!(
        "Testing {} events with {:?}",
        args.event_types.iter().join(","),
        params
    );

    let writer = create_writer(&args.output_prefix, "coordination.tsv.gz", |path| {
        TsvWriter::new(path, &HEADER)
    })?;
    let pipeline = PipelineParams {
        catalog_path: &args.catalog_path,
        samples,
        genome_path: None,
        num_threads: args.num_threads,
    };
    run_gene_pipeline(pipeline, writer, |gene, _genome| {
        coordination_lines(&gene, sample_subset.as_deref(), &args.event_types, &params)
    })
}

fn coordination_lines(
    gene: &Gene,
    samples: Option<&[usize]>,
    event_types: &[EventType],
    params: &CoordinationParams,
) -> Result<Vec<String>> {
    if gene.transcripts().len() < 2 {
        return Ok(Vec::new());
    }
    let results = gene.coordination_test(samples, event_types, params)?;
    Ok(results.iter().map(|result| format_result(gene, result)).collect())
}

fn format_result(gene: &Gene, result: &EventPairTest) -> String {
    let transcript_ids = |ids: &[usize]| {
        if ids.is_empty() {
            NA.to_string()
        } else {
            ids.iter().map(|&t| gene.transcripts()[t].id.as_str()).join(",")
        }
    };
    let [[a, b], [c, d]] = result.counts;
    let [[ta, tb], [tc, td]] = &result.transcripts;
    [
        gene.id.clone(),
        gene.name.clone().unwrap_or_else(|| NA.to_string()),
        gene.chrom.clone(),
        gene.strand.to_string(),
        result.type_a.to_string(),
        result.type_b.to_string(),
        result.coordinate_a.0.to_string(),
        result.coordinate_a.1.to_string(),
        result.coordinate_b.0.to_string(),
        result.coordinate_b.1.to_string(),
        format_p_value(result.p_value),
        format_float(Some(result.statistic)),
        format_float(Some(result.log2_odds_ratio)),
        format_float(Some(result.delta_psi_ab)),
        format_float(Some(result.delta_psi_ba)),
        a.to_string(),
        b.to_string(),
        c.to_string(),
        d.to_string(),
        transcript_ids(ta),
        transcript_ids(tb),
        transcript_ids(tc),
        transcript_ids(td),
    ]
    .join("\t")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TestKind;
    use crate::gene::{SampleInfo, Transcript};
    use crate::utils::{Interval, Strand};

    fn gene() -> Gene {
        let samples = Arc::new(SampleTable::new(vec![
            SampleInfo {
                name: "s1".to_string(),
                group: "ctrl".to_string(),
                total_reads: 1000,
            },
            SampleInfo {
                name: "s2".to_string(),
                group: "case".to_string(),
                total_reads: 1000,
            },
        ]));
        let chains = [
            vec![(0, 100), (200, 300), (400, 500), (600, 700), (800, 900)],
            vec![(0, 100), (400, 500), (600, 700), (800, 900)],
            vec![(0, 100), (200, 300), (400, 500), (800, 900)],
            vec![(0, 100), (400, 500), (800, 900)],
        ];
        let coverage = [50, 10, 10, 40];
        let transcripts = chains
            .iter()
            .zip(coverage)
            .enumerate()
            .map(|(i, (chain, cov))| {
                let exons = chain.iter().map(|&(s, e)| Interval::new(s, e).unwrap()).collect();
                let mut transcript = Transcript::new(&format!("t{}", i + 1), exons);
                transcript.coverage = [("s1".to_string(), cov), ("s2".to_string(), 1)].into();
                transcript
            })
            .collect();
        Gene::new("G1", Some("ABC".to_string()), "chr1", Strand::Forward, transcripts, Vec::new(), samples)
    }

    #[test]
    fn cassette_pair_line() {
        let gene = gene();
        let params = CoordinationParams {
            test: TestKind::Fisher,
            ..Default::default()
        };
        let lines = coordination_lines(&gene, Some(&[0][..]), &EventType::ALL, &params).unwrap();
        assert_eq!(lines.len(), 1);
        let columns: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(columns.len(), HEADER.len());
        assert_eq!(&columns[..10], &["G1", "ABC", "chr1", "+", "ES", "ES", "100", "400", "500", "800"]);
        assert_eq!(columns[11], "20.000");
        assert_eq!(&columns[15..19], &["40", "10", "10", "50"]);
        assert_eq!(columns[19], "t4");
        assert_eq!(columns[22], "t1");
    }

    #[test]
    fn sample_subset_limits_coverage() {
        let gene = gene();
        // s2 alone has 4 reads, below min_total
        let lines = coordination_lines(&gene, Some(&[1][..]), &EventType::ALL, &CoordinationParams::default()).unwrap();
        assert!(lines.is_empty());
    }
}
