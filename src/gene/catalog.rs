use super::{Annotation, Gene, NoveltyClass, SampleProfile, SampleTable, Transcript};
use crate::utils::{open_catalog_reader, Error, Interval, Result, Strand};
use crossbeam_channel::Sender;
use std::{
    collections::{BTreeMap, HashMap},
    io::{BufRead, BufReader, Lines, Read as ioRead},
    iter::Enumerate,
    path::Path,
    sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    Lrts,
    Reference,
}

/// One catalog line: `chrom<TAB>strand<TAB>exons<TAB>info`.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRecord {
    pub chrom: String,
    pub strand: Strand,
    pub gene_id: String,
    pub gene_name: Option<String>,
    pub source: TranscriptSource,
    pub transcript: Transcript,
}

impl CatalogRecord {
    pub fn from_line(line: &str) -> Result<Self> {
        const EXPECTED_FIELD_COUNT: usize = 4;
        let split_line: Vec<&str> = line.trim_end().split('\t').collect();
        let (chrom, strand, exons, info_fields) = match &split_line[..] {
            [chrom, strand, exons, info_fields] => (*chrom, *strand, *exons, *info_fields),
            _ => {
                return Err(Error::Parse(format!(
                    "Expected {} fields in the format 'chrom strand exons info', found {}: {}",
                    EXPECTED_FIELD_COUNT,
                    split_line.len(),
                    line
                )))
            }
        };
        let strand: Strand = strand.parse()?;
        let fields = decode_fields(info_fields)?;
        let get_field = |key: &str| {
            fields
                .get(key)
                .copied()
                .ok_or_else(|| Error::Parse(format!("{} field missing", key)))
        };

        let mut transcript = Transcript::new(get_field("ID")?, decode_exons(exons)?);
        if let Some(coverage) = fields.get("COV") {
            transcript.coverage = decode_coverage(coverage)?;
        }
        if let Some(tss) = fields.get("TSS") {
            transcript.tss = Some(decode_profile(tss)?);
        }
        if let Some(pas) = fields.get("PAS") {
            transcript.pas = Some(decode_profile(pas)?);
        }
        if let Some(cds) = fields.get("CDS") {
            let cds = Interval::from_string(cds)?;
            transcript.cds = Some((cds.start, cds.end));
        }
        if let Some(annotation) = fields.get("ANNOTATION") {
            transcript.annotation = Some(decode_annotation(annotation)?);
        }
        let source = match fields.get("SOURCE").copied() {
            None | Some("lrts") => TranscriptSource::Lrts,
            Some("reference") => TranscriptSource::Reference,
            Some(other) => return Err(Error::Parse(format!("Unknown transcript source '{}'", other))),
        };

        Ok(CatalogRecord {
            chrom: chrom.to_string(),
            strand,
            gene_id: get_field("GENE")?.to_string(),
            gene_name: fields.get("NAME").map(|name| name.to_string()),
            source,
            transcript,
        })
    }
}

fn decode_fields(info_fields: &str) -> Result<HashMap<&str, &str>> {
    let mut fields = HashMap::new();
    for field_encoding in info_fields.split(';').filter(|f| !f.is_empty()) {
        let (name, value) = decode_info_field(field_encoding)?;
        if fields.insert(name, value).is_some() {
            return Err(Error::Parse(format!("Duplicate field name: '{}'", name)));
        }
    }
    Ok(fields)
}

fn decode_info_field(encoding: &str) -> Result<(&str, &str)> {
    match encoding.split_once('=') {
        Some((name, value)) if !name.is_empty() && !value.is_empty() => Ok((name, value)),
        _ => Err(Error::Parse(format!(
            "Field must be in 'name=value' format: '{}'",
            encoding
        ))),
    }
}

fn decode_exons(encoding: &str) -> Result<Vec<Interval>> {
    encoding.split(',').map(Interval::from_string).collect()
}

fn decode_count(encoding: &str) -> Result<(&str, u64)> {
    let error = || Error::Parse(format!("Expected 'key:count', found '{}'", encoding));
    let (key, count) = encoding.rsplit_once(':').ok_or_else(error)?;
    Ok((key, count.parse().map_err(|_| error())?))
}

/// `sample:count,...`
fn decode_coverage(encoding: &str) -> Result<BTreeMap<String, u64>> {
    encoding
        .split(',')
        .map(|entry| decode_count(entry).map(|(sample, count)| (sample.to_string(), count)))
        .collect()
}

/// `sample@pos:count|pos:count,...`
fn decode_profile(encoding: &str) -> Result<SampleProfile> {
    let mut profile = SampleProfile::new();
    for sample_encoding in encoding.split(',') {
        let (sample, positions) = sample_encoding.split_once('@').ok_or_else(|| {
            Error::Parse(format!("Expected 'sample@pos:count|...', found '{}'", sample_encoding))
        })?;
        let counts = profile.entry(sample.to_string()).or_default();
        for entry in positions.split('|') {
            let (pos, count) = decode_count(entry)?;
            let pos: i64 = pos
                .parse()
                .map_err(|_| Error::Parse(format!("Invalid position '{}'", pos)))?;
            *counts.entry(pos).or_insert(0) += count;
        }
    }
    Ok(profile)
}

/// Inverse of the `TSS`/`PAS` field decoding.
pub fn encode_profile(profile: &SampleProfile) -> String {
    profile
        .iter()
        .filter(|(_, counts)| !counts.is_empty())
        .map(|(sample, counts)| {
            let positions: Vec<String> = counts.iter().map(|(pos, count)| format!("{}:{}", pos, count)).collect();
            format!("{}@{}", sample, positions.join("|"))
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// `class[:subcategory,subcategory]`
fn decode_annotation(encoding: &str) -> Result<Annotation> {
    let (class, subcategories) = encoding.split_once(':').unwrap_or((encoding, ""));
    Ok(Annotation {
        class: class.parse::<NoveltyClass>()?,
        subcategories: subcategories
            .split(',')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect(),
    })
}

struct PendingGene {
    id: String,
    name: Option<String>,
    chrom: String,
    strand: Strand,
    transcripts: Vec<Transcript>,
    ref_transcripts: Vec<Transcript>,
}

impl PendingGene {
    fn new(record: CatalogRecord) -> Self {
        let mut gene = PendingGene {
            id: record.gene_id.clone(),
            name: None,
            chrom: record.chrom.clone(),
            strand: record.strand,
            transcripts: Vec::new(),
            ref_transcripts: Vec::new(),
        };
        gene.push(record);
        gene
    }

    fn add(&mut self, record: CatalogRecord) -> Result<()> {
        if record.chrom != self.chrom || record.strand != self.strand {
            return Err(Error::Data(format!(
                "transcript {} at {}:{} does not match gene {} at {}:{}",
                record.transcript.id, record.chrom, record.strand, self.id, self.chrom, self.strand
            )));
        }
        self.push(record);
        Ok(())
    }

    fn push(&mut self, record: CatalogRecord) {
        if self.name.is_none() {
            self.name = record.gene_name;
        }
        match record.source {
            TranscriptSource::Lrts => self.transcripts.push(record.transcript),
            TranscriptSource::Reference => self.ref_transcripts.push(record.transcript),
        }
    }

    fn finish(self, samples: &Arc<SampleTable>) -> Gene {
        Gene::new(
            &self.id,
            self.name,
            &self.chrom,
            self.strand,
            self.transcripts,
            self.ref_transcripts,
            Arc::clone(samples),
        )
    }
}

/// Groups consecutive catalog lines of the same gene. Malformed lines are
/// reported as errors and skipped.
pub struct GeneReader<R> {
    lines: Enumerate<Lines<R>>,
    samples: Arc<SampleTable>,
    current: Option<PendingGene>,
    failed: bool,
}

impl GeneReader<BufReader<Box<dyn ioRead>>> {
    pub fn from_path(path: &Path, samples: Arc<SampleTable>) -> Result<Self> {
        Ok(Self::new(open_catalog_reader(path)?, samples))
    }
}

impl<R: BufRead> GeneReader<R> {
    pub fn new(reader: R, samples: Arc<SampleTable>) -> Self {
        GeneReader {
            lines: reader.lines().enumerate(),
            samples,
            current: None,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for GeneReader<R> {
    type Item = Result<Gene>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let line_error = |line_number: usize, e: Error| {
            Error::Parse(format!("Error at catalog line {}: {}", line_number + 1, e))
        };
        loop {
            let Some((line_number, result_line)) = self.lines.next() else {
                return self.current.take().map(|gene| Ok(gene.finish(&self.samples)));
            };
            let line = match result_line {
                Ok(line) => line,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(line_error(line_number, err.into())));
                }
            };
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }
            let record = match CatalogRecord::from_line(&line) {
                Ok(record) => record,
                Err(e) => return Some(Err(line_error(line_number, e))),
            };
            if let Some(pending) = self.current.as_mut().filter(|g| g.id == record.gene_id) {
                if let Err(e) = pending.add(record) {
                    return Some(Err(line_error(line_number, e)));
                }
                continue;
            }
            if let Some(finished) = self.current.replace(PendingGene::new(record)) {
                return Some(Ok(finished.finish(&self.samples)));
            }
        }
    }
}

pub fn stream_genes_into_channel(
    catalog_path: &Path,
    samples: Arc<SampleTable>,
    sender: Sender<Result<Gene>>,
) {
    let reader = match GeneReader::from_path(catalog_path, samples) {
        Ok(reader) => reader,
        Err(e) => {
            sender
                .send(Err(e))
                .expect("Failed to send error through channel");
            return;
        }
    };
    for gene in reader {
        sender
            .send(gene)
            .expect("Failed to send gene through channel");
    }
}
