use super::{open_genome_reader, Error, Result};
use rust_htslib::faidx;
use std::{collections::HashMap, path::Path};

/// Random access to the reference genome.
///
/// Coordinates are 0-based and half-open. Requests reaching past either end of
/// the chromosome are clipped and padded with `N`.
pub trait GenomeProvider {
    fn chrom_len(&self, chrom: &str) -> Result<i64>;

    fn fetch_clipped(&self, chrom: &str, start: i64, end: i64) -> Result<String>;

    fn fetch(&self, chrom: &str, start: i64, end: i64) -> Result<String> {
        if start >= end {
            return Ok(String::new());
        }
        let chrom_len = self.chrom_len(chrom)?;
        let clipped_start = start.clamp(0, chrom_len);
        let clipped_end = end.clamp(0, chrom_len);
        if clipped_start >= clipped_end {
            return Ok("N".repeat((end - start) as usize));
        }
        let mut seq = String::with_capacity((end - start) as usize);
        seq.push_str(&"N".repeat((clipped_start - start) as usize));
        seq.push_str(&self.fetch_clipped(chrom, clipped_start, clipped_end)?);
        seq.push_str(&"N".repeat((end - clipped_end) as usize));
        Ok(seq)
    }
}

/// Indexed FASTA backed genome.
pub struct FaidxGenome {
    reader: faidx::Reader,
}

impl FaidxGenome {
    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self {
            reader: open_genome_reader(path)?,
        })
    }
}

impl GenomeProvider for FaidxGenome {
    fn chrom_len(&self, chrom: &str) -> Result<i64> {
        let len = i64::try_from(self.reader.fetch_seq_len(chrom)).map_err(|_| {
            Error::Genome(format!("FASTA reference does not contain chromosome '{}'", chrom))
        })?;
        if len <= 0 {
            return Err(Error::Genome(format!(
                "FASTA reference does not contain chromosome '{}'",
                chrom
            )));
        }
        Ok(len)
    }

    fn fetch_clipped(&self, chrom: &str, start: i64, end: i64) -> Result<String> {
        // faidx end coordinates are inclusive
        self.reader
            .fetch_seq_string(chrom, start as usize, (end - 1) as usize)
            .map(|seq| seq.to_uppercase())
            .map_err(|e| {
                Error::Genome(format!(
                    "Error fetching sequence for region {}:{}-{}: {}",
                    chrom, start, end, e
                ))
            })
    }
}

/// In-memory genome, used for small references and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryGenome {
    chroms: HashMap<String, String>,
}

impl MemoryGenome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chrom(mut self, name: &str, seq: &str) -> Self {
        self.chroms.insert(name.to_string(), seq.to_uppercase());
        self
    }
}

impl GenomeProvider for MemoryGenome {
    fn chrom_len(&self, chrom: &str) -> Result<i64> {
        self.chroms
            .get(chrom)
            .map(|seq| seq.len() as i64)
            .ok_or_else(|| Error::Genome(format!("Unknown chromosome '{}'", chrom)))
    }

    fn fetch_clipped(&self, chrom: &str, start: i64, end: i64) -> Result<String> {
        let seq = self
            .chroms
            .get(chrom)
            .ok_or_else(|| Error::Genome(format!("Unknown chromosome '{}'", chrom)))?;
        Ok(seq[start as usize..end as usize].to_string())
    }
}
