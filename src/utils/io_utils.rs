use crate::utils::{Error, Result};
use flate2::{write::GzEncoder, Compression};
use std::{
    fs::File,
    io::{BufWriter, Write},
};

pub fn create_writer<T, F>(output_prefix: &str, output_suffix: &str, f: F) -> Result<T>
where
    F: FnOnce(&str) -> Result<T>,
{
    let output_path = format!("{}.{}", output_prefix, output_suffix);
    f(&output_path)
}

/// Tab-separated output, gzip-compressed when the path ends in `.gz`.
pub struct TsvWriter {
    writer: Box<dyn Write + Send>,
}

impl TsvWriter {
    pub fn new(output_path: &str, header: &[&str]) -> Result<TsvWriter> {
        let file = File::create(output_path)
            .map_err(|e| Error::Config(format!("Cannot create {}: {}", output_path, e)))?;
        let writer: Box<dyn Write + Send> = if output_path.ends_with(".gz") {
            Box::new(BufWriter::new(GzEncoder::new(file, Compression::default())))
        } else {
            Box::new(BufWriter::new(file))
        };
        let mut tsv = TsvWriter { writer };
        tsv.write_line(&format!("#{}", header.join("\t")))?;
        Ok(tsv)
    }

    pub fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{}", line)?;
        Ok(())
    }

    pub fn write_lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            self.write_line(line)?;
        }
        Ok(())
    }
}

impl Drop for TsvWriter {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::error!("Failed to flush output: {}", e);
        }
    }
}
