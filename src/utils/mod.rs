mod error;
mod genome;
mod interval;
mod io_utils;
pub mod math;
mod readers;
pub mod stats;

pub use error::{handle_error_and_exit, Error, Result};
pub use genome::{FaidxGenome, GenomeProvider, MemoryGenome};
pub use interval::{pairwise, Interval, Strand};
pub use io_utils::{create_writer, TsvWriter};
pub use readers::{open_catalog_reader, open_genome_reader};
