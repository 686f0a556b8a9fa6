use crate::events::TestKind;
use crate::graph::EventType;
use chrono::Datelike;
use clap::{ArgAction, ArgGroup, Parser, Subcommand};
use env_logger::fmt::Color;
use log::{Level, LevelFilter};
use once_cell::sync::Lazy;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub static FULL_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    )
});

#[derive(Parser)]
#[command(name="isograph",
          version=&**FULL_VERSION,
          long_about = None,
          disable_help_subcommand = true,
          after_help = format!("Copyright (C) 2023-{}     isograph developers
This program comes with ABSOLUTELY NO WARRANTY.", chrono::Utc::now().year()),
          help_template = "{name} {version}\n{about-section}\n{usage-heading}\n    {usage}\n\n{all-args}{after-help}",
          )]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[clap(short = 'v')]
    #[clap(long = "verbose")]
    #[clap(action = ArgAction::Count, help = "Specify multiple times to increase verbosity level (e.g., -vv for more verbosity)")]
    pub verbosity: u8,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Predict open reading frames")]
    Orf(OrfArgs),
    #[clap(about = "Annotate fragments, splice sites and internal priming")]
    Annotate(AnnotateArgs),
    #[clap(about = "Test splice event pairs for coordinated usage")]
    Coordinate(CoordinateArgs),
    #[clap(about = "Test for differential isoform usage between sample groups")]
    Die(DieArgs),
    #[clap(about = "Unify transcription start and polyadenylation sites")]
    Unify(UnifyArgs),
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("orf")))]
#[command(arg_required_else_help(true))]
pub struct OrfArgs {
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "catalog")]
    #[clap(help = "Transcript catalog grouped by gene")]
    #[clap(value_name = "CATALOG")]
    #[arg(value_parser = check_file_exists)]
    pub catalog_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "samples")]
    #[clap(help = "Sample table with group and total read count per sample")]
    #[clap(value_name = "SAMPLES")]
    #[arg(value_parser = check_file_exists)]
    pub samples_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "reference")]
    #[clap(help = "Predict ORFs of the reference transcripts")]
    pub reference: bool,

    #[clap(long = "query")]
    #[clap(value_name = "QUERY")]
    #[clap(help = "Filter query selecting the transcripts, e.g. 'not (FRAGMENT or MONOEXON)'")]
    pub query: Option<String>,

    #[clap(long = "protein")]
    #[clap(help = "Report the translated ORF")]
    pub protein: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-len")]
    #[clap(value_name = "LENGTH")]
    #[clap(help = "Minimal coding length of unannotated ORFs")]
    #[clap(default_value = "300")]
    pub min_len: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-kozak")]
    #[clap(value_name = "SCORE")]
    #[clap(help = "Minimal Kozak score of unannotated ORFs")]
    pub min_kozak: Option<f64>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "max-5utr-len")]
    #[clap(value_name = "LENGTH")]
    #[clap(help = "Maximal 5'UTR length of unannotated ORFs")]
    pub max_5utr_len: Option<usize>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "ignore-annotated-init")]
    #[clap(help = "Do not prefer annotated CDS initiation sites")]
    pub ignore_annotated_init: bool,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "start-codons")]
    #[clap(value_name = "CODONS")]
    #[clap(help = "Comma separated start codons")]
    #[clap(default_value = "ATG")]
    #[clap(value_delimiter = ',')]
    #[arg(value_parser = codon_from_string)]
    pub start_codons: Vec<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "stop-codons")]
    #[clap(value_name = "CODONS")]
    #[clap(help = "Comma separated stop codons")]
    #[clap(default_value = "TAA,TAG,TGA")]
    #[clap(value_delimiter = ',')]
    #[arg(value_parser = codon_from_string)]
    pub stop_codons: Vec<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "kozak-matrix")]
    #[clap(value_name = "PWM")]
    #[clap(help = "Kozak position weight matrix, the built-in matrix is used by default")]
    #[arg(value_parser = check_file_exists)]
    pub kozak_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "hexamers")]
    #[clap(value_name = "HEXAMERS")]
    #[clap(help = "Coding and noncoding hexamer frequencies")]
    #[arg(value_parser = check_file_exists)]
    pub hexamer_path: Option<PathBuf>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "no-fickett")]
    #[clap(help = "Skip the Fickett score")]
    pub no_fickett: bool,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("annotate")))]
#[command(arg_required_else_help(true))]
pub struct AnnotateArgs {
    #[clap(required = true)]
    #[clap(short = 'g')]
    #[clap(long = "genome")]
    #[clap(help = "Path to reference genome FASTA")]
    #[clap(value_name = "FASTA")]
    #[arg(value_parser = check_file_exists)]
    pub genome_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "catalog")]
    #[clap(help = "Transcript catalog grouped by gene")]
    #[clap(value_name = "CATALOG")]
    #[arg(value_parser = check_file_exists)]
    pub catalog_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "samples")]
    #[clap(help = "Sample table with group and total read count per sample")]
    #[clap(value_name = "SAMPLES")]
    #[arg(value_parser = check_file_exists)]
    pub samples_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "fields")]
    #[clap(value_name = "FIELDS")]
    #[clap(help = "Comma separated report fields")]
    #[clap(
        default_value = "length,n_exons,annotation,coverage,fragments,noncanonical_splicing,direct_repeat_len,downstream_A_content"
    )]
    pub fields: String,

    #[clap(long = "query")]
    #[clap(value_name = "QUERY")]
    #[clap(help = "Filter query selecting the reported transcripts")]
    pub query: Option<String>,

    #[clap(long = "min-coverage")]
    #[clap(value_name = "READS")]
    #[clap(help = "Minimal total coverage of reported transcripts")]
    pub min_coverage: Option<u64>,

    #[clap(long = "max-coverage")]
    #[clap(value_name = "READS")]
    #[clap(help = "Maximal total coverage of reported transcripts")]
    pub max_coverage: Option<u64>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "fuzzy-junction-shift")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Move junctions within this shift onto reference junctions (0 to disable)")]
    #[clap(default_value = "5")]
    pub fuzzy_junction_shift: i64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "repeat-delta")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Window around splice sites searched for direct repeats")]
    #[clap(default_value = "15")]
    pub repeat_delta: i64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "repeat-max-mm")]
    #[clap(value_name = "MISMATCHES")]
    #[clap(help = "Mismatches tolerated within direct repeats")]
    #[clap(default_value = "2")]
    pub repeat_max_mm: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "repeat-wobble")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Offsets tested between donor and acceptor windows")]
    #[clap(default_value = "2")]
    pub repeat_wobble: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "a-content-len")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Length of the genomic region downstream of transcripts checked for A content")]
    #[clap(default_value = "30")]
    pub a_content_len: i64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "pseudocount")]
    #[clap(value_name = "COUNT")]
    #[clap(help = "Pseudocount added to coverage for TPM values")]
    #[clap(default_value = "1")]
    pub pseudocount: f64,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("coordinate")))]
#[command(arg_required_else_help(true))]
pub struct CoordinateArgs {
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "catalog")]
    #[clap(help = "Transcript catalog grouped by gene")]
    #[clap(value_name = "CATALOG")]
    #[arg(value_parser = check_file_exists)]
    pub catalog_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "samples")]
    #[clap(help = "Sample table with group and total read count per sample")]
    #[clap(value_name = "SAMPLES")]
    #[arg(value_parser = check_file_exists)]
    pub samples_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(long = "groups")]
    #[clap(value_name = "GROUPS")]
    #[clap(help = "Comma separated sample groups whose coverage is tested, all samples by default")]
    #[clap(value_delimiter = ',')]
    pub groups: Option<Vec<String>>,

    #[clap(long = "event-types")]
    #[clap(value_name = "TYPES")]
    #[clap(help = "Comma separated event types (ES, 5AS, 3AS, IR, ME, TSS, PAS)")]
    #[clap(default_value = "ES,5AS,3AS,IR,ME")]
    #[clap(value_delimiter = ',')]
    #[arg(value_parser = event_type_from_string)]
    pub event_types: Vec<EventType>,

    #[clap(long = "test")]
    #[clap(value_name = "TEST")]
    #[clap(help = "Independence test (chi2 or fisher)")]
    #[clap(default_value = "chi2")]
    #[arg(value_parser = test_kind_from_string)]
    pub test: TestKind,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-dist")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Minimal distance between the two events of a pair")]
    #[clap(default_value = "1")]
    pub min_dist: i64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-total")]
    #[clap(value_name = "READS")]
    #[clap(help = "Minimal number of reads covering an event pair")]
    #[clap(default_value = "100")]
    pub min_total: u64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-alt-fraction")]
    #[clap(value_name = "FRACTION")]
    #[clap(help = "Minimal fraction of reads supporting the minor state of an event")]
    #[clap(default_value = "0.1")]
    #[arg(value_parser = ensure_unit_float)]
    pub min_alt_fraction: f64,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("die")))]
#[command(arg_required_else_help(true))]
pub struct DieArgs {
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "catalog")]
    #[clap(help = "Transcript catalog grouped by gene")]
    #[clap(value_name = "CATALOG")]
    #[arg(value_parser = check_file_exists)]
    pub catalog_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "samples")]
    #[clap(help = "Sample table with group and total read count per sample")]
    #[clap(value_name = "SAMPLES")]
    #[arg(value_parser = check_file_exists)]
    pub samples_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(required = true)]
    #[clap(long = "groups")]
    #[clap(value_name = "GROUPS")]
    #[clap(help = "Comma separated sample groups to compare, at least two")]
    #[clap(value_delimiter = ',')]
    pub groups: Vec<String>,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "min-cov")]
    #[clap(value_name = "READS")]
    #[clap(help = "Minimal gene coverage in each group")]
    #[clap(default_value = "25")]
    pub min_cov: u64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "max-isoforms")]
    #[clap(value_name = "COUNT")]
    #[clap(help = "Most covered isoforms tested individually, the rest are pooled")]
    #[clap(default_value = "10")]
    pub max_isoforms: usize,
}

#[derive(Parser, Debug)]
#[command(group(ArgGroup::new("unify")))]
#[command(arg_required_else_help(true))]
pub struct UnifyArgs {
    #[clap(required = true)]
    #[clap(short = 'c')]
    #[clap(long = "catalog")]
    #[clap(help = "Transcript catalog grouped by gene")]
    #[clap(value_name = "CATALOG")]
    #[arg(value_parser = check_file_exists)]
    pub catalog_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 's')]
    #[clap(long = "samples")]
    #[clap(help = "Sample table with group and total read count per sample")]
    #[clap(value_name = "SAMPLES")]
    #[arg(value_parser = check_file_exists)]
    pub samples_path: PathBuf,

    #[clap(required = true)]
    #[clap(short = 'o')]
    #[clap(long = "output-prefix")]
    #[clap(help = "Prefix for output files")]
    #[clap(value_name = "OUTPUT_PREFIX")]
    #[arg(value_parser = check_prefix_path)]
    pub output_prefix: String,

    #[clap(short = 't')]
    #[clap(long = "threads")]
    #[clap(help = "Number of threads")]
    #[clap(value_name = "THREADS")]
    #[clap(default_value = "1")]
    #[arg(value_parser = threads_in_range)]
    pub num_threads: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "smooth-window")]
    #[clap(value_name = "BASES")]
    #[clap(help = "Width of the Hann window smoothing the end profiles")]
    #[clap(default_value = "31")]
    pub smooth_window: usize,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "rel-prominence")]
    #[clap(value_name = "PROMINENCE")]
    #[clap(help = "Minimal peak prominence on the log2 scale")]
    #[clap(default_value = "1.0")]
    pub rel_prominence: f64,

    #[clap(help_heading("Advanced"))]
    #[clap(long = "search-range")]
    #[clap(value_name = "LOW,HIGH")]
    #[clap(help = "Quantiles of read ends between which peaks are searched")]
    #[clap(default_value = "0.1,0.9")]
    #[arg(value_parser = range_from_string)]
    pub search_range: (f64, f64),
}

pub fn init_verbose(args: &Cli) {
    let filter_level: LevelFilter = match args.verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            let level = record.level();
            let mut style = buf.style();
            match record.level() {
                Level::Error => style.set_color(Color::Red),
                Level::Warn => style.set_color(Color::Yellow),
                Level::Info => style.set_color(Color::Green),
                Level::Debug => style.set_color(Color::Blue),
                Level::Trace => style.set_color(Color::Cyan),
            };

            writeln!(
                buf,
                "{} [{}] - {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                style.value(level),
                record.args()
            )
        })
        .filter_level(filter_level)
        .init();
}

fn check_prefix_path(s: &str) -> Result<String, String> {
    let path = Path::new(s);
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            return Err(format!("Path does not exist: {}", parent_dir.display()));
        }
    }
    Ok(s.to_string())
}

fn threads_in_range(s: &str) -> Result<usize, String> {
    let thread: usize = s
        .parse()
        .map_err(|_| format!("`{}` is not a valid thread number", s))?;
    if thread >= 1 {
        Ok(thread)
    } else {
        Err("Number of threads must be at least 1".into())
    }
}

fn check_file_exists(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);
    if !path.exists() {
        Err(format!("File does not exist: {}", path.display()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn ensure_unit_float(s: &str) -> Result<f64, String> {
    let value = s
        .parse::<f64>()
        .map_err(|e| format!("Could not parse float: {}", e))?;
    if !(0.0..=1.0).contains(&value) {
        Err(format!(
            "The value must be between 0.0 and 1.0, got: {}",
            value
        ))
    } else {
        Ok(value)
    }
}

fn codon_from_string(s: &str) -> Result<String, String> {
    let codon = s.trim().to_uppercase();
    if codon.len() != 3 || !codon.bytes().all(|b| b"ACGT".contains(&b)) {
        return Err(format!("Invalid codon: {}", s));
    }
    Ok(codon)
}

fn event_type_from_string(s: &str) -> Result<EventType, String> {
    s.trim().parse::<EventType>().map_err(|e| e.to_string())
}

fn test_kind_from_string(s: &str) -> Result<TestKind, String> {
    s.parse().map_err(|e: crate::utils::Error| e.to_string())
}

fn range_from_string(s: &str) -> Result<(f64, f64), String> {
    let error = || format!("Expected two comma separated quantiles, got '{}'", s);
    let (low, high) = s.split_once(',').ok_or_else(error)?;
    let low = ensure_unit_float(low.trim())?;
    let high = ensure_unit_float(high.trim())?;
    if low > high {
        return Err(error());
    }
    Ok((low, high))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codons() {
        assert_eq!(codon_from_string("atg").unwrap(), "ATG");
        assert!(codon_from_string("ATGG").is_err());
        assert!(codon_from_string("ANG").is_err());
    }

    #[test]
    fn event_types() {
        assert_eq!(event_type_from_string("IR").unwrap(), EventType::IntronRetention);
        assert!(event_type_from_string("XX").is_err());
    }

    #[test]
    fn delimited_arguments() {
        let cli = Cli::try_parse_from([
            "isograph", "die", "-c", "Cargo.toml", "-s", "Cargo.toml", "-o", "out", "--groups", "ctrl,case",
        ])
        .unwrap();
        match cli.command {
            Command::Die(args) => assert_eq!(args.groups, vec!["ctrl", "case"]),
            _ => panic!("expected the die command"),
        }

        let cli = Cli::try_parse_from([
            "isograph", "coordinate", "-c", "Cargo.toml", "-s", "Cargo.toml", "-o", "out", "--event-types", "ES,IR",
        ])
        .unwrap();
        match cli.command {
            Command::Coordinate(args) => {
                assert_eq!(args.event_types, vec![EventType::ExonSkipping, EventType::IntronRetention]);
                assert_eq!(args.test, TestKind::Chi2);
                assert!(args.groups.is_none());
            }
            _ => panic!("expected the coordinate command"),
        }
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from([
            "isograph", "die", "-c", "Cargo.toml", "-s", "Cargo.toml", "-o", "out", "--groups", "ctrl,case",
        ])
        .unwrap();
        match cli.command {
            Command::Die(args) => {
                assert_eq!(args.min_cov, 25);
                assert_eq!(args.max_isoforms, 10);
            }
            _ => panic!("expected the die command"),
        }

        let cli = Cli::try_parse_from(["isograph", "coordinate", "-c", "Cargo.toml", "-s", "Cargo.toml", "-o", "out"])
            .unwrap();
        match cli.command {
            Command::Coordinate(args) => {
                // terminal events are opt-in
                assert_eq!(
                    args.event_types,
                    vec![
                        EventType::ExonSkipping,
                        EventType::AltFivePrime,
                        EventType::AltThreePrime,
                        EventType::IntronRetention,
                        EventType::MutuallyExclusive,
                    ]
                );
                assert_eq!(args.min_total, 100);
            }
            _ => panic!("expected the coordinate command"),
        }
    }

    #[test]
    fn search_ranges() {
        assert_eq!(range_from_string("0.1, 0.9").unwrap(), (0.1, 0.9));
        assert!(range_from_string("0.9,0.1").is_err());
        assert!(range_from_string("0.5").is_err());
        assert!(range_from_string("0.1,1.5").is_err());
    }

    #[test]
    fn thread_counts() {
        assert_eq!(threads_in_range("4").unwrap(), 4);
        assert!(threads_in_range("0").is_err());
        assert!(threads_in_range("x").is_err());
    }
}
