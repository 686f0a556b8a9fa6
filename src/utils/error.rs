use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the gene-level analyses.
///
/// `Config` errors are reported before any per-transcript work starts. `Data`
/// and `Stats` errors indicate inconsistent upstream data or a filtering policy
/// that let a degenerate table through; callers processing many genes are
/// expected to log them and continue with the next gene.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("data inconsistency: {0}")]
    Data(String),

    #[error("statistical test failed: {0}")]
    Stats(String),

    #[error("{0}")]
    Parse(String),

    #[error("genome access failed: {0}")]
    Genome(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Parse(msg)
    }
}

pub fn handle_error_and_exit(err: Error) -> ! {
    log::error!("{}", err);
    std::process::exit(1);
}
