use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("duplicated term: {0}")]
    DuplicatedTerm(String),

    #[error("unknown term: {0}")]
    UnknownTerm(String),

    #[error("insufficient data: {samples} samples for {free} free parameters")]
    InsufficientData { samples: usize, free: usize },

    #[error("cannot fit data from different sites: latitude {expected} vs {found}")]
    SiteMismatch { expected: f64, found: f64 },

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
