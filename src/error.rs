use thiserror::Error;

#[derive(Error, Debug)]
pub enum RhoError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Parsing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    #[error("Parse Error (line {line}): {message}")]
    Parse { line: usize, message: String },

    #[error("Invalid pair configuration: {0}")]
    InvalidConfiguration(String),

    #[error("No usable likelihood for pair type {config}: {reason}")]
    UnsupportedConfiguration { config: String, reason: String },

    #[error("Offset {offset} is not strictly inside block of size {size}")]
    InvalidOffset { offset: usize, size: usize },

    #[error("Blocks {left} and {right} are not adjacent")]
    NotAdjacent { left: usize, right: usize },

    #[error("Shifting boundary by {delta} leaves sizes {left_size}/{right_size}")]
    BoundaryOverflow {
        delta: isize,
        left_size: isize,
        right_size: isize,
    },

    #[error("Block {0} is not part of this map")]
    UnknownBlock(usize),
}

pub type RhoResult<T> = Result<T, RhoError>;
