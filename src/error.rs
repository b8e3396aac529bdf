use thiserror::Error;

/// Errors of the characterization and replay pipeline.
///
/// None of them is retried: every stage fails fast and hands the error back to the caller.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown flow label, flow too short, empty or degenerate series
    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Missing model fields, unknown sampling mode or algorithm, invalid parameter
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A sampler was given parameters outside of its domain
    #[error("Numeric domain error: {0}")]
    NumericDomain(String),

    /// The small-cluster merge has no eligible target
    #[error("Convergence failure: {0}")]
    Convergence(String),

    /// A generation worker died without reporting a result
    #[error("Generation worker of sub-flow {0} panicked")]
    Worker(String),

    /// A generation worker finished but its packets could not be collected
    #[error("Generation worker of sub-flow {0} could not hand over its packets: output channel closed")]
    ChannelClosed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
