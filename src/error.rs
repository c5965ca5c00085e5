use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum FetchError {
    #[display("request to {endpoint} failed")]
    Request { endpoint: String },
    #[display("{endpoint} returned status {status}")]
    Status { endpoint: String, status: String },
    #[display("failed to parse response from {endpoint}")]
    ResponseParse { endpoint: String },
    #[display("api key not found in environment variable {var}")]
    MissingApiKey { var: String },
}

/// Failures raised by the normalizer and the indicator engine.
///
/// Per-row numeric gaps (no history yet, zero divisor) are never errors; they
/// show up as `None` cells instead.
#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum TableError {
    #[display("schema error: {field}")]
    Schema { field: String },
    #[display("invalid parameter: {name}")]
    InvalidParameter { name: String },
    #[display("column {column} has {actual} rows, table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
}
