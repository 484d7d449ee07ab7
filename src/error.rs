use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconstructionError {
    #[error("Fact store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Statement {statement} is absent from filing {filing}")]
    StatementAbsent { filing: String, statement: String },

    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Invalid {table} row {row}: {details}")]
    InvalidRow {
        table: &'static str,
        row: usize,
        details: String,
    },

    #[error("Invalid dataset vintage {year}q{quarter}: quarter must be between 1 and 4")]
    InvalidVintage { year: i32, quarter: u8 },

    #[error("Accounting identity violation on {date}: Assets ({assets}) != Liabilities and Equity ({liabilities_and_equity}), difference {difference}")]
    AccountingIdentityViolation {
        date: String,
        assets: f64,
        liabilities_and_equity: f64,
        difference: f64,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReconstructionError>;
